//! Mach-O container parsing and modification.

pub mod commands;
pub mod constants;
pub mod fat;
pub mod file;
pub mod structs;

pub use commands::{read_slice_header, CommandRecord, CommandWalker};
pub use fat::{detect, Container, SliceDescriptor};
pub use file::BinaryFile;
