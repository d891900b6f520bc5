//! machtweak - in-place patching and dylib injection for Mach-O binaries.
//!
//! This library locates, validates, and modifies 64-bit Mach-O executables,
//! thin or fat (universal), two ways:
//!
//! - **Patching**: overwrite instruction bytes at configured virtual
//!   addresses, translated to file offsets through the containing segment.
//! - **Injection**: splice an `LC_LOAD_DYLIB` load command referencing an
//!   auxiliary dylib into the load command region, keeping `ncmds` and
//!   `sizeofcmds` consistent. Re-running against an already-injected binary
//!   is a no-op.
//!
//! All file access goes through a scoped [`macho::BinaryFile`] capability
//! with explicit read/write-at-offset operations; the fat arch table is read
//! but never rewritten.
//!
//! # Example
//!
//! ```no_run
//! use machtweak::{config, patch_binary, inject_dylib, Arch};
//!
//! fn main() -> machtweak::Result<()> {
//!     let targets = config::load("config.json")?;
//!     let target = &targets[0];
//!
//!     patch_binary("MyApp.app/Contents/MacOS/MyApp", target)?;
//!     inject_dylib(
//!         "MyApp.app/Contents/MacOS/MyApp",
//!         "@executable_path/TweakPlugin.dylib",
//!         &[Arch::Arm64],
//!     )?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod hex;
pub mod injector;
pub mod macho;
pub mod patcher;
pub mod util;

// Re-export main types
pub use config::{Arch, PatchEntry, VersionTarget};
pub use error::{Error, Result};
pub use injector::{inject_dylib, inject_slice, InjectOutcome};
pub use patcher::{patch_binary, patch_slice};
