//! Mach-O constants.
//!
//! Read-only format constants; only the subset needed for segment lookup and
//! dylib injection is kept.

// =============================================================================
// Magic Numbers
// =============================================================================

/// 64-bit Mach-O magic (little-endian)
pub const MH_MAGIC_64: u32 = 0xFEEDFACF;

/// FAT binary magic (big-endian on disk)
pub const FAT_MAGIC: u32 = 0xCAFEBABE;

/// FAT binary magic, byte-reversed
pub const FAT_CIGAM: u32 = 0xBEBAFECA;

// =============================================================================
// CPU Types
// =============================================================================

/// 64-bit architecture flag
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;

/// ARM CPU type
pub const CPU_TYPE_ARM: u32 = 12;
/// ARM64 CPU type
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;

/// x86 CPU type
pub const CPU_TYPE_X86: u32 = 7;
/// x86_64 CPU type
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;

// =============================================================================
// Load Commands
// =============================================================================

/// Load a dynamically linked shared library
pub const LC_LOAD_DYLIB: u32 = 0xC;

/// 64-bit segment of this file
pub const LC_SEGMENT_64: u32 = 0x19;
