//! Patch configuration model.
//!
//! The configuration document is a JSON array of version targets, each
//! listing named patch groups with per-architecture entries:
//!
//! ```json
//! [
//!   {
//!     "version": "4.0.6.17",
//!     "targets": [
//!       {
//!         "identifier": "revoke",
//!         "entries": [
//!           { "arch": "arm64", "addr": "1004b87a0", "asm": "1f2003d5" }
//!         ]
//!       }
//!     ]
//!   }
//! ]
//! ```
//!
//! `addr` is base-16 without prefix and `asm` is a hex byte string; malformed
//! hex in either field fails the whole load, before any binary is touched.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::hex;
use crate::macho::constants::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};

/// Supported target architectures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Arch {
    /// 64-bit ARM
    #[serde(rename = "arm64")]
    Arm64,
    /// 64-bit x86
    #[serde(rename = "x86_64")]
    X86_64,
}

impl Arch {
    /// Returns the Mach-O CPU type code for this architecture.
    ///
    /// The mapping is total and bijective over the supported values.
    #[inline]
    pub fn cputype(self) -> u32 {
        match self {
            Arch::Arm64 => CPU_TYPE_ARM64,
            Arch::X86_64 => CPU_TYPE_X86_64,
        }
    }

    /// Returns the canonical architecture name.
    pub fn name(self) -> &'static str {
        match self {
            Arch::Arm64 => "arm64",
            Arch::X86_64 => "x86_64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One patch: replacement bytes for a virtual address in one architecture.
#[derive(Debug, Clone, Deserialize)]
pub struct PatchEntry {
    /// Architecture the entry applies to
    pub arch: Arch,
    /// Target virtual address
    #[serde(deserialize_with = "de_hex_u64")]
    pub addr: u64,
    /// Replacement instruction bytes
    #[serde(deserialize_with = "de_hex_bytes")]
    pub asm: Vec<u8>,
}

/// A named group of patch entries (one tweak feature).
#[derive(Debug, Clone, Deserialize)]
pub struct PatchTarget {
    /// Human-readable name of the group
    pub identifier: String,
    /// Entries belonging to the group
    pub entries: Vec<PatchEntry>,
}

/// All patches for one application version.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionTarget {
    /// Application version string this target applies to
    pub version: String,
    /// Patch groups
    pub targets: Vec<PatchTarget>,
}

impl VersionTarget {
    /// Iterates every patch entry across all groups.
    pub fn entries(&self) -> impl Iterator<Item = &PatchEntry> {
        self.targets.iter().flat_map(|t| t.entries.iter())
    }
}

/// Loads and decodes a configuration document from a local file.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<VersionTarget>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|e| Error::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse(&data).map_err(|e| Error::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Decodes a configuration document from its JSON text.
pub fn parse(data: &str) -> serde_json::Result<Vec<VersionTarget>> {
    serde_json::from_str(data)
}

fn de_hex_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let s = String::deserialize(deserializer)?;
    u64::from_str_radix(&s, 16)
        .map_err(|_| serde::de::Error::custom(format!("invalid hex address '{}'", s)))
}

fn de_hex_bytes<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    hex::decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "version": "4.0.6",
            "targets": [
                {
                    "identifier": "revoke",
                    "entries": [
                        { "arch": "arm64", "addr": "100000010", "asm": "1f2003d5" },
                        { "arch": "x86_64", "addr": "100000020", "asm": "9090" }
                    ]
                },
                {
                    "identifier": "multirun",
                    "entries": [
                        { "arch": "arm64", "addr": "100000030", "asm": "c0035fd6" }
                    ]
                }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_config() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config[0].version, "4.0.6");
        assert_eq!(config[0].targets.len(), 2);

        let entries: Vec<_> = config[0].entries().collect();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].arch, Arch::Arm64);
        assert_eq!(entries[0].addr, 0x1_0000_0010);
        assert_eq!(entries[0].asm, vec![0x1F, 0x20, 0x03, 0xD5]);
        assert_eq!(entries[1].arch, Arch::X86_64);
    }

    #[test]
    fn test_bad_hex_addr() {
        let doc = r#"[{ "version": "1", "targets": [
            { "identifier": "x", "entries": [{ "arch": "arm64", "addr": "0xzz", "asm": "90" }] }
        ]}]"#;
        assert!(parse(doc).is_err());
    }

    #[test]
    fn test_bad_hex_asm() {
        let doc = r#"[{ "version": "1", "targets": [
            { "identifier": "x", "entries": [{ "arch": "arm64", "addr": "10", "asm": "123" }] }
        ]}]"#;
        assert!(parse(doc).is_err());
    }

    #[test]
    fn test_cputype_mapping() {
        assert_eq!(Arch::Arm64.cputype(), CPU_TYPE_ARM64);
        assert_eq!(Arch::X86_64.cputype(), CPU_TYPE_X86_64);
        assert_eq!(Arch::Arm64.to_string(), "arm64");
    }
}
