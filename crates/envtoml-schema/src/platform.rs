//! The closed set of target platforms a document may name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown platform '{0}'")]
pub struct UnknownPlatform(pub String);

/// A target platform identifier from the closed set understood by solvers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "linux-32")]
    Linux32,
    #[serde(rename = "linux-64")]
    Linux64,
    #[serde(rename = "linux-aarch64")]
    LinuxAarch64,
    #[serde(rename = "linux-armv6l")]
    LinuxArmV6l,
    #[serde(rename = "linux-armv7l")]
    LinuxArmV7l,
    #[serde(rename = "linux-ppc64")]
    LinuxPpc64,
    #[serde(rename = "linux-ppc64le")]
    LinuxPpc64le,
    #[serde(rename = "linux-s390x")]
    LinuxS390x,
    #[serde(rename = "linux-riscv64")]
    LinuxRiscv64,
    #[serde(rename = "osx-64")]
    Osx64,
    #[serde(rename = "osx-arm64")]
    OsxArm64,
    #[serde(rename = "win-32")]
    Win32,
    #[serde(rename = "win-64")]
    Win64,
    #[serde(rename = "win-arm64")]
    WinArm64,
    #[serde(rename = "emscripten-wasm32")]
    EmscriptenWasm32,
    #[serde(rename = "wasi-wasm32")]
    WasiWasm32,
    #[serde(rename = "zos-z")]
    ZosZ,
}

impl Platform {
    pub const ALL: &'static [Platform] = &[
        Platform::Linux32,
        Platform::Linux64,
        Platform::LinuxAarch64,
        Platform::LinuxArmV6l,
        Platform::LinuxArmV7l,
        Platform::LinuxPpc64,
        Platform::LinuxPpc64le,
        Platform::LinuxS390x,
        Platform::LinuxRiscv64,
        Platform::Osx64,
        Platform::OsxArm64,
        Platform::Win32,
        Platform::Win64,
        Platform::WinArm64,
        Platform::EmscriptenWasm32,
        Platform::WasiWasm32,
        Platform::ZosZ,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux32 => "linux-32",
            Platform::Linux64 => "linux-64",
            Platform::LinuxAarch64 => "linux-aarch64",
            Platform::LinuxArmV6l => "linux-armv6l",
            Platform::LinuxArmV7l => "linux-armv7l",
            Platform::LinuxPpc64 => "linux-ppc64",
            Platform::LinuxPpc64le => "linux-ppc64le",
            Platform::LinuxS390x => "linux-s390x",
            Platform::LinuxRiscv64 => "linux-riscv64",
            Platform::Osx64 => "osx-64",
            Platform::OsxArm64 => "osx-arm64",
            Platform::Win32 => "win-32",
            Platform::Win64 => "win-64",
            Platform::WinArm64 => "win-arm64",
            Platform::EmscriptenWasm32 => "emscripten-wasm32",
            Platform::WasiWasm32 => "wasi-wasm32",
            Platform::ZosZ => "zos-z",
        }
    }

    /// Whether `s` names a member of the known platform set.
    pub fn is_known(s: &str) -> bool {
        s.parse::<Platform>().is_ok()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPlatform(s.to_owned()))
    }
}
