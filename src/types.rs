//! Enumerations shared between provider state and the Nebraska wire format.
//!
//! Nebraska stores architectures and package types as small integers while
//! provider configuration uses lowercase names. The tables here are the only
//! place the two representations meet.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// CPU architecture of a channel or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// Architecture independent.
    #[default]
    All,
    /// x86-64.
    Amd64,
    /// 64-bit ARM.
    Aarch64,
    /// 32-bit x86.
    X86,
}

impl Arch {
    /// Every architecture, ordered by wire code.
    pub const ALL: [Arch; 4] = [Arch::All, Arch::Amd64, Arch::Aarch64, Arch::X86];

    /// The names accepted in configuration.
    pub const NAMES: [&'static str; 4] = ["all", "amd64", "aarch64", "x86"];

    /// The canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        Self::NAMES[self.code() as usize]
    }

    /// The integer code used on the wire.
    pub fn code(self) -> u32 {
        match self {
            Arch::All => 0,
            Arch::Amd64 => 1,
            Arch::Aarch64 => 2,
            Arch::X86 => 3,
        }
    }

    /// Look up an architecture by its wire code.
    pub fn from_code(code: u32) -> Result<Self, ProviderError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| ProviderError::Validation(format!("unknown arch code {}", code)))
    }
}

impl FromStr for Arch {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .position(|name| *name == s)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| {
                ProviderError::Validation(format!(
                    "invalid/unsupported arch {:?}, expected one of {:?}",
                    s,
                    Self::NAMES
                ))
            })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of payload a package carries.
///
/// Codes start at 1; the server never assigns 0 to a client-facing package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    /// A Flatcar update payload.
    #[default]
    Flatcar,
    /// A docker container.
    Docker,
    /// A rkt container.
    Rkt,
    /// Anything else.
    Other,
}

impl PackageType {
    /// Every package type, ordered by wire code.
    pub const ALL: [PackageType; 4] = [
        PackageType::Flatcar,
        PackageType::Docker,
        PackageType::Rkt,
        PackageType::Other,
    ];

    /// The names accepted in configuration.
    pub const NAMES: [&'static str; 4] = ["flatcar", "docker", "rkt", "other"];

    /// The canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        Self::NAMES[(self.code() - 1) as usize]
    }

    /// The integer code used on the wire (1..=4).
    pub fn code(self) -> u32 {
        match self {
            PackageType::Flatcar => 1,
            PackageType::Docker => 2,
            PackageType::Rkt => 3,
            PackageType::Other => 4,
        }
    }

    /// Look up a package type by its wire code.
    pub fn from_code(code: u32) -> Result<Self, ProviderError> {
        code.checked_sub(1)
            .and_then(|i| Self::ALL.get(i as usize))
            .copied()
            .ok_or_else(|| ProviderError::Validation(format!("unknown package type code {}", code)))
    }
}

impl FromStr for PackageType {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .position(|name| *name == s)
            .map(|i| Self::ALL[i])
            .ok_or_else(|| {
                ProviderError::Validation(format!("nebraska: invalid/unsupported package type {:?}", s))
            })
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication scheme of the Nebraska server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// No authentication.
    #[default]
    Noop,
    /// GitHub personal access token.
    Github,
    /// OpenID Connect username/password login.
    Oidc,
}

impl AuthMode {
    /// The names accepted in configuration.
    pub const NAMES: [&'static str; 3] = ["noop", "github", "oidc"];

    /// The canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthMode::Noop => "noop",
            AuthMode::Github => "github",
            AuthMode::Oidc => "oidc",
        }
    }
}

impl FromStr for AuthMode {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "noop" => Ok(AuthMode::Noop),
            "github" => Ok(AuthMode::Github),
            "oidc" => Ok(AuthMode::Oidc),
            other => Err(ProviderError::Validation(format!(
                "invalid auth_mode {:?}, expected one of {:?}",
                other,
                Self::NAMES
            ))),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the resource and data source types a provider exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}
