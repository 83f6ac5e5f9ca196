// Host platform and Linux distribution family detection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use super::errors::{PipelineError, Result};

/// Operating systems we know how to provision tools on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    /// Map an OS identifier as reported by `std::env::consts::OS`.
    pub fn resolve(os: &str) -> Result<Self> {
        match os {
            "windows" => Ok(Self::Windows),
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            other => Err(PipelineError::UnsupportedPlatform {
                os: other.to_string(),
            }),
        }
    }

    pub fn current() -> Result<Self> {
        Self::resolve(std::env::consts::OS)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::MacOs => "macos",
            Self::Linux => "linux",
        }
    }

    /// Separator between entries of the `PATH` variable.
    pub fn path_separator(&self) -> char {
        match self {
            Self::Windows => ';',
            Self::MacOs | Self::Linux => ':',
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package-management ecosystem of a Linux host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroFamily {
    Debian,
    Rhel,
    Arch,
    Suse,
    Alpine,
    Unknown,
}

/// Marker files checked when os-release is missing or unhelpful.
const MARKER_FILES: &[(&str, DistroFamily)] = &[
    ("etc/debian_version", DistroFamily::Debian),
    ("etc/redhat-release", DistroFamily::Rhel),
    ("etc/fedora-release", DistroFamily::Rhel),
    ("etc/arch-release", DistroFamily::Arch),
    ("etc/SuSE-release", DistroFamily::Suse),
    ("etc/alpine-release", DistroFamily::Alpine),
];

impl DistroFamily {
    /// Detect the family of a filesystem rooted at `root` (`/` for the host).
    pub async fn detect_in(root: &Path) -> Self {
        if let Ok(content) = tokio::fs::read_to_string(root.join("etc/os-release")).await {
            let family = Self::from_os_release(&content);
            if family != Self::Unknown {
                return family;
            }
        }

        for (marker, family) in MARKER_FILES {
            if tokio::fs::try_exists(root.join(marker)).await.unwrap_or(false) {
                return *family;
            }
        }

        Self::Unknown
    }

    /// Classify by `ID`, then by each `ID_LIKE` token.
    pub fn from_os_release(content: &str) -> Self {
        let mut id = None;
        let mut id_like = None;

        for line in content.lines() {
            if let Some((key, value)) = line.trim().split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                match key {
                    "ID" => id = Some(value.to_lowercase()),
                    "ID_LIKE" => id_like = Some(value.to_lowercase()),
                    _ => {}
                }
            }
        }

        let candidates = id
            .iter()
            .map(String::as_str)
            .chain(id_like.iter().flat_map(|like| like.split_whitespace()));

        for candidate in candidates {
            let family = Self::from_id(candidate);
            if family != Self::Unknown {
                return family;
            }
        }

        Self::Unknown
    }

    fn from_id(id: &str) -> Self {
        match id {
            "debian" | "ubuntu" | "linuxmint" | "pop" | "raspbian" | "elementary" | "kali" => {
                Self::Debian
            }
            "rhel" | "fedora" | "centos" | "rocky" | "almalinux" | "ol" | "amzn" => Self::Rhel,
            "arch" | "manjaro" | "endeavouros" => Self::Arch,
            "suse" | "sles" | "opensuse" => Self::Suse,
            "alpine" => Self::Alpine,
            other if other.starts_with("opensuse") => Self::Suse,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debian => "debian",
            Self::Rhel => "rhel",
            Self::Arch => "arch",
            Self::Suse => "suse",
            Self::Alpine => "alpine",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
