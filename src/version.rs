//! Kernel version string parsing.
//!
//! Two shapes exist in the wild: plain upstream versions ("5.10.4", strictly
//! dotted-numeric) and distro-tagged versions with a release suffix after a
//! hyphen ("3.10.0-957.el7"). Which shape a string parses as decides where the
//! sources are downloaded from, so the distinction is made explicit here
//! instead of being re-derived by string slicing at every call site.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid kernel version '{0}': expected '<major>.<minor>[.<patch>]' or '<version>-<release>'")]
pub struct VersionParseError(pub String);

/// A parsed kernel version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelVersion {
    /// Strict dotted-numeric upstream version, e.g. "5.10.4" or "2.6.32".
    Upstream {
        major: u32,
        minor: u32,
        patch: Option<u32>,
    },
    /// Distribution version with a release suffix, e.g. "3.10.0-957.el7".
    DistroTagged { base: String, release: String },
}

impl KernelVersion {
    /// The upstream part of the version ("3.10.0" for "3.10.0-957.el7").
    pub fn base(&self) -> String {
        match self {
            KernelVersion::Upstream { .. } => self.to_string(),
            KernelVersion::DistroTagged { base, .. } => base.clone(),
        }
    }

    /// The release suffix, if this is a distro-tagged version.
    pub fn release(&self) -> Option<&str> {
        match self {
            KernelVersion::Upstream { .. } => None,
            KernelVersion::DistroTagged { release, .. } => Some(release),
        }
    }

    /// True for RHEL/CentOS 8 releases (release ends in ".el8").
    pub fn is_el8(&self) -> bool {
        self.release().is_some_and(|r| r.ends_with(".el8"))
    }

    /// The full version with a trailing ".elN" tag removed, used to name
    /// KABI companion archives ("3.10.0-957" for "3.10.0-957.el7").
    pub fn without_el_suffix(&self) -> String {
        let full = self.to_string();
        if let Some(pos) = full.rfind(".el") {
            if full[pos + 3..].chars().all(|c| c.is_ascii_digit())
                && !full[pos + 3..].is_empty()
            {
                return full[..pos].to_string();
            }
        }
        full
    }

    /// Leading numeric run of the release ("957" for "957.el7"), if any.
    pub fn release_major(&self) -> Option<&str> {
        let release = self.release()?;
        let end = release
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(release.len());
        if end == 0 {
            None
        } else {
            Some(&release[..end])
        }
    }

    /// True when this version sorts below upstream 3.0 (pre-3.0 kernels live
    /// in differently named directories on kernel.org).
    pub fn is_pre_3_0(&self) -> bool {
        match self {
            KernelVersion::Upstream { major, .. } => *major < 3,
            KernelVersion::DistroTagged { .. } => false,
        }
    }
}

impl FromStr for KernelVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((base, release)) = s.split_once('-') {
            if base.is_empty() || release.is_empty() {
                return Err(VersionParseError(s.to_string()));
            }
            return Ok(KernelVersion::DistroTagged {
                base: base.to_string(),
                release: release.to_string(),
            });
        }

        let mut parts = s.split('.');
        let major = parse_component(parts.next(), s)?;
        let minor = parse_component(parts.next(), s)?;
        let patch = match parts.next() {
            Some(p) => Some(parse_component(Some(p), s)?),
            None => None,
        };
        if parts.next().is_some() {
            return Err(VersionParseError(s.to_string()));
        }
        Ok(KernelVersion::Upstream {
            major,
            minor,
            patch,
        })
    }
}

fn parse_component(part: Option<&str>, full: &str) -> Result<u32, VersionParseError> {
    part.filter(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| VersionParseError(full.to_string()))
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelVersion::Upstream {
                major,
                minor,
                patch,
            } => match patch {
                Some(p) => write!(f, "{}.{}.{}", major, minor, p),
                None => write!(f, "{}.{}", major, minor),
            },
            KernelVersion::DistroTagged { base, release } => {
                write!(f, "{}-{}", base, release)
            }
        }
    }
}
