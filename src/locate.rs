//! Source location: maps a kernel version to a download URL.
//!
//! Three mutually exclusive strategies exist:
//! - upstream versions come from kernel.org as a .tar.xz tarball
//! - distro-tagged versions come from the internal build system as an SRPM,
//!   when its host resolves
//! - otherwise they come from the public CentOS vault mirror, looked up in a
//!   static version-to-release map
//!
//! The strategy is decided once, before any download starts; there is no
//! fallback after a transfer begins.

use std::net::ToSocketAddrs;

use thiserror::Error;

use crate::version::KernelVersion;

const UPSTREAM_BASE: &str = "https://www.kernel.org/pub/linux/kernel/";
const INTERNAL_HOST: &str = "download.eng.bos.redhat.com";
const INTERNAL_BASE: &str = "http://download.eng.bos.redhat.com/brewroot/packages/kernel/";
const MIRROR_BASE: &str = "http://vault.centos.org/";

/// Known CentOS kernel releases and the vault directory that carries them.
/// A distro version absent from this table cannot be fetched from the mirror.
pub const CENTOS_RELEASE_MAP: &[(&str, &str)] = &[
    ("3.10.0-123.el7", "7.0.1406"),
    ("3.10.0-229.el7", "7.1.1503"),
    ("3.10.0-327.el7", "7.2.1511"),
    ("3.10.0-514.el7", "7.3.1611"),
    ("3.10.0-693.el7", "7.4.1708"),
    ("3.10.0-862.el7", "7.5.1804"),
    ("3.10.0-957.el7", "7.6.1810"),
    ("3.10.0-1062.el7", "7.7.1908"),
    ("3.10.0-1127.el7", "7.8.2003"),
    ("4.18.0-80.el8", "8.0.1905"),
    ("4.18.0-147.el8", "8.1.1911"),
    ("4.18.0-193.el8", "8.2.2004"),
    ("4.18.0-240.el8", "8.3.2011"),
    ("4.18.0-305.el8", "8.4.2105"),
    ("4.18.0-348.el8", "8.5.2111"),
];

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error(
        "kernel {0} is not in the CentOS release map and the internal build \
         system is unreachable; cannot determine a download source"
    )]
    UnknownCentosRelease(String),
}

/// Where the sources come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Upstream,
    InternalBuildSystem,
    PublicMirror,
}

/// Container format of the downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarXz,
    TarBz2,
    Srpm,
}

/// A fully resolved acquisition: one strategy, one URL, one local file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionPlan {
    pub strategy: Strategy,
    pub url: String,
    pub file_name: String,
    pub format: ArchiveFormat,
}

/// Resolve a version to an acquisition plan using real DNS for the internal
/// host probe.
pub fn resolve(version: &KernelVersion) -> Result<AcquisitionPlan, ResolutionError> {
    resolve_with(version, host_resolves)
}

/// Resolve with an injected DNS probe, so the internal-vs-mirror decision can
/// be exercised without touching the network.
pub fn resolve_with(
    version: &KernelVersion,
    resolver: impl Fn(&str) -> bool,
) -> Result<AcquisitionPlan, ResolutionError> {
    match version {
        KernelVersion::Upstream { .. } => Ok(upstream_plan(version)),
        KernelVersion::DistroTagged { .. } => {
            if resolver(INTERNAL_HOST) {
                Ok(internal_plan(version))
            } else {
                mirror_plan(version)
            }
        }
    }
}

fn upstream_plan(version: &KernelVersion) -> AcquisitionPlan {
    // kernel.org shards release directories by era: v2.6/, v3.x/, v5.x/ ...
    let dir = match version {
        KernelVersion::Upstream { major, minor, .. } if version.is_pre_3_0() => {
            format!("v{}.{}/", major, minor)
        }
        KernelVersion::Upstream { major, .. } => format!("v{}.x/", major),
        KernelVersion::DistroTagged { .. } => unreachable!("upstream plan for distro version"),
    };
    let file_name = format!("linux-{}.tar.xz", version);
    AcquisitionPlan {
        strategy: Strategy::Upstream,
        url: format!("{}{}{}", UPSTREAM_BASE, dir, file_name),
        file_name,
        format: ArchiveFormat::TarXz,
    }
}

fn internal_plan(version: &KernelVersion) -> AcquisitionPlan {
    let release = version
        .release()
        .expect("internal plan requires a distro-tagged version");
    let file_name = format!("kernel-{}.src.rpm", version);
    AcquisitionPlan {
        strategy: Strategy::InternalBuildSystem,
        url: format!(
            "{}{}/{}/src/{}",
            INTERNAL_BASE,
            version.base(),
            release,
            file_name
        ),
        file_name,
        format: ArchiveFormat::Srpm,
    }
}

fn mirror_plan(version: &KernelVersion) -> Result<AcquisitionPlan, ResolutionError> {
    let full = version.to_string();
    let mapped = CENTOS_RELEASE_MAP
        .iter()
        .find(|(v, _)| *v == full)
        .map(|(_, release)| *release)
        .ok_or_else(|| ResolutionError::UnknownCentosRelease(full.clone()))?;

    // CentOS 8 split sources under BaseOS; 7 keeps the flat os/ layout.
    let repo = if version.is_el8() { "BaseOS" } else { "os" };
    let file_name = format!("kernel-{}.src.rpm", version);
    Ok(AcquisitionPlan {
        strategy: Strategy::PublicMirror,
        url: format!(
            "{}{}/{}/Source/SPackages/{}",
            MIRROR_BASE, mapped, repo, file_name
        ),
        file_name,
        format: ArchiveFormat::Srpm,
    })
}

/// DNS probe: true when the host resolves to at least one address.
fn host_resolves(host: &str) -> bool {
    (host, 443)
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> KernelVersion {
        s.parse().unwrap()
    }

    #[test]
    fn upstream_modern_version_uses_major_x_directory() {
        let plan = resolve_with(&parse("5.10.4"), |_| panic!("no DNS for upstream")).unwrap();
        assert_eq!(plan.strategy, Strategy::Upstream);
        assert_eq!(plan.format, ArchiveFormat::TarXz);
        assert_eq!(plan.file_name, "linux-5.10.4.tar.xz");
        assert_eq!(
            plan.url,
            "https://www.kernel.org/pub/linux/kernel/v5.x/linux-5.10.4.tar.xz"
        );
    }

    #[test]
    fn upstream_pre_3_0_uses_major_minor_directory() {
        let plan = resolve_with(&parse("2.6.32"), |_| false).unwrap();
        assert_eq!(
            plan.url,
            "https://www.kernel.org/pub/linux/kernel/v2.6/linux-2.6.32.tar.xz"
        );
    }

    #[test]
    fn upstream_boundary_3_0_counts_as_modern() {
        let plan = resolve_with(&parse("3.0.0"), |_| false).unwrap();
        assert_eq!(
            plan.url,
            "https://www.kernel.org/pub/linux/kernel/v3.x/linux-3.0.0.tar.xz"
        );
    }

    #[test]
    fn distro_version_prefers_internal_when_host_resolves() {
        let plan = resolve_with(&parse("3.10.0-957.el7"), |host| {
            assert_eq!(host, "download.eng.bos.redhat.com");
            true
        })
        .unwrap();
        assert_eq!(plan.strategy, Strategy::InternalBuildSystem);
        assert_eq!(plan.format, ArchiveFormat::Srpm);
        assert_eq!(plan.file_name, "kernel-3.10.0-957.el7.src.rpm");
        assert_eq!(
            plan.url,
            "http://download.eng.bos.redhat.com/brewroot/packages/kernel/3.10.0/957.el7/src/kernel-3.10.0-957.el7.src.rpm"
        );
    }

    #[test]
    fn distro_version_falls_back_to_mirror_when_host_unresolvable() {
        let plan = resolve_with(&parse("3.10.0-957.el7"), |_| false).unwrap();
        assert_eq!(plan.strategy, Strategy::PublicMirror);
        assert_eq!(
            plan.url,
            "http://vault.centos.org/7.6.1810/os/Source/SPackages/kernel-3.10.0-957.el7.src.rpm"
        );
    }

    #[test]
    fn el8_mirror_url_uses_baseos_segment() {
        let plan = resolve_with(&parse("4.18.0-80.el8"), |_| false).unwrap();
        assert_eq!(
            plan.url,
            "http://vault.centos.org/8.0.1905/BaseOS/Source/SPackages/kernel-4.18.0-80.el8.src.rpm"
        );
    }

    #[test]
    fn every_mapped_release_uses_matching_repo_segment() {
        for (version, _) in CENTOS_RELEASE_MAP {
            let plan = resolve_with(&parse(version), |_| false).unwrap();
            if version.ends_with(".el8") {
                assert!(plan.url.contains("/BaseOS/"), "{}", plan.url);
            } else {
                assert!(plan.url.contains("/os/"), "{}", plan.url);
            }
            assert!(plan.url.ends_with(&format!("kernel-{}.src.rpm", version)));
        }
    }

    #[test]
    fn unmapped_distro_version_fails_resolution() {
        let err = resolve_with(&parse("3.10.0-1160.el7"), |_| false).unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownCentosRelease(_)));
        assert!(err.to_string().contains("3.10.0-1160.el7"));
    }

    #[test]
    fn upstream_never_probes_dns() {
        // Closure panics if called; upstream resolution must not need DNS.
        resolve_with(&parse("4.19.0"), |_| unreachable!()).unwrap();
    }
}
