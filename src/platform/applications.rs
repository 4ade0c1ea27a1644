//! Standard per-domain application directories.
//!
//! Mirrors the Foundation search order for the applications directory across
//! all domains: user, local, network, then system.

use std::path::{Path, PathBuf};

/// File-system domain an application directory belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// `~/Applications`
    User,
    /// `/Applications`
    Local,
    /// `/Network/Applications`
    Network,
    /// `/System/Applications` (read-only, never an install target)
    System,
}

/// One application directory with its domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDir {
    /// Owning domain.
    pub domain: Domain,
    /// Directory path.
    pub path: PathBuf,
}

/// Application directories in search order.
pub fn standard_application_dirs() -> Vec<ApplicationDir> {
    let mut found = Vec::with_capacity(4);
    if let Some(home) = dirs::home_dir() {
        found.push(ApplicationDir {
            domain: Domain::User,
            path: home.join("Applications"),
        });
    }
    found.push(ApplicationDir {
        domain: Domain::Local,
        path: PathBuf::from("/Applications"),
    });
    found.push(ApplicationDir {
        domain: Domain::Network,
        path: PathBuf::from("/Network/Applications"),
    });
    found.push(ApplicationDir {
        domain: Domain::System,
        path: PathBuf::from("/System/Applications"),
    });
    found
}

/// First existing non-system directory in `candidates`.
///
/// `~/Applications` is often missing, so a candidate that is not a directory
/// is passed over rather than handed to the installer.
pub fn preferred_install_dir(candidates: &[ApplicationDir]) -> Option<&Path> {
    candidates
        .iter()
        .find(|d| d.domain != Domain::System && !is_system_path(&d.path) && d.path.is_dir())
        .map(|d| d.path.as_path())
}

fn is_system_path(path: &Path) -> bool {
    path.starts_with("/System")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn dir(domain: Domain, path: impl Into<PathBuf>) -> ApplicationDir {
        ApplicationDir {
            domain,
            path: path.into(),
        }
    }

    #[test]
    fn system_domain_is_skipped() {
        let local = tempfile::tempdir().unwrap();
        let candidates = vec![
            dir(Domain::System, "/System/Applications"),
            dir(Domain::Local, local.path()),
        ];
        assert_eq!(preferred_install_dir(&candidates), Some(local.path()));
    }

    #[test]
    fn system_path_is_skipped_even_if_mislabelled() {
        let network = tempfile::tempdir().unwrap();
        let candidates = vec![
            dir(Domain::Local, "/System/Applications/Utilities"),
            dir(Domain::Network, network.path()),
        ];
        assert_eq!(preferred_install_dir(&candidates), Some(network.path()));
    }

    #[test]
    fn missing_user_dir_falls_through_to_next_domain() {
        let home = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        let candidates = vec![
            dir(Domain::User, home.path().join("Applications")),
            dir(Domain::Local, local.path()),
        ];
        assert_eq!(preferred_install_dir(&candidates), Some(local.path()));

        std::fs::create_dir(home.path().join("Applications")).unwrap();
        assert_eq!(
            preferred_install_dir(&candidates),
            Some(home.path().join("Applications").as_path())
        );
    }

    #[test]
    fn only_system_yields_none() {
        let candidates = vec![dir(Domain::System, "/System/Applications")];
        assert!(preferred_install_dir(&candidates).is_none());
    }

    #[test]
    fn standard_dirs_end_with_system() {
        let dirs = standard_application_dirs();
        assert_eq!(dirs.last().map(|d| d.domain), Some(Domain::System));
        assert!(dirs.iter().any(|d| d.path == Path::new("/Applications")));
    }
}
