//! Local implementations of the orchestrator's collaborators.

pub mod detector;
pub mod firewall;
pub mod locate;
pub mod process;
pub mod runner;
pub mod steam;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::launcher::LauncherId;
use crate::storage::KvStore;

/// The launcher's main executable: the saved manual path if it still
/// exists, then the location the system reports for the install, then
/// the first well-known location that exists.
pub fn resolve_primary(store: &KvStore, id: LauncherId) -> Result<Option<PathBuf>> {
    let manual = store.manual_path(id)?;
    Ok(pick_primary(
        manual,
        locate::installed_location(id),
        id.info().candidates,
    ))
}

fn pick_primary(
    manual: Option<PathBuf>,
    located: Option<PathBuf>,
    candidates: &[&str],
) -> Option<PathBuf> {
    manual
        .into_iter()
        .chain(located)
        .chain(candidates.iter().map(PathBuf::from))
        .find(|p| p.is_file())
}

/// Joins a catalog-relative path, resolving `..` lexically. Catalog paths
/// use `\` separators.
pub(crate) fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in relative.split(['\\', '/']) {
        match part {
            "" | "." => {}
            ".." => {
                path.pop();
            }
            part => path.push(part),
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn manual_path_then_located_install_then_candidates() {
        let dir = tempdir().unwrap();
        let manual = dir.path().join("manual.exe");
        let located = dir.path().join("located.exe");
        let candidate = dir.path().join("candidate.exe");
        fs::write(&located, b"MZ").unwrap();
        fs::write(&candidate, b"MZ").unwrap();
        let candidates = [candidate.to_str().unwrap()];

        // A manual path that no longer exists falls through.
        assert_eq!(
            pick_primary(Some(manual.clone()), Some(located.clone()), &candidates),
            Some(located.clone())
        );
        fs::write(&manual, b"MZ").unwrap();
        assert_eq!(
            pick_primary(Some(manual.clone()), Some(located), &candidates),
            Some(manual)
        );
        assert_eq!(pick_primary(None, None, &candidates), Some(candidate));
        assert_eq!(pick_primary(None, None, &[]), None);
    }

    #[test]
    fn join_relative_resolves_parent_segments() {
        let base = Path::new("/games/Rockstar Games/Launcher");
        assert_eq!(
            join_relative(base, r"..\Social Club\SocialClubHelper.exe"),
            PathBuf::from("/games/Rockstar Games/Social Club/SocialClubHelper.exe")
        );
    }
}
