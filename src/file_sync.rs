//! Conditional writes of RTTClient.INI
//!
//! `plan` performs every check without touching the disk beyond reads, so the
//! status reporter can ask what a profile start would do. `sync` executes the
//! plan.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::ownership::{FileOwnership, OwnershipState, classify};
use crate::paths::{RttPaths, backup_path};

/// Why a write was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    Disabled,
    AwaitingConsent,
    /// No installation directory configured, so there is no valid target path
    NoInstallDir,
    /// Installation directory configured but absent on disk
    MissingInstallDir(PathBuf),
    /// Target exists, differs from the generated content and lacks the marker
    NotOwned(PathBuf),
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::Disabled => write!(f, "RTT configuration generation is disabled"),
            Refusal::AwaitingConsent => {
                write!(f, "RTT configuration generation is waiting for consent to take over the existing file")
            }
            Refusal::NoInstallDir => write!(f, "the Falcon installation directory is not configured"),
            Refusal::MissingInstallDir(path) => {
                write!(f, "the Falcon installation directory '{}' does not exist", path.display())
            }
            Refusal::NotOwned(path) => {
                write!(f, "'{}' was not generated by this application", path.display())
            }
        }
    }
}

/// I/O failure while reading or writing the configuration
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read '{}'", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to create directory '{}'", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to write '{}'", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to back up '{}' to '{}'", .from.display(), .to.display())]
    Backup {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

impl SyncError {
    /// Underlying I/O error, for log fields and user-facing messages
    pub fn io_error(&self) -> &io::Error {
        match self {
            SyncError::Read { source, .. }
            | SyncError::CreateDir { source, .. }
            | SyncError::Write { source, .. }
            | SyncError::Backup { source, .. } => source,
        }
    }
}

/// What a sync would do, computed without writing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    Refuse(Refusal),
    UpToDate,
    Write {
        path: PathBuf,
        /// State of the file that will be replaced
        existing: FileOwnership,
    },
}

#[derive(Debug)]
pub enum SyncOutcome {
    Updated,
    UpToDate,
    Refused(Refusal),
    Failed(SyncError),
}

impl SyncOutcome {
    /// True if the file on disk now matches the generated content
    pub fn is_current(&self) -> bool {
        matches!(self, SyncOutcome::Updated | SyncOutcome::UpToDate)
    }
}

pub fn plan(
    paths: Option<&RttPaths>,
    state: OwnershipState,
    content: &str,
) -> Result<SyncPlan, SyncError> {
    match state {
        OwnershipState::Disabled => return Ok(SyncPlan::Refuse(Refusal::Disabled)),
        OwnershipState::AwaitingConsent => return Ok(SyncPlan::Refuse(Refusal::AwaitingConsent)),
        OwnershipState::Active => {}
    }

    let Some(paths) = paths else {
        return Ok(SyncPlan::Refuse(Refusal::NoInstallDir));
    };
    if !paths.install_dir().is_dir() {
        return Ok(SyncPlan::Refuse(Refusal::MissingInstallDir(
            paths.install_dir().to_path_buf(),
        )));
    }

    let path = paths.config_file();
    let existing = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(SyncPlan::Write {
                path,
                existing: FileOwnership::Missing,
            });
        }
        Err(source) => return Err(SyncError::Read { path, source }),
    };

    if existing == content.as_bytes() {
        return Ok(SyncPlan::UpToDate);
    }

    match classify(&existing) {
        FileOwnership::Foreign => Ok(SyncPlan::Refuse(Refusal::NotOwned(path))),
        ownership => Ok(SyncPlan::Write {
            path,
            existing: ownership,
        }),
    }
}

/// Bring the target file in line with `content`, if we are allowed to
pub fn sync(paths: Option<&RttPaths>, state: OwnershipState, content: &str) -> SyncOutcome {
    let plan = match plan(paths, state, content) {
        Ok(plan) => plan,
        Err(e) => {
            error!(error = %e, cause = %e.io_error(), "Failed to inspect RTT configuration");
            return SyncOutcome::Failed(e);
        }
    };

    match plan {
        SyncPlan::Refuse(reason) => {
            warn!(reason = %reason, "Not writing RTT configuration");
            SyncOutcome::Refused(reason)
        }
        SyncPlan::UpToDate => {
            debug!("RTT configuration on disk is already up to date");
            SyncOutcome::UpToDate
        }
        SyncPlan::Write { path, existing } => match write_config(&path, content) {
            Ok(()) => {
                info!(path = %path.display(), replaced = ?existing, "Wrote RTT configuration");
                SyncOutcome::Updated
            }
            Err(e) => {
                error!(error = %e, cause = %e.io_error(), "Failed to write RTT configuration");
                SyncOutcome::Failed(e)
            }
        },
    }
}

fn write_config(path: &Path, content: &str) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SyncError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| SyncError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Move a foreign file out of the way and write ours in its place.
///
/// Returns the backup path. If writing the new file fails, the backup is
/// moved back so the user's file is not lost.
pub fn adopt(target: &Path, content: &str) -> Result<PathBuf, SyncError> {
    adopt_with(target, |path| write_config(path, content))
}

fn adopt_with<F>(target: &Path, write: F) -> Result<PathBuf, SyncError>
where
    F: FnOnce(&Path) -> Result<(), SyncError>,
{
    let backup = backup_path(target);
    fs::rename(target, &backup).map_err(|source| SyncError::Backup {
        from: target.to_path_buf(),
        to: backup.clone(),
        source,
    })?;
    info!(from = %target.display(), to = %backup.display(), "Backed up foreign RTT configuration");

    if let Err(e) = write(target) {
        if let Err(restore) = fs::rename(&backup, target) {
            error!(backup = %backup.display(), error = %restore, "Failed to restore backed up RTT configuration");
        }
        return Err(e);
    }

    info!(path = %target.display(), "Took ownership of RTT configuration");
    Ok(backup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::rtt;
    use tempfile::TempDir;

    fn setup() -> (TempDir, RttPaths) {
        let dir = TempDir::new().unwrap();
        let paths = RttPaths::from_install_dir(Some(dir.path())).unwrap();
        (dir, paths)
    }

    fn content() -> String {
        format!("{} 1.0.0\nRENDERER = 0", rtt::MARKER)
    }

    #[test]
    fn test_creates_directory_and_writes() {
        let (_dir, paths) = setup();
        assert!(!paths.tool_dir().exists());

        let outcome = sync(Some(&paths), OwnershipState::Active, &content());
        assert!(matches!(outcome, SyncOutcome::Updated));
        assert_eq!(std::fs::read_to_string(paths.config_file()).unwrap(), content());
    }

    #[test]
    fn test_second_sync_is_up_to_date() {
        let (_dir, paths) = setup();
        assert!(matches!(
            sync(Some(&paths), OwnershipState::Active, &content()),
            SyncOutcome::Updated
        ));
        let modified = std::fs::metadata(paths.config_file()).unwrap().modified().unwrap();

        assert!(matches!(
            sync(Some(&paths), OwnershipState::Active, &content()),
            SyncOutcome::UpToDate
        ));
        let after = std::fs::metadata(paths.config_file()).unwrap().modified().unwrap();
        assert_eq!(modified, after);
    }

    #[test]
    fn test_overwrites_owned_file() {
        let (_dir, paths) = setup();
        std::fs::create_dir_all(paths.tool_dir()).unwrap();
        std::fs::write(paths.config_file(), format!("{} 0.9.0\nRENDERER = 3", rtt::MARKER)).unwrap();

        assert!(matches!(
            sync(Some(&paths), OwnershipState::Active, &content()),
            SyncOutcome::Updated
        ));
        assert_eq!(std::fs::read_to_string(paths.config_file()).unwrap(), content());
    }

    #[test]
    fn test_refuses_foreign_file() {
        let (_dir, paths) = setup();
        std::fs::create_dir_all(paths.tool_dir()).unwrap();
        std::fs::write(paths.config_file(), "RENDERER = 5").unwrap();

        let outcome = sync(Some(&paths), OwnershipState::Active, &content());
        assert!(matches!(outcome, SyncOutcome::Refused(Refusal::NotOwned(_))));
        assert_eq!(std::fs::read_to_string(paths.config_file()).unwrap(), "RENDERER = 5");
    }

    #[test]
    fn test_claims_empty_file() {
        let (_dir, paths) = setup();
        std::fs::create_dir_all(paths.tool_dir()).unwrap();
        std::fs::write(paths.config_file(), "").unwrap();

        assert!(matches!(
            sync(Some(&paths), OwnershipState::Active, &content()),
            SyncOutcome::Updated
        ));
    }

    #[test]
    fn test_awaiting_consent_refuses_before_io() {
        // Install dir does not exist; consent check must come first
        let paths = RttPaths::from_install_dir(Some(Path::new("/nonexistent/falcon"))).unwrap();
        let outcome = sync(Some(&paths), OwnershipState::AwaitingConsent, &content());
        assert!(matches!(outcome, SyncOutcome::Refused(Refusal::AwaitingConsent)));
    }

    #[test]
    fn test_missing_install_dir_refuses() {
        let (dir, _) = setup();
        let missing = dir.path().join("BMS");
        let paths = RttPaths::from_install_dir(Some(missing.as_path())).unwrap();

        let outcome = sync(Some(&paths), OwnershipState::Active, &content());
        assert!(matches!(outcome, SyncOutcome::Refused(Refusal::MissingInstallDir(_))));
        assert!(!missing.exists());

        assert!(matches!(
            sync(None, OwnershipState::Active, &content()),
            SyncOutcome::Refused(Refusal::NoInstallDir)
        ));
    }

    #[test]
    fn test_plan_matches_sync_without_writing() {
        let (_dir, paths) = setup();
        let planned = plan(Some(&paths), OwnershipState::Active, &content()).unwrap();
        assert_eq!(
            planned,
            SyncPlan::Write {
                path: paths.config_file(),
                existing: FileOwnership::Missing
            }
        );
        assert!(!paths.config_file().exists());
    }

    #[test]
    fn test_adopt_backs_up_and_writes() {
        let (_dir, paths) = setup();
        std::fs::create_dir_all(paths.tool_dir()).unwrap();
        let target = paths.config_file();
        std::fs::write(&target, "user file").unwrap();
        std::fs::write(paths.tool_dir().join("RTTClient.original"), "older backup").unwrap();

        let backup = adopt(&target, &content()).unwrap();
        assert_eq!(backup, paths.tool_dir().join("RTTClient.original2"));
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "user file");
        assert_eq!(std::fs::read_to_string(&target).unwrap(), content());
        assert_eq!(
            std::fs::read_to_string(paths.tool_dir().join("RTTClient.original")).unwrap(),
            "older backup"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_write_failure_is_reported() {
        let (dir, paths) = setup();
        std::fs::create_dir_all(paths.tool_dir()).unwrap();
        // Dangling link: reads see no file, the write cannot create one
        std::os::unix::fs::symlink(dir.path().join("gone").join("RTTClient.INI"), paths.config_file())
            .unwrap();

        let outcome = sync(Some(&paths), OwnershipState::Active, &content());
        let SyncOutcome::Failed(err) = outcome else {
            panic!("expected a failed sync");
        };
        assert!(matches!(&err, SyncError::Write { path, .. } if *path == paths.config_file()));
        assert_eq!(err.io_error().kind(), io::ErrorKind::NotFound);
        assert!(!err.to_string().contains("os error"));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_dir_failure_is_reported() {
        let (dir, paths) = setup();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("Tools")).unwrap();

        let outcome = sync(Some(&paths), OwnershipState::Active, &content());
        assert!(
            matches!(&outcome, SyncOutcome::Failed(SyncError::CreateDir { path, .. }) if *path == paths.tool_dir()),
            "unexpected outcome {outcome:?}"
        );
        assert!(!dir.path().join("gone").exists());
    }

    #[test]
    fn test_adopt_restores_original_when_write_fails() {
        let (_dir, paths) = setup();
        std::fs::create_dir_all(paths.tool_dir()).unwrap();
        let target = paths.config_file();
        std::fs::write(&target, "user file").unwrap();

        let result = adopt_with(&target, |path| {
            assert!(!path.exists());
            Err(SyncError::Write {
                path: path.to_path_buf(),
                source: io::Error::other("disk full"),
            })
        });

        assert!(matches!(result, Err(SyncError::Write { .. })));
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "user file");
        assert!(!paths.tool_dir().join("RTTClient.original").exists());
    }
}
