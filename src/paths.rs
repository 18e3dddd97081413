use std::path::{Path, PathBuf};

use crate::constants::rtt;

/// Locations derived from the Falcon installation directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RttPaths {
    install_dir: PathBuf,
}

impl RttPaths {
    /// None when no installation directory is configured
    pub fn from_install_dir(install_dir: Option<&Path>) -> Option<Self> {
        install_dir
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| Self {
                install_dir: dir.to_path_buf(),
            })
    }

    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Directory the client runs from and reads its configuration in
    pub fn tool_dir(&self) -> PathBuf {
        let mut path = self.install_dir.clone();
        path.extend(rtt::TOOL_DIR);
        path
    }

    pub fn config_file(&self) -> PathBuf {
        self.tool_dir().join(rtt::CONFIG_FILENAME)
    }

    pub fn executable(&self, name: &str) -> PathBuf {
        self.tool_dir().join(name)
    }
}

/// First unused backup name: `X.original`, then `X.original2`, `X.original3`, ...
pub fn backup_path(target: &Path) -> PathBuf {
    let first = target.with_extension(rtt::BACKUP_EXTENSION);
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|n| target.with_extension(format!("{}{}", rtt::BACKUP_EXTENSION, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_under_install_dir() {
        let paths = RttPaths::from_install_dir(Some(Path::new("/games/BMS"))).unwrap();
        assert_eq!(paths.tool_dir(), PathBuf::from("/games/BMS/Tools/RTTRemote"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/games/BMS/Tools/RTTRemote/RTTClient.INI")
        );
        assert_eq!(
            paths.executable("RTTClient64.exe"),
            PathBuf::from("/games/BMS/Tools/RTTRemote/RTTClient64.exe")
        );
    }

    #[test]
    fn test_empty_install_dir_is_unconfigured() {
        assert!(RttPaths::from_install_dir(None).is_none());
        assert!(RttPaths::from_install_dir(Some(Path::new(""))).is_none());
    }

    #[test]
    fn test_backup_path_skips_used_names() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("RTTClient.INI");
        assert_eq!(backup_path(&target), dir.path().join("RTTClient.original"));

        std::fs::write(dir.path().join("RTTClient.original"), "a").unwrap();
        assert_eq!(backup_path(&target), dir.path().join("RTTClient.original2"));

        std::fs::write(dir.path().join("RTTClient.original2"), "b").unwrap();
        assert_eq!(backup_path(&target), dir.path().join("RTTClient.original3"));
    }
}
