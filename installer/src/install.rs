//! Installation of the built module into the canonical PAM location.
//!
//! The produced library is copied to `<install-root>/security/pam_ssh_agent.so`.
//! PAM's module loader expects the `.so` suffix on every platform, so the
//! macOS `.dylib` source extension is normalized away during the copy. The
//! target directory is created and probed for writability before anything is
//! copied.

use crate::builder::BuildResult;
use crate::error::{InstallerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Fixed filename of the installed module, independent of host platform.
pub const MODULE_TARGET_NAME: &str = "pam_ssh_agent.so";

/// Copies the built module into the install root.
pub struct Installer {
    install_root: Utf8PathBuf,
}

impl Installer {
    /// Create an installer rooted at the given directory (typically
    /// `<prefix>/lib`).
    #[must_use]
    pub fn new(install_root: Utf8PathBuf) -> Self {
        Self { install_root }
    }

    /// The `security` directory the module is installed into.
    #[must_use]
    pub fn security_dir(&self) -> Utf8PathBuf {
        self.install_root.join("security")
    }

    /// The canonical installed path of the module.
    #[must_use]
    pub fn target_path(&self) -> Utf8PathBuf {
        self.security_dir().join(MODULE_TARGET_NAME)
    }

    /// The install root this installer was created with.
    #[must_use]
    pub fn install_root(&self) -> &Utf8Path {
        &self.install_root
    }

    /// Ensure the target directory exists and is writable.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::TargetNotWritable`] when the directory
    /// cannot be created or written to.
    pub fn prepare(&self) -> Result<()> {
        let security_dir = self.security_dir();

        fs::create_dir_all(&security_dir).map_err(|e| InstallerError::TargetNotWritable {
            path: security_dir.clone(),
            reason: e.to_string(),
        })?;

        let probe = security_dir.join(".pam-ssh-agent-installer-test");
        match fs::write(&probe, b"test") {
            Ok(()) => {
                let _ = fs::remove_file(&probe);
                Ok(())
            }
            Err(e) => Err(InstallerError::TargetNotWritable {
                path: security_dir,
                reason: e.to_string(),
            }),
        }
    }

    /// Copy the built library to the canonical path, normalizing the
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ArtifactMissing`] when the build result
    /// points at a file that no longer exists (an internal inconsistency, not
    /// retried), and [`InstallerError::InstallFailed`] when the copy itself
    /// fails.
    pub fn install(&self, build: &BuildResult) -> Result<Utf8PathBuf> {
        if !build.library_path.exists() {
            return Err(InstallerError::ArtifactMissing {
                path: build.library_path.clone(),
            });
        }

        let target = self.target_path();
        fs::copy(&build.library_path, &target).map_err(|e| InstallerError::InstallFailed {
            reason: format!("failed to copy {} to {target}: {e}", build.library_path),
        })?;

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn install_root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(dir.path().join("lib")).expect("utf-8 path");
        (dir, root)
    }

    fn built_library(dir: &TempDir, name: &str) -> BuildResult {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 path");
        std::fs::write(&path, b"\x7fELF").expect("write library");
        BuildResult { library_path: path }
    }

    #[test]
    fn target_path_is_fixed_regardless_of_source_extension() {
        let installer = Installer::new(Utf8PathBuf::from("/usr/local/lib"));
        assert_eq!(
            installer.target_path(),
            Utf8PathBuf::from("/usr/local/lib/security/pam_ssh_agent.so")
        );
    }

    #[test]
    fn install_normalizes_dylib_extension() {
        let (guard, root) = install_root();
        let installer = Installer::new(root);
        installer.prepare().expect("prepare");

        let build = built_library(&guard, "libpam_ssh_agent.dylib");
        let installed = installer.install(&build).expect("install");

        assert!(installed.as_str().ends_with("security/pam_ssh_agent.so"));
        assert!(installed.exists());
    }

    #[test]
    fn prepare_creates_the_security_directory() {
        let (_guard, root) = install_root();
        let installer = Installer::new(root);
        installer.prepare().expect("prepare");
        assert!(installer.security_dir().is_dir());
    }

    #[test]
    fn missing_build_artifact_is_an_internal_inconsistency() {
        let (_guard, root) = install_root();
        let installer = Installer::new(root);
        installer.prepare().expect("prepare");

        let build = BuildResult {
            library_path: Utf8PathBuf::from("/nonexistent/libpam_ssh_agent.so"),
        };
        let err = installer.install(&build).expect_err("missing artifact fails");
        assert!(matches!(err, InstallerError::ArtifactMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn prepare_reports_non_writable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let (guard, root) = install_root();
        let installer = Installer::new(root.clone());
        let security = installer.security_dir();
        std::fs::create_dir_all(&security).expect("create dir");

        let mut perms = std::fs::metadata(&security).expect("metadata").permissions();
        perms.set_mode(0o555);
        std::fs::set_permissions(&security, perms).expect("make read-only");

        // Root bypasses permission bits; nothing to assert in that case.
        if std::fs::write(security.join("probe"), b"x").is_ok() {
            return;
        }

        let err = installer.prepare().expect_err("read-only dir fails");
        assert!(matches!(err, InstallerError::TargetNotWritable { .. }));

        let mut restore = std::fs::metadata(&security).expect("metadata").permissions();
        restore.set_mode(0o755);
        std::fs::set_permissions(&security, restore).expect("restore permissions");
        drop(guard);
    }
}
