//! Cargo build orchestration for the PAM module.
//!
//! The module is built once, in release mode, library output only, with the
//! linking directive applied as per-invocation environment. The build is the
//! single long-running step of the pipeline and runs to completion before any
//! later stage starts; a non-zero exit aborts the whole install with the
//! toolchain's diagnostics surfaced verbatim.

use crate::error::{InstallerError, Result};
use crate::exec::{CommandRunner, CommandSpec, stderr_message};
use crate::platform::{LinkDirective, Platform};
use crate::toolchain::Toolchain;
use camino::Utf8PathBuf;

/// Crate name of the PAM module being packaged.
pub const MODULE_CRATE: &str = "pam-ssh-agent";

/// Filename stem of the shared library cargo produces.
pub const MODULE_LIB_STEM: &str = "libpam_ssh_agent";

/// Configuration for the module build.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Root of the pam-ssh-agent source tree.
    pub source_dir: Utf8PathBuf,
    /// Host platform, fixing the expected artifact extension.
    pub platform: Platform,
    /// Pinned toolchain, when the source tree or the operator names one.
    pub toolchain: Option<Toolchain>,
    /// Linking directive for this platform.
    pub directive: LinkDirective,
    /// Number of parallel build jobs (`None` for the cargo default).
    pub jobs: Option<usize>,
    /// Cargo output verbosity.
    pub verbosity: u8,
}

/// Result of a successful module build: the one produced shared library.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Path to the compiled library under `target/release`.
    pub library_path: Utf8PathBuf,
}

/// Builder for compiling the PAM module.
pub struct Builder<'a> {
    config: BuildConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> Builder<'a> {
    /// Create a builder with the given configuration and command runner.
    #[must_use]
    pub fn new(config: BuildConfig, runner: &'a dyn CommandRunner) -> Self {
        Self { config, runner }
    }

    /// Build the module and locate the produced shared library.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::SourceTreeNotFound`] when the source tree
    /// has no `Cargo.toml`, [`InstallerError::BuildFailed`] when cargo exits
    /// non-zero, and an artifact error when the build claims success but the
    /// `target/release` scan does not find exactly one candidate.
    pub fn build(&self) -> Result<BuildResult> {
        if !self.config.source_dir.join("Cargo.toml").exists() {
            return Err(InstallerError::SourceTreeNotFound {
                path: self.config.source_dir.clone(),
            });
        }

        let output = self.runner.run(&self.command_spec())?;
        if !output.status.success() {
            return Err(InstallerError::BuildFailed {
                reason: stderr_message(&output),
            });
        }

        self.locate_artifact()
    }

    fn command_spec(&self) -> CommandSpec {
        let mut spec = CommandSpec::new("cargo");

        if let Some(toolchain) = &self.config.toolchain {
            spec = spec.arg(format!("+{}", toolchain.channel()));
        }

        spec = spec.args(["build", "--release", "--lib"]);

        if let Some(jobs) = self.config.jobs {
            spec = spec.args(["-j".to_owned(), jobs.to_string()]);
        }
        if self.config.verbosity > 0 {
            spec = spec.arg("-v");
        }

        for (key, value) in self.config.directive.env_pairs() {
            spec = spec.env(key.clone(), value.clone());
        }

        spec.current_dir(&self.config.source_dir)
    }

    /// Scan `target/release` for the produced library.
    ///
    /// Both shared-library extensions are scanned so stale artifacts from a
    /// previous cross-platform checkout surface as an ambiguity instead of
    /// silently winning.
    fn locate_artifact(&self) -> Result<BuildResult> {
        let release_dir = self.config.source_dir.join("target").join("release");

        let candidates: Vec<Utf8PathBuf> = [".so", ".dylib"]
            .iter()
            .map(|ext| release_dir.join(format!("{MODULE_LIB_STEM}{ext}")))
            .filter(|path| path.exists())
            .collect();

        match candidates.as_slice() {
            [single] => Ok(BuildResult {
                library_path: single.clone(),
            }),
            [] => Err(InstallerError::ArtifactMissing {
                path: release_dir.join(format!(
                    "{MODULE_LIB_STEM}{}",
                    self.config.platform.module_extension()
                )),
            }),
            _ => Err(InstallerError::ArtifactAmbiguous { candidates }),
        }
    }
}
