//! Install pipeline orchestration.
//!
//! The pipeline is strictly sequential: probe, link-mode selection, build,
//! install, signing (macOS), then caveats. Each stage depends on the full
//! completion of the previous one, no stage is retried, and the first error
//! aborts the whole install. This module coordinates the builder, installer,
//! signing, and caveats modules; the CLI entrypoint only resolves
//! configuration and dispatches here.

use crate::builder::{BuildConfig, BuildResult, Builder, MODULE_CRATE};
use crate::caveats::{CaveatsInputs, compose};
use crate::error::{InstallerError, Result};
use crate::exec::CommandRunner;
use crate::install::Installer;
use crate::output::{success_message, write_stderr_line};
use crate::platform::{PamDirectory, Platform};
use crate::signing::{SigningIdentity, sign_module, verify_identity_present, write_entitlements};
use crate::toolchain::Toolchain;
use camino::{Utf8Path, Utf8PathBuf};
use std::io::Write;

/// Resolved configuration for one install run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Host platform, probed once at install start.
    pub platform: Platform,
    /// Root of the pam-ssh-agent source checkout.
    pub source_dir: Utf8PathBuf,
    /// Install root; the module lands in `<install-root>/security`.
    pub install_root: Utf8PathBuf,
    /// Signing identity used on macOS.
    pub identity: SigningIdentity,
    /// Crypto prefix hint for the macOS static build.
    pub crypto_prefix: Option<Utf8PathBuf>,
    /// Toolchain pinned by the source tree or the operator.
    pub toolchain: Option<Toolchain>,
    /// Number of parallel build jobs.
    pub jobs: Option<usize>,
    /// Cargo output verbosity.
    pub verbosity: u8,
    /// Suppress progress output.
    pub quiet: bool,
}

impl PipelineContext {
    /// The installer for this context's install root.
    #[must_use]
    pub fn installer(&self) -> Installer {
        Installer::new(self.install_root.clone())
    }
}

/// Run the whole pipeline: build, install, sign, caveats.
///
/// The caveats message is written to the given writer after a successful
/// install; a failed install produces no caveats at all, so partial output
/// never implies success.
///
/// # Errors
///
/// Propagates the first stage failure; later stages never run after one.
pub fn run_install(
    context: &PipelineContext,
    runner: &dyn CommandRunner,
    stderr: &mut dyn Write,
) -> Result<()> {
    let build = perform_build(context, runner, stderr)?;
    let target = install_module(context, &build, stderr)?;
    let signed = sign_installed_module(context, runner, &target, stderr)?;

    if !context.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, success_message(&target));
    }

    write_stderr_line(stderr, "");
    write_stderr_line(stderr, compose_install_caveats(context, &target, signed));
    Ok(())
}

/// Build the module with the platform's linking directive.
///
/// # Errors
///
/// Returns an error when the build fails or does not produce exactly one
/// shared library.
pub fn perform_build(
    context: &PipelineContext,
    runner: &dyn CommandRunner,
    stderr: &mut dyn Write,
) -> Result<BuildResult> {
    if !context.quiet {
        match &context.toolchain {
            Some(toolchain) => write_stderr_line(
                stderr,
                format!(
                    "Building {MODULE_CRATE} in release mode with toolchain {}...",
                    toolchain.channel()
                ),
            ),
            None => write_stderr_line(
                stderr,
                format!("Building {MODULE_CRATE} in release mode..."),
            ),
        }
    }

    let config = BuildConfig {
        source_dir: context.source_dir.clone(),
        platform: context.platform,
        toolchain: context.toolchain.clone(),
        directive: context
            .platform
            .link_directive(context.crypto_prefix.as_deref()),
        jobs: context.jobs,
        verbosity: context.verbosity,
    };
    Builder::new(config, runner).build()
}

/// Copy the built module into the canonical install location.
///
/// # Errors
///
/// Returns an error when the target directory is not writable or the copy
/// fails.
pub fn install_module(
    context: &PipelineContext,
    build: &BuildResult,
    stderr: &mut dyn Write,
) -> Result<Utf8PathBuf> {
    let installer = context.installer();

    if !context.quiet {
        write_stderr_line(
            stderr,
            format!("Installing to {}...", installer.target_path()),
        );
    }

    installer.prepare()?;
    installer.install(build)
}

/// Sign the installed module when the platform requires it.
///
/// Returns whether signing was performed. The entitlements descriptor lives
/// in a scratch directory that is deleted when this function returns.
///
/// # Errors
///
/// Returns an error when the identity is missing from the keychain or the
/// signing tool rejects the module.
pub fn sign_installed_module(
    context: &PipelineContext,
    runner: &dyn CommandRunner,
    target: &Utf8Path,
    stderr: &mut dyn Write,
) -> Result<bool> {
    if !context.platform.requires_signing() {
        return Ok(false);
    }

    if !context.quiet {
        write_stderr_line(
            stderr,
            format!("Signing with identity \"{}\"...", context.identity),
        );
    }

    verify_identity_present(runner, &context.identity)?;

    let scratch = tempfile::tempdir()?;
    let scratch_dir = Utf8PathBuf::from_path_buf(scratch.path().to_path_buf()).map_err(|_| {
        InstallerError::InstallFailed {
            reason: "scratch directory path is not valid UTF-8".to_owned(),
        }
    })?;
    let entitlements = write_entitlements(&scratch_dir)?;
    sign_module(runner, target, &context.identity, &entitlements)?;

    Ok(true)
}

/// Compose the caveats for a completed install.
///
/// The Linux PAM directory is probed here, once, so the composer itself
/// stays a pure function.
#[must_use]
pub fn compose_install_caveats(
    context: &PipelineContext,
    target: &Utf8Path,
    signing_performed: bool,
) -> String {
    let pam_directory = match context.platform {
        Platform::Linux => PamDirectory::detect(),
        Platform::MacOs | Platform::Other => PamDirectory::Undetected,
    };

    compose(&CaveatsInputs {
        platform: context.platform,
        pam_directory: &pam_directory,
        signing_performed,
        installed_path: target,
        identity: &context.identity,
    })
}
