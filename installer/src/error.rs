//! Error types for the pam-ssh-agent installer CLI.
//!
//! This module defines semantic error variants that provide actionable
//! guidance when an install fails. Every variant is terminal for the current
//! install attempt; nothing is retried. Each variant includes recovery hints
//! where applicable, most importantly [`InstallerError::SigningIdentityMissing`],
//! which carries the full certificate-creation walkthrough so the operator
//! knows exactly what manual action unblocks the install.

use crate::signing::identity_walkthrough;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while building, installing, signing, or verifying
/// the PAM module.
#[derive(Debug, Error)]
pub enum InstallerError {
    /// The module source tree was not found at the given path.
    #[error("source tree not found at {path}: expected a pam-ssh-agent checkout with a Cargo.toml")]
    SourceTreeNotFound {
        /// Path where the source tree was expected.
        path: Utf8PathBuf,
    },

    /// The `rust-toolchain.toml` file in the source tree could not be parsed.
    #[error("invalid rust-toolchain.toml: {reason}")]
    InvalidToolchainFile {
        /// Description of the parse error.
        reason: String,
    },

    /// The pinned toolchain is not installed via rustup.
    #[error("toolchain {toolchain} not installed; run: rustup toolchain install {toolchain}")]
    ToolchainNotInstalled {
        /// The missing toolchain channel.
        toolchain: String,
    },

    /// The cargo build of the module failed.
    #[error("cargo build of the PAM module failed: {reason}")]
    BuildFailed {
        /// Diagnostic output from the toolchain, verbatim.
        reason: String,
    },

    /// The build reported success but the expected shared library is absent.
    #[error("build succeeded but no shared library was produced at {path}")]
    ArtifactMissing {
        /// Path where the artifact was expected.
        path: Utf8PathBuf,
    },

    /// More than one shared-library candidate was found after the build.
    #[error("expected exactly one built library, found {}: {}", .candidates.len(), format_candidates(.candidates))]
    ArtifactAmbiguous {
        /// All candidate paths that were found.
        candidates: Vec<Utf8PathBuf>,
    },

    /// The installation directory exists but is not writable.
    #[error("install directory {path} is not writable: {reason}")]
    TargetNotWritable {
        /// Path to the non-writable directory.
        path: Utf8PathBuf,
        /// Description of the underlying I/O error.
        reason: String,
    },

    /// Copying the built library into the install directory failed.
    #[error("install failed: {reason}")]
    InstallFailed {
        /// Description of the copy failure.
        reason: String,
    },

    /// No trusted code-signing identity with the configured name exists in
    /// the keychain.
    ///
    /// macOS refuses to load unsigned modules into privileged processes, so
    /// this is a hard stop rather than a warning; the rendered message walks
    /// through creating and trusting a certificate.
    #[error(
        "no code-signing identity named \"{identity}\" found in the keychain\n\n{}",
        identity_walkthrough(.identity)
    )]
    SigningIdentityMissing {
        /// Name of the identity that was looked up.
        identity: String,
    },

    /// The codesign tool rejected the installed module.
    #[error("codesign failed: {reason}")]
    SigningFailed {
        /// Diagnostic output from codesign, verbatim.
        reason: String,
    },

    /// The post-install check found a missing or wrongly signed module.
    ///
    /// Kept distinct from build and install failures so operators can tell
    /// "didn't build" apart from "built but wrongly signed".
    #[error("install verification failed: {reason}")]
    VerificationFailed {
        /// Description of the mismatch.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`InstallerError`].
pub type Result<T> = std::result::Result<T, InstallerError>;

fn format_candidates(candidates: &[Utf8PathBuf]) -> String {
    let names: Vec<&str> = candidates.iter().map(|p| p.as_str()).collect();
    names.join(", ")
}
