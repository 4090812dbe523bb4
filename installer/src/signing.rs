//! Code signing of the installed module on macOS.
//!
//! A PAM module is loaded into privileged system processes such as `sudo`,
//! and macOS refuses dynamic libraries that are not signed with a trusted
//! identity. The signing stage therefore runs as three steps, each a hard
//! stop on failure: verify the identity exists in the keychain, write the
//! minimal entitlements descriptor the signing tool requires, and sign the
//! installed module in place with the hardened runtime enabled.

use crate::error::{InstallerError, Result};
use crate::exec::{CommandRunner, CommandSpec, stderr_message};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// Default name of the code-signing certificate looked up in the keychain.
pub const DEFAULT_SIGNING_IDENTITY: &str = "pam-ssh-agent";

/// Identifier recorded in the module's signature.
pub const MODULE_IDENTIFIER: &str = "pam_ssh_agent";

/// Fixed content of the entitlements descriptor.
///
/// The signing tool requires a descriptor argument; the module itself needs
/// no entitlements, so the dictionary stays empty.
pub const ENTITLEMENTS_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict/>
</plist>
"#;

/// A named reference to a certificate in the keychain.
///
/// Only looked up, never created; existence is a precondition of the macOS
/// install, checked by [`verify_identity_present`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity(String);

impl SigningIdentity {
    /// Wrap an identity name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SigningIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Check that a trusted code-signing identity with the given name exists.
///
/// Queries the keychain scoped to code-signing usage. An absent identity is
/// a hard stop: an unsigned module would later be rejected by the OS loader
/// with a far less diagnosable failure.
///
/// # Errors
///
/// Returns [`InstallerError::SigningIdentityMissing`] when the query fails
/// or the identity name does not appear among the valid identities.
pub fn verify_identity_present(
    runner: &dyn CommandRunner,
    identity: &SigningIdentity,
) -> Result<()> {
    let spec = CommandSpec::new("security").args(["find-identity", "-v", "-p", "codesigning"]);
    let output = runner.run(&spec)?;

    let listing = String::from_utf8_lossy(&output.stdout);
    let quoted = format!("\"{identity}\"");
    if output.status.success() && listing.contains(&quoted) {
        Ok(())
    } else {
        Err(InstallerError::SigningIdentityMissing {
            identity: identity.as_str().to_owned(),
        })
    }
}

/// Write the entitlements descriptor into a scratch directory.
///
/// The descriptor is ephemeral; it lives only as long as the scratch
/// directory that holds it.
///
/// # Errors
///
/// Propagates the underlying I/O error when the write fails.
pub fn write_entitlements(scratch_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let path = scratch_dir.join("pam_ssh_agent.entitlements");
    std::fs::write(&path, ENTITLEMENTS_PLIST)?;
    Ok(path)
}

/// Sign the installed module in place with the hardened runtime enabled.
///
/// Must only run after [`verify_identity_present`] passed; an
/// installed-but-unsigned module is a failed install, not a partial success.
///
/// # Errors
///
/// Returns [`InstallerError::SigningFailed`] carrying the signing tool's
/// diagnostics when it exits non-zero.
pub fn sign_module(
    runner: &dyn CommandRunner,
    target: &Utf8Path,
    identity: &SigningIdentity,
    entitlements: &Utf8Path,
) -> Result<()> {
    let spec = CommandSpec::new("codesign").args([
        "--force",
        "--options",
        "runtime",
        "--identifier",
        MODULE_IDENTIFIER,
        "--entitlements",
        entitlements.as_str(),
        "--sign",
        identity.as_str(),
        target.as_str(),
    ]);
    let output = runner.run(&spec)?;

    if output.status.success() {
        Ok(())
    } else {
        Err(InstallerError::SigningFailed {
            reason: stderr_message(&output),
        })
    }
}

/// Steps for creating and trusting a self-signed code-signing certificate.
///
/// Rendered inside [`InstallerError::SigningIdentityMissing`] and in the
/// macOS caveats, so the operator sees the same remediation in both places.
#[must_use]
pub fn identity_walkthrough(identity: &str) -> String {
    format!(
        concat!(
            "To create a self-signed certificate named \"{identity}\":\n",
            "  1. Open Keychain Access (in /Applications/Utilities).\n",
            "  2. Choose Keychain Access > Certificate Assistant > Create a Certificate.\n",
            "  3. Set Name to \"{identity}\", Identity Type to \"Self-Signed Root\",\n",
            "     and Certificate Type to \"Code Signing\".\n",
            "  4. After creating it, find the certificate in the login keychain,\n",
            "     open it, expand Trust, and set Code Signing to \"Always Trust\".\n",
            "  5. Run this installer again."
        ),
        identity = identity
    )
}
