//! Post-install verification of the installed module.
//!
//! Verification is a separate failure class from building and installing:
//! it answers "is what sits on disk the thing we meant to install", so an
//! operator can tell "didn't build" apart from "built but wrongly signed".
//! On every platform the canonical path must exist; on macOS the embedded
//! signature must additionally record the expected identifier and the
//! configured signing authority. A verification failure never rolls back the
//! installed artifact.

use crate::error::{InstallerError, Result};
use crate::exec::{CommandRunner, CommandSpec, stderr_message};
use crate::platform::Platform;
use crate::signing::{MODULE_IDENTIFIER, SigningIdentity};
use camino::Utf8Path;

/// Fields of interest parsed out of the signature diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureRecord {
    /// Recorded identifier, when present.
    pub identifier: Option<String>,
    /// Every recorded authority, outermost first.
    pub authorities: Vec<String>,
}

/// Parse `Identifier=` and `Authority=` lines from `codesign -d -vv` output.
#[must_use]
pub fn parse_signature_record(diagnostics: &str) -> SignatureRecord {
    let mut record = SignatureRecord::default();
    for line in diagnostics.lines() {
        let line = line.trim();
        if let Some(identifier) = line.strip_prefix("Identifier=") {
            record.identifier = Some(identifier.to_owned());
        } else if let Some(authority) = line.strip_prefix("Authority=") {
            record.authorities.push(authority.to_owned());
        }
    }
    record
}

/// Check that the install left the expected module at the canonical path.
///
/// # Errors
///
/// Returns [`InstallerError::VerificationFailed`] when the module is absent,
/// unsigned where a signature is required, or signed with an unexpected
/// identifier or authority.
pub fn verify_install(
    runner: &dyn CommandRunner,
    platform: Platform,
    target: &Utf8Path,
    identity: &SigningIdentity,
) -> Result<()> {
    if !target.exists() {
        return Err(InstallerError::VerificationFailed {
            reason: format!("module not found at {target}"),
        });
    }

    if !platform.requires_signing() {
        return Ok(());
    }

    let spec = CommandSpec::new("codesign").args(["-d", "-vv", target.as_str()]);
    let output = runner.run(&spec)?;
    if !output.status.success() {
        return Err(InstallerError::VerificationFailed {
            reason: format!("codesign could not read a signature: {}", stderr_message(&output)),
        });
    }

    // codesign -d writes its diagnostics to stderr.
    let record = parse_signature_record(&String::from_utf8_lossy(&output.stderr));

    match record.identifier.as_deref() {
        Some(MODULE_IDENTIFIER) => {}
        Some(other) => {
            return Err(InstallerError::VerificationFailed {
                reason: format!(
                    "signature identifier is {other}, expected {MODULE_IDENTIFIER}"
                ),
            });
        }
        None => {
            return Err(InstallerError::VerificationFailed {
                reason: "signature records no identifier".to_owned(),
            });
        }
    }

    if !record
        .authorities
        .iter()
        .any(|authority| authority == identity.as_str())
    {
        return Err(InstallerError::VerificationFailed {
            reason: format!("signature authority does not include \"{identity}\""),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{StubRunner, output};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    const DIAGNOSTICS: &str = concat!(
        "Executable=/usr/local/lib/security/pam_ssh_agent.so\n",
        "Identifier=pam_ssh_agent\n",
        "Format=Mach-O thin (arm64)\n",
        "Authority=pam-ssh-agent\n",
        "Signed Time=6 Aug 2026 at 10:00:00\n",
    );

    fn installed_module() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path =
            Utf8PathBuf::from_path_buf(dir.path().join("pam_ssh_agent.so")).expect("utf-8 path");
        std::fs::write(&path, b"\x7fELF").expect("write module");
        (dir, path)
    }

    #[test]
    fn parses_identifier_and_authorities() {
        let record = parse_signature_record(DIAGNOSTICS);
        assert_eq!(record.identifier.as_deref(), Some("pam_ssh_agent"));
        assert_eq!(record.authorities, ["pam-ssh-agent"]);
    }

    #[test]
    fn parses_empty_diagnostics_to_an_empty_record() {
        assert_eq!(parse_signature_record(""), SignatureRecord::default());
    }

    #[test]
    fn missing_module_fails_verification_on_every_platform() {
        let runner = StubRunner::new();
        let err = verify_install(
            &runner,
            Platform::Linux,
            Utf8Path::new("/nonexistent/pam_ssh_agent.so"),
            &SigningIdentity::from("pam-ssh-agent"),
        )
        .expect_err("missing module fails");
        assert!(matches!(err, InstallerError::VerificationFailed { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn linux_verification_stops_at_the_existence_check() {
        let (_guard, path) = installed_module();
        let runner = StubRunner::new();
        verify_install(
            &runner,
            Platform::Linux,
            &path,
            &SigningIdentity::from("pam-ssh-agent"),
        )
        .expect("existence is enough on Linux");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn macos_verification_accepts_a_matching_signature() {
        let (_guard, path) = installed_module();
        let runner = StubRunner::new().expect("codesign", output(0, "", DIAGNOSTICS));

        verify_install(
            &runner,
            Platform::MacOs,
            &path,
            &SigningIdentity::from("pam-ssh-agent"),
        )
        .expect("matching signature verifies");

        let calls = runner.calls();
        assert_eq!(calls[0].args[..2], ["-d".to_owned(), "-vv".to_owned()]);
    }

    #[test]
    fn wrong_identifier_is_a_verification_failure() {
        let (_guard, path) = installed_module();
        let diagnostics = "Identifier=pam_wrong\nAuthority=pam-ssh-agent\n";
        let runner = StubRunner::new().expect("codesign", output(0, "", diagnostics));

        let err = verify_install(
            &runner,
            Platform::MacOs,
            &path,
            &SigningIdentity::from("pam-ssh-agent"),
        )
        .expect_err("identifier mismatch fails");
        assert!(
            matches!(err, InstallerError::VerificationFailed { reason } if reason.contains("pam_wrong"))
        );
    }

    #[test]
    fn missing_authority_is_a_verification_failure() {
        let (_guard, path) = installed_module();
        let diagnostics = "Identifier=pam_ssh_agent\nAuthority=someone-else\n";
        let runner = StubRunner::new().expect("codesign", output(0, "", diagnostics));

        let err = verify_install(
            &runner,
            Platform::MacOs,
            &path,
            &SigningIdentity::from("pam-ssh-agent"),
        )
        .expect_err("authority mismatch fails");
        assert!(
            matches!(err, InstallerError::VerificationFailed { reason } if reason.contains("pam-ssh-agent"))
        );
    }

    #[test]
    fn unsigned_module_is_a_verification_failure_on_macos() {
        let (_guard, path) = installed_module();
        let runner = StubRunner::new().expect(
            "codesign",
            output(1, "", "code object is not signed at all"),
        );

        let err = verify_install(
            &runner,
            Platform::MacOs,
            &path,
            &SigningIdentity::from("pam-ssh-agent"),
        )
        .expect_err("unsigned module fails");
        assert!(
            matches!(err, InstallerError::VerificationFailed { reason } if reason.contains("not signed"))
        );
    }
}
