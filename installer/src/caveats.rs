//! Post-install guidance for the operator.
//!
//! PAM configuration is edited by the operator, never by this tool, so the
//! installer's last word is a caveats message explaining how to activate the
//! module. Composition is a pure function of the platform, the PAM directory
//! probe outcome, and whether signing was performed; identical inputs always
//! produce byte-identical output.

use crate::install::MODULE_TARGET_NAME;
use crate::platform::{PamDirectory, Platform};
use crate::signing::{SigningIdentity, identity_walkthrough};
use camino::Utf8Path;

/// Everything the caveats message depends on.
#[derive(Debug, Clone, Copy)]
pub struct CaveatsInputs<'a> {
    /// Host platform.
    pub platform: Platform,
    /// Outcome of the Linux PAM directory probe.
    pub pam_directory: &'a PamDirectory,
    /// Whether the installed module was code signed.
    pub signing_performed: bool,
    /// Canonical installed path of the module.
    pub installed_path: &'a Utf8Path,
    /// Identity the module was (or would be) signed with.
    pub identity: &'a SigningIdentity,
}

/// Compose the post-install message.
#[must_use]
pub fn compose(inputs: &CaveatsInputs<'_>) -> String {
    let mut message = format!(
        concat!(
            "To use pam-ssh-agent, configure your system's PAM service.\n",
            "The module was installed to:\n",
            "  {path}\n",
            "\n",
        ),
        path = inputs.installed_path
    );

    match inputs.platform {
        Platform::MacOs => message.push_str(&macos_section(inputs)),
        Platform::Linux | Platform::Other => message.push_str(&linux_section(inputs)),
    }

    message.push_str(concat!(
        "\n",
        "To use a specific set of authorized keys, add the file parameter:\n",
        "\n",
        "  auth       sufficient     ",
        "pam_ssh_agent.so file=~/.ssh/authorized_keys\n",
    ));

    message
}

fn macos_section(inputs: &CaveatsInputs<'_>) -> String {
    let mut section = format!(
        concat!(
            "macOS instructions:\n",
            "\n",
            "No symlink is needed. Edit the PAM configuration file for the\n",
            "service you want (for example /etc/pam.d/sudo) and add the\n",
            "following line at the top, using the full path:\n",
            "\n",
            "  auth       sufficient     {path}\n",
            "\n",
            "Editing requires root privileges, for example:\n",
            "  sudo nano /etc/pam.d/sudo\n",
        ),
        path = inputs.installed_path
    );

    if inputs.signing_performed {
        section.push_str(&format!(
            concat!(
                "\n",
                "The module was signed with the \"{identity}\" identity. If you\n",
                "ever recreate that certificate, run this installer again so the\n",
                "module is re-signed.\n",
                "\n",
                "{walkthrough}\n",
            ),
            identity = inputs.identity,
            walkthrough = identity_walkthrough(inputs.identity.as_str()),
        ));
    }

    section
}

fn linux_section(inputs: &CaveatsInputs<'_>) -> String {
    let symlink_step = match inputs.pam_directory {
        PamDirectory::Detected(dir) => format!(
            concat!(
                "1. Create a symlink from the installed module into the system\n",
                "   PAM directory:\n",
                "\n",
                "  sudo ln -sf \"{path}\" {dir}/\n",
            ),
            path = inputs.installed_path,
            dir = dir
        ),
        PamDirectory::Undetected => format!(
            concat!(
                "1. No known system PAM directory was detected. Locate your\n",
                "   distribution's security-module directory and symlink the\n",
                "   module into it, for example:\n",
                "\n",
                "  sudo ln -sf \"{path}\" <pam-directory>/\n",
            ),
            path = inputs.installed_path
        ),
    };

    format!(
        concat!(
            "Linux instructions:\n",
            "\n",
            "{symlink_step}",
            "\n",
            "2. Edit the PAM configuration file (for example /etc/pam.d/sudo)\n",
            "   and add this line at the top:\n",
            "\n",
            "  auth       sufficient     {module}\n",
        ),
        symlink_step = symlink_step,
        module = MODULE_TARGET_NAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::rstest;

    fn installed_path() -> Utf8PathBuf {
        Utf8PathBuf::from("/usr/local/lib/security/pam_ssh_agent.so")
    }

    fn identity() -> SigningIdentity {
        SigningIdentity::from("pam-ssh-agent")
    }

    #[test]
    fn composition_is_pure_and_idempotent() {
        let path = installed_path();
        let identity = identity();
        let pam_dir = PamDirectory::Detected(Utf8PathBuf::from("/lib64/security"));
        let inputs = CaveatsInputs {
            platform: Platform::Linux,
            pam_directory: &pam_dir,
            signing_performed: false,
            installed_path: &path,
            identity: &identity,
        };

        assert_eq!(compose(&inputs), compose(&inputs));
    }

    #[test]
    fn macos_caveats_use_the_full_path_and_walkthrough() {
        let path = installed_path();
        let identity = identity();
        let inputs = CaveatsInputs {
            platform: Platform::MacOs,
            pam_directory: &PamDirectory::Undetected,
            signing_performed: true,
            installed_path: &path,
            identity: &identity,
        };

        let message = compose(&inputs);
        assert!(message.contains(
            "auth       sufficient     /usr/local/lib/security/pam_ssh_agent.so"
        ));
        assert!(message.contains("Certificate Assistant"));
        assert!(message.contains("signed with the \"pam-ssh-agent\" identity"));
        assert!(!message.contains("symlink from the installed module"));
    }

    #[test]
    fn linux_caveats_symlink_into_the_detected_directory() {
        let path = installed_path();
        let identity = identity();
        let pam_dir = PamDirectory::Detected(Utf8PathBuf::from("/lib64/security"));
        let inputs = CaveatsInputs {
            platform: Platform::Linux,
            pam_directory: &pam_dir,
            signing_performed: false,
            installed_path: &path,
            identity: &identity,
        };

        let message = compose(&inputs);
        assert!(message.contains(
            "sudo ln -sf \"/usr/local/lib/security/pam_ssh_agent.so\" /lib64/security/"
        ));
        assert!(message.contains("auth       sufficient     pam_ssh_agent.so"));
        assert!(!message.contains("<pam-directory>"));
        assert!(!message.contains("Certificate Assistant"));
    }

    #[test]
    fn undetected_directory_degrades_to_a_templated_example() {
        let path = installed_path();
        let identity = identity();
        let inputs = CaveatsInputs {
            platform: Platform::Linux,
            pam_directory: &PamDirectory::Undetected,
            signing_performed: false,
            installed_path: &path,
            identity: &identity,
        };

        let message = compose(&inputs);
        assert!(message.contains("<pam-directory>/"));
        assert!(message.contains("No known system PAM directory was detected"));
    }

    #[rstest]
    #[case::linux(Platform::Linux)]
    #[case::other(Platform::Other)]
    fn file_parameter_note_is_always_present(#[case] platform: Platform) {
        let path = installed_path();
        let identity = identity();
        let inputs = CaveatsInputs {
            platform,
            pam_directory: &PamDirectory::Undetected,
            signing_performed: false,
            installed_path: &path,
            identity: &identity,
        };

        assert!(compose(&inputs).contains("file=~/.ssh/authorized_keys"));
    }
}
