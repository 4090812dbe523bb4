//! CLI argument definitions for the pam-ssh-agent installer.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Build and install the pam-ssh-agent PAM module.
#[derive(Parser, Debug)]
#[command(name = "pam-ssh-agent-installer")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build and install the pam-ssh-agent PAM module.\n\n",
    "pam-ssh-agent is a PAM module that authenticates against a running\n",
    "ssh-agent. This installer builds the module from a source checkout in\n",
    "release mode, installs it as <prefix>/lib/security/pam_ssh_agent.so,\n",
    "and on macOS signs it with a trusted identity from the keychain so the\n",
    "system loader accepts it.\n\n",
    "PAM configuration itself is never modified; the installer prints the\n",
    "exact lines to add once the module is in place.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build and install from a checkout in the current directory:\n",
    "    $ pam-ssh-agent-installer\n\n",
    "  Install into a Homebrew prefix:\n",
    "    $ pam-ssh-agent-installer --prefix /opt/homebrew\n\n",
    "  Use a differently named signing certificate:\n",
    "    $ pam-ssh-agent-installer --identity my-signing-cert\n\n",
    "  Check an existing install:\n",
    "    $ pam-ssh-agent-installer verify\n\n",
    "  Reprint the activation instructions:\n",
    "    $ pam-ssh-agent-installer caveats\n\n",
    "  Preview without building:\n",
    "    $ pam-ssh-agent-installer --dry-run\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Install arguments (used when no subcommand is given).
    #[command(flatten)]
    pub install: InstallArgs,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build, install, and (on macOS) sign the module (default).
    Install(InstallArgs),

    /// Check that the installed module exists and is correctly signed.
    Verify(VerifyArgs),

    /// Print the post-install activation instructions.
    Caveats(CaveatsArgs),
}

/// Arguments for the install command.
#[derive(Parser, Debug, Clone)]
pub struct InstallArgs {
    /// Path to the pam-ssh-agent source checkout.
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub source_dir: Utf8PathBuf,

    /// Installation prefix; the module lands in `PREFIX/lib/security`.
    #[arg(short, long, value_name = "DIR", default_value = "/usr/local")]
    pub prefix: Utf8PathBuf,

    /// Name of the code-signing identity in the keychain (macOS).
    #[arg(long, value_name = "NAME")]
    pub identity: Option<String>,

    /// Prefix of a static OpenSSL install [default: probed Homebrew paths].
    #[arg(long, value_name = "DIR")]
    pub crypto_prefix: Option<Utf8PathBuf>,

    /// Override the toolchain pinned by the source tree.
    #[arg(long, value_name = "TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Number of parallel cargo build jobs.
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Show configuration and exit without building.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase cargo output verbosity (repeatable).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Arguments for the verify command.
#[derive(Parser, Debug, Clone)]
pub struct VerifyArgs {
    /// Installation prefix the module was installed under.
    #[arg(short, long, value_name = "DIR", default_value = "/usr/local")]
    pub prefix: Utf8PathBuf,

    /// Name of the signing identity the module should be signed with (macOS).
    #[arg(long, value_name = "NAME")]
    pub identity: Option<String>,
}

/// Arguments for the caveats command.
#[derive(Parser, Debug, Clone)]
pub struct CaveatsArgs {
    /// Installation prefix the module was installed under.
    #[arg(short, long, value_name = "DIR", default_value = "/usr/local")]
    pub prefix: Utf8PathBuf,

    /// Name of the signing identity referenced in the instructions (macOS).
    #[arg(long, value_name = "NAME")]
    pub identity: Option<String>,
}

impl Cli {
    /// Returns the effective install arguments.
    ///
    /// If an `Install` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened install arguments, so plain
    /// `pam-ssh-agent-installer` behaves like `pam-ssh-agent-installer
    /// install`.
    #[must_use]
    pub fn install_args(&self) -> &InstallArgs {
        match &self.command {
            Some(Command::Install(args)) => args,
            Some(Command::Verify(_) | Command::Caveats(_)) | None => &self.install,
        }
    }
}

impl Default for InstallArgs {
    /// Creates an `InstallArgs` with the same values clap would assign when
    /// no flags are passed.
    ///
    /// # Examples
    ///
    /// ```
    /// use pam_ssh_agent_installer::cli::InstallArgs;
    ///
    /// let args = InstallArgs::default();
    /// assert_eq!(args.prefix.as_str(), "/usr/local");
    /// assert!(!args.dry_run);
    /// ```
    fn default() -> Self {
        Self {
            source_dir: Utf8PathBuf::from("."),
            prefix: Utf8PathBuf::from("/usr/local"),
            identity: None,
            crypto_prefix: None,
            toolchain: None,
            jobs: None,
            dry_run: false,
            verbosity: 0,
            quiet: false,
        }
    }
}
