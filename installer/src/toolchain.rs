//! Rust toolchain detection for the module build.
//!
//! The pam-ssh-agent source tree may pin a toolchain via
//! `rust-toolchain.toml`; when it does, the build runs `cargo +<channel>` and
//! the channel is verified installed through rustup first. An absent file is
//! not an error — the build then uses the default toolchain.

use crate::error::{InstallerError, Result};
use crate::exec::{CommandRunner, CommandSpec};
use camino::Utf8Path;

/// A pinned Rust toolchain channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    channel: String,
}

impl Toolchain {
    /// Detect the pinned toolchain from `rust-toolchain.toml` in the source
    /// tree, returning `None` when the tree does not pin one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn detect(source_dir: &Utf8Path) -> Result<Option<Self>> {
        let toolchain_path = source_dir.join("rust-toolchain.toml");
        if !toolchain_path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&toolchain_path)?;
        let channel = parse_toolchain_channel(&contents)?;
        Ok(Some(Self { channel }))
    }

    /// Create a toolchain with an explicit override channel.
    #[must_use]
    pub fn with_override(channel: &str) -> Self {
        Self {
            channel: channel.to_owned(),
        }
    }

    /// Return the channel string for `cargo +<channel>` invocations.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Verify that the channel is installed via rustup.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::ToolchainNotInstalled`] when rustup cannot
    /// run a compiler from the channel.
    pub fn verify_installed(&self, runner: &dyn CommandRunner) -> Result<()> {
        let spec = CommandSpec::new("rustup").args([
            "run",
            self.channel.as_str(),
            "rustc",
            "--version",
        ]);
        let output = runner.run(&spec)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(InstallerError::ToolchainNotInstalled {
                toolchain: self.channel.clone(),
            })
        }
    }
}

/// Parse the channel from `rust-toolchain.toml` contents.
///
/// Supports the standard `[toolchain].channel` format and the legacy
/// top-level `channel` key.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or no channel field is found.
pub fn parse_toolchain_channel(contents: &str) -> Result<String> {
    let table: toml::Table =
        contents
            .parse()
            .map_err(|e| InstallerError::InvalidToolchainFile {
                reason: format!("TOML parse error: {e}"),
            })?;

    let channel_from_toolchain = table
        .get("toolchain")
        .and_then(|t| t.get("channel"))
        .and_then(|c| c.as_str());

    if let Some(s) = channel_from_toolchain {
        return Ok(s.to_owned());
    }

    let channel_from_top = table.get("channel").and_then(|c| c.as_str());

    if let Some(s) = channel_from_top {
        return Ok(s.to_owned());
    }

    Err(InstallerError::InvalidToolchainFile {
        reason: "no channel field found in rust-toolchain.toml".to_owned(),
    })
}
