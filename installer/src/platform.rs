//! Host platform detection and platform-dependent install policy.
//!
//! The platform is probed once at install start and carried through the
//! pipeline as a [`Platform`] value; every later stage consults its methods
//! instead of re-checking the host OS. The module also houses the ordered
//! directory probe used for the Linux PAM directory and the macOS crypto
//! prefix: the probe is total, answering with a sentinel rather than failing,
//! so consumers degrade to generic guidance when nothing is found.

use camino::{Utf8Path, Utf8PathBuf};

/// Host operating system family, probed once per install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// macOS: static linking and code signing required.
    MacOs,
    /// Linux: dynamic linking against system libraries, no signing.
    Linux,
    /// Anything else: treated like Linux minus the PAM directory probe.
    Other,
}

impl Platform {
    /// Probe the host OS identity.
    #[must_use]
    pub fn detect() -> Self {
        match std::env::consts::OS {
            "macos" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Other,
        }
    }

    /// Extension of the shared library cargo produces on this platform.
    #[must_use]
    pub const fn module_extension(self) -> &'static str {
        match self {
            Self::MacOs => ".dylib",
            Self::Linux | Self::Other => ".so",
        }
    }

    /// Whether the installed module must be code signed before the OS loader
    /// will accept it.
    #[must_use]
    pub const fn requires_signing(self) -> bool {
        matches!(self, Self::MacOs)
    }

    /// Linking directives for the module build on this platform.
    ///
    /// On macOS the module is loaded into SIP-protected system processes, so
    /// the libssh chain is linked statically and the crypto prefix hint makes
    /// the static archives discoverable. Elsewhere the directive is empty and
    /// the module links dynamically against system libraries.
    #[must_use]
    pub fn link_directive(self, crypto_prefix: Option<&Utf8Path>) -> LinkDirective {
        match self {
            Self::MacOs => {
                let mut pairs = vec![("LIBSSH_STATIC".to_owned(), "1".to_owned())];
                if let Some(prefix) = crypto_prefix {
                    pairs.push(("OPENSSL_DIR".to_owned(), prefix.to_string()));
                }
                LinkDirective { pairs }
            }
            Self::Linux | Self::Other => LinkDirective::none(),
        }
    }
}

/// Environment instructions communicating the linking choice to the build.
///
/// Fully determined before the build starts and consumed exactly once by the
/// build invocation; never revisited mid-build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkDirective {
    pairs: Vec<(String, String)>,
}

impl LinkDirective {
    /// The empty directive: dynamic linking, no hints.
    #[must_use]
    pub const fn none() -> Self {
        Self { pairs: Vec::new() }
    }

    /// The environment pairs to apply to the build invocation.
    #[must_use]
    pub fn env_pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Whether the directive carries no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Known Linux security-module directories, in fixed probe order.
pub const PAM_DIR_CANDIDATES: &[&str] = &[
    "/lib/x86_64-linux-gnu/security",
    "/lib64/security",
    "/lib/security",
];

/// Homebrew OpenSSL prefixes probed for static crypto archives on macOS.
pub const CRYPTO_PREFIX_CANDIDATES: &[&str] = &[
    "/opt/homebrew/opt/openssl@3",
    "/usr/local/opt/openssl@3",
];

/// Outcome of the Linux PAM directory probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PamDirectory {
    /// The first candidate directory that exists.
    Detected(Utf8PathBuf),
    /// No candidate exists; guidance falls back to a templated example.
    Undetected,
}

impl PamDirectory {
    /// Probe the fixed candidate list on the host filesystem.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_candidates(PAM_DIR_CANDIDATES)
    }

    /// Probe an explicit candidate list, first existing directory wins.
    #[must_use]
    pub fn from_candidates(candidates: &[&str]) -> Self {
        match first_existing_dir(candidates) {
            Some(path) => Self::Detected(path),
            None => Self::Undetected,
        }
    }

    /// The detected path, when there is one.
    #[must_use]
    pub fn as_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Detected(path) => Some(path),
            Self::Undetected => None,
        }
    }
}

/// Return the first candidate that exists as a directory.
///
/// The probe order is the argument order; later candidates are never merged
/// in. Returns `None` when nothing matches.
#[must_use]
pub fn first_existing_dir(candidates: &[&str]) -> Option<Utf8PathBuf> {
    candidates
        .iter()
        .map(Utf8PathBuf::from)
        .find(|path| path.is_dir())
}

/// Default crypto prefix hint for the macOS static build.
#[must_use]
pub fn default_crypto_prefix() -> Option<Utf8PathBuf> {
    first_existing_dir(CRYPTO_PREFIX_CANDIDATES)
}
