//! Progress output helpers for the installer CLI.
//!
//! Progress goes to an injected writer rather than straight to the process
//! stderr so tests can capture and assert on it.

use camino::Utf8Path;
use std::io::Write;

/// Write a single line to the given writer, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Format the line reported after a successful install.
#[must_use]
pub fn success_message(target: &Utf8Path) -> String {
    format!("pam_ssh_agent.so installed to {target}")
}
