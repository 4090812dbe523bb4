//! External command execution for the installer.
//!
//! Every external tool the installer touches (cargo, rustup, security,
//! codesign) is invoked through the [`CommandRunner`] trait so tests can
//! substitute scripted responses instead of running real commands. Linking
//! directives travel inside [`CommandSpec`] as per-invocation environment
//! pairs rather than process-global environment mutation.

use crate::error::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::process::{Command, Output};

/// A fully described external command invocation.
///
/// Captures the program, arguments, environment additions, and working
/// directory in one value so a stub runner can assert on exactly what would
/// have been executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name looked up on `PATH`.
    pub program: String,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Environment pairs added on top of the inherited environment.
    pub envs: Vec<(String, String)>,
    /// Working directory, when it differs from the current one.
    pub current_dir: Option<Utf8PathBuf>,
}

impl CommandSpec {
    /// Create a spec for the given program with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment pair for this invocation only.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.current_dir = Some(dir.to_owned());
        self
    }

    /// Render the command line for log output.
    #[must_use]
    pub fn rendered(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Abstraction for running external commands.
pub trait CommandRunner {
    /// Runs the described command and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning or running the
    /// command.
    fn run(&self, spec: &CommandSpec) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<Output> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        for (key, value) in &spec.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        log::debug!("running: {}", spec.rendered());
        cmd.output().map_err(Into::into)
    }
}

/// Return the trimmed stderr of an output, or a placeholder when empty.
#[must_use]
pub fn stderr_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        "unknown error".to_owned()
    } else {
        trimmed.to_owned()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use stub::{StubRunner, exit_status, output};

#[cfg(any(test, feature = "test-support"))]
mod stub {
    use super::{CommandRunner, CommandSpec};
    use crate::error::{InstallerError, Result};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::process::{ExitStatus, Output};

    /// A command runner that replays scripted responses.
    ///
    /// Responses are matched in FIFO order against the program name of each
    /// invocation; an unexpected program or an exhausted script produces
    /// [`InstallerError::StubMismatch`]. All invocations are recorded so
    /// tests can assert on the exact command lines and environments.
    #[derive(Default)]
    pub struct StubRunner {
        responses: RefCell<VecDeque<(String, Output)>>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl StubRunner {
        /// Create a stub with an empty script.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append a scripted response for the next invocation of `program`.
        #[must_use]
        pub fn expect(self, program: &str, response: Output) -> Self {
            self.responses
                .borrow_mut()
                .push_back((program.to_owned(), response));
            self
        }

        /// Return every invocation recorded so far.
        #[must_use]
        pub fn calls(&self) -> Vec<CommandSpec> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for StubRunner {
        fn run(&self, spec: &CommandSpec) -> Result<Output> {
            self.calls.borrow_mut().push(spec.clone());
            let Some((program, response)) = self.responses.borrow_mut().pop_front() else {
                return Err(InstallerError::StubMismatch {
                    message: format!("unexpected invocation of {}", spec.program),
                });
            };
            if program != spec.program {
                return Err(InstallerError::StubMismatch {
                    message: format!("expected {program}, got {}", spec.program),
                });
            }
            Ok(response)
        }
    }

    /// Build an [`ExitStatus`] from an exit code.
    #[must_use]
    pub fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    /// Build a process [`Output`] from an exit code and captured streams.
    #[must_use]
    pub fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: exit_status(code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InstallerError;

    mockall::mock! {
        Runner {}

        impl CommandRunner for Runner {
            fn run(&self, spec: &CommandSpec) -> Result<std::process::Output>;
        }
    }

    #[test]
    fn spec_builder_collects_args_envs_and_dir() {
        let spec = CommandSpec::new("cargo")
            .args(["build", "--release"])
            .arg("--lib")
            .env("LIBSSH_STATIC", "1")
            .current_dir(Utf8Path::new("/src"));

        assert_eq!(spec.program, "cargo");
        assert_eq!(spec.args, ["build", "--release", "--lib"]);
        assert_eq!(
            spec.envs,
            [("LIBSSH_STATIC".to_owned(), "1".to_owned())]
        );
        assert_eq!(spec.current_dir.as_deref(), Some(Utf8Path::new("/src")));
        assert_eq!(spec.rendered(), "cargo build --release --lib");
    }

    #[test]
    fn system_runner_captures_output() {
        let runner = SystemCommandRunner;
        let result = runner
            .run(&CommandSpec::new("echo").arg("hello"))
            .expect("echo should run");
        assert!(result.status.success());
        assert_eq!(String::from_utf8_lossy(&result.stdout).trim(), "hello");
    }

    #[test]
    fn stub_replays_responses_in_order() {
        let runner = StubRunner::new()
            .expect("security", output(0, "identity list", ""))
            .expect("codesign", output(0, "", ""));

        let first = runner
            .run(&CommandSpec::new("security").arg("find-identity"))
            .expect("first response");
        assert_eq!(String::from_utf8_lossy(&first.stdout), "identity list");

        let second = runner
            .run(&CommandSpec::new("codesign"))
            .expect("second response");
        assert!(second.status.success());
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn stub_rejects_unexpected_program() {
        let runner = StubRunner::new().expect("codesign", output(0, "", ""));
        let err = runner
            .run(&CommandSpec::new("security"))
            .expect_err("program mismatch should fail");
        assert!(matches!(err, InstallerError::StubMismatch { .. }));
    }

    #[test]
    fn mock_runner_scripts_responses() {
        let mut mock = MockRunner::new();
        mock.expect_run().returning(|_| Ok(output(0, "ok", "")));

        let out = mock
            .run(&CommandSpec::new("true"))
            .expect("mocked run succeeds");
        assert!(out.status.success());
    }

    #[test]
    fn stderr_message_falls_back_when_empty() {
        assert_eq!(stderr_message(&output(1, "", "")), "unknown error");
        assert_eq!(stderr_message(&output(1, "", " boom \n")), "boom");
    }
}
