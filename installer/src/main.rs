//! pam-ssh-agent installer CLI entrypoint.
//!
//! This binary builds the pam-ssh-agent PAM module from a source checkout,
//! installs it into `<prefix>/lib/security`, signs it on macOS, and prints
//! activation instructions. The heavy lifting lives in the library crate;
//! this module resolves configuration from the CLI and dispatches.

use camino::Utf8PathBuf;
use clap::Parser;
use pam_ssh_agent_installer::cli::{CaveatsArgs, Cli, Command, InstallArgs, VerifyArgs};
use pam_ssh_agent_installer::error::Result;
use pam_ssh_agent_installer::exec::{CommandRunner, SystemCommandRunner};
use pam_ssh_agent_installer::install::Installer;
use pam_ssh_agent_installer::output::write_stderr_line;
use pam_ssh_agent_installer::pipeline::{self, PipelineContext, compose_install_caveats};
use pam_ssh_agent_installer::platform::{Platform, default_crypto_prefix};
use pam_ssh_agent_installer::signing::{DEFAULT_SIGNING_IDENTITY, SigningIdentity};
use pam_ssh_agent_installer::toolchain::Toolchain;
use pam_ssh_agent_installer::verify::verify_install;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let runner = SystemCommandRunner;
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &runner, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, runner: &dyn CommandRunner, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Some(Command::Verify(args)) => run_verify(args, runner, stderr),
        Some(Command::Caveats(args)) => run_caveats(args, stderr),
        Some(Command::Install(_)) | None => run_install(cli.install_args(), runner, stderr),
    }
}

fn run_install(
    args: &InstallArgs,
    runner: &dyn CommandRunner,
    stderr: &mut dyn Write,
) -> Result<()> {
    let context = resolve_context(args)?;

    if args.dry_run {
        print_dry_run_info(&context, stderr);
        return Ok(());
    }

    if let Some(toolchain) = &context.toolchain {
        toolchain.verify_installed(runner)?;
    }

    pipeline::run_install(&context, runner, stderr)
}

/// Resolves the pipeline configuration from CLI arguments.
///
/// Performs only local reads (platform probe, toolchain pin file, crypto
/// prefix probe); external tools are not invoked, so dry runs stay free of
/// side effects.
fn resolve_context(args: &InstallArgs) -> Result<PipelineContext> {
    let platform = Platform::detect();

    let toolchain = match &args.toolchain {
        Some(channel) => Some(Toolchain::with_override(channel)),
        None => Toolchain::detect(&args.source_dir)?,
    };

    let crypto_prefix = match platform {
        Platform::MacOs => args.crypto_prefix.clone().or_else(default_crypto_prefix),
        Platform::Linux | Platform::Other => None,
    };

    Ok(PipelineContext {
        platform,
        source_dir: args.source_dir.clone(),
        install_root: args.prefix.join("lib"),
        identity: resolve_identity(args.identity.as_deref()),
        crypto_prefix,
        toolchain,
        jobs: args.jobs,
        verbosity: args.verbosity,
        quiet: args.quiet,
    })
}

fn resolve_identity(identity: Option<&str>) -> SigningIdentity {
    SigningIdentity::from(identity.unwrap_or(DEFAULT_SIGNING_IDENTITY))
}

fn run_verify(args: &VerifyArgs, runner: &dyn CommandRunner, stderr: &mut dyn Write) -> Result<()> {
    let platform = Platform::detect();
    let target = installer_for(&args.prefix).target_path();
    let identity = resolve_identity(args.identity.as_deref());

    verify_install(runner, platform, &target, &identity)?;
    write_stderr_line(stderr, format!("verified: {target}"));
    Ok(())
}

fn run_caveats(args: &CaveatsArgs, stderr: &mut dyn Write) -> Result<()> {
    let platform = Platform::detect();
    let target = installer_for(&args.prefix).target_path();

    let context = PipelineContext {
        platform,
        source_dir: Utf8PathBuf::from("."),
        install_root: args.prefix.join("lib"),
        identity: resolve_identity(args.identity.as_deref()),
        crypto_prefix: None,
        toolchain: None,
        jobs: None,
        verbosity: 0,
        quiet: true,
    };

    write_stderr_line(
        stderr,
        compose_install_caveats(&context, &target, platform.requires_signing()),
    );
    Ok(())
}

fn installer_for(prefix: &camino::Utf8Path) -> Installer {
    Installer::new(prefix.join("lib"))
}

fn print_dry_run_info(context: &PipelineContext, stderr: &mut dyn Write) {
    write_stderr_line(stderr, "Dry run - no files will be modified");
    write_stderr_line(stderr, "");
    write_stderr_line(stderr, format!("Platform: {:?}", context.platform));
    write_stderr_line(stderr, format!("Source directory: {}", context.source_dir));
    write_stderr_line(
        stderr,
        format!("Install target: {}", context.installer().target_path()),
    );
    match &context.toolchain {
        Some(toolchain) => {
            write_stderr_line(stderr, format!("Toolchain: {}", toolchain.channel()));
        }
        None => write_stderr_line(stderr, "Toolchain: default"),
    }

    let directive = context
        .platform
        .link_directive(context.crypto_prefix.as_deref());
    if directive.is_empty() {
        write_stderr_line(stderr, "Linking: dynamic against system libraries");
    } else {
        write_stderr_line(stderr, "Linking: static, with environment:");
        for (key, value) in directive.env_pairs() {
            write_stderr_line(stderr, format!("  {key}={value}"));
        }
    }

    if context.platform.requires_signing() {
        write_stderr_line(
            stderr,
            format!("Signing identity: {}", context.identity),
        );
    }
    if let Some(jobs) = context.jobs {
        write_stderr_line(stderr, format!("Parallel jobs: {jobs}"));
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pam_ssh_agent_installer::error::InstallerError;
    use pam_ssh_agent_installer::exec::StubRunner;
    use tempfile::TempDir;

    fn install_args_in(dir: &TempDir) -> InstallArgs {
        InstallArgs {
            source_dir: Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
                .expect("utf-8 source path"),
            ..InstallArgs::default()
        }
    }

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = InstallerError::BuildFailed {
            reason: "linker not found".to_owned(),
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("linker not found"));
    }

    #[test]
    fn identity_defaults_to_the_documented_name() {
        assert_eq!(resolve_identity(None).as_str(), "pam-ssh-agent");
        assert_eq!(resolve_identity(Some("custom")).as_str(), "custom");
    }

    #[test]
    fn context_installs_under_the_prefix_lib_directory() {
        let dir = TempDir::new().expect("temp dir");
        let mut args = install_args_in(&dir);
        args.prefix = Utf8PathBuf::from("/opt/homebrew");

        let context = resolve_context(&args).expect("context resolves");
        assert_eq!(
            context.installer().target_path(),
            Utf8PathBuf::from("/opt/homebrew/lib/security/pam_ssh_agent.so")
        );
    }

    #[test]
    fn toolchain_override_beats_detection() {
        let dir = TempDir::new().expect("temp dir");
        let source =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 source path");
        std::fs::write(
            source.join("rust-toolchain.toml"),
            "[toolchain]\nchannel = \"1.84.0\"\n",
        )
        .expect("write pin file");

        let mut args = install_args_in(&dir);
        args.toolchain = Some("1.85.0".to_owned());

        let context = resolve_context(&args).expect("context resolves");
        assert_eq!(
            context.toolchain.as_ref().map(Toolchain::channel),
            Some("1.85.0")
        );
    }

    #[test]
    fn dry_run_invokes_nothing_external() {
        let dir = TempDir::new().expect("temp dir");
        let mut args = install_args_in(&dir);
        args.dry_run = true;

        let runner = StubRunner::new();
        let mut stderr = Vec::new();
        run_install(&args, &runner, &mut stderr).expect("dry run succeeds");

        assert!(runner.calls().is_empty());
        let text = String::from_utf8_lossy(&stderr);
        assert!(text.contains("Dry run - no files will be modified"));
        assert!(text.contains("pam_ssh_agent.so"));
    }
}
