//! Build command execution.
//!
//! Runs the configured `[build] command` after source changes settle and
//! turns its outcome into compile failures and warnings.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;

use crate::config::ReloadConfig;
use crate::reload::{CompileFailure, Orchestrator};

// ============================================================================
// Environment Variables
// ============================================================================

/// Build `$NSRELOAD_*` environment variables for the build command
pub fn build_vars(config: &ReloadConfig) -> FxHashMap<String, String> {
    let mut vars = FxHashMap::default();
    vars.insert(
        "NSRELOAD_OUTPUT_DIR".into(),
        config.build.output_dir.display().to_string(),
    );
    vars.insert("NSRELOAD_ROOT".into(), config.get_root().display().to_string());
    vars
}

/// Resolve `$NSRELOAD_*` variables in command arguments
pub fn resolve_args(args: &[String], vars: &FxHashMap<String, String>) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let mut result = arg.clone();
            for (key, value) in vars {
                let pattern = format!("${}", key);
                result = result.replace(&pattern, value);
            }
            result
        })
        .collect()
}

// ============================================================================
// Build Output
// ============================================================================

/// Captured result of one build command run.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub program: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    /// Output lines starting with `WARNING` (any case).
    pub fn warnings(&self) -> Vec<&str> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .filter(|line| is_warning(line))
            .collect()
    }

    /// Failure record for a non-zero exit, `None` on success.
    pub fn failure(&self) -> Option<CompileFailure> {
        if self.success {
            return None;
        }
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        Some(CompileFailure::from_output(&self.program, text))
    }
}

fn is_warning(line: &str) -> bool {
    line.get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("warning"))
}

// ============================================================================
// Execution
// ============================================================================

/// Run the configured build command, if any.
///
/// Returns `Ok(None)` when no command is configured. A command that cannot
/// be started is an error; a command that exits non-zero is not.
pub fn run_build_command(config: &ReloadConfig) -> Result<Option<BuildOutput>> {
    let Some(command) = config.build.command.as_ref().filter(|c| !c.is_empty()) else {
        return Ok(None);
    };

    let vars = build_vars(config);
    let resolved = resolve_args(command, &vars);
    let Some((program, args)) = resolved.split_first() else {
        return Ok(None);
    };

    crate::debug!("build"; "running `{}`", resolved.join(" "));
    let output = Command::new(program)
        .args(args)
        .current_dir(config.get_root())
        .envs(&vars)
        .output()
        .with_context(|| format!("failed to run build command `{}`", program))?;

    Ok(Some(BuildOutput {
        program: program_name(program),
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }))
}

/// Run the build command and report its outcome.
///
/// Returns `false` when the build failed and the snapshot diff should be
/// skipped.
pub fn run_and_report(config: &ReloadConfig, orchestrator: &Orchestrator) -> bool {
    match run_build_command(config) {
        Ok(None) => true,
        Ok(Some(output)) => report_output(&output, orchestrator),
        Err(e) => {
            orchestrator.on_compile_error(CompileFailure::from_error(&e));
            false
        }
    }
}

/// Push warnings and any failure from `output` to the change log.
pub fn report_output(output: &BuildOutput, orchestrator: &Orchestrator) -> bool {
    for warning in output.warnings() {
        orchestrator.on_compile_warning(warning);
    }
    match output.failure() {
        Some(failure) => {
            orchestrator.on_compile_error(failure);
            false
        }
        None => true,
    }
}

fn program_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::UrlMapper;
    use crate::reload::{ChangeLog, ChannelOptions};
    use std::sync::Arc;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            Arc::new(ChangeLog::new()),
            UrlMapper::new(&["resources"], "public", "resources/public/out"),
            Vec::new(),
            ChannelOptions::default(),
        )
    }

    fn output(success: bool, stdout: &str, stderr: &str) -> BuildOutput {
        BuildOutput {
            program: "lein".into(),
            success,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[test]
    fn test_resolve_args() {
        let mut vars = FxHashMap::default();
        vars.insert("NSRELOAD_OUTPUT_DIR".into(), "/app/out".into());
        vars.insert("NSRELOAD_ROOT".into(), "/app".into());

        let args = vec!["cljs".into(), "--out $NSRELOAD_OUTPUT_DIR".into(), "$NSRELOAD_ROOT/src".into()];
        assert_eq!(
            resolve_args(&args, &vars),
            vec!["cljs", "--out /app/out", "/app/src"]
        );
    }

    #[test]
    fn test_warnings_detected_in_both_streams() {
        let out = output(
            true,
            "Compiling...\nWARNING: Use of undeclared Var app.core/x\n",
            "  warning: shadowed var\nnot a Warning line\n",
        );
        assert_eq!(
            out.warnings(),
            vec!["WARNING: Use of undeclared Var app.core/x", "warning: shadowed var"]
        );
    }

    #[test]
    fn test_failure_prefers_stderr() {
        let out = output(false, "Compiling...", "Unmatched delimiter at src/app/core.cljs:3:1");
        let failure = out.failure().unwrap();

        assert_eq!(failure.class, "lein");
        assert_eq!(failure.message, "Unmatched delimiter at src/app/core.cljs:3:1");
        assert_eq!(failure.trace[0].line, Some(3));

        assert!(output(true, "", "").failure().is_none());
    }

    #[test]
    fn test_failure_falls_back_to_stdout() {
        let failure = output(false, "EOF while reading", "  \n").failure().unwrap();
        assert_eq!(failure.message, "EOF while reading");
    }

    #[test]
    fn test_report_output() {
        let orch = orchestrator();

        assert!(report_output(&output(true, "WARNING: careful", ""), &orch));
        assert!(!report_output(&output(false, "", "boom"), &orch));

        let events = orch.log().events();
        assert_eq!(events[0].name(), "compile-failed");
        assert_eq!(events[1].name(), "compile-warning");
    }

    #[test]
    fn test_no_command_is_noop() {
        let config = crate::config::test_parse_config("");
        assert!(run_build_command(&config).unwrap().is_none());
        assert!(run_and_report(&config, &orchestrator()));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_with_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = crate::config::test_parse_config(
            "[build]\ncommand = [\"sh\", \"-c\", \"echo $NSRELOAD_ROOT; exit 3\"]",
        );
        config.finalize(dir.path());

        let out = run_build_command(&config).unwrap().unwrap();
        assert!(!out.success);
        assert_eq!(out.program, "sh");
        assert_eq!(out.stdout.trim(), config.get_root().display().to_string());
    }

    #[test]
    fn test_missing_program_reported() {
        let mut config = crate::config::test_parse_config(
            "[build]\ncommand = [\"nsreload-no-such-build-tool\"]",
        );
        config.finalize(&std::env::temp_dir());
        let orch = orchestrator();

        assert!(!run_and_report(&config, &orch));
        assert_eq!(orch.log().head().unwrap().name(), "compile-failed");
    }
}
