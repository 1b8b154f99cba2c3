// tests/cook.rs

//! End-to-end cooks against local source archives

mod common;

use common::{Fixture, entries_in, fixed_metadata};
use kiln::formula::{ArtifactMode, ArtifactSpec, CommitPin, FlagEntry};
use kiln::kitchen::procedure::{BuildContext, InstallProcedure};
use kiln::kitchen::{CookState, FixedMetadata, Phase, TestOutcome};
use kiln::{ErrorKind, HostPlatform, Result};
use std::fs;

const PASSING_TEST: &str = r#"
[test]
commands = [["%(bin)s/hello"]]
expect_output = "hello from kiln"
"#;

const STUB_TEST: &str = r#"
[test]
stub = true
commands = [["false"]]
"#;

#[test]
fn test_cook_reaches_done() {
    let fixture = Fixture::new();
    let formula = fixture.formula(PASSING_TEST);
    let prefix = fixture.prefix();

    let report = fixture.kitchen().cook(&formula, &prefix);

    assert!(report.succeeded(), "{}", report);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.trail,
        vec![
            CookState::At(Phase::Init),
            CookState::At(Phase::Fetching),
            CookState::At(Phase::Verifying),
            CookState::At(Phase::Resolving),
            CookState::At(Phase::Building),
            CookState::At(Phase::Installing),
            CookState::At(Phase::Testing),
            CookState::At(Phase::Done),
        ]
    );
    assert_eq!(report.test, Some(TestOutcome::Passed));

    let binary = prefix.join("bin/hello");
    let script = fs::read_to_string(&binary).unwrap();
    assert!(script.contains("hello from kiln"));
    assert!(script.contains("-s -w -X main.Version=1.0 -X main.Commit=a1b2c3d"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&binary).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    assert_eq!(report.flags.len(), 2 + formula.build.flags.len());
    let variables = report.variables.as_ref().unwrap();
    assert_eq!(variables.get("build_time"), Some("2024-05-01T12:30:45Z"));
    assert_eq!(variables.get("branch"), Some("main"));
}

#[test]
fn test_cook_without_test_skips_testing() {
    let fixture = Fixture::new();
    let report = fixture.kitchen().cook(&fixture.formula(""), &fixture.prefix());

    assert!(report.succeeded(), "{}", report);
    assert!(!report.trail.contains(&CookState::At(Phase::Testing)));
    assert!(report.test.is_none());
}

#[test]
fn test_checksum_mismatch_halts_in_fetching() {
    let fixture = Fixture::new();
    // Same digest with the last hex character changed
    let mut checksum = fixture.checksum.clone();
    let last = checksum.pop().unwrap();
    checksum.push(if last == '0' { '1' } else { '0' });

    let formula = fixture.formula_with_checksum(&checksum, PASSING_TEST);
    let prefix = fixture.prefix();
    let report = fixture.kitchen().cook(&formula, &prefix);

    assert_eq!(
        report.trail,
        vec![
            CookState::At(Phase::Init),
            CookState::At(Phase::Fetching),
            CookState::Failed {
                phase: Phase::Fetching,
                kind: ErrorKind::IntegrityError
            },
        ]
    );
    assert_ne!(report.exit_code(), 0);
    assert!(report.installed.is_none());
    assert!(report.source_files.is_none());
    assert!(!prefix.exists());
    assert_eq!(entries_in(&fixture.build_root()), 0);
}

#[test]
fn test_stub_test_fails_after_install() {
    let fixture = Fixture::new();
    let prefix = fixture.prefix();
    let report = fixture.kitchen().cook(&fixture.formula(STUB_TEST), &prefix);

    assert_eq!(
        report.state(),
        CookState::Failed {
            phase: Phase::Testing,
            kind: ErrorKind::TestFailure
        }
    );
    assert!(matches!(report.test, Some(TestOutcome::Stubbed { .. })));

    // The install stays in place
    assert!(prefix.join("bin/hello").is_file());
    assert_eq!(report.installed.as_ref().unwrap().files.len(), 1);

    // Distinguishable from a build failure
    assert_ne!(report.exit_code(), 0);
    assert_ne!(report.exit_code(), ErrorKind::BuildError.exit_code());
    assert!(report.summary().contains("smoke test did not pass"));
    assert!(!report.summary().contains("BuildError"));
}

#[test]
fn test_failing_test_keeps_install() {
    let fixture = Fixture::new();
    let prefix = fixture.prefix();
    let extra = r#"
[test]
commands = [["%(bin)s/hello"]]
expect_output = "goodbye"
"#;
    let report = fixture.kitchen().cook(&fixture.formula(extra), &prefix);

    assert!(matches!(report.test, Some(TestOutcome::Failed { .. })));
    assert_eq!(report.failure.as_ref().unwrap().kind, ErrorKind::TestFailure);
    assert!(prefix.join("bin/hello").is_file());
}

#[test]
fn test_host_too_old_fails_before_fetch() {
    let fixture = Fixture::new();
    let extra = r#"
[[dependencies]]
name = "ncurses"
provenance = "host"
host = { os = "macos", since = "sonoma" }
"#;
    // Remove the archive so any download attempt would fail differently
    fs::remove_file(&fixture.archive).unwrap();

    let kitchen = fixture.kitchen_on(HostPlatform::new("macos", "12.6").unwrap());
    let report = kitchen.cook(&fixture.formula(extra), &fixture.prefix());

    assert_eq!(
        report.trail,
        vec![
            CookState::At(Phase::Init),
            CookState::Failed {
                phase: Phase::Init,
                kind: ErrorKind::UnsatisfiedDependencyError
            },
        ]
    );
    assert!(report.failure.as_ref().unwrap().message.contains("ncurses"));
    assert!(!fixture.prefix().exists());
}

#[test]
fn test_host_on_other_os_builds_dependency() {
    let fixture = Fixture::new();
    let extra = r#"
[[dependencies]]
name = "ncurses"
provenance = "host"
host = { os = "macos", since = "sonoma" }
"#;
    let kitchen = fixture.kitchen_on(HostPlatform::new("linux", "6.8").unwrap());
    let report = kitchen.cook(&fixture.formula(extra), &fixture.prefix());

    assert!(report.succeeded(), "{}", report);
    let host = report.host.as_ref().unwrap();
    assert_eq!(host.must_build, vec!["ncurses".to_string()]);
    assert!(host.satisfied.is_empty());
}

#[test]
fn test_build_failure_installs_nothing() {
    let fixture = Fixture::with_files(&[("build.sh", b"echo 'compile error' >&2\nexit 2\n")]);
    let prefix = fixture.prefix();
    let report = fixture.kitchen().cook(&fixture.formula(PASSING_TEST), &prefix);

    assert_eq!(
        report.state(),
        CookState::Failed {
            phase: Phase::Building,
            kind: ErrorKind::BuildError
        }
    );
    assert_eq!(report.exit_code(), ErrorKind::BuildError.exit_code());
    assert!(report.failure.as_ref().unwrap().message.contains("compile error"));
    assert!(report.installed.is_none());
    assert!(!prefix.exists());
}

#[test]
fn test_missing_commit_fails_resolving() {
    let fixture = Fixture::new();
    let kitchen = fixture.kitchen().with_metadata(FixedMetadata {
        commit: None,
        ..fixed_metadata()
    });
    let report = kitchen.cook(&fixture.formula(PASSING_TEST), &fixture.prefix());

    assert_eq!(
        report.state(),
        CookState::Failed {
            phase: Phase::Resolving,
            kind: ErrorKind::ResolveError
        }
    );
    assert!(report.flags.is_empty());
}

#[test]
fn test_pinned_commit_used_without_vcs() {
    let fixture = Fixture::new();
    let kitchen = fixture.kitchen().with_metadata(FixedMetadata {
        commit: None,
        ..fixed_metadata()
    });
    let mut formula = fixture.formula("");
    formula.source.commit = Some(CommitPin {
        version: "1.0".to_string(),
        id: "feedface".to_string(),
    });

    let report = kitchen.cook(&formula, &fixture.prefix());
    assert!(report.succeeded(), "{}", report);
    assert!(report.flags.contains(&"-X main.Commit=feedface".to_string()));
}

#[test]
fn test_stale_commit_pin_fails_resolving() {
    let fixture = Fixture::new();
    let kitchen = fixture.kitchen().with_metadata(FixedMetadata {
        commit: None,
        ..fixed_metadata()
    });
    let mut formula = fixture.formula("");
    formula.source.commit = Some(CommitPin {
        version: "0.9".to_string(),
        id: "feedface".to_string(),
    });

    let report = kitchen.cook(&formula, &fixture.prefix());
    assert_eq!(
        report.state(),
        CookState::Failed {
            phase: Phase::Resolving,
            kind: ErrorKind::ResolveError
        }
    );
    assert!(report.flags.is_empty());
    assert_eq!(entries_in(&fixture.prefix()), 0);
}

#[test]
fn test_unknown_flag_variable_fails_before_fetch() {
    let fixture = Fixture::new();
    let mut formula = fixture.formula("");
    formula.build.flags.push(FlagEntry {
        symbol: "main.Missing".to_string(),
        variable: "no_such_variable".to_string(),
    });

    let report = fixture.kitchen().cook(&formula, &fixture.prefix());
    assert_eq!(
        report.state(),
        CookState::Failed {
            phase: Phase::Init,
            kind: ErrorKind::TemplateError
        }
    );
}

#[test]
fn test_sandbox_leaves_nothing_behind() {
    let fixture = Fixture::new();
    let kitchen = fixture.kitchen();

    let passing = kitchen.cook(&fixture.formula(PASSING_TEST), &fixture.prefix());
    assert!(passing.succeeded(), "{}", passing);
    let stubbed = kitchen.cook(&fixture.formula(STUB_TEST), &fixture.prefix());
    assert!(!stubbed.succeeded());

    assert_eq!(entries_in(&fixture.sandbox_root()), 0);
    assert_eq!(entries_in(&fixture.build_root()), 0);
}

/// Writes the output file directly instead of running a build tool
struct WriteOutput;

impl InstallProcedure for WriteOutput {
    fn build(&self, ctx: &BuildContext) -> Result<String> {
        fs::write(ctx.workdir.join(&ctx.output), ctx.ldflags.as_bytes())?;
        fs::write(ctx.workdir.join("hello.1"), b".TH HELLO 1\n")?;
        Ok(format!("wrote {}", ctx.output))
    }

    fn artifacts(&self, ctx: &BuildContext) -> Vec<ArtifactSpec> {
        vec![
            ArtifactSpec {
                path: ctx.output.clone(),
                dest: format!("libexec/{}", ctx.output),
                mode: ArtifactMode::Executable,
            },
            ArtifactSpec {
                path: "hello.1".to_string(),
                dest: "share/man/man1/hello.1".to_string(),
                mode: ArtifactMode::Readable,
            },
        ]
    }
}

#[test]
fn test_cook_with_custom_procedure() {
    let fixture = Fixture::new();
    let prefix = fixture.prefix();
    let formula = fixture.formula("");

    let report = fixture.kitchen().cook_with(&formula, &WriteOutput, None, &prefix);

    assert!(report.succeeded(), "{}", report);
    assert!(report.log.contains("wrote hello"));
    let written = fs::read_to_string(prefix.join("libexec/hello")).unwrap();
    assert!(written.starts_with("-s -w -X main.Version=1.0"));
    assert!(prefix.join("share/man/man1/hello.1").is_file());
    assert_eq!(report.installed.unwrap().files.len(), 2);
}

#[test]
fn test_report_json() {
    let fixture = Fixture::new();
    let report = fixture.kitchen().cook(&fixture.formula(STUB_TEST), &fixture.prefix());

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["formula"], "hello");
    assert_eq!(json["failure"]["phase"], "testing");
    assert_eq!(json["test"]["outcome"], "stubbed");
}
