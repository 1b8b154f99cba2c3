// src/kitchen/sandbox.rs

//! Ephemeral sandbox for smoke tests
//!
//! Each test run gets a freshly created, empty directory that is removed
//! as soon as the run ends, whether the procedure passes, fails or panics.

use crate::error::{Error, Result};
use crate::kitchen::procedure::{TestProcedure, test_context};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Result of a sandboxed test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    Failed { reason: String },
    /// A declared stub failed, as it always does
    Stubbed { reason: String },
}

impl TestOutcome {
    /// Convert a non-passing outcome into a `TestFailure`
    pub fn into_result(self) -> Result<()> {
        match self {
            TestOutcome::Passed => Ok(()),
            TestOutcome::Failed { reason } => Err(Error::TestFailure { reason, stub: false }),
            TestOutcome::Stubbed { reason } => Err(Error::TestFailure { reason, stub: true }),
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Passed => write!(f, "passed"),
            TestOutcome::Failed { reason } => write!(f, "failed: {}", reason),
            TestOutcome::Stubbed { reason } => write!(f, "stub (always fails): {}", reason),
        }
    }
}

/// Run a test procedure against `prefix` in a sandbox under the system temp dir
pub fn run_test(procedure: &dyn TestProcedure, prefix: &Path) -> Result<TestOutcome> {
    run_test_in(procedure, prefix, None)
}

/// Run a test procedure in a sandbox created under `root`
///
/// The sandbox is gone when this returns. Only failing to create or remove
/// it is an error; everything the procedure does is reported through the
/// outcome.
pub fn run_test_in(
    procedure: &dyn TestProcedure,
    prefix: &Path,
    root: Option<&Path>,
) -> Result<TestOutcome> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("kiln-test-");
    let sandbox = match root {
        Some(root) => std::fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
        None => builder.tempdir(),
    }
    .map_err(|e| Error::TestFailure {
        reason: format!("could not create test sandbox: {}", e),
        stub: false,
    })?;

    let ctx = test_context(sandbox.path(), prefix);
    debug!("Test sandbox: {}", ctx.workdir.display());

    let result = panic::catch_unwind(AssertUnwindSafe(|| procedure.run(&ctx)));

    remove_sandbox(sandbox)?;

    let failure = match result {
        Ok(Ok(output)) => {
            debug!("Test output:\n{}", output);
            if procedure.is_stub() {
                warn!("Stub test procedure passed unexpectedly");
            }
            info!("Smoke test passed");
            return Ok(TestOutcome::Passed);
        }
        Ok(Err(Error::TestFailure { reason, .. })) => reason,
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("test procedure panicked: {}", panic_message(payload.as_ref())),
    };

    if procedure.is_stub() {
        info!("Smoke test is a declared stub: {}", failure);
        Ok(TestOutcome::Stubbed { reason: failure })
    } else {
        warn!("Smoke test failed: {}", failure);
        Ok(TestOutcome::Failed { reason: failure })
    }
}

/// Remove a sandbox, including trees the procedure left read-only
///
/// Toolchains such as `go` write their module cache without write
/// permission, which defeats a plain recursive delete.
fn remove_sandbox(sandbox: TempDir) -> Result<()> {
    let path = sandbox.path().to_path_buf();
    let Err(first) = sandbox.close() else {
        return Ok(());
    };
    debug!("Retrying removal of {} after: {}", path.display(), first);

    for entry in WalkDir::new(&path).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() {
            continue;
        }
        make_writable(entry.path());
    }

    fs::remove_dir_all(&path).map_err(|e| Error::TestFailure {
        reason: format!("could not remove test sandbox {}: {}", path.display(), e),
        stub: false,
    })
}

#[cfg(unix)]
fn make_writable(dir: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = fs::metadata(dir) {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o700);
        if let Err(e) = fs::set_permissions(dir, perms) {
            debug!("Could not unlock {}: {}", dir.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn make_writable(dir: &Path) {
    if let Ok(meta) = fs::metadata(dir) {
        let mut perms = meta.permissions();
        perms.set_readonly(false);
        let _ = fs::set_permissions(dir, perms);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kitchen::procedure::TestContext;
    use std::sync::Mutex;

    /// Records the sandbox it ran in and then behaves as configured
    struct Recorder {
        seen: Mutex<Option<std::path::PathBuf>>,
        behavior: Behavior,
        stub: bool,
    }

    enum Behavior {
        Pass,
        Fail,
        Panic,
        /// Leave a write-protected tree behind, the way a Go module cache does
        ReadOnlyTree,
    }

    impl Recorder {
        fn new(behavior: Behavior) -> Self {
            Self {
                seen: Mutex::new(None),
                behavior,
                stub: false,
            }
        }

        fn seen(&self) -> std::path::PathBuf {
            self.seen.lock().unwrap().clone().unwrap()
        }
    }

    impl TestProcedure for Recorder {
        fn is_stub(&self) -> bool {
            self.stub
        }

        fn run(&self, ctx: &TestContext) -> Result<String> {
            *self.seen.lock().unwrap() = Some(ctx.workdir.clone());
            assert_eq!(fs::read_dir(&ctx.workdir).unwrap().count(), 0, "sandbox not empty");
            fs::write(ctx.workdir.join("scratch.txt"), b"left behind").unwrap();

            match self.behavior {
                Behavior::Pass => Ok("ok".to_string()),
                Behavior::Fail => Err(Error::TestFailure {
                    reason: "exit 1".to_string(),
                    stub: self.stub,
                }),
                Behavior::Panic => panic!("procedure blew up"),
                Behavior::ReadOnlyTree => {
                    use std::os::unix::fs::PermissionsExt;
                    let cache = ctx.workdir.join("go/pkg/mod/cache");
                    fs::create_dir_all(cache.join("x")).unwrap();
                    fs::write(cache.join("x/go.mod"), b"module x\n").unwrap();
                    for dir in [cache.join("x"), cache.clone()] {
                        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
                    }
                    Ok("ok".to_string())
                }
            }
        }
    }

    fn remaining(root: &Path) -> usize {
        fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_sandbox_removed_after_pass() {
        let root = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(Behavior::Pass);

        let outcome = run_test_in(&recorder, Path::new("/prefix"), Some(root.path())).unwrap();
        assert_eq!(outcome, TestOutcome::Passed);
        assert!(!recorder.seen().exists());
        assert_eq!(remaining(root.path()), 0);
    }

    #[test]
    fn test_sandbox_removed_after_failure() {
        let root = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(Behavior::Fail);

        let outcome = run_test_in(&recorder, Path::new("/prefix"), Some(root.path())).unwrap();
        assert_eq!(
            outcome,
            TestOutcome::Failed {
                reason: "exit 1".to_string()
            }
        );
        assert_eq!(remaining(root.path()), 0);
    }

    #[test]
    fn test_sandbox_removed_after_panic() {
        let root = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(Behavior::Panic);

        let outcome = run_test_in(&recorder, Path::new("/prefix"), Some(root.path())).unwrap();
        match outcome {
            TestOutcome::Failed { reason } => assert!(reason.contains("blew up")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(remaining(root.path()), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_tree_is_removed() {
        let root = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(Behavior::ReadOnlyTree);

        let outcome = run_test_in(&recorder, Path::new("/prefix"), Some(root.path())).unwrap();
        assert_eq!(outcome, TestOutcome::Passed);
        assert!(!recorder.seen().exists());
        assert_eq!(remaining(root.path()), 0);
    }

    #[test]
    fn test_repeated_runs_leave_nothing() {
        let root = tempfile::tempdir().unwrap();
        for behavior in [Behavior::Pass, Behavior::Fail, Behavior::Pass, Behavior::Fail] {
            let recorder = Recorder::new(behavior);
            run_test_in(&recorder, Path::new("/prefix"), Some(root.path())).unwrap();
        }
        assert_eq!(remaining(root.path()), 0);
    }

    #[test]
    fn test_each_run_gets_fresh_sandbox() {
        let root = tempfile::tempdir().unwrap();
        let first = Recorder::new(Behavior::Pass);
        let second = Recorder::new(Behavior::Pass);
        run_test_in(&first, Path::new("/prefix"), Some(root.path())).unwrap();
        run_test_in(&second, Path::new("/prefix"), Some(root.path())).unwrap();
        assert_ne!(first.seen(), second.seen());
    }

    #[test]
    fn test_stub_failure_is_stubbed() {
        let root = tempfile::tempdir().unwrap();
        let mut recorder = Recorder::new(Behavior::Fail);
        recorder.stub = true;

        let outcome = run_test_in(&recorder, Path::new("/prefix"), Some(root.path())).unwrap();
        assert!(matches!(outcome, TestOutcome::Stubbed { .. }));

        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, Error::TestFailure { stub: true, .. }));
    }

    #[test]
    fn test_context_paths() {
        let recorder = Recorder::new(Behavior::Pass);
        run_test(&recorder, Path::new("/opt/kiln/hello/1.0")).unwrap();
        assert!(recorder.seen().file_name().unwrap().to_string_lossy().starts_with("kiln-test-"));
    }
}
