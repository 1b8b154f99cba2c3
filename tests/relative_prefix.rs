// tests/relative_prefix.rs

//! Cooking into a prefix given relative to the working directory
//!
//! Kept in its own test binary because it changes the process working
//! directory.

mod common;

use common::Fixture;
use kiln::kitchen::TestOutcome;
use std::path::Path;

#[test]
fn test_relative_prefix_reaches_sandboxed_test() {
    let fixture = Fixture::new();
    let formula = fixture.formula(
        r#"
[test]
commands = [["%(bin)s/hello"]]
expect_output = "hello from kiln"
"#,
    );
    std::env::set_current_dir(fixture.dir.path()).unwrap();

    let report = fixture.kitchen().cook(&formula, Path::new("prefix"));

    assert!(report.succeeded(), "{}", report);
    assert_eq!(report.test, Some(TestOutcome::Passed));
    assert!(report.prefix.is_absolute());
    assert!(fixture.prefix().join("bin/hello").is_file());

    let installed = report.installed.as_ref().unwrap();
    assert!(installed.files.iter().all(|f| f.path.is_absolute()));
}
