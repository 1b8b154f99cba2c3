// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: formula file
fn formula_arg() -> Arg {
    Arg::new("formula")
        .required(true)
        .value_name("FORMULA")
        .help("Path to the formula file")
}

/// Common arguments: source cache handling
fn source_args() -> [Arg; 3] {
    [
        Arg::new("source_cache")
            .long("source-cache")
            .value_name("DIR")
            .help("Directory for caching downloaded sources"),
        Arg::new("no_cache")
            .long("no-cache")
            .action(ArgAction::SetTrue)
            .help("Do not read or write the source cache"),
        Arg::new("no_probe")
            .long("no-probe")
            .action(ArgAction::SetTrue)
            .help("Skip the PATH check for build and test dependencies"),
    ]
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print the result as JSON")
}

fn build_cli() -> Command {
    Command::new("kiln")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Declarative build-recipe execution engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Kitchen configuration file (TOML)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("cook")
                .about("Fetch, build, install and smoke-test a formula")
                .arg(formula_arg())
                .arg(
                    Arg::new("prefix")
                        .short('p')
                        .long("prefix")
                        .value_name("DIR")
                        .help("Installation prefix"),
                )
                .args(source_args())
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help("Number of parallel build jobs"),
                )
                .arg(
                    Arg::new("keep_builddir")
                        .long("keep-builddir")
                        .action(ArgAction::SetTrue)
                        .help("Keep the build directory after completion"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("fetch")
                .about("Download and verify a formula's source without building")
                .arg(formula_arg())
                .args(source_args()),
        )
        .subcommand(
            Command::new("flags")
                .about("Resolve build variables and print the rendered linker flags")
                .arg(formula_arg())
                .args(source_args())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("deps")
                .about("Show dependency contexts and host-provided decisions")
                .arg(formula_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate a formula")
                .arg(formula_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("kiln.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
