// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: formula file path
fn formula_arg() -> Arg {
    Arg::new("formula")
        .required(true)
        .value_name("FORMULA")
        .help("Path to the formula file")
}

/// Common argument: install root directory
fn prefix_arg() -> Arg {
    Arg::new("prefix")
        .short('p')
        .long("prefix")
        .required(true)
        .value_name("DIR")
        .help("Install root directory")
}

/// Common argument: source cache directory
fn source_cache_arg() -> Arg {
    Arg::new("source_cache")
        .long("source-cache")
        .value_name("DIR")
        .help("Directory for caching verified source archives")
}

fn build_cli() -> Command {
    Command::new("formulary")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Formulary Contributors")
        .about("Fetch, verify, build and install packages from declarative formulas")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level (RUST_LOG overrides)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("install")
                .about("Build a formula and install it under a prefix")
                .arg(formula_arg())
                .arg(prefix_arg())
                .arg(
                    Arg::new("build_root")
                        .long("build-root")
                        .value_name("DIR")
                        .help("Build in this directory (must be empty) instead of a temporary one"),
                )
                .arg(
                    Arg::new("keep_build_root")
                        .long("keep-build-root")
                        .action(ArgAction::SetTrue)
                        .help("Keep the run workspace after completion"),
                )
                .arg(source_cache_arg())
                .arg(
                    Arg::new("path")
                        .long("path")
                        .value_name("PATH")
                        .help("Execution path for build tools (default: inherit PATH)"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .help("Timeout for each build command, in seconds"),
                )
                .arg(
                    Arg::new("skip_test")
                        .long("skip-test")
                        .action(ArgAction::SetTrue)
                        .help("Skip the post-install self-test"),
                ),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch and verify a formula's source archive")
                .arg(formula_arg())
                .arg(
                    Arg::new("dest")
                        .short('d')
                        .long("dest")
                        .default_value(".")
                        .help("Directory to place the archive in"),
                )
                .arg(source_cache_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a formula for errors and print warnings")
                .arg(formula_arg()),
        )
        .subcommand(
            Command::new("test")
                .about("Run a formula's self-test against an existing install")
                .arg(formula_arg())
                .arg(prefix_arg()),
        )
        .subcommand(
            Command::new("checksum")
                .about("Print the checksum of a local file, for pinning in a formula")
                .arg(Arg::new("file").required(true).help("File to hash"))
                .arg(
                    Arg::new("algorithm")
                        .short('a')
                        .long("algorithm")
                        .default_value("sha256")
                        .value_parser(["sha256", "sha512", "sha1", "xxh128"])
                        .help("Hash algorithm"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show formula metadata")
                .arg(formula_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

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

    let man_path = man_dir.join("formulary.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
