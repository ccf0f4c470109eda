// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: image root
fn image_arg() -> Arg {
    Arg::new("image")
        .short('i')
        .long("image")
        .default_value("/")
        .help("Image root to operate on")
}

fn build_cli() -> Command {
    Command::new("zpm")
        .version(env!("CARGO_PKG_VERSION"))
        .author("zpm contributors")
        .about("Transactional binary package manager for zpkg images")
        .subcommand(
            Command::new("install")
                .about("Install packages from configured repositories")
                .arg(Arg::new("packages").required(true).num_args(1..).help("Requirements, e.g. nginx or nginx>=1.24"))
                .arg(Arg::new("policy").long("policy").default_value("updated").help("Candidate policy"))
                .arg(image_arg()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove installed packages")
                .arg(Arg::new("packages").required(true).num_args(1..))
                .arg(image_arg()),
        )
        .subcommand(
            Command::new("plan")
                .about("Show what an install or remove would do")
                .arg(Arg::new("action").required(true).value_parser(["install", "remove"]))
                .arg(Arg::new("packages").required(true).num_args(1..))
                .arg(image_arg()),
        )
        .subcommand(Command::new("list").about("List installed packages").arg(image_arg()))
        .subcommand(Command::new("refresh").about("Refresh repository metadata").arg(image_arg()))
        .subcommand(Command::new("clean").about("Drop cached artifacts and metadata").arg(image_arg()))
        .subcommand(
            Command::new("build")
                .about("Build a .zpkg from a manifest and a staging tree")
                .arg(Arg::new("manifest").required(true))
                .arg(Arg::new("staging").required(true))
                .arg(Arg::new("output").short('o').long("output").default_value(".")),
        )
        .subcommand(
            Command::new("publish")
                .about("Publish artifacts to a configured repository")
                .arg(Arg::new("repo").required(true))
                .arg(Arg::new("files").required(true).num_args(1..))
                .arg(image_arg()),
        )
        .subcommand(
            Command::new("repo-init")
                .about("Initialize a repository's layout")
                .arg(Arg::new("repo").required(true))
                .arg(image_arg()),
        )
        .subcommand(Command::new("repo-list").about("List configured repositories").arg(image_arg()))
        .subcommand(
            Command::new("repo-contents")
                .about("List a repository's cached candidates")
                .arg(Arg::new("repo").required(true))
                .arg(image_arg()),
        )
        .subcommand(Command::new("history").about("Show the transaction log").arg(image_arg()))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell"]),
                ),
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

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("zpm.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
