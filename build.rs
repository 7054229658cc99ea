use std::{env, ffi::OsString};

use clap::Command;
use clap::CommandFactory;
use clap_complete::{Generator, Shell};
#[path = "src/cli.rs"]
mod cli;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command, outdir: impl Into<OsString>) {
    clap_complete::generate_to(gen, cmd, "neuro_tile", outdir).unwrap();
}

fn generate_complete_scripts(cmd: &mut Command, outdir: &OsString) {
    print_completions(Shell::Zsh, cmd, outdir);
    print_completions(Shell::Bash, cmd, outdir);
    print_completions(Shell::Fish, cmd, outdir);
    print_completions(Shell::PowerShell, cmd, outdir);
    print_completions(Shell::Elvish, cmd, outdir);
}

fn main() {
    println!("cargo:rerun-if-changed=src/cli.rs");
    let Some(outdir) = env::var_os("OUT_DIR") else {
        return;
    };
    let mut cmd = cli::Cli::command();
    generate_complete_scripts(&mut cmd, &outdir);
}
