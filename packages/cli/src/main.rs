mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, diff, init, CheckArgs, DiffArgs, InitArgs};
use std::path::PathBuf;

/// Instruct CLI - tooling for assembly-instruction documents
#[derive(Parser, Debug)]
#[command(name = "instruct")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write an instruct.config.json with editing-session settings
    Init(InitArgs),

    /// Check documents for structural consistency
    Check(CheckArgs),

    /// Print the change-set between a saved and an edited document
    Diff(DiffArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let result = match cli.command {
        Command::Init(args) => init(args, &cwd),
        Command::Check(args) => check(args, &cwd),
        Command::Diff(args) => diff(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
