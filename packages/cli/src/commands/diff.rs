use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use instruct_editor::{diff_documents, export_changes, ChangeSet};
use instruct_model::Instruction;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Last-saved document
    pub baseline: PathBuf,

    /// Edited document
    pub current: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn diff(args: DiffArgs, _cwd: &Path) -> Result<()> {
    let baseline = load(&args.baseline)?;
    let current = load(&args.current)?;

    let change_set = change_set_between(&baseline, &current);

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&change_set)?);
    } else {
        print_summary(&change_set);
    }

    Ok(())
}

fn load(path: &Path) -> Result<Instruction> {
    Instruction::load(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// The change-set an editor would save to move `baseline` to `current`.
fn change_set_between(baseline: &Instruction, current: &Instruction) -> ChangeSet {
    let tracker = diff_documents(current, baseline);
    export_changes(current, &tracker)
}

fn print_summary(change_set: &ChangeSet) {
    if change_set.is_empty() {
        println!("{} No changes", "✓".green());
        return;
    }

    for (kind, rows) in &change_set.changed {
        println!("  {} {} {}", "changed".yellow().bold(), rows.len(), kind);
    }
    for (key, ids) in &change_set.deleted {
        let kind = key.strip_suffix("_ids").unwrap_or(key);
        println!("  {} {} {}", "deleted".red().bold(), ids.len(), kind);
        for id in ids {
            println!("    {}", id.dimmed());
        }
    }

    println!();
    println!("   Total: {}", change_set.len());
}
