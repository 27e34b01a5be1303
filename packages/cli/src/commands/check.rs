use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use instruct_model::{check_integrity, reconcile_child_lists, Instruction};
use instruct_sync::DEFAULT_CONFIG_NAME;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Document .json file or directory of documents
    pub input: PathBuf,

    /// Rebuild grouped id arrays from back-references and write the file back
    #[arg(long)]
    pub fix: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: String,
    rows: usize,
    violations: Vec<String>,
    repaired: usize,
}

pub fn check(args: CheckArgs, _cwd: &Path) -> Result<()> {
    let files = if args.input.is_file() {
        vec![args.input.clone()]
    } else if args.input.is_dir() {
        find_documents(&args.input)
    } else {
        return Err(anyhow::anyhow!(
            "Input path does not exist: {}",
            args.input.display()
        ));
    };

    let mut reports = Vec::with_capacity(files.len());
    for file in &files {
        reports.push(check_file(file, args.fix)?);
    }

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_text(&reports);
    }

    // Exit with error code if any document is inconsistent
    if reports.iter().any(|r| !r.violations.is_empty()) {
        std::process::exit(1);
    }

    Ok(())
}

fn check_file(path: &Path, fix: bool) -> Result<FileReport> {
    let mut document = Instruction::load(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut repaired = 0;
    if fix {
        repaired = reconcile_child_lists(&mut document);
        if repaired > 0 {
            fs::write(path, document.to_json_pretty()?)?;
            tracing::info!(path = %path.display(), repaired, "Rewrote grouped id arrays");
        }
    }

    Ok(FileReport {
        path: path.display().to_string(),
        rows: document.row_count(),
        violations: check_integrity(&document)
            .iter()
            .map(ToString::to_string)
            .collect(),
        repaired,
    })
}

fn print_text(reports: &[FileReport]) {
    println!("🔍 {} Instruction documents", "Checking".green().bold());
    println!();

    for report in reports {
        if report.violations.is_empty() {
            println!("{} {} ({} rows)", "✓".green(), report.path, report.rows);
        } else {
            println!("{} {}", "✗".red(), report.path);
            for violation in &report.violations {
                println!("  {} {}", "error".red().bold(), violation);
            }
        }
        if report.repaired > 0 {
            println!("  {} repaired {} grouped id arrays", "✓".green(), report.repaired);
        }
    }

    let failing = reports.iter().filter(|r| !r.violations.is_empty()).count();
    println!();
    println!("   Files checked: {}", reports.len());
    if failing > 0 {
        println!("   {} {}", "Inconsistent:".red(), failing);
    } else {
        println!("   {} No issues found!", "✓".green());
    }
}

fn find_documents(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path.extension().map(|e| e == "json").unwrap_or(false)
                && path.file_name().map(|n| n != DEFAULT_CONFIG_NAME).unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruct_model::{Assembly, Step};

    fn broken_document() -> Instruction {
        let mut doc = Instruction::default();
        doc.assemblies.insert("a1".into(), Assembly { id: "a1".into(), ..Default::default() });
        doc.steps.insert(
            "s1".into(),
            Step { id: "s1".into(), assembly_id: Some("a1".into()), ..Default::default() },
        );
        doc
    }

    #[test]
    fn test_check_reports_and_fixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, broken_document().to_json_pretty().unwrap()).unwrap();

        let report = check_file(&path, false).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.repaired, 0);

        let report = check_file(&path, true).unwrap();
        assert!(report.violations.is_empty());
        assert_eq!(report.repaired, 1);

        let fixed = Instruction::load(&path).unwrap();
        assert_eq!(fixed.assemblies["a1"].step_ids, vec!["s1".to_string()]);
    }

    #[test]
    fn test_find_documents_skips_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{}").unwrap();

        let files = find_documents(dir.path());
        assert_eq!(files, vec![dir.path().join("a.json")]);
    }
}
