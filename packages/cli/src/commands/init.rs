use anyhow::Result;
use clap::Args;
use colored::Colorize;
use instruct_sync::{AutoSaveConfig, HistoryConfig, SessionConfig, DEFAULT_CONFIG_NAME};
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Quiet period after the last edit before auto-saving
    #[arg(long, default_value_t = 1000)]
    pub debounce_ms: u64,

    /// Number of undo levels to keep (0 = unlimited)
    #[arg(long, default_value_t = 20)]
    pub history: usize,

    /// Disable debounced auto-save
    #[arg(long)]
    pub no_auto_save: bool,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &Path) -> Result<()> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let config = SessionConfig {
        auto_save: AutoSaveConfig {
            debounce_ms: args.debounce_ms,
            enabled: !args.no_auto_save,
        },
        history: HistoryConfig {
            capacity: args.history,
        },
    };

    fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;
    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let args = InitArgs { debounce_ms: 300, history: 5, no_auto_save: true, force: false };

        init(args, dir.path()).unwrap();

        let config = SessionConfig::load(dir.path()).unwrap();
        assert_eq!(config.auto_save.debounce_ms, 300);
        assert!(!config.auto_save.enabled);
        assert_eq!(config.history.capacity, 5);
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{}").unwrap();
        let args = InitArgs { debounce_ms: 300, history: 5, no_auto_save: false, force: false };

        init(args, dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join(DEFAULT_CONFIG_NAME)).unwrap();
        assert_eq!(content, "{}");
    }
}
