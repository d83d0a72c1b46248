//! Config command - manage configuration.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use travex_core::{PureOcrService, TravexConfig};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the effective configuration and whether AI and OCR are ready
    Show,

    /// Initialize a new configuration file
    Init(InitArgs),

    /// Show configuration file path
    Path,
}

#[derive(Args)]
struct InitArgs {
    /// Output path for configuration file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Overwrite existing file
    #[arg(long)]
    force: bool,

    /// OCR model directory to record
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// AI model name to record
    #[arg(long)]
    ai_model: Option<String>,

    /// Record heuristic-only extraction as the default
    #[arg(long)]
    no_ai: bool,
}

pub async fn run(args: ConfigArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(config_path),
        ConfigCommand::Init(init_args) => init_config(init_args),
        ConfigCommand::Path => show_path(),
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("travex")
        .join("config.json")
}

/// Load the configuration from an explicit path, the default path, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<TravexConfig> {
    if let Some(path) = config_path {
        return read_config(Path::new(path));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        read_config(&default_path)
    } else {
        Ok(TravexConfig::default())
    }
}

fn read_config(path: &Path) -> anyhow::Result<TravexConfig> {
    TravexConfig::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot read config {}: {}", path.display(), e))
}

fn show_config(config_path: Option<&str>) -> anyhow::Result<()> {
    if config_path.is_none() && !default_config_path().exists() {
        eprintln!(
            "{} No config file found, showing defaults.",
            style("ℹ").blue()
        );
    }

    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    for line in readiness(&config, |name| std::env::var_os(name).is_some()) {
        eprintln!("{}", line);
    }

    Ok(())
}

/// One status line each for AI extraction and OCR.
fn readiness(config: &TravexConfig, env_is_set: impl Fn(&str) -> bool) -> Vec<String> {
    let ai = if !config.extraction.use_ai {
        format!("{} AI extraction disabled", style("ℹ").blue())
    } else if env_is_set(&config.ai.api_key_env) {
        format!(
            "{} AI extraction: {} (key in ${})",
            style("✓").green(),
            config.ai.model,
            config.ai.api_key_env
        )
    } else {
        format!(
            "{} AI extraction: ${} is not set; PDF, text and image inputs need --no-ai",
            style("⚠").yellow(),
            config.ai.api_key_env
        )
    };

    let missing = PureOcrService::missing_models(&config.ocr.model_dir);
    let ocr = if missing.is_empty() {
        format!(
            "{} OCR models in {}",
            style("✓").green(),
            config.ocr.model_dir.display()
        )
    } else {
        let names: Vec<String> = missing
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        format!(
            "{} OCR disabled, missing {} in {}",
            style("⚠").yellow(),
            names.join(", "),
            config.ocr.model_dir.display()
        )
    };

    vec![ai, ocr]
}

fn init_config(args: InitArgs) -> anyhow::Result<()> {
    let output_path = args.output.unwrap_or_else(default_config_path);

    if output_path.exists() && !args.force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            output_path.display()
        );
    }

    let mut config = TravexConfig::default();
    if let Some(model_dir) = args.model_dir {
        config.ocr.model_dir = model_dir;
    }
    if let Some(model) = args.ai_model {
        config.ai.model = model;
    }
    config.extraction.use_ai = !args.no_ai;

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    config.save(&output_path)?;

    println!(
        "{} Created configuration file at {}",
        style("✓").green(),
        output_path.display()
    );

    Ok(())
}

fn show_path() -> anyhow::Result<()> {
    let config_path = default_config_path();

    println!("Configuration file: {}", config_path.display());

    if config_path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("Run 'travex config init' to create a configuration file.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: Vec<String>) -> Vec<String> {
        lines
            .into_iter()
            .map(|l| console::strip_ansi_codes(&l).into_owned())
            .collect()
    }

    #[test]
    fn test_readiness_reports_missing_key_and_models() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TravexConfig::default();
        config.ocr.model_dir = dir.path().to_path_buf();

        let lines = plain(readiness(&config, |_| false));
        assert!(lines[0].contains("$TRAVEX_API_KEY is not set"));
        assert!(lines[1].contains("missing det.onnx, latin_rec.onnx, latin_dict.txt"));

        let lines = plain(readiness(&config, |name| name == "TRAVEX_API_KEY"));
        assert!(lines[0].contains("AI extraction: gemini-2.0-flash"));
    }

    #[test]
    fn test_readiness_with_ai_disabled_and_models_present() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["det.onnx", "latin_rec.onnx", "latin_dict.txt"] {
            fs::write(dir.path().join(file), b"").unwrap();
        }
        let mut config = TravexConfig::default();
        config.extraction.use_ai = false;
        config.ocr.model_dir = dir.path().to_path_buf();

        let lines = plain(readiness(&config, |_| true));
        assert!(lines[0].contains("AI extraction disabled"));
        assert!(lines[1].contains("OCR models in"));
    }

    #[test]
    fn test_unreadable_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config(path.to_str()).unwrap_err();
        assert!(err.to_string().starts_with("Cannot read config"));
        assert!(err.to_string().contains("config.json"));
    }
}
