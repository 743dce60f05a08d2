//! `sage config`: Configuration management commands.

use super::load_config;
use sage_config::AppConfig;
use std::path::Path;

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();

            if !config.knowledge.dir.is_dir() {
                warnings.push(format!(
                    "Knowledge directory {} does not exist; prompts will carry no knowledge base",
                    config.knowledge.dir.display()
                ));
            }

            if config.completion.backend == "local" && !cfg!(feature = "local") {
                warnings.push(
                    "Backend 'local' needs a build with `--features local`".to_string(),
                );
            }

            if !config.search.enabled {
                warnings.push("Web search is disabled".to_string());
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Assistant: {} ({})", config.assistant.name, config.assistant.domain);
            println!("   Backend:   {}", config.completion.backend);
            println!("   Model:     {}", config.completion.model);
            println!("   Gateway:   {}:{}", config.gateway.host, config.gateway.port);
            println!("   History:   {} exchanges", config.session.max_history);
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let target = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));

    if target.exists() {
        println!("Config already exists at {}", target.display());
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&target, AppConfig::default_toml())?;
    println!("Wrote default config to {}", target.display());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
