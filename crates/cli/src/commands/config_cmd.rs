//! `switchyard config`: configuration management commands.

use switchyard_config::{AppConfig, ConfigError};

use super::setup::CliResult;

pub async fn validate(loaded: Result<AppConfig, ConfigError>) -> CliResult<()> {
    println!("🔍 Validating configuration...");

    match loaded {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No API key set (set SWITCHYARD_API_KEY or OPENAI_API_KEY)");
            }
            if config.memory.backend == "in_memory" {
                warnings.push("memory.backend = \"in_memory\" forgets passages when the process exits");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Endpoint:  {}", config.openai.endpoint);
            println!(
                "   Flavor:    {}",
                if config.openai.is_azure() { "azure" } else { "openai" }
            );
            println!("   Model:     {}", config.openai.chat_model);
            println!("   Memory:    {}", config.memory.backend);
            println!("   Timeout:   {:?}", config.runtime.request_timeout());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(mut config: AppConfig) -> CliResult<()> {
    if config.openai.api_key.is_some() {
        config.openai.api_key = Some("[REDACTED]".into());
    }
    if let Some(qdrant) = config.qdrant.as_mut() {
        if qdrant.api_key.is_some() {
            qdrant.api_key = Some("[REDACTED]".into());
        }
    }
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub async fn path() -> CliResult<()> {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
    Ok(())
}

pub async fn init() -> CliResult<()> {
    println!("{}", AppConfig::default_toml());
    Ok(())
}
