//! `groundchat doctor`: Diagnose configuration.
//!
//! Reports what is set and what is missing. Secrets are never printed.

use std::path::Path;

use groundchat_agent::resolve_profile;
use groundchat_config::{AppConfig, env};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("GroundChat Doctor: Configuration Diagnostics");
    println!("=============================================\n");

    let mut issues = 0;

    let default_path = AppConfig::config_dir().join("config.toml");
    let file = config_path.unwrap_or(&default_path);
    if file.exists() {
        println!("  ✅ Config file: {}", file.display());
    } else {
        println!("  ℹ️  No config file at {} (defaults in use)", file.display());
    }

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            return Ok(());
        }
    };

    let missing = config.missing_required();
    for key in [
        env::SEARCH_SERVICE,
        env::SEARCH_ADMIN_KEY,
        env::INDEX_NAME,
        env::COMPLETION_API_KEY,
        env::COMPLETION_API_BASE,
    ] {
        if missing.contains(&key) {
            println!("  ❌ {key} is not set");
            issues += 1;
        } else {
            println!("  ✅ {key} is set");
        }
    }
    println!("  ✅ API version: {}", config.completion.api_version);
    println!("  ✅ Engine: {}", config.completion.engine);

    match resolve_profile(&config.context.token_model) {
        Ok(resolved) if resolved.model == config.context.token_model => {
            println!("  ✅ Token model: {}", resolved.model);
        }
        Ok(resolved) => {
            println!(
                "  ⚠️  Token model {} is unpinned; counting as {}",
                config.context.token_model, resolved.model
            );
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
