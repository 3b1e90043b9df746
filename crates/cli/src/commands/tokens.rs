//! `groundchat tokens`: Estimate the prompt cost of a message list.
//!
//! Reads a JSON array of `{role, content, name?}` objects, the same shape a
//! completion request carries.

use std::path::Path;

use groundchat_agent::estimate_with_resolution;
use groundchat_config::AppConfig;
use groundchat_core::message::Message;

/// Parse a JSON message array.
pub fn parse_messages(json: &str) -> Result<Vec<Message>, serde_json::Error> {
    serde_json::from_str(json)
}

pub async fn run(
    config_path: Option<&Path>,
    file: &Path,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = match model {
        Some(m) => m,
        None => AppConfig::load(config_path)?.context.token_model,
    };

    let raw = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let messages = parse_messages(&raw)?;

    let (resolved, total) = estimate_with_resolution(&messages, &model)?;

    println!("  Model:     {model}");
    if resolved.model != model {
        println!("  Counted as {}", resolved.model);
    }
    println!("  Messages:  {}", messages.len());
    println!("  Tokens:    {total}");

    Ok(())
}
