//! `groundchat chat`: Interactive or single-question chat mode.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use groundchat_agent::ConversationController;
use groundchat_channels::CliChannel;
use groundchat_config::AppConfig;
use groundchat_core::channel::Channel;
use tracing::debug;

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail before any network call rather than on a 401 later
    let credentials = match config.credentials() {
        Ok(c) => c,
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set them in the environment or in a .env file in this directory.");
            eprintln!("  Run `groundchat doctor` to see what is configured.");
            eprintln!();
            return Err(e.into());
        }
    };

    let timeout = config.context.call_timeout_secs.map(Duration::from_secs);
    let (provider, search) = groundchat_providers::build_from_credentials(&credentials, timeout)?;
    let mut controller = ConversationController::from_config(&config, provider, search);

    if let Some(question) = message {
        eprint!("  Thinking...");
        let outcome = controller.handle_turn(&question).await;
        eprint!("\r              \r");
        let outcome = outcome?;
        println!("{}", outcome.reply.content);
        return Ok(());
    }

    println!();
    println!("  GroundChat: Interactive Mode");
    println!();
    println!("  Index:   {}", credentials.index_name);
    println!("  Engine:  {}", controller.settings().engine);
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let channel = CliChannel::new();
    for message in controller.transcript() {
        channel.render(message).await?;
    }
    println!();

    let mut rx = channel.start().await.map_err(|e| format!("Channel error: {e}"))?;

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(result) = rx.recv().await {
        match result {
            Ok(input) => {
                eprint!("  ...");
                let turn = controller.handle_turn(&input.content).await;
                eprint!("\r     \r");

                match turn {
                    Ok(outcome) => {
                        debug!(
                            sources = ?outcome.sources,
                            tokens_before = outcome.tokens_before,
                            pruned = outcome.pruned,
                            "Turn outcome"
                        );
                        println!();
                        channel.render(&outcome.reply).await?;
                        println!();
                    }
                    Err(e) => {
                        channel.send_error(&e.to_string()).await?;
                        println!();
                    }
                }

                print!("  You > ");
                std::io::stdout().flush()?;
            }
            Err(e) => {
                channel.send_error(&format!("Channel error: {e}")).await?;
                break;
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
