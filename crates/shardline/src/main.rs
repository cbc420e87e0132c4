//! Shardline bot entry point
//!
//! Run with:
//! ```bash
//! SHARDLINE_TOKEN=... cargo run -p shardline --bin shardline-bot
//! ```
//!
//! Configuration is loaded from environment variables.

use anyhow::Context;
use shardline::{ClientBuilder, ClientConfig, Event};
use shardline_common::{try_init_tracing_with_config, TracingConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %e, "Bot stopped with an error");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = ClientConfig::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.env,
        shard_count = ?config.sharding.shard_count,
        "Configuration loaded"
    );

    let client = ClientBuilder::new(config)
        .build()
        .context("Failed to build client")?;
    let mut events = client.start().await.context("Failed to start shards")?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                break;
            }
            next = events.recv() => {
                let Some(shard_event) = next else {
                    warn!("Event stream ended");
                    break;
                };
                log_event(shard_event.shard_id, &shard_event.event);
            }
        }
    }

    client.shutdown().await.context("Shutdown failed")?;
    info!("Bot stopped");
    Ok(())
}

fn log_event(shard_id: u32, event: &Event) {
    match event {
        Event::Ready(ready) => info!(
            shard_id,
            user = %ready.user.username,
            guilds = ready.guild_ids.len(),
            "Shard ready"
        ),
        Event::ShardFailed { close_code, reason } => {
            error!(shard_id, close_code = ?close_code, reason = %reason, "Shard failed");
        }
        Event::MessageCreate(message) => info!(
            shard_id,
            channel_id = %message.channel_id,
            author_id = %message.author_id,
            content = %message.content,
            "Message"
        ),
        other => tracing::debug!(
            shard_id,
            event = other.name(),
            guild_id = ?other.guild_id(),
            "Event"
        ),
    }
}
