// This is the entry point of the anti-spam bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (databases)
// - `discord/` = Discord-specific adapters (commands, events, actions)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::gif::{BannedGifStore, GifPolicyStore, GifService};
use crate::core::moderation::{AntiSpamService, PolicyStore};
use crate::discord::commands::presence;
use crate::discord::gif::handle_message_for_gifs;
use crate::discord::moderation::{handle_message_for_spam, SerenityDispatcher};
use crate::discord::{Data, Error};
use crate::infra::gif::{InMemoryGifStore, SqliteGifStore};
use crate::infra::moderation::{InMemoryPolicyStore, SqlitePolicyStore};
use poise::serenity_prelude as serenity;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const DEFAULT_NOTICE_SECS: u64 = 4;

/// Read an environment variable, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}

/// Event handler for non-command Discord events.
/// Every guild message goes through the anti-spam check, then the GIF filter.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        // A failure here only affects this one message.
        let flagged = match handle_message_for_spam(new_message, data).await {
            Ok(flagged) => flagged,
            Err(e) => {
                tracing::error!(
                    message_id = new_message.id.get(),
                    channel_id = new_message.channel_id.get(),
                    "Anti-spam check failed: {}",
                    e
                );
                false
            }
        };

        // Spam is already being deleted; don't delete it twice.
        if !flagged {
            if let Err(e) = handle_message_for_gifs(ctx, new_message, data).await {
                tracing::error!(
                    message_id = new_message.id.get(),
                    channel_id = new_message.channel_id.get(),
                    "GIF check failed: {}",
                    e
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening. RUST_LOG overrides.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let notice_ttl = Duration::from_secs(env_or("ANTISPAM_NOTICE_SECS", DEFAULT_NOTICE_SECS));
    let dev_guild_id: Option<u64> = std::env::var("DEV_GUILD_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|id| *id != 0);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let (policy_store, gif_policies, banned_gifs): (
        Arc<dyn PolicyStore>,
        Arc<dyn GifPolicyStore>,
        Arc<dyn BannedGifStore>,
    ) = match std::env::var("ANTISPAM_STORE").as_deref() {
        Ok("memory") => {
            tracing::warn!("Using in-memory stores; settings are lost on restart");
            let gif_store = Arc::new(InMemoryGifStore::new());
            (
                Arc::new(InMemoryPolicyStore::new()),
                gif_store.clone(),
                gif_store,
            )
        }
        _ => {
            std::fs::create_dir_all(&data_dir)
                .expect("Failed to create data directory for SQLite files");
            let policy_store = SqlitePolicyStore::new(&format!("{}/antispam.db", data_dir))
                .await
                .expect("Failed to initialize anti-spam policy database");
            let gif_store = Arc::new(
                SqliteGifStore::new(&format!("{}/gifs.db", data_dir))
                    .await
                    .expect("Failed to initialize GIF database"),
            );
            (Arc::new(policy_store), gif_store.clone(), gif_store)
        }
    };

    let anti_spam = Arc::new(AntiSpamService::new(policy_store));
    let gifs = Arc::new(GifService::new(gif_policies, banned_gifs));

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                discord::moderation::commands::antispam(),
                discord::gif::commands::gif_limit(),
                discord::gif::commands::gif_ban(),
                discord::commands::clear::clear(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                tracing::info!("Connected as {}", ready.user.name);

                match dev_guild_id {
                    Some(guild_id) => {
                        // Guild commands update instantly; handy while developing.
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                        tracing::info!(guild_id, "Commands registered in development guild");
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                        tracing::info!("Commands registered globally");
                    }
                }

                presence::on_ready(ctx);

                let dispatcher = Arc::new(SerenityDispatcher::new(ctx.http.clone(), notice_ttl));

                Ok(Data {
                    anti_spam,
                    gifs,
                    dispatcher,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
