// GIF moderation slash commands - per-channel limits and the banned GIF list.

use crate::core::gif::{GifError, GifPolicy, GifPolicyUpdate};
use crate::discord::{Context, Error};

// Leave room for the heading inside Discord's 2000 character limit.
const MAX_LIST_CHARS: usize = 1800;

async fn reply(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(text.into())
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn describe(policy: &GifPolicy) -> String {
    format!(
        "**GIF limit for this channel**\nLimit: {} GIF(s)\nWindow: {} seconds\nStatus: {}",
        policy.limit,
        policy.window_seconds,
        if policy.enabled { "✅ Enabled" } else { "❌ Disabled" }
    )
}

/// Per-channel GIF rate limits.
#[poise::command(
    slash_command,
    rename = "giflimit",
    subcommands(
        "enable",
        "disable",
        "enable_server",
        "disable_server",
        "set_limit",
        "set_window",
        "show"
    ),
    required_permissions = "ADMINISTRATOR",
    guild_only
)]
pub async fn gif_limit(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

async fn update_here(ctx: Context<'_>, update: GifPolicyUpdate) -> Result<Option<GifPolicy>, Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    match ctx
        .data()
        .gifs
        .update_channel_policy(guild_id.get(), ctx.channel_id().get(), update)
        .await
    {
        Ok(policy) => Ok(Some(policy)),
        Err(GifError::InvalidValue(reason)) => {
            reply(ctx, format!("❌ Invalid setting: {}", reason)).await?;
            Ok(None)
        }
        Err(e) => Err(Error::from(e.to_string())),
    }
}

/// Enable the GIF limit in this channel.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    if update_here(ctx, GifPolicyUpdate::enabled(true)).await?.is_some() {
        reply(ctx, "✅ GIF limit **enabled** for this channel.").await?;
    }
    Ok(())
}

/// Disable the GIF limit in this channel.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    if update_here(ctx, GifPolicyUpdate::enabled(false)).await?.is_some() {
        reply(ctx, "❌ GIF limit **disabled** for this channel.").await?;
    }
    Ok(())
}

/// Enable the GIF limit in every channel of this server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn enable_server(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    ctx.data()
        .gifs
        .set_server_enabled(guild_id.get(), true)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    reply(ctx, "✅ GIF limit **enabled** in every channel of this server.").await
}

/// Disable the GIF limit in every channel of this server.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn disable_server(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    ctx.data()
        .gifs
        .set_server_enabled(guild_id.get(), false)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    reply(ctx, "❌ GIF limit **disabled** in every channel of this server.").await
}

/// Set how many GIFs this channel allows per window.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn set_limit(
    ctx: Context<'_>,
    #[description = "GIFs allowed per window (0 blocks GIFs entirely)"] limit: u32,
) -> Result<(), Error> {
    let update = GifPolicyUpdate {
        limit: Some(limit),
        ..Default::default()
    };
    if let Some(policy) = update_here(ctx, update).await? {
        reply(ctx, format!("GIF limit for this channel set to {}.", policy.limit)).await?;
    }
    Ok(())
}

/// Set the GIF counting window for this channel.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn set_window(
    ctx: Context<'_>,
    #[description = "Window length in seconds"]
    #[min = 1]
    seconds: u64,
) -> Result<(), Error> {
    let update = GifPolicyUpdate {
        window_seconds: Some(seconds),
        ..Default::default()
    };
    if let Some(policy) = update_here(ctx, update).await? {
        reply(
            ctx,
            format!("GIF window for this channel set to {} seconds.", policy.window_seconds),
        )
        .await?;
    }
    Ok(())
}

/// Show the GIF limit for this channel.
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn show(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;
    let policy = ctx
        .data()
        .gifs
        .get_channel_policy(guild_id.get(), ctx.channel_id().get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    reply(ctx, describe(&policy)).await
}

/// Banned GIFs for this server.
#[poise::command(
    slash_command,
    rename = "gifban",
    subcommands("add", "remove", "list"),
    required_permissions = "MANAGE_MESSAGES",
    guild_only
)]
pub async fn gif_ban(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

/// Ban a GIF URL on this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn add(
    ctx: Context<'_>,
    #[description = "GIF link to ban"] url: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    match ctx.data().gifs.ban_gif(guild_id.get(), &url).await {
        Ok(true) => reply(ctx, format!("🚫 GIF banned: <{}>", url.trim())).await,
        Ok(false) => reply(ctx, "That GIF is already banned.").await,
        Err(GifError::InvalidValue(reason)) => reply(ctx, format!("❌ {}", reason)).await,
        Err(e) => Err(Error::from(e.to_string())),
    }
}

/// Allow a previously banned GIF again.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "GIF link to allow again"] url: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let removed = ctx
        .data()
        .gifs
        .unban_gif(guild_id.get(), &url)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    if removed {
        reply(ctx, format!("✅ GIF allowed again: <{}>", url.trim())).await
    } else {
        reply(ctx, "That GIF wasn't banned.").await
    }
}

/// List the GIFs banned on this server.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_MESSAGES")]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let banned = ctx
        .data()
        .gifs
        .banned_gifs(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    reply(ctx, banned_list_text(&banned)).await
}

/// Render the banned list, cutting it short before it outgrows one message.
fn banned_list_text(banned: &[String]) -> String {
    if banned.is_empty() {
        return "No GIFs are banned on this server.".to_string();
    }

    let mut text = String::from("**Banned GIFs on this server:**");
    for (shown, url) in banned.iter().enumerate() {
        let line = format!("\n<{}>", url);
        if text.len() + line.len() > MAX_LIST_CHARS {
            text.push_str(&format!("\n...and {} more", banned.len() - shown));
            break;
        }
        text.push_str(&line);
    }
    text
}
