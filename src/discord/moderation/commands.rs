// Anti-spam slash commands for configuration.

use crate::core::moderation::{CommunityPolicy, PolicyError, PolicyUpdate};
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Anti-spam configuration commands.
///
/// Configure repeated-message detection for your server.
#[poise::command(
    slash_command,
    subcommands("status", "enable", "disable", "config"),
    required_permissions = "MANAGE_GUILD",
    guild_only
)]
pub async fn antispam(_ctx: Context<'_>) -> Result<(), Error> {
    // Parent command - shows help
    Ok(())
}

fn status_embed(policy: &CommunityPolicy) -> serenity::CreateEmbed {
    let status_emoji = if policy.enabled { "✅" } else { "❌" };
    let alert_channel = policy
        .notify_target
        .map(|id| format!("<#{}>", id))
        .unwrap_or_else(|| "None".to_string());
    let staff_role = policy
        .escalation_role
        .map(|id| format!("<@&{}>", id))
        .unwrap_or_else(|| "None".to_string());

    serenity::CreateEmbed::new()
        .title("🛡️ Anti-Spam Status")
        .color(if policy.enabled { 0x00FF00 } else { 0xFF0000 })
        .field(
            "Status",
            format!(
                "{} {}",
                status_emoji,
                if policy.enabled { "Enabled" } else { "Disabled" }
            ),
            false,
        )
        .field(
            "Duplicate Detection",
            format!(
                "More than {} identical messages / {} seconds",
                policy.repetition_threshold, policy.window_seconds
            ),
            true,
        )
        .field(
            "Ban Threshold",
            format!("More than {} channels", policy.spread_threshold),
            true,
        )
        .field("Alert Channel", alert_channel, true)
        .field("Staff Role", staff_role, true)
}

/// Show current anti-spam status and settings.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let policy = ctx
        .data()
        .anti_spam
        .get_policy(guild_id.get())
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.send(
        poise::CreateReply::default()
            .embed(status_embed(&policy))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Enable anti-spam protection.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn enable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let policy = ctx
        .data()
        .anti_spam
        .set_enabled(guild_id.get(), true)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    let mut reply = "✅ Anti-spam protection has been **enabled**.".to_string();
    if policy.notify_target.is_none() {
        reply.push_str("\nNo alert channel is set, so staff won't be notified. Use `/antispam config alert_channel:`.");
    }
    ctx.say(reply).await?;
    Ok(())
}

/// Disable anti-spam protection.
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn disable(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    ctx.data()
        .anti_spam
        .set_enabled(guild_id.get(), false)
        .await
        .map_err(|e| Error::from(e.to_string()))?;

    ctx.say("❌ Anti-spam protection has been **disabled**.")
        .await?;
    Ok(())
}

/// Combine a "set" and a "clear" option into a nullable-field update.
fn reference_update(set: Option<u64>, clear: Option<bool>) -> Option<Option<u64>> {
    match (set, clear) {
        (Some(id), _) => Some(Some(id)),
        (None, Some(true)) => Some(None),
        _ => None,
    }
}

/// Configure anti-spam settings.
#[allow(clippy::too_many_arguments)]
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn config(
    ctx: Context<'_>,
    #[description = "Identical messages tolerated in the window (default: 3)"]
    #[min = 1]
    repetition_threshold: Option<u32>,
    #[description = "Window in seconds (default: 10)"]
    #[min = 1]
    window_seconds: Option<u64>,
    #[description = "Channels tolerated before banning (default: 5, 0 bans immediately)"]
    spread_threshold: Option<u32>,
    #[description = "Channel that receives staff alerts"] alert_channel: Option<
        serenity::GuildChannel,
    >,
    #[description = "Role mentioned in staff alerts"] staff_role: Option<serenity::Role>,
    #[description = "Remove the alert channel"] clear_alert_channel: Option<bool>,
    #[description = "Remove the staff role"] clear_staff_role: Option<bool>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be used in a server")?;

    let update = PolicyUpdate {
        repetition_threshold,
        window_seconds,
        spread_threshold,
        enabled: None,
        notify_target: reference_update(alert_channel.map(|c| c.id.get()), clear_alert_channel),
        escalation_role: reference_update(staff_role.map(|r| r.id.get()), clear_staff_role),
    };

    if update.is_empty() {
        ctx.say("Nothing to change. Use `/antispam status` to see the current settings.")
            .await?;
        return Ok(());
    }

    let policy = match ctx
        .data()
        .anti_spam
        .update_policy(guild_id.get(), update)
        .await
    {
        Ok(policy) => policy,
        Err(PolicyError::InvalidValue(reason)) => {
            ctx.say(format!("❌ Invalid setting: {}", reason)).await?;
            return Ok(());
        }
        Err(e) => return Err(Error::from(e.to_string())),
    };

    let mut reply = poise::CreateReply::default()
        .content("✅ Anti-spam configuration updated!")
        .embed(status_embed(&policy));
    if policy.spread_threshold == 0 {
        reply = reply.content(
            "✅ Anti-spam configuration updated!\n\
             ⚠️ The ban threshold is 0: anyone who trips duplicate detection will be **banned** immediately.",
        );
    }
    ctx.send(reply).await?;

    Ok(())
}
