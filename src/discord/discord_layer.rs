// Discord layer - commands and event handlers.

use crate::core::gif::{BannedGifStore, GifPolicyStore, GifService};
use crate::core::moderation::{AntiSpamService, PolicyStore};
use std::sync::Arc;

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "gif/mod.rs"]
pub mod gif;

#[path = "moderation/mod.rs"]
pub mod moderation;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// The anti-spam service with whichever policy store was configured at startup.
pub type AntiSpam = AntiSpamService<Arc<dyn PolicyStore>>;

/// The GIF filter with whichever stores were configured at startup.
pub type GifFilter = GifService<Arc<dyn GifPolicyStore>, Arc<dyn BannedGifStore>>;

/// Shared state handed to every command and event.
pub struct Data {
    pub anti_spam: Arc<AntiSpam>,
    pub gifs: Arc<GifFilter>,
    pub dispatcher: Arc<moderation::SerenityDispatcher>,
}
