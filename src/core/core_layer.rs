// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "gif/mod.rs"]
pub mod gif;
#[path = "moderation/mod.rs"]
pub mod moderation;
