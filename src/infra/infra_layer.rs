// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "gif/mod.rs"]
pub mod gif;
#[path = "moderation/mod.rs"]
pub mod moderation;
