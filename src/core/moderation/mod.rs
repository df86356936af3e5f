// Core moderation module - repetition and channel-spread anti-spam.
// Following the same pattern as the other core modules: models, service, ports.

pub mod dispatch;
pub mod escalation_engine;
pub mod moderation_models;
pub mod moderation_service;
pub mod window_tracker;

pub use dispatch::*;
pub use escalation_engine::*;
pub use moderation_models::*;
pub use moderation_service::*;
pub use window_tracker::*;
