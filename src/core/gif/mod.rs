// Core GIF moderation module - per-channel GIF limits and banned GIFs.

pub mod gif_counter;
pub mod gif_models;
pub mod gif_service;

pub use gif_counter::*;
pub use gif_models::*;
pub use gif_service::*;
