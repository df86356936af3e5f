// Discord commands module.
// Feature-specific commands live next to their feature (see `moderation`).

pub mod clear;

// Bot presence management
pub mod presence;
