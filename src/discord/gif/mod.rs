// Discord GIF module - GIF limit and banned GIF handling and commands.

pub mod commands;
pub mod gif_handler;

pub use gif_handler::handle_message_for_gifs;
