// Discord moderation module - anti-spam event handling, actions and commands.

pub mod commands;
pub mod serenity_dispatcher;
pub mod spam_handler;

pub use serenity_dispatcher::SerenityDispatcher;
pub use spam_handler::handle_message_for_spam;
