// Implementations of the GIF limit and banned GIF stores.

pub mod in_memory;
pub mod sqlite_gif_store;

pub use in_memory::InMemoryGifStore;
pub use sqlite_gif_store::SqliteGifStore;
