// Implementations of the anti-spam policy store.

pub mod in_memory;
pub mod sqlite_policy_store;

// Re-export for convenience
pub use in_memory::InMemoryPolicyStore;
pub use sqlite_policy_store::SqlitePolicyStore;
