//! Storage backends for conversation history.

pub mod in_memory;
pub mod interface;

pub use in_memory::InMemoryConversationStore;
pub use interface::ConversationStore;
