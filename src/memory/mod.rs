//! Conversation memory: turns and the stores that keep them.

pub mod storage;
pub mod turn;

pub use storage::{ConversationStore, InMemoryConversationStore};
pub use turn::{last_persona_turn, render_transcript, Speaker, Turn};
