//! Conversation history storage interface.

use async_trait::async_trait;

use crate::memory::turn::Turn;
use crate::utilities::errors::StoreError;

/// Per-(user, persona) conversation history.
///
/// Implementations must serialize writes per conversation so that two
/// appends to the same conversation are never interleaved.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The last `limit` turns of a conversation, oldest first.
    async fn history(
        &self,
        user_id: &str,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError>;

    /// Append one turn to a conversation.
    async fn append(&self, user_id: &str, persona_id: &str, turn: Turn) -> Result<(), StoreError>;

    /// Append several turns atomically with respect to other writers.
    async fn append_all(
        &self,
        user_id: &str,
        persona_id: &str,
        turns: Vec<Turn>,
    ) -> Result<(), StoreError> {
        for turn in turns {
            self.append(user_id, persona_id, turn).await?;
        }
        Ok(())
    }
}
