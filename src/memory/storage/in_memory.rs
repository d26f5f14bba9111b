//! Process-local conversation store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::interface::ConversationStore;
use crate::memory::turn::Turn;
use crate::utilities::errors::StoreError;

/// Default number of turns kept per conversation.
pub const DEFAULT_MAX_TURNS: usize = 500;

type ConversationKey = (String, String);

/// Conversation history held in memory; lost on restart.
#[derive(Debug)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationKey, Vec<Turn>>>,
    max_turns: usize,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl InMemoryConversationStore {
    /// Keep at most `max_turns` per conversation, dropping the oldest.
    pub fn new(max_turns: usize) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            max_turns: max_turns.max(1),
        }
    }

    /// Number of stored conversations.
    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(user_id: &str, persona_id: &str) -> ConversationKey {
        (user_id.to_string(), persona_id.to_string())
    }

    fn push_locked(&self, turns: &mut Vec<Turn>, turn: Turn) {
        turns.push(turn);
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn history(
        &self,
        user_id: &str,
        persona_id: &str,
        limit: usize,
    ) -> Result<Vec<Turn>, StoreError> {
        let conversations = self.conversations.read();
        let turns = conversations
            .get(&Self::key(user_id, persona_id))
            .map(|turns| {
                let start = turns.len().saturating_sub(limit);
                turns[start..].to_vec()
            })
            .unwrap_or_default();
        Ok(turns)
    }

    async fn append(&self, user_id: &str, persona_id: &str, turn: Turn) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write();
        let turns = conversations.entry(Self::key(user_id, persona_id)).or_default();
        self.push_locked(turns, turn);
        Ok(())
    }

    async fn append_all(
        &self,
        user_id: &str,
        persona_id: &str,
        new_turns: Vec<Turn>,
    ) -> Result<(), StoreError> {
        let mut conversations = self.conversations.write();
        let turns = conversations.entry(Self::key(user_id, persona_id)).or_default();
        for turn in new_turns {
            self.push_locked(turns, turn);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_is_bounded_and_ordered() {
        let store = InMemoryConversationStore::default();
        for i in 0..5 {
            store.append("u1", "priya", Turn::user(format!("m{}", i))).await.unwrap();
        }
        let history = store.history("u1", "priya", 3).await.unwrap();
        let texts: Vec<_> = history.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let store = InMemoryConversationStore::default();
        store.append("u1", "priya", Turn::user("a")).await.unwrap();
        store.append("u1", "therapist", Turn::user("b")).await.unwrap();
        assert_eq!(store.history("u1", "priya", 50).await.unwrap().len(), 1);
        assert!(store.history("u2", "priya", 50).await.unwrap().is_empty());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_max_turns_drops_oldest() {
        let store = InMemoryConversationStore::new(2);
        store
            .append_all(
                "u",
                "p",
                vec![Turn::user("1"), Turn::persona("2"), Turn::user("3")],
            )
            .await
            .unwrap();
        let history = store.history("u", "p", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text, "2");
    }
}
