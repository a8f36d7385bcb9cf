//! Per-(user, channel) transcripts with a sliding history window.

use crate::error::SessionError;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Identifies one conversational thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub user_id: u64,
    pub channel_id: u64,
}

impl SessionKey {
    pub fn new(user_id: u64, channel_id: u64) -> Self {
        Self {
            user_id,
            channel_id,
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.user_id, self.channel_id)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub author_label: Option<String>,
    pub text: String,
}

impl Turn {
    pub fn user(author_label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            author_label: Some(author_label.into()),
            text: text.into(),
        }
    }

    pub fn assistant(author_label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            author_label: Some(author_label.into()),
            text: text.into(),
        }
    }
}

/// Ordered turns, never longer than `max_len`.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: VecDeque<Turn>,
    max_len: usize,
}

impl Transcript {
    pub fn new(max_len: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            max_len: max_len.max(1),
        }
    }

    /// Append a turn, evicting the oldest turns to stay within the window.
    pub fn push(&mut self, turn: Turn) {
        while self.turns.len() >= self.max_len {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// Keep only the most recent `max_len - 1` turns, leaving room for the next one.
    pub fn trim_for_next_turn(&mut self) {
        let keep = self.max_len - 1;
        while self.turns.len() > keep {
            self.turns.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &VecDeque<Turn> {
        &self.turns
    }

    /// Contiguous view of the turns, oldest first.
    pub fn as_slice(&mut self) -> &[Turn] {
        self.turns.make_contiguous()
    }
}

/// Process-lifetime map of session transcripts.
///
/// Each transcript has its own lock. The response pipeline holds it for a full
/// turn, so messages from the same user in the same channel are processed one
/// at a time while other sessions proceed concurrently.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionKey, Arc<Mutex<Transcript>>>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    /// Lock the transcript for `key`, creating it on first use.
    pub async fn lock(&self, key: SessionKey) -> OwnedMutexGuard<Transcript> {
        let existing = self.sessions.read().await.get(&key).cloned();
        let transcript = match existing {
            Some(transcript) => transcript,
            None => {
                let mut sessions = self.sessions.write().await;
                sessions
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(Transcript::new(self.max_history))))
                    .clone()
            }
        };
        transcript.lock_owned().await
    }

    /// Empty the transcript for `key`. Errors when the session was never created.
    pub async fn clear(&self, key: SessionKey) -> Result<(), SessionError> {
        let transcript = self
            .sessions
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(SessionError::NoHistory)?;
        transcript.lock().await.clear();
        Ok(())
    }

    /// Copy of the turns for `key`, oldest first.
    pub async fn snapshot(&self, key: SessionKey) -> Option<Vec<Turn>> {
        let transcript = self.sessions.read().await.get(&key).cloned()?;
        let guard = transcript.lock().await;
        Some(guard.turns().iter().cloned().collect())
    }
}
