//! Session Store: per-candidate progress and transcript, held in memory.
//!
//! Append-only: a transcript entry is only ever pushed, never edited, and the
//! question index only moves forward together with it.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::evaluation::models::TranscriptEntry;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session {0} not found")]
    NotFound(Uuid),

    #[error("Session {id} expected answer for question {expected} but is at {actual}")]
    OutOfSequence {
        id: Uuid,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub candidate_name: String,
    /// Index of the next question to ask.
    pub current_index: usize,
    pub transcript: Vec<TranscriptEntry>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// Time since the session was opened.
    pub fn elapsed(&self) -> Duration {
        Utc::now() - self.started_at
    }
}

/// Repository interface over interview sessions.
pub trait SessionStore: Send + Sync {
    fn create(&self, candidate_name: &str) -> Session;

    /// Snapshot of the session as it is now.
    fn get(&self, id: Uuid) -> Option<Session>;

    /// Appends `entry` and advances the index, but only if the session is still
    /// at `expected_index`. Returns the updated snapshot.
    fn append(
        &self,
        id: Uuid,
        expected_index: usize,
        entry: TranscriptEntry,
    ) -> Result<Session, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, candidate_name: &str) -> Session {
        let session = Session {
            id: Uuid::new_v4(),
            candidate_name: candidate_name.to_string(),
            current_index: 0,
            transcript: Vec::new(),
            started_at: Utc::now(),
        };
        // poisoning leaves the map consistent; recover it
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id, session.clone());
        session
    }

    fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    fn append(
        &self,
        id: Uuid,
        expected_index: usize,
        entry: TranscriptEntry,
    ) -> Result<Session, StoreError> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let session = sessions.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if session.current_index != expected_index {
            return Err(StoreError::OutOfSequence {
                id,
                expected: expected_index,
                actual: session.current_index,
            });
        }

        session.transcript.push(entry);
        session.current_index += 1;
        Ok(session.clone())
    }
}
