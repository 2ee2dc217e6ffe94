// SPDX-License-Identifier: MIT OR Apache-2.0
//! A trivial in-memory [`AgentSessionCreator`] for tests and local
//! development, modeled on the "echo back what you were told" shape of a
//! mock backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{AgentSession, AgentSessionCreator, PermissionMode, StreamEvent};

struct MockSession {
    id: String,
}

#[async_trait]
impl AgentSession for MockSession {
    fn session_id(&self) -> &str {
        &self.id
    }

    async fn send_message(
        &self,
        content: String,
        events_tx: mpsc::Sender<StreamEvent>,
    ) -> anyhow::Result<()> {
        let _ = events_tx
            .send(StreamEvent::Text {
                chunk: format!("echo: {content}"),
            })
            .await;
        let _ = events_tx.send(StreamEvent::Done { error: None }).await;
        Ok(())
    }
}

/// A session creator that hands out [`MockSession`]s which simply echo
/// whatever message they receive. Useful for exercising the router and
/// bridge without a real agent runtime.
#[derive(Default)]
pub struct MockSessionCreator {
    sessions: Mutex<HashMap<String, Arc<dyn AgentSession>>>,
    next_id: Mutex<u64>,
}

impl MockSessionCreator {
    /// A fresh, empty creator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentSessionCreator for MockSessionCreator {
    async fn create_session(
        &self,
        _cwd: &str,
        _permission_mode: PermissionMode,
    ) -> anyhow::Result<String> {
        let mut next_id = self.next_id.lock().expect("mock creator mutex poisoned");
        *next_id += 1;
        let id = format!("mock-session-{next_id}", next_id = *next_id);
        self.sessions
            .lock()
            .expect("mock creator mutex poisoned")
            .insert(id.clone(), Arc::new(MockSession { id: id.clone() }));
        Ok(id)
    }

    async fn get_session(
        &self,
        session_id: &str,
    ) -> anyhow::Result<Option<Arc<dyn AgentSession>>> {
        Ok(self
            .sessions
            .lock()
            .expect("mock creator mutex poisoned")
            .get(session_id)
            .cloned())
    }

    async fn ensure_session(
        &self,
        session_id: &str,
        cwd: &str,
        permission_mode: PermissionMode,
    ) -> anyhow::Result<Arc<dyn AgentSession>> {
        if let Some(existing) = self.get_session(session_id).await? {
            return Ok(existing);
        }
        let mut sessions = self.sessions.lock().expect("mock creator mutex poisoned");
        let session: Arc<dyn AgentSession> = Arc::new(MockSession {
            id: session_id.to_string(),
        });
        sessions.insert(session_id.to_string(), Arc::clone(&session));
        drop(sessions);
        let _ = (cwd, permission_mode);
        Ok(session)
    }
}
