//! Session registry.
//!
//! [`SessionManager`] maps connection-scoped session ids (UUID v4) to their
//! [`Session`]. Backed by `DashMap` so transport tasks never contend on a
//! global lock; each session serializes its own state behind its own mutex.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{Outbound, Session};

pub struct SessionManager {
    sessions: DashMap<Uuid, Arc<Session>>,
    tick: Duration,
}

impl SessionManager {
    /// `tick` is the autoplay interval at speed 1.0 for every session.
    pub fn new(tick: Duration) -> Self {
        SessionManager {
            sessions: DashMap::new(),
            tick,
        }
    }

    /// Opens a session whose frames go to `outbound`. The client receives an
    /// initial `simulation_state` carrying its session id.
    pub async fn open(&self, outbound: Outbound) -> Arc<Session> {
        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, outbound, self.tick));
        self.sessions.insert(id, Arc::clone(&session));
        tracing::info!("session {} opened ({} active)", id, self.sessions.len());
        session.get_state().await;
        session
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::NoSession(id))
    }

    /// Routes one inbound text frame. Fails only when the session is gone;
    /// every other failure is reported to the client by the session.
    pub async fn dispatch(&self, id: Uuid, frame: &str) -> Result<(), SessionError> {
        let session = self.get(id)?;
        session.receive(frame).await;
        Ok(())
    }

    /// Removes a session and stops its autoplay task.
    pub async fn close(&self, id: Uuid) {
        if let Some((_, session)) = self.sessions.remove(&id) {
            session.shutdown().await;
            tracing::info!("session {} closed ({} active)", id, self.sessions.len());
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ServerMessage;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn open_announces_session_and_close_removes_it() {
        let manager = SessionManager::new(Duration::from_millis(5));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = manager.open(tx).await.id();
        let Some(ServerMessage::SimulationState(state)) = rx.recv().await else {
            panic!("expected simulation_state");
        };
        assert_eq!(state.session_id, id);
        assert_eq!(manager.len(), 1);

        manager.close(id).await;
        assert!(manager.is_empty());
        let err = manager.dispatch(id, r#"{"type":"get_state"}"#).await.unwrap_err();
        assert_eq!(err.code(), "no_session");
    }
}
