//! Presence Module - Participant registration, heartbeat, and eviction

use std::sync::Arc;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::message::{self, Message};
use crate::store::DocumentStore;
use crate::validation::sanitize;

pub const PARTICIPANTS: &str = "participants";

/// A registered chat identity with a liveness timestamp (millis since epoch).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    pub last_seen: i64,
}

#[derive(Debug, PartialEq)]
pub enum RegisterError {
    /// Name missing, not a string, or empty after sanitization.
    Invalid,
    /// A participant with this exact name already exists.
    Conflict,
    Store(String),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterError::Invalid => write!(f, "invalid name"),
            RegisterError::Conflict => write!(f, "name already taken"),
            RegisterError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum HeartbeatError {
    /// No identity supplied by the caller.
    Unidentified,
    /// No participant with that name currently exists.
    NotFound,
    Store(String),
}

impl std::fmt::Display for HeartbeatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeartbeatError::Unidentified => write!(f, "no identity supplied"),
            HeartbeatError::NotFound => write!(f, "participant not found"),
            HeartbeatError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

/// Eviction timing knobs.
///
/// The timeout is deliberately shorter than the sweep interval (10s vs
/// 15s): a participant can sit stale for up to one extra interval before
/// removal. Inherited from the original backend; do not "fix".
#[derive(Clone, Debug)]
pub struct PresenceSettings {
    pub timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(15),
        }
    }
}

/// Owns the participant lifecycle: registration, uniqueness, heartbeat
/// refresh, and the timed eviction sweep.
pub struct PresenceManager {
    store: Arc<DocumentStore>,
    settings: PresenceSettings,
}

impl PresenceManager {
    pub fn new(store: Arc<DocumentStore>, settings: PresenceSettings) -> Self {
        Self { store, settings }
    }

    /// Register a new participant and announce it with an entry message.
    ///
    /// The existence check and the insert are separate store operations;
    /// two concurrent registrations of the same name can both pass the
    /// check. Accepted race, the store takes whatever arrives.
    pub async fn register(&self, raw_name: &str) -> Result<(), RegisterError> {
        let name = sanitize(raw_name);
        if name.is_empty() {
            return Err(RegisterError::Invalid);
        }

        let existing = self
            .store
            .find_one(PARTICIPANTS, |v| v["name"] == name.as_str())
            .await;
        if existing.is_some() {
            return Err(RegisterError::Conflict);
        }

        let participant = Participant {
            name: name.clone(),
            last_seen: chrono::Utc::now().timestamp_millis(),
        };
        let value = serde_json::to_value(&participant)
            .map_err(|e| RegisterError::Store(e.to_string()))?;
        self.store
            .insert(PARTICIPANTS, value)
            .await
            .map_err(RegisterError::Store)?;

        // Companion entry announcement. Not rolled back if it fails: a
        // participant without an entry message is an accepted partial state.
        let entry = Message::status(&name, "entered the room");
        match serde_json::to_value(&entry) {
            Ok(value) => {
                if let Err(e) = self.store.insert(message::MESSAGES, value).await {
                    warn!("entry message for '{}' not stored: {}", name, e);
                }
            }
            Err(e) => warn!("entry message for '{}' not serialized: {}", name, e),
        }

        info!("participant '{}' registered", name);
        Ok(())
    }

    /// Refresh a participant's liveness, overwriting the whole record.
    pub async fn heartbeat(&self, name: Option<&str>) -> Result<(), HeartbeatError> {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => return Err(HeartbeatError::Unidentified),
        };

        let existing = self
            .store
            .find_one(PARTICIPANTS, |v| v["name"] == name)
            .await;
        if existing.is_none() {
            return Err(HeartbeatError::NotFound);
        }

        let refreshed = Participant {
            name: name.to_string(),
            last_seen: chrono::Utc::now().timestamp_millis(),
        };
        let value = serde_json::to_value(&refreshed)
            .map_err(|e| HeartbeatError::Store(e.to_string()))?;
        self.store
            .update_one(PARTICIPANTS, |v| v["name"] == name, value)
            .await
            .map_err(HeartbeatError::Store)?;
        Ok(())
    }

    /// Every stored participant, store order.
    pub async fn list_active(&self) -> Result<Vec<Participant>, String> {
        let docs = self.store.find(PARTICIPANTS, |_| true).await;
        let mut participants = Vec::with_capacity(docs.len());
        for doc in docs {
            let p: Participant =
                serde_json::from_value(doc.data).map_err(|e| e.to_string())?;
            participants.push(p);
        }
        Ok(participants)
    }

    /// One eviction pass: remove every participant whose `last_seen` is
    /// strictly below `now - timeout` and announce each departure.
    ///
    /// Per-participant cleanup is spawned and not awaited, matching the
    /// original's fire-and-forget behavior; one participant's failure never
    /// stops the rest. The handles are returned so tests can join them.
    pub async fn sweep_once(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let threshold = chrono::Utc::now().timestamp_millis() - self.settings.timeout.as_millis() as i64;
        let stale = self
            .store
            .find(PARTICIPANTS, |v| {
                v["last_seen"].as_i64().map(|t| t < threshold).unwrap_or(false)
            })
            .await;

        if !stale.is_empty() {
            info!("eviction sweep: {} stale participant(s)", stale.len());
        }

        let mut handles = Vec::with_capacity(stale.len());
        for doc in stale {
            let store = Arc::clone(&self.store);
            let name = doc.data["name"].as_str().unwrap_or_default().to_string();
            handles.push(tokio::spawn(async move {
                match store
                    .delete_one(PARTICIPANTS, |v| v["name"] == name.as_str())
                    .await
                {
                    Ok(true) => {}
                    Ok(false) => {
                        // Already gone, e.g. an overlapping sweep beat this
                        // task to it. Announcing again would duplicate the
                        // departure message.
                        warn!("eviction of '{}' found nothing to delete", name);
                        return;
                    }
                    Err(e) => {
                        warn!("failed to evict '{}': {}", name, e);
                        return;
                    }
                }
                let leave = Message::status(&name, "left the room");
                match serde_json::to_value(&leave) {
                    Ok(value) => {
                        if let Err(e) = store.insert(message::MESSAGES, value).await {
                            warn!("leave message for '{}' not stored: {}", name, e);
                        }
                    }
                    Err(e) => warn!("leave message for '{}' not serialized: {}", name, e),
                }
                info!("participant '{}' evicted", name);
            }));
        }
        handles
    }

    /// Spawn the periodic sweep loop. Abort the returned handle to stop it.
    pub fn start_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.settings.sweep_interval);
            // The first tick fires immediately; skip it so a fresh server
            // does not sweep before anyone has had a chance to heartbeat.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _handles = manager.sweep_once().await;
            }
        })
    }
}
