//! Message Module - Message creation, visibility, and author-scoped edits

use std::sync::Arc;
use serde::{Serialize, Deserialize};
use tracing::info;

use crate::presence::PARTICIPANTS;
use crate::store::DocumentStore;

pub const MESSAGES: &str = "messages";

/// Distinguished broadcast recipient, visible to all viewers.
pub const BROADCAST: &str = "Todos";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// System-generated presence event (entry/departure).
    Status,
    /// Broadcast chat message.
    Message,
    /// Targeted message, visible only to sender and recipient.
    PrivateMessage,
}

impl MessageType {
    /// Parse the wire value for caller-posted messages. `status` is
    /// reserved for system-generated presence events and not accepted.
    pub fn from_user_input(s: &str) -> Option<Self> {
        match s {
            "message" => Some(MessageType::Message),
            "private_message" => Some(MessageType::PrivateMessage),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Display timestamp, `HH:mm:ss`. Ordering authority is store
    /// insertion order, not this field.
    pub time: String,
}

impl Message {
    /// A presence event; always broadcast.
    pub fn status(from: &str, text: &str) -> Self {
        Self {
            from: from.to_string(),
            to: BROADCAST.to_string(),
            text: text.to_string(),
            kind: MessageType::Status,
            time: display_time(),
        }
    }
}

/// A message as read back from the store, id included.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    #[serde(flatten)]
    pub message: Message,
}

fn display_time() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

#[derive(Debug, PartialEq)]
pub enum PostError {
    /// Missing identity or malformed to/text/type.
    Invalid,
    /// Sender is not a registered participant.
    UnknownSender,
    Store(String),
}

impl std::fmt::Display for PostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostError::Invalid => write!(f, "invalid message"),
            PostError::UnknownSender => write!(f, "sender is not a participant"),
            PostError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum EditError {
    Invalid,
    NotFound,
    /// The stored message's author is not the editor.
    Forbidden,
    Store(String),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditError::Invalid => write!(f, "invalid message"),
            EditError::NotFound => write!(f, "message not found"),
            EditError::Forbidden => write!(f, "not the message author"),
            EditError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum DeleteError {
    NotFound,
    Forbidden,
    Store(String),
}

impl std::fmt::Display for DeleteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteError::NotFound => write!(f, "message not found"),
            DeleteError::Forbidden => write!(f, "not the message author"),
            DeleteError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

/// Owns message creation, per-viewer visibility, and author-scoped
/// edit/delete. Identity is always an explicit parameter; there is no
/// ambient notion of "current user".
pub struct MessageRouter {
    store: Arc<DocumentStore>,
}

impl MessageRouter {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    fn validate_payload(to: &str, text: &str) -> Result<(), ()> {
        if to.is_empty() || text.is_empty() {
            return Err(());
        }
        Ok(())
    }

    async fn sender_exists(&self, name: &str) -> bool {
        self.store
            .find_one(PARTICIPANTS, |v| v["name"] == name)
            .await
            .is_some()
    }

    /// Append a message from the asserted identity. Returns the new id.
    pub async fn post_message(
        &self,
        from: Option<&str>,
        to: &str,
        text: &str,
        kind: &str,
    ) -> Result<String, PostError> {
        let from = match from {
            Some(f) if !f.is_empty() => f,
            _ => return Err(PostError::Invalid),
        };
        Self::validate_payload(to, text).map_err(|_| PostError::Invalid)?;
        let kind = MessageType::from_user_input(kind).ok_or(PostError::Invalid)?;

        if !self.sender_exists(from).await {
            return Err(PostError::UnknownSender);
        }

        let message = Message {
            from: from.to_string(),
            to: to.to_string(),
            text: text.to_string(),
            kind,
            time: display_time(),
        };
        let value =
            serde_json::to_value(&message).map_err(|e| PostError::Store(e.to_string()))?;
        let id = self
            .store
            .insert(MESSAGES, value)
            .await
            .map_err(PostError::Store)?;
        info!("message {} from '{}' to '{}'", id, from, message.to);
        Ok(id)
    }

    /// Messages the viewer may see, store order. `limit` selects the LAST
    /// n matches (the most recent ones), not the first.
    ///
    /// The viewer does not need to be a registered participant; with no
    /// identity only broadcasts come back, since stored senders are never
    /// empty.
    pub async fn list_visible(
        &self,
        viewer: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredMessage>, String> {
        let viewer = viewer.unwrap_or_default();
        let docs = self
            .store
            .find(MESSAGES, |v| {
                v["to"] == BROADCAST
                    || v["from"] == viewer
                    || (v["to"] == viewer && v["type"] == "private_message")
            })
            .await;

        let mut visible = Vec::with_capacity(docs.len());
        for doc in docs {
            let message: Message =
                serde_json::from_value(doc.data).map_err(|e| e.to_string())?;
            visible.push(StoredMessage { id: doc.id, message });
        }

        if let Some(n) = limit {
            let skip = visible.len().saturating_sub(n);
            visible.drain(..skip);
        }
        Ok(visible)
    }

    /// Overwrite `to`, `text`, and `type` of an owned message in place.
    /// `from`, `time`, and the id never change.
    pub async fn edit_message(
        &self,
        id: &str,
        editor: Option<&str>,
        to: &str,
        text: &str,
        kind: &str,
    ) -> Result<(), EditError> {
        let editor = match editor {
            Some(e) if !e.is_empty() => e,
            _ => return Err(EditError::Invalid),
        };
        Self::validate_payload(to, text).map_err(|_| EditError::Invalid)?;
        let kind = MessageType::from_user_input(kind).ok_or(EditError::Invalid)?;

        if !self.sender_exists(editor).await {
            return Err(EditError::Invalid);
        }

        let doc = self
            .store
            .find_by_id(MESSAGES, id)
            .await
            .ok_or(EditError::NotFound)?;
        let mut stored: Message =
            serde_json::from_value(doc.data).map_err(|e| EditError::Store(e.to_string()))?;
        if stored.from != editor {
            return Err(EditError::Forbidden);
        }

        stored.to = to.to_string();
        stored.text = text.to_string();
        stored.kind = kind;
        let value =
            serde_json::to_value(&stored).map_err(|e| EditError::Store(e.to_string()))?;
        self.store
            .update_by_id(MESSAGES, id, value)
            .await
            .map_err(EditError::Store)?;
        Ok(())
    }

    /// Remove an owned message.
    pub async fn delete_message(
        &self,
        id: &str,
        requester: Option<&str>,
    ) -> Result<(), DeleteError> {
        let doc = self
            .store
            .find_by_id(MESSAGES, id)
            .await
            .ok_or(DeleteError::NotFound)?;
        if doc.data["from"] != requester.unwrap_or_default() {
            return Err(DeleteError::Forbidden);
        }
        self.store
            .delete_by_id(MESSAGES, id)
            .await
            .map_err(DeleteError::Store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::{PresenceManager, PresenceSettings};

    async fn setup() -> (Arc<DocumentStore>, MessageRouter) {
        let store = Arc::new(DocumentStore::new());
        let presence =
            PresenceManager::new(Arc::clone(&store), PresenceSettings::default());
        presence.register("Maria").await.unwrap();
        presence.register("João").await.unwrap();
        (Arc::clone(&store), MessageRouter::new(store))
    }

    #[tokio::test]
    async fn test_post_validates_fields() {
        let (_, router) = setup().await;
        assert_eq!(
            router.post_message(None, "Todos", "hi", "message").await,
            Err(PostError::Invalid)
        );
        assert_eq!(
            router.post_message(Some("Maria"), "", "hi", "message").await,
            Err(PostError::Invalid)
        );
        assert_eq!(
            router.post_message(Some("Maria"), "Todos", "", "message").await,
            Err(PostError::Invalid)
        );
        assert_eq!(
            router.post_message(Some("Maria"), "Todos", "hi", "status").await,
            Err(PostError::Invalid)
        );
        assert_eq!(
            router.post_message(Some("ghost"), "Todos", "hi", "message").await,
            Err(PostError::UnknownSender)
        );
        assert!(router
            .post_message(Some("Maria"), "Todos", "hi", "message")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_visibility_predicate() {
        let (_, router) = setup().await;
        router
            .post_message(Some("Maria"), "Todos", "broadcast", "message")
            .await
            .unwrap();
        router
            .post_message(Some("Maria"), "João", "psst", "private_message")
            .await
            .unwrap();

        // Sender and recipient both see the private message.
        let maria: Vec<String> = texts(&router, Some("Maria")).await;
        assert!(maria.contains(&"psst".to_string()));
        let joao: Vec<String> = texts(&router, Some("João")).await;
        assert!(joao.contains(&"psst".to_string()));

        // A third party does not.
        let other: Vec<String> = texts(&router, Some("Ana")).await;
        assert!(!other.contains(&"psst".to_string()));
        assert!(other.contains(&"broadcast".to_string()));

        // No identity: broadcasts only.
        let anon: Vec<String> = texts(&router, None).await;
        assert!(anon.contains(&"broadcast".to_string()));
        assert!(!anon.contains(&"psst".to_string()));
    }

    #[tokio::test]
    async fn test_limit_takes_most_recent() {
        let (_, router) = setup().await;
        for i in 0..5 {
            router
                .post_message(Some("Maria"), "Todos", &format!("m{}", i), "message")
                .await
                .unwrap();
        }
        let last_two = router.list_visible(Some("Maria"), Some(2)).await.unwrap();
        let texts: Vec<&str> = last_two.iter().map(|m| m.message.text.as_str()).collect();
        assert_eq!(texts, vec!["m3", "m4"]);

        // Limit larger than the match count returns everything.
        let all = router.list_visible(Some("Maria"), Some(100)).await.unwrap();
        // Two entry announcements plus five posts.
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn test_edit_rules() {
        let (_, router) = setup().await;
        let id = router
            .post_message(Some("Maria"), "Todos", "original", "message")
            .await
            .unwrap();

        // Non-author fails Forbidden even with a fully valid payload.
        assert_eq!(
            router
                .edit_message(&id, Some("João"), "Todos", "hacked", "message")
                .await,
            Err(EditError::Forbidden)
        );
        // Unregistered editor is Invalid, not Forbidden.
        assert_eq!(
            router
                .edit_message(&id, Some("ghost"), "Todos", "x", "message")
                .await,
            Err(EditError::Invalid)
        );
        assert_eq!(
            router
                .edit_message("no-such-id", Some("Maria"), "Todos", "x", "message")
                .await,
            Err(EditError::NotFound)
        );

        router
            .edit_message(&id, Some("Maria"), "João", "edited", "private_message")
            .await
            .unwrap();
        let visible = router.list_visible(Some("Maria"), None).await.unwrap();
        let edited = visible.iter().find(|m| m.id == id).unwrap();
        assert_eq!(edited.message.text, "edited");
        assert_eq!(edited.message.to, "João");
        assert_eq!(edited.message.kind, MessageType::PrivateMessage);
        assert_eq!(edited.message.from, "Maria");
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (_, router) = setup().await;
        let id = router
            .post_message(Some("Maria"), "Todos", "hi", "message")
            .await
            .unwrap();

        assert_eq!(
            router.delete_message(&id, Some("João")).await,
            Err(DeleteError::Forbidden)
        );
        assert_eq!(
            router.delete_message(&id, None).await,
            Err(DeleteError::Forbidden)
        );
        assert_eq!(
            router.delete_message("no-such-id", Some("Maria")).await,
            Err(DeleteError::NotFound)
        );

        router.delete_message(&id, Some("Maria")).await.unwrap();
        let visible = router.list_visible(Some("Maria"), None).await.unwrap();
        assert!(visible.iter().all(|m| m.id != id));
    }

    async fn texts(router: &MessageRouter, viewer: Option<&str>) -> Vec<String> {
        router
            .list_visible(viewer, None)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.message.text)
            .collect()
    }
}
