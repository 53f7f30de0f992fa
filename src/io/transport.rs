//! Outbound transports
//!
//! The only thing the engine asks of a transport is to deliver one text
//! message to one recipient and say whether that worked.

use crate::core::types::UserId;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Delivers batched text to a remote party
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message. Returns false when delivery failed; callers log
    /// and move on.
    async fn send(&self, recipient: &UserId, text: &str) -> bool;
}

/// Writes messages to stdout
#[derive(Debug, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send(&self, recipient: &UserId, text: &str) -> bool {
        for line in text.lines() {
            println!("[{}] {}", recipient, line);
        }
        true
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<(UserId, String)>>,
    failing: AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends report failure (messages are still recorded)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<(UserId, String)> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Every line sent to `user`, in order, with batches split apart
    pub fn lines_for(&self, user: &UserId) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(to, _)| to == user)
            .flat_map(|(_, text)| text.split('\n').map(str::to_string).collect::<Vec<_>>())
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, recipient: &UserId, text: &str) -> bool {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((recipient.clone(), text.to_string()));
        }
        !self.failing.load(Ordering::SeqCst)
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    text: &'a str,
}

/// Posts `{recipient, text}` as JSON to a webhook URL
pub struct WebhookTransport {
    client: Client,
    url: String,
}

impl WebhookTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn send(&self, recipient: &UserId, text: &str) -> bool {
        let payload = WebhookPayload {
            recipient: recipient.as_str(),
            text,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(status = %response.status(), url = %self.url, "webhook rejected message");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "webhook request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_transport_keeps_order() {
        let transport = RecordingTransport::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        assert!(transport.send(&alice, "one\ntwo").await);
        assert!(transport.send(&bob, "other").await);
        transport.set_failing(true);
        assert!(!transport.send(&alice, "three").await);

        assert_eq!(transport.lines_for(&alice), vec!["one", "two", "three"]);
        assert_eq!(transport.messages().len(), 3);
    }

    #[test]
    fn test_webhook_payload_shape() {
        let payload = WebhookPayload {
            recipient: "alice",
            text: "hi",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"recipient": "alice", "text": "hi"}));
    }
}
