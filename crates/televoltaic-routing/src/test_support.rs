//! Shared fixtures for unit tests.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use televoltaic_core::{ApiResult, Bot, ChatId};

/// An outbound call recorded by [`MockBot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat: ChatId, text: String },
    Answer { id: String, text: Option<String> },
}

/// Bot that records everything it is asked to send.
#[derive(Debug, Default)]
pub struct MockBot {
    sent: Mutex<Vec<Sent>>,
}

impl MockBot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                Sent::Answer { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> &str {
        "test-bot"
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> ApiResult<i64> {
        let mut sent = self.sent.lock();
        sent.push(Sent::Text {
            chat,
            text: text.to_string(),
        });
        Ok(sent.len() as i64)
    }

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>) -> ApiResult<()> {
        self.sent.lock().push(Sent::Answer {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
