//! Collaborator seams. Every concrete backend (local model, HTTP service,
//! SQLite, outbox file) sits behind one of these.

use crate::error::{Error, Result};
use crate::types::{ConversationRecord, ConversationTurn, EscalationNotice, EscalationStats};

pub trait EmbeddingGateway: Send + Sync {
    /// Encodes `texts` in order, one vector per input.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.encode_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::upstream("embedding", "gateway returned no vector"))
    }
}

pub trait GenerationService: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

pub trait ConversationStore: Send + Sync {
    fn append(&self, record: &ConversationRecord) -> Result<()>;
    /// Latest turns for `user_id`, most recent first.
    fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ConversationTurn>>;
    fn stats(&self) -> Result<EscalationStats>;
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: &EscalationNotice) -> Result<()>;
}
