//! Domain types shared by the chunker, the index and the chat pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// One retrievable unit of a source document.
///
/// - `text`: the chunk payload, already trimmed
/// - `source_id`: stable name of the owning source
/// - `ordinal`: position in the source's chunk table; equals the index row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source_id: String,
    pub ordinal: usize,
}

/// How a document is cut into chunks. Chosen per source by the operator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Greedy sentence packing up to a character budget.
    Sentence,
    /// Split on uppercase heading lines.
    Title,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sentence => "sentence",
            Self::Title => "title",
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sentence" | "sentences" => Ok(Self::Sentence),
            "title" | "titles" => Ok(Self::Title),
            other => Err(Error::InvalidConfig(format!(
                "unknown chunk strategy '{other}' (expected 'sentence' or 'title')"
            ))),
        }
    }
}

/// A single retrieved chunk. Lower `distance` is more relevant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub source: String,
    pub row: usize,
    pub text: String,
    pub distance: f32,
}

/// A past exchange, as read back from the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    pub user_id: String,
    pub question: String,
    pub answer: String,
}

/// The row appended to the conversation store for every answered question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRecord {
    pub timestamp: String,
    pub user_id: String,
    pub question: String,
    pub context: String,
    pub answer: String,
    pub escalated: bool,
}

/// Aggregate escalation counters over the whole conversation log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EscalationStats {
    pub escalated_users: u64,
    pub escalation_cases: u64,
    pub total_users: u64,
    pub total_questions: u64,
    pub escalation_rate_percent: f64,
}

impl EscalationStats {
    /// Builds the counters and derives the rate, rounded to two decimals.
    pub fn new(escalated_users: u64, escalation_cases: u64, total_users: u64, total_questions: u64) -> Self {
        let escalation_rate_percent = if total_questions > 0 {
            let rate = escalation_cases as f64 / total_questions as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            0.0
        };
        Self { escalated_users, escalation_cases, total_users, total_questions, escalation_rate_percent }
    }
}

/// What the pipeline hands to a notification sink when a conversation escalates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EscalationNotice {
    pub user_id: String,
    pub question: String,
    pub history: String,
}

impl EscalationNotice {
    pub fn subject(&self) -> String {
        format!("Escalation Needed: User {}", self.user_id)
    }

    pub fn body(&self) -> String {
        format!(
            "The following question from user {} requires attention:\n\n\"{}\"\n\n\
             Here is the conversation so far:\n\n\"{}\"\n\n\
             Please follow up as soon as possible.\n",
            self.user_id, self.question, self.history
        )
    }
}
