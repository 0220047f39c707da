//! Per-question orchestration: retrieve, recall history, generate, classify,
//! hand off when needed, record.

use std::sync::Arc;

use ragdesk_core::config::Settings;
use ragdesk_core::traits::{ConversationStore, GenerationService, NotificationSink};
use ragdesk_core::types::{ConversationRecord, EscalationNotice};
use ragdesk_core::Result;
use ragdesk_index::MultiIndexRetriever;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::escalation::EscalationEvaluator;
use crate::prompt::{answer_prompt, format_history};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Answered { answer: String },
    /// `answer` is the hand-off notice; `notified` is false when the sink failed.
    Escalated { answer: String, notified: bool },
}

impl Outcome {
    pub fn answer(&self) -> &str {
        match self {
            Self::Answered { answer } | Self::Escalated { answer, .. } => answer,
        }
    }

    pub fn is_escalated(&self) -> bool {
        matches!(self, Self::Escalated { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub top_k: usize,
    pub history_limit: usize,
    pub handoff_message: String,
    /// Skip classification when retrieval found nothing.
    pub skip_when_context_empty: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            top_k: settings.retrieval.top_k,
            history_limit: settings.conversation.history_limit,
            handoff_message: settings.escalation.handoff_message.clone(),
            skip_when_context_empty: settings.escalation.skip_when_context_empty,
        }
    }
}

pub struct ContextPipeline {
    retriever: Arc<MultiIndexRetriever>,
    generator: Arc<dyn GenerationService>,
    evaluator: EscalationEvaluator,
    store: Arc<dyn ConversationStore>,
    notifier: Arc<dyn NotificationSink>,
    options: PipelineOptions,
}

impl ContextPipeline {
    pub fn new(
        retriever: Arc<MultiIndexRetriever>,
        generator: Arc<dyn GenerationService>,
        store: Arc<dyn ConversationStore>,
        notifier: Arc<dyn NotificationSink>,
        options: PipelineOptions,
    ) -> Self {
        let evaluator = EscalationEvaluator::new(generator.clone());
        Self { retriever, generator, evaluator, store, notifier, options }
    }

    pub fn retriever(&self) -> &MultiIndexRetriever {
        &self.retriever
    }

    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    /// Answers one question. Embedding and generation failures propagate;
    /// history, notification and logging failures only degrade.
    pub fn handle(&self, user_id: &str, question: &str) -> Result<Outcome> {
        let context = self.retriever.retrieve(question, self.options.top_k)?;

        let turns = self.store.recent(user_id, self.options.history_limit).unwrap_or_else(|e| {
            warn!(user_id, error = %e, "history unavailable, answering without it");
            Vec::new()
        });
        let history = format_history(&turns);

        let prompt = answer_prompt(question, &context, &history);
        debug!(user_id, prompt = %prompt, "answer prompt");
        let answer = self.generator.complete(&prompt)?;

        let escalate = if self.options.skip_when_context_empty && context.trim().is_empty() {
            debug!(user_id, "empty context, escalation check skipped");
            false
        } else {
            self.evaluator.should_escalate(question, &answer)?
        };

        let outcome = if escalate {
            let notice = EscalationNotice {
                user_id: user_id.to_string(),
                question: question.to_string(),
                history,
            };
            let notified = match self.notifier.notify(&notice) {
                Ok(()) => true,
                Err(e) => {
                    warn!(user_id, error = %e, "escalation notice not delivered");
                    false
                }
            };
            info!(user_id, notified, "conversation escalated");
            Outcome::Escalated { answer: self.options.handoff_message.clone(), notified }
        } else {
            Outcome::Answered { answer }
        };

        let record = ConversationRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            user_id: user_id.to_string(),
            question: question.to_string(),
            context,
            answer: outcome.answer().to_string(),
            escalated: outcome.is_escalated(),
        };
        if let Err(e) = self.store.append(&record) {
            warn!(user_id, error = %e, "conversation not recorded");
        }
        Ok(outcome)
    }
}
