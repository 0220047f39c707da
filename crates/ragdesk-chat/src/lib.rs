//! Online side: prompts, escalation, conversation memory, notifications and
//! the orchestrator tying them to the retriever.

pub mod escalation;
pub mod notify;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod store;

pub use escalation::EscalationEvaluator;
pub use notify::{LogNotifier, OutboxNotifier};
pub use openai::OpenAiCompatClient;
pub use pipeline::{ContextPipeline, Outcome, PipelineOptions};
pub use store::{MemoryConversationStore, SqliteConversationStore};
