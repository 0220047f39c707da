use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ragdesk_chat::{ContextPipeline, MemoryConversationStore, Outcome, PipelineOptions};
use ragdesk_core::traits::{ConversationStore, EmbeddingGateway, GenerationService, NotificationSink};
use ragdesk_core::types::{ConversationRecord, ConversationTurn, EscalationNotice, EscalationStats};
use ragdesk_core::{Error, Result};
use ragdesk_index::{FlatL2Index, MultiIndexRetriever, RetrieverState, SourcePair};

const HANDOFF: &str = "Your request has been forwarded to a human agent via email.";

struct OriginEmbedder;

impl EmbeddingGateway for OriginEmbedder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0]).collect())
    }
}

/// Replies from a script; `None` simulates an unavailable service.
#[derive(Default)]
struct ScriptedGenerator {
    replies: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(replies: &[Option<&str>]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.map(str::to_string)).collect()),
            prompts: Mutex::default(),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl GenerationService for ScriptedGenerator {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.replies.lock().unwrap().pop_front().flatten() {
            Some(reply) => Ok(reply),
            None => Err(Error::upstream("generation", "script exhausted")),
        }
    }
}

#[derive(Default)]
struct RecordingNotifier {
    fail: bool,
    notices: Mutex<Vec<EscalationNotice>>,
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notice: &EscalationNotice) -> Result<()> {
        if self.fail {
            return Err(Error::NotificationFailure("smtp down".into()));
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Reads succeed, writes always fail.
struct ReadOnlyStore;

impl ConversationStore for ReadOnlyStore {
    fn append(&self, _record: &ConversationRecord) -> Result<()> {
        Err(Error::Storage("disk full".into()))
    }
    fn recent(&self, _user_id: &str, _limit: usize) -> Result<Vec<ConversationTurn>> {
        Ok(Vec::new())
    }
    fn stats(&self) -> Result<EscalationStats> {
        Ok(EscalationStats::default())
    }
}

fn corpus() -> RetrieverState {
    let index = FlatL2Index::from_vectors(&[vec![1.0], vec![2.0]]).unwrap();
    RetrieverState::from_pairs([SourcePair::new(
        "cards",
        index,
        vec!["New cards arrive within five business days.".into(), "Blocked cards cannot be reactivated.".into()],
    )])
}

struct Harness {
    pipeline: ContextPipeline,
    generator: Arc<ScriptedGenerator>,
    store: Arc<MemoryConversationStore>,
    notifier: Arc<RecordingNotifier>,
}

fn harness(state: RetrieverState, replies: &[Option<&str>], notifier: RecordingNotifier, options: PipelineOptions) -> Harness {
    let generator = ScriptedGenerator::new(replies);
    let store = Arc::new(MemoryConversationStore::new());
    let notifier = Arc::new(notifier);
    let retriever = Arc::new(MultiIndexRetriever::new(Arc::new(OriginEmbedder), state));
    let pipeline = ContextPipeline::new(retriever, generator.clone(), store.clone(), notifier.clone(), options);
    Harness { pipeline, generator, store, notifier }
}

#[test]
fn confident_answer_is_returned_and_recorded() {
    let h = harness(corpus(), &[Some("Within five business days."), Some("NO")], RecordingNotifier::default(), PipelineOptions::default());

    let outcome = h.pipeline.handle("42", "When does my card arrive?").unwrap();
    assert_eq!(outcome, Outcome::Answered { answer: "Within five business days.".into() });

    let prompts = h.generator.prompts();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("Context:\nNew cards arrive within five business days.\nBlocked cards cannot be reactivated."));
    assert!(prompts[0].contains("Question:\nWhen does my card arrive?"));
    assert!(prompts[1].contains("Answer: Within five business days."));

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].escalated);
    assert!(records[0].context.starts_with("New cards"));
    assert!(h.notifier.notices.lock().unwrap().is_empty());
}

#[test]
fn escalation_returns_handoff_and_notifies_with_history() {
    let h = harness(corpus(), &[Some("I am not sure."), Some("YES")], RecordingNotifier::default(), PipelineOptions::default());
    for (q, a) in [("first?", "one"), ("second?", "two")] {
        h.store
            .append(&ConversationRecord {
                timestamp: "2024-05-01T10:00:00+00:00".into(),
                user_id: "42".into(),
                question: q.into(),
                context: String::new(),
                answer: a.into(),
                escalated: false,
            })
            .unwrap();
    }

    let outcome = h.pipeline.handle("42", "Let me talk to a person").unwrap();
    assert_eq!(outcome, Outcome::Escalated { answer: HANDOFF.into(), notified: true });

    assert!(h.generator.prompts()[0].contains("Conversation History:\nQ: first?\nA: one\nQ: second?\nA: two"));
    let notices = h.notifier.notices.lock().unwrap().clone();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].question, "Let me talk to a person");
    assert_eq!(notices[0].history, "Q: first?\nA: one\nQ: second?\nA: two");

    let last = h.store.records().pop().unwrap();
    assert!(last.escalated);
    assert_eq!(last.answer, HANDOFF);
}

#[test]
fn failed_notification_keeps_handoff_answer() {
    let notifier = RecordingNotifier { fail: true, ..RecordingNotifier::default() };
    let h = harness(corpus(), &[Some(""), Some("yes")], notifier, PipelineOptions::default());

    let outcome = h.pipeline.handle("7", "help").unwrap();
    assert_eq!(outcome, Outcome::Escalated { answer: HANDOFF.into(), notified: false });
    assert_eq!(h.store.stats().unwrap().escalation_cases, 1);
}

#[test]
fn generation_failure_propagates_without_recording() {
    let h = harness(corpus(), &[None], RecordingNotifier::default(), PipelineOptions::default());
    let err = h.pipeline.handle("7", "anything").unwrap_err();
    assert!(matches!(err, Error::Upstream { service: "generation", .. }));
    assert!(h.store.records().is_empty());
}

#[test]
fn empty_corpus_still_answers_and_classifies_by_default() {
    let h = harness(RetrieverState::new(), &[Some("General answer."), Some("NO")], RecordingNotifier::default(), PipelineOptions::default());
    let outcome = h.pipeline.handle("7", "hello").unwrap();
    assert_eq!(outcome.answer(), "General answer.");
    assert!(h.generator.prompts()[0].contains("Context:\n\n"));
    assert_eq!(h.generator.prompts().len(), 2);
}

#[test]
fn empty_context_can_skip_classification() {
    let options = PipelineOptions { skip_when_context_empty: true, ..PipelineOptions::default() };
    let h = harness(RetrieverState::new(), &[Some("General answer.")], RecordingNotifier::default(), options);
    let outcome = h.pipeline.handle("7", "hello").unwrap();
    assert!(!outcome.is_escalated());
    assert_eq!(h.generator.prompts().len(), 1);
}

#[test]
fn top_k_and_history_limit_come_from_options() {
    let options = PipelineOptions { top_k: 1, history_limit: 1, ..PipelineOptions::default() };
    let h = harness(corpus(), &[Some("a1"), Some("no"), Some("a2"), Some("no")], RecordingNotifier::default(), options);
    h.pipeline.handle("9", "q1").unwrap();
    h.pipeline.handle("9", "q2").unwrap();

    let second = &h.generator.prompts()[2];
    assert!(second.contains("Context:\nNew cards arrive within five business days.\n\nConversation History:\nQ: q1\nA: a1\n\n"));
}

#[test]
fn store_write_failure_does_not_fail_the_request() {
    let generator = ScriptedGenerator::new(&[Some("fine"), Some("NO")]);
    let retriever = Arc::new(MultiIndexRetriever::new(Arc::new(OriginEmbedder), corpus()));
    let pipeline = ContextPipeline::new(
        retriever,
        generator,
        Arc::new(ReadOnlyStore),
        Arc::new(RecordingNotifier::default()),
        PipelineOptions::default(),
    );
    assert_eq!(pipeline.handle("1", "q").unwrap().answer(), "fine");
}
