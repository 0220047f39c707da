use std::sync::Arc;

use ragdesk_core::traits::GenerationService;
use ragdesk_core::Result;
use tracing::debug;

use crate::prompt::escalation_prompt;

/// YES/NO classifier delegated to the generation service.
#[derive(Clone)]
pub struct EscalationEvaluator {
    generator: Arc<dyn GenerationService>,
}

impl EscalationEvaluator {
    pub fn new(generator: Arc<dyn GenerationService>) -> Self {
        Self { generator }
    }

    pub fn should_escalate(&self, question: &str, answer: &str) -> Result<bool> {
        let response = self.generator.complete(&escalation_prompt(question, answer))?;
        let verdict = parse_verdict(&response);
        debug!(response = %response.trim(), verdict, "escalation verdict");
        Ok(verdict)
    }
}

/// True when the trimmed response contains "yes", in any case.
pub fn parse_verdict(response: &str) -> bool {
    response.trim().to_lowercase().contains("yes")
}
