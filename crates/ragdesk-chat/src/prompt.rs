use ragdesk_core::types::ConversationTurn;

pub fn answer_prompt(question: &str, context: &str, history: &str) -> String {
    format!(
        "You are a helpful assistant. Use the context and conversation history to answer the user's question.\n\n\
         Context:\n{context}\n\n\
         Conversation History:\n{history}\n\n\
         Question:\n{question}\n\n\
         Answer:"
    )
}

pub fn escalation_prompt(question: &str, answer: &str) -> String {
    format!(
        "You are an AI agent monitoring user conversations.\n\
         If the assistant's answer falls in one of these cases:\n \
         - it is empty, unhelpful or incorrect\n \
         - the user seems frustrated\n \
         - the user indicates they need human help\n \
         - the user says they want more help\n\
         Then, return YES.\n\
         Otherwise, return NO.\n\n\
         Question: {question}\n\
         Answer: {answer}\n\n\
         Return only YES or NO."
    )
}

/// Renders turns as `Q: ..\nA: ..` lines. `turns` come most recent first
/// and are printed oldest first.
pub fn format_history(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .rev()
        .map(|t| format!("Q: {}\nA: {}", t.question, t.answer))
        .collect::<Vec<_>>()
        .join("\n")
}
