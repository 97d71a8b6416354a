//! Prompt assembly: persona plus retrieved context as a system turn.

use secondbrain_core::knowledge::KnowledgeExcerpt;
use secondbrain_core::message::ConversationTurn;

/// Fixed assistant persona, placed before any retrieved context.
pub const PERSONA: &str = r#"You are an intelligent AI assistant serving as a "Second Brain" - a personal knowledge companion. You have access to the user's knowledge base which includes documents, audio transcripts, web content, notes, and images.

Your responsibilities:
1. Answer questions accurately based on the provided context from the user's knowledge base
2. Synthesize information from multiple sources when relevant
3. Support temporal queries (e.g., "what did I work on last week")
4. Be helpful, concise, and cite your sources when possible
5. If you don't have relevant information in the knowledge base, say so clearly"#;

pub const CONTEXT_HEADER: &str = "\n\nRELEVANT CONTEXT FROM KNOWLEDGE BASE:\n";
pub const EXCERPT_SEPARATOR: &str = "\n\n---\n\n";
pub const NO_CONTEXT_NOTICE: &str = "\n\nNote: The knowledge base is currently empty or no relevant content was found for this query.";

/// The request sent to the backend for one chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledRequest {
    pub system_instruction: String,

    /// Caller turns, unchanged and in order
    pub turns: Vec<ConversationTurn>,

    pub streaming: bool,
}

impl AssembledRequest {
    /// Backend messages: the system instruction first, then the caller's turns.
    pub fn messages(&self) -> Vec<ConversationTurn> {
        std::iter::once(ConversationTurn::system(self.system_instruction.clone()))
            .chain(self.turns.iter().cloned())
            .collect()
    }
}

/// `[MODALITY - TITLE - DATE]` followed by the excerpt text.
fn render_excerpt(excerpt: &KnowledgeExcerpt) -> String {
    let date = excerpt
        .captured_at
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown date".into());
    format!(
        "[{} - {} - {}]\n{}",
        excerpt.modality.as_str().to_uppercase(),
        excerpt.title,
        date,
        excerpt.excerpt
    )
}

/// The full system instruction for a set of excerpts.
pub fn system_instruction(excerpts: &[KnowledgeExcerpt]) -> String {
    let context = if excerpts.is_empty() {
        NO_CONTEXT_NOTICE.to_string()
    } else {
        let blocks: Vec<String> = excerpts.iter().map(render_excerpt).collect();
        format!("{CONTEXT_HEADER}{}", blocks.join(EXCERPT_SEPARATOR))
    };
    format!("{PERSONA}\n\n{context}")
}

/// Build the streaming request for `turns`, grounded in `excerpts`.
pub fn assemble(excerpts: &[KnowledgeExcerpt], turns: Vec<ConversationTurn>) -> AssembledRequest {
    AssembledRequest {
        system_instruction: system_instruction(excerpts),
        turns,
        streaming: true,
    }
}
