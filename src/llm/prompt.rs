use crate::llm::semantic_search::SearchResult;

pub const NO_ANSWER: &str = "I don't know based on the provided document.";

pub const NO_CONTEXT: &str = "No relevant context found.";

pub const SYSTEM_PROMPT: &str = "You are a document assistant. Answer the user's question using only \
the context supplied with it. Do not draw on outside knowledge. If the context does not contain \
the answer, reply exactly: \"I don't know based on the provided document.\"

Format every answer as a single short heading followed by one paragraph of prose. Do not use \
bullet points or numbered lists, and do not mention the documents, the context or any sources \
in the answer.";

/// Context blocks in retrieval order, each under a `--- Document {i} ---` header.
pub fn format_context(chunks: &[SearchResult]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT.to_string();
    }
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("--- Document {} ---\n{}", i + 1, chunk.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn user_message(context: &str, question: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nPlease provide a clear and accurate answer based only on the context above.",
        context, question
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub system: String,
    pub user: String,
    /// Chunks that made it into the context.
    pub included: usize,
    /// Lowest-ranked chunks left out to stay within the budget.
    pub dropped: usize,
}

impl AssembledPrompt {
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    max_prompt_chars: usize,
}

impl PromptAssembler {
    pub fn new(max_prompt_chars: usize) -> Self {
        Self { max_prompt_chars }
    }

    /// Builds the prompt from ranked chunks, dropping chunks from the end of the
    /// ranking until system + user message fit in the character budget.
    pub fn assemble(&self, question: &str, chunks: &[SearchResult]) -> AssembledPrompt {
        let mut included = chunks.len();
        loop {
            let prompt = AssembledPrompt {
                system: SYSTEM_PROMPT.to_string(),
                user: user_message(&format_context(&chunks[..included]), question.trim()),
                included,
                dropped: chunks.len() - included,
            };
            if included == 0 || prompt.char_len() <= self.max_prompt_chars {
                if prompt.dropped > 0 {
                    log::warn!(
                        "Prompt budget of {} chars exceeded, dropped {} of {} chunks",
                        self.max_prompt_chars,
                        prompt.dropped,
                        chunks.len()
                    );
                }
                return prompt;
            }
            included -= 1;
        }
    }
}
