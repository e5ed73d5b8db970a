use crate::completion::Completer;
use crate::database::VectorStore;
use crate::embeddings::Embedder;
use crate::error::{RagError, Result};
use crate::prompt::PromptBuilder;
use crate::session::Question;
use log::{debug, error, info};
use std::fmt;

/// Answer used when retrieval finds nothing
pub const NO_INFORMATION_ANSWER: &str = "I could not find relevant information in the document.";
/// Answer used when any stage fails
pub const ERROR_ANSWER: &str = "I could not process your question right now. Please try again.";
/// Answer used when the model produced no text (e.g. safety filtering)
pub const BLOCKED_ANSWER: &str = "The model did not return an answer to this question.";

/// Stages of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Embedding,
    Retrieving,
    ShortCircuit,
    Composing,
    Completing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Embedding => "embedding",
            PipelineState::Retrieving => "retrieving",
            PipelineState::ShortCircuit => "short-circuit",
            PipelineState::Composing => "composing",
            PipelineState::Completing => "completing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of one pipeline run. Always carries an answer to show the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub answer: String,
    /// Terminal state: `Done` or `Failed`
    pub state: PipelineState,
    /// Stage that failed, when `state` is `Failed`
    pub failed_stage: Option<PipelineState>,
    /// Number of chunks used as context
    pub contexts: usize,
}

/// RAG (Retrieval-Augmented Generation) pipeline
pub struct RagPipeline<E, S, C> {
    embedder: E,
    store: S,
    completer: C,
    prompt_builder: PromptBuilder,
    top_k: usize,
}

impl<E, S, C> RagPipeline<E, S, C>
where
    E: Embedder,
    S: VectorStore,
    C: Completer,
{
    /// Create a new RAG pipeline
    pub fn new(embedder: E, store: S, completer: C, prompt_builder: PromptBuilder, top_k: usize) -> Self {
        RagPipeline {
            embedder,
            store,
            completer,
            prompt_builder,
            top_k,
        }
    }

    /// Answer a question. Failures are logged and turned into a fallback answer.
    pub async fn run(&self, question: &Question) -> PipelineOutcome {
        let mut state = PipelineState::Idle;
        let mut contexts = 0;

        match self.execute(question, &mut state, &mut contexts).await {
            Ok(answer) => {
                transition(&mut state, PipelineState::Done);
                PipelineOutcome {
                    answer,
                    state,
                    failed_stage: None,
                    contexts,
                }
            }
            Err(err) => {
                error!("Pipeline failed while {}: {}", state, err);
                let answer = match err {
                    RagError::CompletionBlocked(_) => BLOCKED_ANSWER,
                    _ => ERROR_ANSWER,
                };
                let failed_stage = state;
                transition(&mut state, PipelineState::Failed);
                PipelineOutcome {
                    answer: answer.to_string(),
                    state,
                    failed_stage: Some(failed_stage),
                    contexts,
                }
            }
        }
    }

    async fn execute(
        &self,
        question: &Question,
        state: &mut PipelineState,
        contexts: &mut usize,
    ) -> Result<String> {
        transition(state, PipelineState::Embedding);
        let query = self.embedder.embed(question.as_str()).await?;

        transition(state, PipelineState::Retrieving);
        let chunks = self.store.search(&query, self.top_k).await?;
        *contexts = chunks.len();

        if chunks.is_empty() {
            transition(state, PipelineState::ShortCircuit);
            info!("No relevant information found for the question");
            return Ok(NO_INFORMATION_ANSWER.to_string());
        }

        transition(state, PipelineState::Composing);
        let prompt = self.prompt_builder.build(question.as_str(), &chunks);

        transition(state, PipelineState::Completing);
        self.completer.complete(&prompt).await
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!("Pipeline {} -> {}", state, next);
    *state = next;
}
