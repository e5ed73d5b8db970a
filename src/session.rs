use crate::completion::Completer;
use crate::database::VectorStore;
use crate::embeddings::Embedder;
use crate::rag::{PipelineOutcome, RagPipeline};
use log::info;
use std::fmt;
use std::io::{self, BufRead, Write};

/// A user question, non-empty after trimming
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Returns `None` for empty or whitespace-only input
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Question(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("You"),
            Role::Assistant => f.write_str("Assistant"),
        }
    }
}

/// One contribution to the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Append-only conversation history
#[derive(Debug, Default, Clone)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        History::default()
    }

    pub fn append_turn(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Write every turn, oldest first
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for turn in &self.turns {
            writeln!(out, "{}: {}", turn.role, turn.text)?;
        }
        Ok(())
    }
}

/// A single-user chat over one document collection
pub struct ChatSession<E, S, C> {
    pipeline: RagPipeline<E, S, C>,
    history: History,
}

impl<E, S, C> ChatSession<E, S, C>
where
    E: Embedder,
    S: VectorStore,
    C: Completer,
{
    pub fn new(pipeline: RagPipeline<E, S, C>) -> Self {
        ChatSession {
            pipeline,
            history: History::new(),
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Answer one question and record it. Blank input is ignored and returns `None`.
    ///
    /// Takes `&mut self`, so a session never has two questions in flight.
    pub async fn ask(&mut self, input: &str) -> Option<PipelineOutcome> {
        let question = Question::parse(input)?;
        let outcome = self.pipeline.run(&question).await;

        self.history.append_turn(Role::User, question.as_str());
        self.history.append_turn(Role::Assistant, outcome.answer.as_str());

        Some(outcome)
    }

    /// Run the interactive question loop until `exit` or end of input
    pub async fn run_query_loop<R: BufRead, W: Write>(
        &mut self,
        mut input: R,
        mut output: W,
    ) -> io::Result<()> {
        writeln!(
            output,
            "Ask questions about the document. Type 'history' to show the conversation, 'exit' to quit."
        )?;

        let mut buffer = String::new();

        loop {
            write!(output, "\nYour question: ")?;
            output.flush()?;

            buffer.clear();
            if input.read_line(&mut buffer)? == 0 {
                break;
            }

            let line = buffer.trim();

            match line.to_lowercase().as_str() {
                "exit" => {
                    info!("Goodbye!");
                    break;
                }
                "history" => {
                    writeln!(output)?;
                    self.history.render(&mut output)?;
                    continue;
                }
                "" => continue,
                _ => {}
            }

            writeln!(output, "Searching for an answer...")?;
            output.flush()?;

            if let Some(outcome) = self.ask(line).await {
                writeln!(output, "\n{}: {}", Role::Assistant, outcome.answer)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::tests::{pipeline, FakeCompleter, FakeEmbedder, FakeStore};
    use crate::rag::{ERROR_ANSWER, NO_INFORMATION_ANSWER};

    #[test]
    fn test_question_rejects_blank_input() {
        assert!(Question::parse("").is_none());
        assert!(Question::parse("  \n\t ").is_none());
        assert_eq!(Question::parse("  hi ").unwrap().as_str(), "hi");
    }

    #[test]
    fn test_history_render() {
        let mut history = History::new();
        history.append_turn(Role::User, "Hello?");
        history.append_turn(Role::Assistant, "Hi.");

        let mut out = Vec::new();
        history.render(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "You: Hello?\nAssistant: Hi.\n");
    }

    #[tokio::test]
    async fn test_turns_recorded_in_order() {
        let mut session = ChatSession::new(pipeline(
            FakeEmbedder::ok(),
            FakeStore::with(&[
                ("Refunds are allowed within 30 days.", 0.9),
                ("Contact support for exceptions.", 0.8),
            ]),
            FakeCompleter::replying("You can request a refund within 30 days."),
        ));

        let outcome = session.ask("What is the refund policy?").await.unwrap();

        assert_eq!(outcome.answer, "You can request a refund within 30 days.");
        assert_eq!(
            session.history().turns(),
            &[
                Turn {
                    role: Role::User,
                    text: "What is the refund policy?".to_string()
                },
                Turn {
                    role: Role::Assistant,
                    text: "You can request a refund within 30 days.".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_question_not_recorded() {
        let mut session = ChatSession::new(pipeline(
            FakeEmbedder::ok(),
            FakeStore::with(&[("context", 0.9)]),
            FakeCompleter::replying("answer"),
        ));

        assert!(session.ask("   ").await.is_none());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_failed_question_still_recorded() {
        let mut session = ChatSession::new(pipeline(
            FakeEmbedder::failing(),
            FakeStore::with(&[]),
            FakeCompleter::replying("unused"),
        ));

        let outcome = session.ask("anything").await.unwrap();

        assert_eq!(outcome.answer, ERROR_ANSWER);
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history().turns()[1].text, ERROR_ANSWER);
    }

    #[tokio::test]
    async fn test_query_loop() {
        let mut session = ChatSession::new(pipeline(
            FakeEmbedder::ok(),
            FakeStore::with(&[]),
            FakeCompleter::replying("unused"),
        ));
        let input = b"asdkjqwe\n\n   \nhistory\nexit\nignored\n";
        let mut output = Vec::new();

        session
            .run_query_loop(&input[..], &mut output)
            .await
            .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(session.history().len(), 2);
        assert!(output.contains(&format!("Assistant: {}", NO_INFORMATION_ANSWER)));
        assert!(output.contains("You: asdkjqwe"));
        assert!(!output.contains("ignored"));
    }

    #[tokio::test]
    async fn test_query_loop_stops_at_end_of_input() {
        let mut session = ChatSession::new(pipeline(
            FakeEmbedder::ok(),
            FakeStore::with(&[("context", 0.9)]),
            FakeCompleter::replying("answer"),
        ));
        let mut output = Vec::new();

        session
            .run_query_loop(&b"first\nsecond"[..], &mut output)
            .await
            .unwrap();

        assert_eq!(session.history().len(), 4);
    }
}
