use crate::database::ContextChunk;

/// Assembles the grounded prompt sent to the completion service.
///
/// Chunks are used in the order given, without re-ranking, deduplication or
/// truncation. The assembled context size is not capped.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
}

impl PromptBuilder {
    pub fn new(language: impl Into<String>) -> Self {
        PromptBuilder {
            language: language.into(),
        }
    }

    /// Build the prompt for `question` grounded in `contexts`
    pub fn build(&self, question: &str, contexts: &[ContextChunk]) -> String {
        let context = contexts
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n");

        format!(
            "You are an expert assistant. Use the following context to answer the user's question.\n\
             \n\
             Context:\n\
             {}\n\
             \n\
             Question: {}\n\
             \n\
             Answer concisely and clearly in {}, using only the context above.\n",
            context, question, self.language
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[(&str, f32)]) -> Vec<ContextChunk> {
        texts
            .iter()
            .map(|(text, score)| ContextChunk::new(*text, *score))
            .collect()
    }

    #[test]
    fn test_contains_question_and_chunks_in_order() {
        let builder = PromptBuilder::new("English");
        let contexts = chunks(&[
            ("Refunds are allowed within 30 days.", 0.9),
            ("Contact support for exceptions.", 0.8),
        ]);
        let prompt = builder.build("What is the refund policy?", &contexts);

        assert!(prompt.contains("Question: What is the refund policy?"));
        assert!(prompt.contains(
            "Context:\nRefunds are allowed within 30 days.\n\nContact support for exceptions.\n"
        ));
        assert!(prompt.contains("in English"));
    }

    #[test]
    fn test_order_not_resorted() {
        let builder = PromptBuilder::new("English");
        // Reverse alphabetical and increasing length; must stay as given
        let contexts = chunks(&[("zz", 0.9), ("mmmm", 0.8), ("aaaaaaaa", 0.7)]);
        let prompt = builder.build("q", &contexts);

        let positions: Vec<usize> = contexts
            .iter()
            .map(|c| prompt.find(c.text.as_str()).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_build_is_idempotent() {
        let builder = PromptBuilder::new("Spanish");
        let contexts = chunks(&[("one", 0.5), ("one", 0.4)]);
        let first = builder.build("¿Qué?", &contexts);
        let second = builder.build("¿Qué?", &contexts);
        assert_eq!(first, second);
        // Duplicates are kept
        assert_eq!(first.matches("one").count(), 2);
    }
}
