//! Grounded prompt composition.

/// Answer returned when retrieval finds nothing usable. Inference is skipped.
pub const NOT_FOUND_MESSAGE: &str =
    "I couldn't find relevant documentation in the offline knowledge base for that query.";

/// What the model is told to say when the context lacks the answer.
pub const REFUSAL_SENTENCE: &str = "I cannot answer that question based on the provided documents.";

/// Wrap retrieved `context` and the user's `query` in the field-engineering instruction.
pub fn compose_prompt(context: &str, query: &str) -> String {
    format!(
        "\nYou are an expert Field Engineering assistant. Answer the user's question ONLY using the information\n\
         contained in the CONTEXT below. If the context does not contain the answer, say:\n\
         \"{REFUSAL_SENTENCE}\"\n\
         \n\
         --- CONTEXT START ---\n\
         {context}\n\
         --- CONTEXT END ---\n\
         \n\
         USER QUESTION: {query}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_fenced_and_question_last() {
        let prompt = compose_prompt("The sky is blue.", "What color is the sky?");
        let start = prompt.find("--- CONTEXT START ---").unwrap();
        let body = prompt.find("The sky is blue.").unwrap();
        let end = prompt.find("--- CONTEXT END ---").unwrap();
        let question = prompt.find("USER QUESTION: What color is the sky?").unwrap();
        assert!(start < body && body < end && end < question);
    }

    #[test]
    fn instruction_names_the_refusal() {
        let prompt = compose_prompt("ctx", "q");
        assert!(prompt.contains("Field Engineering assistant"));
        assert!(prompt.contains(REFUSAL_SENTENCE));
    }
}
