//! Prompt construction for the support chatbot

/// Persona and tone instructions prepended to every user message
pub const SYSTEM_PROMPT: &str = "You are a compassionate mental health support chatbot named 'MindfulBot'. \
Provide helpful, empathetic responses while being clear that you are not a replacement for professional mental health care. \
Always encourage users to seek professional help when appropriate. \
Keep responses supportive, non-judgmental, and under 200 words. \
Focus on active listening, validation, and gentle guidance.";

/// Closing cue after the user message
pub const RESPONSE_CUE: &str = "Please respond with empathy and support:";

/// Combine the system prompt and the literal user message into one payload
pub fn build_prompt(user_message: &str) -> String {
    format!("{SYSTEM_PROMPT}\n\nUser message: {user_message}\n\n{RESPONSE_CUE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("I feel anxious today");
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with(RESPONSE_CUE));

        let label = prompt.find("User message: I feel anxious today").unwrap();
        assert!(label > SYSTEM_PROMPT.len());
        assert!(label < prompt.len() - RESPONSE_CUE.len());
    }

    #[test]
    fn test_message_kept_verbatim() {
        let message = "  line one\nline \"two\" {braces}  ";
        let prompt = build_prompt(message);
        assert!(prompt.contains(&format!("User message: {message}\n\n")));
    }

    #[test]
    fn test_persona_mentions_limits() {
        assert!(SYSTEM_PROMPT.contains("MindfulBot"));
        assert!(SYSTEM_PROMPT.contains("under 200 words"));
        assert!(SYSTEM_PROMPT.contains("not a replacement for professional mental health care"));
    }
}
