use std::time::Duration;

use chatgpt::config::ChatGPTEngine;
use chatgpt::prelude::*;
use chatgpt::types::CompletionResponse;
use log::debug;
use rand::seq::SliceRandom;

use crate::error::TutorError;
use crate::quiz::evaluator::Mistake;

/// The study chat partner. Every reply is an async call that may fail, so
/// callers decide how to degrade (the quiz falls back to stating the answer).
pub enum Tutor {
    /// Offline replies picked at random after a fixed delay.
    Canned { delay: Duration },
    ChatGpt(ChatGPT),
}

impl Tutor {
    pub fn canned(delay: Duration) -> Self {
        Tutor::Canned { delay }
    }

    pub fn chat_gpt(api_key: &str, timeout: Duration) -> std::result::Result<Self, TutorError> {
        let mut gpt = ChatGPT::new(api_key)?;
        gpt.config.engine = ChatGPTEngine::Gpt35Turbo;
        gpt.config.timeout = timeout;
        Ok(Tutor::ChatGpt(gpt))
    }

    pub async fn reply(
        &self,
        history: &[ChatLine],
        message: &str,
    ) -> std::result::Result<String, TutorError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TutorError::EmptyMessage);
        }

        match self {
            Tutor::Canned { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(canned_reply(message))
            }
            Tutor::ChatGpt(gpt) => {
                let conversation = history
                    .iter()
                    .map(|line| format!("{}: {}", line.role.speaker(), line.content))
                    .collect::<Vec<_>>()
                    .join("\n");
                let prompt = format!(
                    "You are BusyBuddy, a friendly study assistant helping a student prepare for exams.
                    Answer the student's last message briefly and encouragingly, in at most 3 short paragraphs.
                    Conversation so far:
                    {}
                    Student: {}",
                    conversation, message
                );
                ask(gpt, &prompt).await
            }
        }
    }

    pub async fn explain_mistake(
        &self,
        mistake: &Mistake<'_>,
    ) -> std::result::Result<String, TutorError> {
        match self {
            Tutor::Canned { delay } => {
                tokio::time::sleep(*delay).await;
                Ok(format!(
                    "The expected answer was \"{}\". Try to remember the key idea and give it another go!",
                    mistake.step.display_answer(mistake.expected)
                ))
            }
            Tutor::ChatGpt(gpt) => {
                let prompt = format!(
                    "You are BusyBuddy, a friendly study assistant.
                    A student answered the quiz question \"{}\" with \"{}\", but the expected answer is \"{}\".
                    Explain the mistake in one or two sentences, limit 300 characters.",
                    mistake.step.prompt,
                    mistake.given.unwrap_or("(no answer)"),
                    mistake.expected
                );
                ask(gpt, &prompt).await
            }
        }
    }
}

async fn ask(gpt: &ChatGPT, prompt: &str) -> std::result::Result<String, TutorError> {
    debug!("Sending prompt to ChatGPT: {:?}", prompt);
    let response: CompletionResponse = gpt.send_message(prompt).await?;
    let content = response.message().clone().content;
    debug!("Completion: {:?}", content);
    Ok(content)
}

pub const MAX_TRANSCRIPT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    fn speaker(&self) -> &'static str {
        match self {
            ChatRole::User => "Student",
            ChatRole::Assistant => "BusyBuddy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatLine {
    pub role: ChatRole,
    pub content: String,
}

impl ChatLine {
    pub fn new(role: ChatRole, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
        }
    }
}

/// Appends a line, dropping the oldest ones beyond [`MAX_TRANSCRIPT`].
pub fn push_capped(transcript: &mut Vec<ChatLine>, line: ChatLine) {
    transcript.push(line);
    if transcript.len() > MAX_TRANSCRIPT {
        let excess = transcript.len() - MAX_TRANSCRIPT;
        transcript.drain(..excess);
    }
}

const CANNED_REPLIES: [&str; 4] = [
    "I understand you said: \"{}\". This is a dummy response for testing purposes.",
    "That's interesting! You mentioned \"{}\". How can I help you further?",
    "I see. You're asking about \"{}\". Let me think about that...",
    "Great question! Regarding \"{}\", let me provide some insights.",
];

fn canned_reply(message: &str) -> String {
    let template = CANNED_REPLIES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&CANNED_REPLIES[0]);
    template.replacen("{}", message, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::StepDefinition;

    #[tokio::test]
    async fn canned_reply_echoes_message() {
        let tutor = Tutor::canned(Duration::ZERO);
        let reply = tutor.reply(&[], "  what is a compiler?  ").await.unwrap();
        assert!(reply.contains("\"what is a compiler?\""), "{reply}");
        assert!(!reply.contains("{}"));
    }

    #[tokio::test]
    async fn empty_message_gets_no_reply() {
        let tutor = Tutor::canned(Duration::ZERO);
        assert!(matches!(
            tutor.reply(&[], "   ").await,
            Err(TutorError::EmptyMessage)
        ));
    }

    #[test]
    fn transcript_keeps_latest_lines() {
        let mut transcript = Vec::new();
        for i in 0..25 {
            push_capped(&mut transcript, ChatLine::new(ChatRole::User, &i.to_string()));
        }
        assert_eq!(transcript.len(), MAX_TRANSCRIPT);
        assert_eq!(transcript[0].content, "5");
        assert_eq!(transcript[MAX_TRANSCRIPT - 1].content, "24");
    }

    #[tokio::test]
    async fn canned_explanation_names_expected_answer() {
        let step = StepDefinition::free_text("db", "Describe a database")
            .with_correct_answer("An organized collection");
        let mistake = Mistake {
            step: &step,
            given: Some("a table"),
            expected: "An organized collection",
        };
        let tutor = Tutor::canned(Duration::ZERO);
        let text = tutor.explain_mistake(&mistake).await.unwrap();
        assert!(text.contains("\"An organized collection\""));
    }
}
