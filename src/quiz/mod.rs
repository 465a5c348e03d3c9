pub mod evaluator;
pub mod navigator;
pub mod steps;
pub mod tutor;

use std::collections::{BTreeMap, HashMap};

/// Transcript recorded for an audio-capture step when the user sends a voice note.
/// There is no speech recognition behind it, the voice note only proves an answer was given.
pub const PLACEHOLDER_TRANSCRIPT: &str =
    "Compilation is the process of converting source code into executable code";

/// One question of a flow. Immutable once the flow is built.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawStep")]
pub struct StepDefinition {
    pub id: String,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: StepKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepKind {
    SingleChoice { options: Vec<ChoiceOption> },
    FreeText,
    AudioCapture,
}

/// Step as written in a quiz file, before `options` is checked against `kind`.
#[derive(serde::Deserialize)]
struct RawStep {
    id: String,
    prompt: String,
    kind: String,
    #[serde(default)]
    options: Option<Vec<ChoiceOption>>,
    #[serde(default)]
    correct_answer: Option<String>,
}

impl TryFrom<RawStep> for StepDefinition {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let kind = match (raw.kind.as_str(), raw.options) {
            ("single-choice", Some(options)) => StepKind::SingleChoice { options },
            ("single-choice", None) => {
                return Err(format!("single-choice step '{}' has no options", raw.id))
            }
            ("free-text" | "audio-capture", Some(_)) => {
                return Err(format!(
                    "{} step '{}' can't have options",
                    raw.kind, raw.id
                ))
            }
            ("free-text", None) => StepKind::FreeText,
            ("audio-capture", None) => StepKind::AudioCapture,
            (other, _) => return Err(format!("unknown step kind '{}'", other)),
        };
        Ok(Self {
            id: raw.id,
            prompt: raw.prompt,
            kind,
            correct_answer: raw.correct_answer,
        })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
    pub value: String,
}

impl ChoiceOption {
    pub fn new(id: &str, label: &str, value: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            value: value.to_string(),
        }
    }
}

impl StepDefinition {
    pub fn single_choice(id: &str, prompt: &str, options: Vec<ChoiceOption>) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind: StepKind::SingleChoice { options },
            correct_answer: None,
        }
    }

    pub fn free_text(id: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind: StepKind::FreeText,
            correct_answer: None,
        }
    }

    pub fn audio_capture(id: &str, prompt: &str) -> Self {
        Self {
            id: id.to_string(),
            prompt: prompt.to_string(),
            kind: StepKind::AudioCapture,
            correct_answer: None,
        }
    }

    pub fn with_correct_answer(mut self, answer: &str) -> Self {
        self.correct_answer = Some(answer.to_string());
        self
    }

    pub fn options(&self) -> &[ChoiceOption] {
        match &self.kind {
            StepKind::SingleChoice { options } => options,
            StepKind::FreeText | StepKind::AudioCapture => &[],
        }
    }

    /// Resolves what the user typed (or tapped) to an option value.
    /// Buttons carry labels, so both labels and raw values are accepted.
    pub fn option_value_for(&self, input: &str) -> Option<&str> {
        self.options()
            .iter()
            .find(|o| o.label == input || o.value == input)
            .map(|o| o.value.as_str())
    }

    /// Label to show for a stored answer; free-form answers are shown as is.
    pub fn display_answer<'a>(&'a self, answer: &'a str) -> &'a str {
        self.options()
            .iter()
            .find(|o| o.value == answer)
            .map(|o| o.label.as_str())
            .unwrap_or(answer)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            StepKind::SingleChoice { .. } => "single-choice",
            StepKind::FreeText => "free-text",
            StepKind::AudioCapture => "audio-capture",
        }
    }
}

/// Answers keyed by step id.
pub type AnswerRecord = HashMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlowState {
    pub current_index: usize,
    pub answers: AnswerRecord,
    pub is_complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultSummary {
    pub correct_count: usize,
    pub total: usize,
    pub collected_fields: BTreeMap<String, String>,
}

impl ResultSummary {
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        ((self.correct_count as f64 / self.total as f64) * 100.0).round() as u32
    }
}
