use std::io::Read;

use crate::error::FlowError;
use crate::quiz::navigator::StepFlow;
use crate::quiz::{ChoiceOption, StepDefinition};

/// The five profiling questions asked once, right after the email is verified.
pub fn onboarding_profiler() -> StepFlow {
    let steps = vec![
        StepDefinition::single_choice(
            "examType",
            "Which exam are you preparing for?",
            vec![
                ChoiceOption::new("university", "University/ Polytechnic Exam", "university"),
                ChoiceOption::new("professional", "Professional / Certification Exam", "professional"),
            ],
        ),
        StepDefinition::single_choice(
            "mainGoal",
            "What's your main goal?",
            vec![
                ChoiceOption::new("good_grades", "Pass with good grades", "good_grades"),
                ChoiceOption::new("top_score", "Get a top score / distinction", "top_score"),
                ChoiceOption::new("weak_subjects", "Improve weak subjects", "weak_subjects"),
                ChoiceOption::new(
                    "build_confidence",
                    "Build confidence & consistency",
                    "build_confidence",
                ),
            ],
        ),
        StepDefinition::single_choice(
            "studyPreference",
            "How do you prefer to study?",
            vec![
                ChoiceOption::new("reading", "Reading summaries & notes", "reading"),
                ChoiceOption::new("past_questions", "Practicing past questions", "past_questions"),
                ChoiceOption::new("lessons", "Watching lessons or tutorials", "lessons"),
                ChoiceOption::new("quizzes", "Interactive quizzes & games", "quizzes"),
            ],
        ),
        StepDefinition::single_choice(
            "confidence",
            "How confident do you feel about your exam prep right now?",
            vec![
                ChoiceOption::new("very_confident", "Very confident", "very_confident"),
                ChoiceOption::new("somewhat_ready", "Somewhat ready", "somewhat_ready"),
                ChoiceOption::new("unsure", "A bit unsure", "unsure"),
                ChoiceOption::new("not_confident", "Not confident yet", "not_confident"),
            ],
        ),
        StepDefinition::single_choice(
            "challenge",
            "What's your biggest challenge with studying?",
            vec![
                ChoiceOption::new("staying_consistent", "Staying consistent", "staying_consistent"),
                ChoiceOption::new(
                    "difficult_topics",
                    "Understanding difficult topics",
                    "difficult_topics",
                ),
                ChoiceOption::new("time_management", "Time management", "time_management"),
                ChoiceOption::new("distractions", "Distractions / focus", "distractions"),
                ChoiceOption::new("motivation", "Lack of Motivation", "motivation"),
            ],
        ),
    ];
    StepFlow::new(steps).expect("onboarding steps are well formed")
}

/// Mixed quiz used when no quiz file is configured.
pub fn default_quiz() -> StepFlow {
    let steps = vec![
        StepDefinition::audio_capture(
            "compilation",
            "What is Compilation process, and its ability to compile",
        )
        .with_correct_answer("compilation is the process"),
        StepDefinition::single_choice(
            "programming_language",
            "Which of the following is a programming language?",
            vec![
                ChoiceOption::new("1", "JavaScript", "JavaScript"),
                ChoiceOption::new("2", "HTML", "HTML"),
                ChoiceOption::new("3", "CSS", "CSS"),
                ChoiceOption::new("4", "XML", "XML"),
            ],
        )
        .with_correct_answer("JavaScript"),
        StepDefinition::free_text("oop", "Explain the concept of object-oriented programming")
            .with_correct_answer("OOP is a programming paradigm"),
        StepDefinition::single_choice(
            "api",
            "What does API stand for?",
            vec![
                ChoiceOption::new(
                    "1",
                    "Application Programming Interface",
                    "Application Programming Interface",
                ),
                ChoiceOption::new(
                    "2",
                    "Advanced Programming Integration",
                    "Advanced Programming Integration",
                ),
                ChoiceOption::new("3", "Application Process Interface", "Application Process Interface"),
                ChoiceOption::new("4", "Automated Programming Index", "Automated Programming Index"),
            ],
        )
        .with_correct_answer("Application Programming Interface"),
        StepDefinition::free_text("database", "Describe what a database is")
            .with_correct_answer("A database is an organized collection"),
    ];
    StepFlow::new(steps).expect("default quiz steps are well formed")
}

/// Reads a JSON array of step definitions and validates it as a flow.
pub fn load_steps<R: Read>(reader: R) -> Result<StepFlow, FlowError> {
    let steps: Vec<StepDefinition> = serde_json::from_reader(reader)
        .map_err(|e| FlowError::InvalidDefinition(e.to_string()))?;
    StepFlow::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::StepKind;

    #[test]
    fn builtin_sets_have_five_steps() {
        let profiler = onboarding_profiler();
        assert_eq!(profiler.len(), 5);
        assert!(profiler.steps().iter().all(|s| s.correct_answer.is_none()));
        assert!(profiler
            .steps()
            .iter()
            .all(|s| matches!(s.kind, StepKind::SingleChoice { .. })));

        let quiz = default_quiz();
        assert_eq!(quiz.len(), 5);
        assert!(quiz.steps().iter().all(|s| s.correct_answer.is_some()));
        let kinds: Vec<_> = quiz.steps().iter().map(|s| s.kind_name()).collect();
        assert_eq!(
            kinds,
            ["audio-capture", "single-choice", "free-text", "single-choice", "free-text"]
        );
    }

    #[test]
    fn every_scored_choice_step_can_be_answered_correctly() {
        let quiz = default_quiz();
        for step in quiz.steps() {
            if let (StepKind::SingleChoice { options }, Some(correct)) = (&step.kind, &step.correct_answer) {
                assert!(options.iter().any(|o| &o.value == correct), "{}", step.id);
            }
        }
    }

    #[test]
    fn loads_steps_from_json() {
        let json = r#"[
            {"id": "capital", "prompt": "Capital of France?", "kind": "single-choice",
             "options": [{"id": "1", "label": "Paris", "value": "paris"},
                         {"id": "2", "label": "Rome", "value": "rome"}],
             "correct_answer": "paris"},
            {"id": "why", "prompt": "Why?", "kind": "free-text"},
            {"id": "say", "prompt": "Say hello", "kind": "audio-capture", "correct_answer": "hello"}
        ]"#;
        let flow = load_steps(json.as_bytes()).unwrap();
        assert_eq!(flow.len(), 3);
        assert_eq!(flow.steps()[0].options().len(), 2);
        assert_eq!(flow.steps()[1].kind, StepKind::FreeText);
        assert_eq!(flow.steps()[2].correct_answer.as_deref(), Some("hello"));
    }

    #[test]
    fn rejects_malformed_json() {
        let unknown_kind = r#"[{"id": "x", "prompt": "?", "kind": "drawing"}]"#;
        assert!(matches!(
            load_steps(unknown_kind.as_bytes()),
            Err(FlowError::InvalidDefinition(_))
        ));
        let stray_options = r#"[{"id": "say", "prompt": "Say it", "kind": "audio-capture",
            "options": [{"id": "1", "label": "Hi", "value": "hi"}]}]"#;
        assert!(matches!(
            load_steps(stray_options.as_bytes()),
            Err(FlowError::InvalidDefinition(_))
        ));
        let unreachable_answer = r#"[{"id": "capital", "prompt": "Capital?", "kind": "single-choice",
            "options": [{"id": "1", "label": "Paris", "value": "paris"}],
            "correct_answer": "rome"}]"#;
        assert!(matches!(
            load_steps(unreachable_answer.as_bytes()),
            Err(FlowError::InvalidDefinition(_))
        ));
        assert!(matches!(
            load_steps("[]".as_bytes()),
            Err(FlowError::InvalidDefinition(_))
        ));
    }
}
