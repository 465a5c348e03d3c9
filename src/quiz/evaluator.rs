use std::collections::BTreeMap;

use crate::quiz::{AnswerRecord, ResultSummary, StepDefinition};

/// Reduces the answers of a finished flow into a [`ResultSummary`].
///
/// Scored steps count only on an exact, case-sensitive match. Steps without a
/// correct answer are profiling questions and their raw answers are collected.
pub fn evaluate(steps: &[StepDefinition], answers: &AnswerRecord) -> ResultSummary {
    let mut correct_count = 0;
    let mut collected_fields = BTreeMap::new();

    for step in steps {
        let given = answers.get(&step.id);
        match &step.correct_answer {
            Some(expected) => {
                if given == Some(expected) {
                    correct_count += 1;
                }
            }
            None => {
                if let Some(value) = given {
                    collected_fields.insert(step.id.clone(), value.clone());
                }
            }
        }
    }

    ResultSummary {
        correct_count,
        total: steps.len(),
        collected_fields,
    }
}

/// A scored step the user got wrong.
#[derive(Debug, Clone, PartialEq)]
pub struct Mistake<'a> {
    pub step: &'a StepDefinition,
    pub given: Option<&'a str>,
    pub expected: &'a str,
}

pub fn review<'a>(steps: &'a [StepDefinition], answers: &'a AnswerRecord) -> Vec<Mistake<'a>> {
    steps
        .iter()
        .filter_map(|step| {
            let expected = step.correct_answer.as_deref()?;
            let given = answers.get(&step.id).map(String::as_str);
            (given != Some(expected)).then_some(Mistake {
                step,
                given,
                expected,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{steps, ChoiceOption};

    fn record(pairs: &[(&str, &str)]) -> AnswerRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn quiz_with_three_exact_matches() {
        let flow = steps::default_quiz();
        let answers = record(&[
            ("compilation", "compilation is the process"),
            ("programming_language", "JavaScript"),
            ("oop", "OOP is a programming paradigm"),
            ("api", "Advanced Programming Integration"),
            ("database", "a database is an organized collection"),
        ]);
        let summary = evaluate(flow.steps(), &answers);
        assert_eq!(summary.correct_count, 3);
        assert_eq!(summary.total, 5);
        assert!(summary.collected_fields.is_empty());
        assert_eq!(summary.percentage(), 60);
    }

    #[test]
    fn profiler_collects_every_answer() {
        let flow = steps::onboarding_profiler();
        let answers = record(&[
            ("examType", "university"),
            ("mainGoal", "top_score"),
            ("studyPreference", "quizzes"),
            ("confidence", "unsure"),
            ("challenge", "motivation"),
        ]);
        let summary = evaluate(flow.steps(), &answers);
        assert_eq!(summary.correct_count, 0);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.collected_fields.len(), 5);
        assert_eq!(summary.collected_fields["mainGoal"], "top_score");
        assert_eq!(summary.collected_fields["challenge"], "motivation");
    }

    #[test]
    fn two_single_choice_steps_with_wrong_answer() {
        let options = vec![
            ChoiceOption::new("a", "A", "A"),
            ChoiceOption::new("b", "B", "B"),
            ChoiceOption::new("c", "C", "C"),
        ];
        let defs = vec![
            StepDefinition::single_choice("one", "First", options.clone()),
            StepDefinition::single_choice("two", "Second", options).with_correct_answer("C"),
        ];
        let answers = record(&[("one", "A"), ("two", "B")]);
        let summary = evaluate(&defs, &answers);
        assert_eq!(summary.correct_count, 0);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.collected_fields.get("one").map(String::as_str), Some("A"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let defs = vec![StepDefinition::free_text("t", "?").with_correct_answer("Rust")];
        assert_eq!(evaluate(&defs, &record(&[("t", "rust")])).correct_count, 0);
        assert_eq!(evaluate(&defs, &record(&[("t", "Rust ")])).correct_count, 0);
        assert_eq!(evaluate(&defs, &record(&[("t", "Rust")])).correct_count, 1);
    }

    #[test]
    fn evaluate_is_deterministic() {
        let flow = steps::default_quiz();
        let answers = record(&[("programming_language", "CSS")]);
        assert_eq!(
            evaluate(flow.steps(), &answers),
            evaluate(flow.steps(), &answers)
        );
    }

    #[test]
    fn review_lists_wrong_and_missing_answers() {
        let defs = vec![
            StepDefinition::free_text("a", "?").with_correct_answer("x"),
            StepDefinition::free_text("b", "?").with_correct_answer("y"),
            StepDefinition::free_text("c", "?").with_correct_answer("z"),
            StepDefinition::free_text("profile", "?"),
        ];
        let answers = record(&[("a", "x"), ("b", "nope"), ("profile", "anything")]);
        let mistakes = review(&defs, &answers);
        assert_eq!(mistakes.len(), 2);
        assert_eq!(mistakes[0].step.id, "b");
        assert_eq!(mistakes[0].given, Some("nope"));
        assert_eq!(mistakes[0].expected, "y");
        assert_eq!(mistakes[1].step.id, "c");
        assert_eq!(mistakes[1].given, None);
    }
}
