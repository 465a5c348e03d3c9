use std::collections::HashSet;

use crate::error::FlowError;
use crate::quiz::{evaluator, FlowState, ResultSummary, StepDefinition, StepKind};

/// An ordered, validated set of steps and the transitions over a [`FlowState`].
///
/// Transitions never mutate the state they are given; they return the next one.
#[derive(Debug, Clone)]
pub struct StepFlow {
    steps: Vec<StepDefinition>,
}

impl StepFlow {
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, FlowError> {
        if steps.is_empty() {
            return Err(FlowError::InvalidDefinition(
                "a flow needs at least one step".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(FlowError::InvalidDefinition(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
            if let StepKind::SingleChoice { options } = &step.kind {
                if options.is_empty() {
                    return Err(FlowError::InvalidDefinition(format!(
                        "single-choice step '{}' has no options",
                        step.id
                    )));
                }
                if let Some(correct) = &step.correct_answer {
                    if !options.iter().any(|o| &o.value == correct) {
                        return Err(FlowError::InvalidDefinition(format!(
                            "correct answer '{}' of step '{}' is not one of its options",
                            correct, step.id
                        )));
                    }
                }
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn restart(&self) -> FlowState {
        FlowState::default()
    }

    pub fn current<'a>(&'a self, state: &FlowState) -> Result<&'a StepDefinition, FlowError> {
        self.steps
            .get(state.current_index)
            .ok_or(FlowError::OutOfRange {
                index: state.current_index,
                len: self.steps.len(),
            })
    }

    /// Answer previously recorded for the current step, if the user went back to it.
    pub fn previous_answer<'a>(&self, state: &'a FlowState) -> Option<&'a str> {
        let step = self.current(state).ok()?;
        state.answers.get(&step.id).map(String::as_str)
    }

    pub fn advance(&self, state: &FlowState, answer: &str) -> Result<FlowState, FlowError> {
        if state.is_complete {
            return Err(FlowError::OutOfRange {
                index: state.current_index + 1,
                len: self.steps.len(),
            });
        }
        let step = self.current(state)?;
        validate_answer(step, answer)?;

        let mut next = state.clone();
        next.answers.insert(step.id.clone(), answer.to_string());
        if state.current_index + 1 == self.steps.len() {
            next.is_complete = true;
        } else {
            next.current_index += 1;
        }
        Ok(next)
    }

    pub fn retreat(&self, state: &FlowState) -> FlowState {
        let mut next = state.clone();
        if next.current_index > 0 {
            next.current_index -= 1;
            next.is_complete = false;
        }
        next
    }

    /// Retreats, failing when the resulting step doesn't exist (a stored state
    /// outliving a shorter step set).
    pub fn step_back(&self, state: &FlowState) -> Result<FlowState, FlowError> {
        let previous = self.retreat(state);
        self.current(&previous)?;
        Ok(previous)
    }

    /// `None` until the last step has been answered.
    pub fn result(&self, state: &FlowState) -> Option<ResultSummary> {
        state
            .is_complete
            .then(|| evaluator::evaluate(&self.steps, &state.answers))
    }
}

fn validate_answer(step: &StepDefinition, answer: &str) -> Result<(), FlowError> {
    if answer.trim().is_empty() {
        return Err(FlowError::Validation {
            step_id: step.id.clone(),
            reason: "an answer is required".to_string(),
        });
    }

    match &step.kind {
        StepKind::SingleChoice { options } => {
            if options.iter().any(|o| o.value == answer) {
                Ok(())
            } else {
                Err(FlowError::Validation {
                    step_id: step.id.clone(),
                    reason: format!("'{}' is not one of the options", answer),
                })
            }
        }
        StepKind::FreeText | StepKind::AudioCapture => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{steps, ChoiceOption, PLACEHOLDER_TRANSCRIPT};

    fn abc_step(id: &str) -> StepDefinition {
        StepDefinition::single_choice(
            id,
            "Pick one",
            vec![
                ChoiceOption::new("a", "A", "A"),
                ChoiceOption::new("b", "B", "B"),
                ChoiceOption::new("c", "C", "C"),
            ],
        )
    }

    fn three_step_flow() -> StepFlow {
        StepFlow::new(vec![
            abc_step("first"),
            StepDefinition::free_text("second", "Explain"),
            StepDefinition::audio_capture("third", "Say it"),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_bad_definitions() {
        assert!(matches!(
            StepFlow::new(vec![]),
            Err(FlowError::InvalidDefinition(_))
        ));
        assert!(matches!(
            StepFlow::new(vec![abc_step("x"), abc_step("x")]),
            Err(FlowError::InvalidDefinition(_))
        ));
        assert!(matches!(
            StepFlow::new(vec![StepDefinition::single_choice("x", "?", vec![])]),
            Err(FlowError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn rejects_unreachable_correct_answer() {
        let step = abc_step("pick").with_correct_answer("D");
        let err = StepFlow::new(vec![step]).unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidDefinition(
                "correct answer 'D' of step 'pick' is not one of its options".to_string()
            )
        );
        assert!(StepFlow::new(vec![abc_step("pick").with_correct_answer("C")]).is_ok());
    }

    #[test]
    fn empty_answer_is_rejected_without_change() {
        let flow = three_step_flow();
        let state = flow.restart();
        for answer in ["", "   "] {
            let err = flow.advance(&state, answer).unwrap_err();
            assert!(matches!(err, FlowError::Validation { .. }));
        }
        assert_eq!(state, FlowState::default());

        let on_text = flow.advance(&state, "A").unwrap();
        assert!(matches!(
            flow.advance(&on_text, ""),
            Err(FlowError::Validation { .. })
        ));
        assert_eq!(on_text.current_index, 1);
    }

    #[test]
    fn single_choice_requires_known_option() {
        let flow = three_step_flow();
        let err = flow.advance(&flow.restart(), "D").unwrap_err();
        assert_eq!(
            err,
            FlowError::Validation {
                step_id: "first".to_string(),
                reason: "'D' is not one of the options".to_string(),
            }
        );
    }

    #[test]
    fn n_advances_complete_the_flow() {
        let flow = three_step_flow();
        let mut state = flow.restart();
        for answer in ["B", "some text", PLACEHOLDER_TRANSCRIPT] {
            assert!(!state.is_complete);
            state = flow.advance(&state, answer).unwrap();
        }
        assert!(state.is_complete);
        assert_eq!(state.current_index, flow.len() - 1);
        assert_eq!(state.answers.len(), 3);
        assert_eq!(state.answers["third"], PLACEHOLDER_TRANSCRIPT);
    }

    #[test]
    fn advancing_a_complete_flow_is_out_of_range() {
        let flow = StepFlow::new(vec![abc_step("only")]).unwrap();
        let done = flow.advance(&flow.restart(), "C").unwrap();
        assert!(done.is_complete);
        assert_eq!(
            flow.advance(&done, "A"),
            Err(FlowError::OutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn current_past_the_end_is_out_of_range() {
        let flow = three_step_flow();
        let broken = FlowState {
            current_index: 3,
            ..FlowState::default()
        };
        assert_eq!(
            flow.current(&broken),
            Err(FlowError::OutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn retreat_at_start_is_a_no_op() {
        let flow = three_step_flow();
        let state = flow.restart();
        assert_eq!(flow.retreat(&state), state);
    }

    #[test]
    fn retreat_restores_previous_answer() {
        let flow = three_step_flow();
        let state = flow.advance(&flow.restart(), "C").unwrap();
        assert_eq!(flow.previous_answer(&state), None);

        let back = flow.retreat(&state);
        assert_eq!(back.current_index, 0);
        assert_eq!(flow.previous_answer(&back), Some("C"));
    }

    #[test]
    fn step_back_from_stale_state_is_out_of_range() {
        let flow = three_step_flow();
        let stale = FlowState {
            current_index: 7,
            ..FlowState::default()
        };
        assert_eq!(
            flow.step_back(&stale),
            Err(FlowError::OutOfRange { index: 6, len: 3 })
        );

        let state = flow.advance(&flow.restart(), "A").unwrap();
        assert_eq!(flow.step_back(&state).unwrap().current_index, 0);
    }

    #[test]
    fn retreat_then_advance_round_trips() {
        let flow = three_step_flow();
        let state = flow.advance(&flow.restart(), "A").unwrap();
        let state = flow.advance(&state, "why not").unwrap();
        let back = flow.retreat(&state);
        let again = flow.advance(&back, "why not").unwrap();
        assert_eq!(again, state);
    }

    #[test]
    fn retreat_reopens_a_complete_flow() {
        let flow = three_step_flow();
        let mut state = flow.restart();
        for answer in ["A", "text", "voice"] {
            state = flow.advance(&state, answer).unwrap();
        }
        let back = flow.retreat(&state);
        assert!(!back.is_complete);
        assert_eq!(back.current_index, 1);
        assert!(flow.result(&back).is_none());
    }

    #[test]
    fn index_stays_in_bounds_for_mixed_sequences() {
        let flow = steps::default_quiz();
        let answers = ["voice", "JavaScript", "text", "Application Programming Interface", "db"];
        let mut state = flow.restart();
        // Deterministic walk: forward twice, back once, repeated past the end.
        for round in 0..20 {
            for _ in 0..2 {
                let answer = answers[state.current_index];
                match flow.advance(&state, answer) {
                    Ok(next) => state = next,
                    Err(FlowError::OutOfRange { .. }) => assert!(state.is_complete),
                    Err(other) => panic!("unexpected error: {other}"),
                }
                assert!(state.current_index < flow.len());
            }
            if round % 3 != 2 {
                state = flow.retreat(&state);
                assert!(state.current_index < flow.len());
            }
        }
    }

    #[test]
    fn restart_discards_progress() {
        let flow = three_step_flow();
        let state = flow.advance(&flow.restart(), "A").unwrap();
        assert_ne!(state, FlowState::default());
        assert_eq!(flow.restart(), FlowState::default());
    }
}
