use agora_core::{AgentMemory, MemoryError, Stance, StaticContext, ThoughtKind, VoteStance, NO_RESPONSE};
use proptest::prelude::*;

const SPEAKERS: [&str; 4] = ["resident_01", "resident_02", "resident_03", "planner"];

proptest! {
    #[test]
    fn history_never_holds_owner_utterances(
        events in prop::collection::vec((0usize..SPEAKERS.len(), "[a-z ]{0,20}"), 0..40)
    ) {
        let mut memory = AgentMemory::new("resident_01", StaticContext::new("g", "r", "l", "p"));
        let mut accepted = 0;

        for (speaker, content) in &events {
            match memory.add_utterance(SPEAKERS[*speaker], content) {
                Ok(()) => accepted += 1,
                Err(MemoryError::OwnUtterance(id)) => {
                    prop_assert_eq!(id.as_str(), "resident_01");
                    memory.add_own_utterance(content);
                }
            }
        }

        prop_assert_eq!(memory.history_len(), accepted);
        prop_assert!(memory.conversation_history().all(|(speaker, _)| speaker != "resident_01"));
        prop_assert_eq!(
            memory.think_trace().filter(|(kind, _)| *kind == ThoughtKind::OwnUtterance).count(),
            events.len() - accepted
        );
    }

    #[test]
    fn stance_labels_tolerate_case_and_separators(index in 0usize..4, upper in any::<bool>(), dash in any::<bool>()) {
        let stance = Stance::ALL[index];
        let mut label = stance.as_str().to_string();
        if upper {
            label = label.to_uppercase();
        }
        if dash {
            label = label.replace('_', "-");
        }
        prop_assert_eq!(label.parse::<Stance>().ok(), Some(stance));
    }
}

#[test]
fn sentinel_is_never_a_label() {
    assert!(NO_RESPONSE.parse::<Stance>().is_err());
    assert!(NO_RESPONSE.parse::<VoteStance>().is_err());
}
