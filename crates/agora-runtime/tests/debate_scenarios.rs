//! Full runs against the mock provider

use agora_core::{ParticipantRecord, ParticipantSpec, ThoughtKind, NO_RESPONSE, PLANNER_ID};
use agora_llm::{smart_reply, Gateway, LlmError, MockProvider, ProviderRegistry, RetryPolicy};
use agora_persist::{ArtifactStore, MemoryStore};
use agora_runtime::{run_debate, DebateController, RunConfig, RunError, StaticPrompts, SynthesisConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn participants(n: usize) -> Vec<ParticipantRecord> {
    (1..=n)
        .map(|i| {
            ParticipantSpec::new(&format!("resident_{:02}", i))
                .with_attribute("occupation", "baker")
                .assign("mock")
        })
        .collect()
}

fn gateway(mock: Arc<MockProvider>) -> Arc<Gateway> {
    Arc::new(Gateway::new(
        ProviderRegistry::new().with("mock", mock),
        RetryPolicy::immediate(),
    ))
}

fn config(rounds: u32) -> RunConfig {
    RunConfig {
        rounds,
        ..Default::default()
    }
}

fn prompts() -> StaticPrompts {
    StaticPrompts::new("You are a resident.", "Debate the redevelopment plan.", "A hillside district.")
}

fn controller(n: usize, rounds: u32, mock: Arc<MockProvider>) -> DebateController {
    DebateController::new(
        config(rounds),
        prompts(),
        participants(n),
        gateway(mock),
        Arc::new(MemoryStore::new()),
    )
    .unwrap()
}

fn is_speaking(task: &str) -> bool {
    task.contains("It is your turn to speak")
}

/// Gives every utterance unique text so history entries can be counted
fn unique_speech_mock() -> MockProvider {
    let counter = AtomicUsize::new(0);
    MockProvider::with_responder(move |bundle| {
        if is_speaking(&bundle.task) {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let who = bundle.session.clone().unwrap_or_default();
            Ok(format!(r#"{{"utterance": "{} speech #{}", "nominations": []}}"#, who, n))
        } else {
            Ok(smart_reply(bundle))
        }
    })
}

#[tokio::test]
async fn test_three_participants_one_round() {
    let mut ctl = controller(3, 1, Arc::new(MockProvider::smart()));
    let summary = ctl.run().await.unwrap();
    let log = ctl.logger();

    let codes: Vec<&str> = log.utterances().iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["resident_01_r1_01_r", "resident_02_r1_02_r", "resident_03_r1_03_r"]);

    let reactions: Vec<_> = log
        .thinks()
        .iter()
        .filter(|r| r.payload.think_type() == "reaction")
        .collect();
    assert_eq!(reactions.len(), 6);

    let to_first: Vec<&str> = reactions
        .iter()
        .filter(|r| r.payload.referenced_code() == "resident_01_r1_01_r")
        .map(|r| r.participant_id.as_str())
        .collect();
    assert_eq!(to_first, vec!["resident_02", "resident_03"]);
    assert_eq!(reactions[0].code, "resident_02_r1_01_t");
    assert_eq!(reactions[5].code, "resident_02_r1_06_t");

    let reflection_turns: Vec<u32> = log
        .thinks()
        .iter()
        .filter(|r| r.payload.think_type() == "reflection")
        .map(|r| r.turn)
        .collect();
    assert_eq!(reflection_turns, vec![7, 8, 9]);

    let round_zero: Vec<(&str, u32)> = log
        .thinks()
        .iter()
        .filter(|r| r.round == 0)
        .map(|r| (r.payload.think_type(), r.turn))
        .collect();
    assert_eq!(
        round_zero,
        vec![("narrative", 1), ("narrative", 2), ("narrative", 3), ("initial", 4), ("initial", 5), ("initial", 6)]
    );

    let finals = log.thinks().iter().filter(|r| r.payload.think_type() == "final");
    assert!(finals.clone().all(|r| r.round == 2));
    assert_eq!(finals.count(), 3);

    assert_eq!(summary.utterances, 3);
    assert_eq!(summary.think_records, 6 + 6 + 3 + 3);
    assert_eq!(summary.degraded, 0);
    assert!(summary.votes.is_none());
}

#[tokio::test]
async fn test_speaking_timeout_degrades_and_run_continues() {
    let mock = Arc::new(MockProvider::with_responder(|bundle| {
        if bundle.session.as_deref() == Some("resident_02") && is_speaking(&bundle.task) {
            Err(LlmError::Timeout(Duration::from_secs(120)))
        } else {
            Ok(smart_reply(bundle))
        }
    }));
    let mut ctl = controller(3, 1, mock.clone());
    let summary = ctl.run().await.unwrap();
    let log = ctl.logger();

    let failed = &log.utterances()[1];
    assert_eq!(failed.code, "resident_02_r1_02_r");
    assert!(failed.degraded);
    assert_eq!(failed.attitude_column(), NO_RESPONSE);
    assert!(failed.content.contains("timed out"));

    // Listeners still react to the failure text
    let reactions = log
        .thinks()
        .iter()
        .filter(|r| r.payload.referenced_code() == "resident_02_r1_02_r")
        .count();
    assert_eq!(reactions, 2);
    let heard = ctl
        .memory("resident_01")
        .unwrap()
        .conversation_history()
        .any(|(speaker, content)| speaker == "resident_02" && content == failed.content);
    assert!(heard);

    let attempts = mock
        .calls()
        .iter()
        .filter(|b| b.session.as_deref() == Some("resident_02") && is_speaking(&b.task))
        .count();
    assert_eq!(attempts, 3);
    assert_eq!(summary.degraded, 1);
    assert_eq!(summary.gateway.exhausted, 1);
}

#[tokio::test]
async fn test_history_visibility() {
    let mut ctl = controller(4, 2, Arc::new(unique_speech_mock()));
    ctl.run().await.unwrap();

    let utterances = ctl.logger().utterances().to_vec();
    assert_eq!(utterances.len(), 8);

    for participant in ctl.participants() {
        let memory = ctl.memory(&participant.id).unwrap();
        let history: Vec<(&str, &str)> = memory.conversation_history().collect();

        assert!(history.iter().all(|(speaker, _)| *speaker != participant.id));
        for record in utterances.iter().filter(|r| r.participant_id != participant.id) {
            let seen = history
                .iter()
                .filter(|(speaker, content)| *speaker == record.participant_id && *content == record.content)
                .count();
            assert_eq!(seen, 1, "{} should hear {} once", participant.id, record.code);
        }

        let own: Vec<&str> = memory
            .think_trace()
            .filter(|(kind, _)| *kind == ThoughtKind::OwnUtterance)
            .map(|(_, content)| content)
            .collect();
        assert_eq!(own.len(), 2);
        assert_eq!(history.len(), 6);
    }
}

#[tokio::test]
async fn test_reactions_start_after_utterance_is_committed() {
    let mock = Arc::new(unique_speech_mock());
    let mut ctl = controller(3, 2, mock.clone());
    ctl.run().await.unwrap();

    let utterances = ctl.logger().utterances().to_vec();
    let calls = mock.calls();
    let mut checked = 0;

    for (index, bundle) in calls.iter().enumerate() {
        let Some(record) = utterances
            .iter()
            .find(|r| bundle.task.contains(&format!("(code: {})", r.code)))
        else {
            continue;
        };
        // The listener's memory already holds the utterance
        assert!(bundle.history.contains(&format!("[{}]: {}", record.participant_id, record.content)));

        // And the next speaker has not been asked yet
        let speaks_before = calls[..index].iter().filter(|b| is_speaking(&b.task)).count();
        let speeches_so_far = utterances.iter().position(|r| r.code == record.code).unwrap() + 1;
        assert_eq!(speaks_before, speeches_so_far);
        checked += 1;
    }
    assert_eq!(checked, 2 * 3 * 2);
}

#[tokio::test]
async fn test_synthesis_and_vote() {
    let store = Arc::new(MemoryStore::new());
    let config = RunConfig {
        rounds: 1,
        synthesis: Some(SynthesisConfig {
            planner_model: "mock".to_string(),
            planner_guide: "You are an urban planner.".to_string(),
        }),
        ..Default::default()
    };
    let mut ctl = DebateController::new(
        config,
        prompts(),
        participants(3),
        gateway(Arc::new(MockProvider::smart())),
        store.clone(),
    )
    .unwrap();
    let summary = ctl.run().await.unwrap();

    let planner = ctl
        .logger()
        .thinks()
        .iter()
        .find(|r| r.participant_id == PLANNER_ID)
        .unwrap();
    assert_eq!(planner.code, "planner_r3_01_t");

    let vote_codes: Vec<&str> = ctl
        .logger()
        .thinks()
        .iter()
        .filter(|r| r.payload.think_type() == "vote")
        .map(|r| r.code.as_str())
        .collect();
    assert_eq!(vote_codes, vec!["resident_01_r3_02_t", "resident_02_r3_03_t", "resident_03_r3_04_t"]);

    let tally = summary.votes.unwrap();
    assert_eq!(tally.conditional_accept, 3);
    assert_eq!(summary.adopted(), Some(true));
    assert!(summary.consensus.as_deref().unwrap().contains("relocation fund"));

    for participant in ctl.participants() {
        let heard_planner = ctl
            .memory(&participant.id)
            .unwrap()
            .conversation_history()
            .any(|(speaker, _)| speaker == PLANNER_ID);
        assert!(heard_planner);
    }

    let consensus = store.get("set1_lv2_consensus.json").await.unwrap().unwrap();
    let consensus: serde_json::Value = serde_json::from_slice(&consensus).unwrap();
    assert!(consensus["consensus"].as_str().unwrap().contains("relocation fund"));
    assert!(consensus["issues"].is_array());
}

#[tokio::test]
async fn test_permanent_error_aborts_run() {
    let mock = Arc::new(MockProvider::failing(LlmError::Authentication("invalid key".into())));
    let result = run_debate(
        config(1),
        prompts(),
        participants(2),
        gateway(mock.clone()),
        Arc::new(MemoryStore::new()),
    )
    .await;

    assert!(matches!(result, Err(RunError::Provider(LlmError::Authentication(_)))));
    // Narrative phase fans out once; nothing is retried
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_tables_are_saved_to_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(agora_persist::FileStore::new(dir.path()));
    let summary = run_debate(
        RunConfig {
            set_id: 4,
            level: 3,
            rounds: 1,
            ..Default::default()
        },
        prompts(),
        participants(2),
        gateway(Arc::new(MockProvider::smart())),
        store.clone(),
    )
    .await
    .unwrap();

    assert_eq!(summary.level, 3);
    assert_eq!(
        store.list().await.unwrap(),
        vec![
            "set4_lv3_agents.csv",
            "set4_lv3_debate.csv",
            "set4_lv3_think.csv",
            "set4_lv3_tokens.csv",
        ]
    );

    let agents = std::fs::read_to_string(store.path_of("set4_lv3_agents.csv")).unwrap();
    assert!(agents.contains("conditional_support,conditional_support"));
}

#[tokio::test]
async fn test_reserved_or_duplicate_ids_are_refused_before_any_call() {
    let planner_named = vec![
        ParticipantSpec::new(PLANNER_ID).assign("mock"),
        ParticipantSpec::new("resident_02").assign("mock"),
    ];
    let mut duplicated = participants(2);
    duplicated.push(ParticipantSpec::new("resident_01").assign("mock"));

    for records in [planner_named, duplicated] {
        let mock = Arc::new(MockProvider::smart());
        let built = DebateController::new(
            config(1),
            prompts(),
            records.clone(),
            gateway(mock.clone()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(built, Err(RunError::Config(_))));

        let synthesis = RunConfig {
            rounds: 1,
            synthesis: Some(SynthesisConfig {
                planner_model: "mock".to_string(),
                planner_guide: "You are an urban planner.".to_string(),
            }),
            ..Default::default()
        };
        let run = run_debate(synthesis, prompts(), records, gateway(mock.clone()), Arc::new(MemoryStore::new())).await;
        match run {
            Err(RunError::Config(message)) => assert!(message.contains("resident_01") || message.contains(PLANNER_ID)),
            other => panic!("expected a config error, got {:?}", other.map(|s| s.utterances)),
        }
        assert_eq!(mock.call_count(), 0);
    }
}
