//! End-to-end parsing behaviour through the public API

use agora_core::{Attitude, ReactionType};
use agora_debate::{
    nomination, parse_structured, NoRepair, Nomination, ReactionResponse, Repairer, UtteranceResponse,
};
use agora_llm::{LlmError, LlmProvider, MockProvider, MockReply};
use async_trait::async_trait;

/// Routes repair prompts to a mock provider, the way the runtime does
struct ProviderRepairer<'a>(&'a MockProvider);

#[async_trait]
impl Repairer for ProviderRepairer<'_> {
    async fn repair(&self, prompt: &str) -> Result<String, LlmError> {
        self.0.ask(prompt).await
    }
}

#[tokio::test]
async fn test_json_fence_decodes_without_repair() {
    let mock = MockProvider::constant("{\"thought\": \"unused\"}");
    let raw = "```json\n{\"referenced_code\": \"resident_01_r1_01_r\", \"reaction_type\": \"Criticism\", \"thought\": \"The numbers do not add up.\"}\n```";

    let parsed = parse_structured::<ReactionResponse>(raw, &ProviderRepairer(&mock), 2)
        .await
        .unwrap();

    let reaction = parsed.value.expect("fenced JSON should decode");
    assert_eq!(reaction.reaction_type, ReactionType::Criticism);
    assert_eq!(parsed.repair_attempts, 0);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_legacy_single_target_normalizes_to_list() {
    let raw = r#"{"utterance": "What happens to renters?", "target": "resident_05", "attitude": "question"}"#;
    let parsed = parse_structured::<UtteranceResponse>(raw, &NoRepair, 0).await.unwrap();

    let utterance = parsed.value.unwrap();
    assert_eq!(
        utterance.nominations,
        vec![Nomination::new("resident_05", Some(Attitude::Question))]
    );
    assert_eq!(
        nomination::encode_list(&utterance.nominations),
        r#"[{"target":"resident_05","attitude":"question"}]"#
    );
}

#[tokio::test]
async fn test_unparseable_output_degrades_after_repairs() {
    let mock = MockProvider::constant("Sorry, I can only answer in prose.");
    let raw = "I think the plan is fine, mostly.";

    let parsed = parse_structured::<UtteranceResponse>(raw, &ProviderRepairer(&mock), 2)
        .await
        .unwrap();

    assert!(parsed.is_degraded());
    assert_eq!(parsed.free_text(), raw);
    assert_eq!(parsed.repair_attempts, 2);
    assert_eq!(mock.call_count(), 2);

    let repair_prompt = &mock.calls()[0].task;
    assert!(repair_prompt.contains("failed to parse"));
    assert!(repair_prompt.contains(raw));
}

#[tokio::test]
async fn test_repair_through_provider_recovers() {
    let mock = MockProvider::smart().with_script(vec![
        MockReply::Fail(LlmError::ConnectionFailed("reset".into())),
        MockReply::Text("{\"utterance\": \"Fixed.\", \"nominations\": null}".into()),
    ]);
    let parsed = parse_structured::<UtteranceResponse>("utterance = Fixed.", &ProviderRepairer(&mock), 2)
        .await
        .unwrap();

    assert!(!parsed.is_degraded());
    assert_eq!(parsed.repair_attempts, 2);
    assert!(parsed.value.unwrap().nominations.is_empty());
}
