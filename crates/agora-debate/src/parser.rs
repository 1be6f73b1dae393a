//! Tolerant structured-output parsing with a bounded LLM repair loop
//!
//! Decoding tries, in order: a direct decode of the trimmed reply, markdown
//! fence stripping followed by another direct decode, and the first balanced
//! `{...}` span. If all of that fails the raw text goes
//! back to the model with a fix-it instruction, up to `max_retries` times.
//! When repair is exhausted the caller gets a degraded result carrying the
//! raw text; parsing never aborts the run except on a permanent provider
//! error raised while repairing.

use agora_llm::LlmError;
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::responses::StructuredResponse;

/// Raw text beyond this many characters is cut from repair prompts
pub const REPAIR_INPUT_LIMIT: usize = 3000;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is a valid regex")
});

/// Why a structured decode failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("no JSON found in response")]
    NoJson,
    #[error("invalid {shape}: {reason}")]
    Decode { shape: &'static str, reason: String },
    #[error("repair call failed: {0}")]
    Repair(String),
    #[error("provider call failed: {0}")]
    Provider(String),
}

/// Outcome of [`parse_structured`]
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResult<T> {
    /// Decoded value; `None` when degraded
    pub value: Option<T>,
    /// Set when decoding and every repair attempt failed
    pub degraded: bool,
    /// The original model text, kept for audit and as free-text fallback
    pub raw: String,
    /// Repair calls made
    pub repair_attempts: u32,
    /// Last failure, for degraded results
    pub failure: Option<ParseFailure>,
}

impl<T> ParsedResult<T> {
    pub fn valid(value: T, raw: &str, repair_attempts: u32) -> Self {
        Self {
            value: Some(value),
            degraded: false,
            raw: raw.to_string(),
            repair_attempts,
            failure: None,
        }
    }

    pub fn degraded(raw: &str, repair_attempts: u32, failure: ParseFailure) -> Self {
        Self {
            value: None,
            degraded: true,
            raw: raw.to_string(),
            repair_attempts,
            failure: Some(failure),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// The free-text field of a degraded result
    pub fn free_text(&self) -> &str {
        &self.raw
    }
}

/// Sends a repair prompt to the model that produced the broken output
#[async_trait]
pub trait Repairer: Send + Sync {
    async fn repair(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Repairer that never gets a chance; used when repair is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRepair;

#[async_trait]
impl Repairer for NoRepair {
    async fn repair(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled("repair is disabled".to_string()))
    }
}

/// Content of the markdown fence around the reply, or of the first fence
/// opening at the start of a line, or the trimmed input if there is none.
/// Backticks in the middle of a line never open a fence.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let opened = trimmed
        .strip_prefix("```")
        .map(|rest| rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'));

    if let Some(body) = opened.and_then(|rest| rest.strip_suffix("```")) {
        return body.trim();
    }
    if let Some(inner) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }
    match opened {
        // Unterminated fence: drop the opener and its language tag
        Some(rest) => rest.trim(),
        None => trimmed,
    }
}

/// First balanced `open ... close` span, skipping delimiters inside strings
pub fn first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

fn decode_exact<T: StructuredResponse>(text: &str) -> Result<T, ParseFailure> {
    serde_json::from_str(text).map_err(|e| ParseFailure::Decode {
        shape: T::NAME,
        reason: e.to_string(),
    })
}

/// Decode without any model calls
pub fn decode<T: StructuredResponse>(raw: &str) -> Result<T, ParseFailure> {
    if let Ok(value) = decode_exact::<T>(raw.trim()) {
        return Ok(value);
    }
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(ParseFailure::NoJson);
    }
    let direct = match decode_exact::<T>(text) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    match first_balanced(text, '{', '}') {
        Some(span) if span.len() < text.len() => decode_exact(span),
        Some(_) => Err(direct),
        None => Err(ParseFailure::NoJson),
    }
}

/// Repair instruction for `raw`
pub fn repair_prompt(shape: &str, raw: &str) -> String {
    let truncated: String = raw.chars().take(REPAIR_INPUT_LIMIT).collect();
    format!(
        "The following text should be JSON but failed to parse.\n\
         Fix it so it matches this shape: {}\n\
         Output valid JSON only. Output nothing else.\n\n\
         Original:\n{}",
        shape, truncated
    )
}

/// Decode `raw` as `T`, repairing through `repairer` up to `max_retries`
/// times before degrading.
pub async fn parse_structured<T: StructuredResponse>(
    raw: &str,
    repairer: &dyn Repairer,
    max_retries: u32,
) -> Result<ParsedResult<T>, LlmError> {
    let mut failure = match decode::<T>(raw) {
        Ok(value) => return Ok(ParsedResult::valid(value, raw, 0)),
        Err(e) => e,
    };

    if max_retries == 0 {
        tracing::warn!(shape = T::NAME, error = %failure, "Structured decode failed, repair disabled");
        return Ok(ParsedResult::degraded(raw, 0, failure));
    }

    tracing::warn!(shape = T::NAME, error = %failure, "Structured decode failed, entering repair loop");
    let prompt = repair_prompt(&T::shape(), raw);

    for attempt in 1..=max_retries {
        match repairer.repair(&prompt).await {
            Ok(repaired) => match decode::<T>(&repaired) {
                Ok(value) => {
                    tracing::info!(shape = T::NAME, attempt, "Repair succeeded");
                    return Ok(ParsedResult::valid(value, raw, attempt));
                }
                Err(e) => {
                    tracing::warn!(shape = T::NAME, attempt, error = %e, "Repaired output still invalid");
                    failure = e;
                }
            },
            Err(e) if e.is_permanent() => return Err(e),
            Err(e) => {
                tracing::warn!(shape = T::NAME, attempt, error = %e, "Repair call failed");
                failure = ParseFailure::Repair(e.to_string());
            }
        }
    }

    tracing::warn!(shape = T::NAME, attempts = max_retries, "Repair exhausted, recording degraded result");
    Ok(ParsedResult::degraded(raw, max_retries, failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responses::{OpinionResponse, ReflectionResponse, UtteranceResponse};
    use agora_core::Stance;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replies from a fixed list and counts calls
    struct ScriptedRepairer {
        replies: Mutex<Vec<Result<String, LlmError>>>,
        calls: AtomicU32,
    }

    impl ScriptedRepairer {
        fn new(mut replies: Vec<Result<String, LlmError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Repairer for ScriptedRepairer {
        async fn repair(&self, _prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("still not json".to_string()))
        }
    }

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fences("Sure!\n```\n{\"a\": 1}\n```\nHope that helps."), "{\"a\": 1}");
        assert_eq!(strip_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_inline_backticks_do_not_open_a_fence() {
        let text = r#"{"thought": "They said ```rent control``` would fix it."}"#;
        assert_eq!(strip_fences(text), text);

        let fenced = "```json\n{\"thought\": \"a ```quoted``` phrase\"}\n```";
        assert_eq!(strip_fences(fenced), "{\"thought\": \"a ```quoted``` phrase\"}");
    }

    #[test]
    fn test_first_balanced_ignores_braces_in_strings() {
        let text = r#"Answer: {"thought": "use {curly} and \"quotes\""} trailing }"#;
        assert_eq!(
            first_balanced(text, '{', '}'),
            Some(r#"{"thought": "use {curly} and \"quotes\""}"#)
        );
        assert_eq!(first_balanced("no json here", '{', '}'), None);
        assert_eq!(first_balanced("{\"open\": ", '{', '}'), None);
    }

    #[tokio::test]
    async fn test_fenced_output_needs_no_repair() {
        let repairer = ScriptedRepairer::new(vec![]);
        let raw = "```json\n{\"utterance\": \"We need a relocation fund.\", \"nominations\": []}\n```";
        let parsed = parse_structured::<UtteranceResponse>(raw, &repairer, 2).await.unwrap();

        assert!(!parsed.is_degraded());
        assert_eq!(parsed.repair_attempts, 0);
        assert_eq!(parsed.value.unwrap().utterance, "We need a relocation fund.");
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backticks_inside_json_string_survive() {
        let repairer = ScriptedRepairer::new(vec![]);
        let raw = r#"{"thought": "They said ```rent control``` would fix it."}"#;
        let parsed = parse_structured::<ReflectionResponse>(raw, &repairer, 2).await.unwrap();

        assert!(!parsed.is_degraded());
        assert_eq!(parsed.value.unwrap().thought, "They said ```rent control``` would fix it.");
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 0);

        let fenced = "```json\n{\"thought\": \"a ```quoted``` phrase\"}\n```";
        let parsed = parse_structured::<ReflectionResponse>(fenced, &NoRepair, 0).await.unwrap();
        assert_eq!(parsed.value.unwrap().thought, "a ```quoted``` phrase");
    }

    #[tokio::test]
    async fn test_prose_wrapped_object_is_extracted() {
        let raw = "Here is my answer: {\"stance\": \"Oppose\", \"thought\": \"too costly\"} Thanks.";
        let parsed = parse_structured::<OpinionResponse>(raw, &NoRepair, 0).await.unwrap();
        assert_eq!(parsed.value.unwrap().stance, Stance::Oppose);
    }

    #[tokio::test]
    async fn test_repair_loop_recovers() {
        let repairer = ScriptedRepairer::new(vec![
            Ok("{broken".to_string()),
            Ok("{\"thought\": \"fixed\"}".to_string()),
        ]);
        let parsed = parse_structured::<ReflectionResponse>("thought: fixed", &repairer, 2)
            .await
            .unwrap();
        assert_eq!(parsed.repair_attempts, 2);
        assert_eq!(parsed.value.unwrap().thought, "fixed");
    }

    #[tokio::test]
    async fn test_exhausted_repair_degrades_with_raw_text() {
        let repairer = ScriptedRepairer::new(vec![
            Err(LlmError::Timeout(std::time::Duration::from_secs(1))),
            Ok("nope".to_string()),
        ]);
        let raw = "I refuse to answer in JSON.";
        let parsed = parse_structured::<OpinionResponse>(raw, &repairer, 2).await.unwrap();

        assert!(parsed.is_degraded());
        assert!(parsed.value.is_none());
        assert_eq!(parsed.free_text(), raw);
        assert_eq!(repairer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_out_of_set_label_enters_repair() {
        let repairer = ScriptedRepairer::new(vec![Ok(
            "{\"stance\": \"conditional_support\", \"thought\": \"ok\"}".to_string()
        )]);
        let raw = "{\"stance\": \"lukewarm\", \"thought\": \"ok\"}";
        let parsed = parse_structured::<OpinionResponse>(raw, &repairer, 1).await.unwrap();
        assert_eq!(parsed.repair_attempts, 1);
        assert_eq!(parsed.value.unwrap().stance, Stance::ConditionalSupport);
    }

    #[tokio::test]
    async fn test_permanent_repair_error_propagates() {
        let repairer = ScriptedRepairer::new(vec![Err(LlmError::Authentication("revoked".into()))]);
        let result = parse_structured::<ReflectionResponse>("garbage", &repairer, 2).await;
        assert!(matches!(result, Err(LlmError::Authentication(_))));
    }

    #[test]
    fn test_repair_prompt_truncates_input() {
        let raw = "x".repeat(REPAIR_INPUT_LIMIT + 500);
        let prompt = repair_prompt("{}", &raw);
        assert!(prompt.ends_with(&"x".repeat(REPAIR_INPUT_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(REPAIR_INPUT_LIMIT + 1)));
    }

    proptest! {
        #[test]
        fn prop_object_is_found_inside_prose(prefix in "[a-zA-Z .,!]{0,40}", suffix in "[a-zA-Z .,!]{0,40}", thought in "[a-zA-Z {}\\[\\]]{0,30}") {
            let object = serde_json::json!({ "thought": thought }).to_string();
            let raw = format!("{}{}{}", prefix, object, suffix);
            let decoded = decode::<ReflectionResponse>(&raw).unwrap();
            prop_assert_eq!(decoded.thought, thought);
        }
    }
}
