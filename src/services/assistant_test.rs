use super::*;
use std::sync::Mutex;
use tokio::time::Instant;

// =========================================================================
// MockLlm
// =========================================================================

/// Scripted LLM: pops one result per call and records when each call
/// arrived (against the tokio clock, which tests pause).
struct MockLlm {
    script: Mutex<Vec<Result<Generation, LlmError>>>,
    call_times: Mutex<Vec<Instant>>,
}

impl MockLlm {
    fn new(script: Vec<Result<Generation, LlmError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script), call_times: Mutex::new(Vec::new()) })
    }

    fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl GenerateText for MockLlm {
    async fn generate(&self, _prompt: &str, _max_output_tokens: u32) -> Result<Generation, LlmError> {
        self.call_times.lock().unwrap().push(Instant::now());
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            Ok(Generation { text: "unscripted".into(), tokens_used: None })
        } else {
            script.remove(0)
        }
    }
}

fn quota_error() -> LlmError {
    LlmError::ApiResponse { status: 429, body: "quota exceeded".into() }
}

fn ok_generation(text: &str) -> Result<Generation, LlmError> {
    Ok(Generation { text: text.into(), tokens_used: Some(42) })
}

fn turns(n: usize) -> Vec<Turn> {
    (0..n)
        .map(|i| Turn {
            role: if i % 2 == 0 { "user".into() } else { "assistant".into() },
            text: format!("turn-{i}"),
        })
        .collect()
}

// =========================================================================
// build_prompt
// =========================================================================

#[test]
fn prompt_is_deterministic() {
    let history = turns(4);
    let a = build_prompt("hello", Some("ctx"), &history);
    let b = build_prompt("hello", Some("ctx"), &history);
    assert_eq!(a, b);
}

#[test]
fn prompt_section_order_is_fixed() {
    let history = turns(2);
    let prompt = build_prompt("close the deal", Some("Q3 pipeline"), &history);

    let persona = prompt.find("SalesHub AI").unwrap();
    let transcript = prompt.find("--- Recent Conversation ---").unwrap();
    let context = prompt.find("Additional Context: Q3 pipeline").unwrap();
    let message = prompt.find("Current User Message: close the deal").unwrap();
    let closing = prompt.find("Provide a helpful, sales-focused response:").unwrap();

    assert!(persona < transcript);
    assert!(transcript < context);
    assert!(context < message);
    assert!(message < closing);
}

#[test]
fn prompt_labels_roles_oldest_first() {
    let history = vec![
        Turn { role: "user".into(), text: "first".into() },
        Turn { role: "assistant".into(), text: "second".into() },
    ];
    let prompt = build_prompt("now", None, &history);

    let first = prompt.find("User: first").unwrap();
    let second = prompt.find("Assistant: second").unwrap();
    assert!(first < second);
}

#[test]
fn prompt_keeps_only_last_ten_turns() {
    let history = turns(14);
    let prompt = build_prompt("msg", None, &history);

    for i in 0..4 {
        assert!(!prompt.contains(&format!("turn-{i}\n")), "turn-{i} should be dropped");
    }
    for i in 4..14 {
        assert!(prompt.contains(&format!("turn-{i}")), "turn-{i} should be kept");
    }
}

#[test]
fn prompt_omits_empty_sections() {
    let prompt = build_prompt("msg", None, &[]);
    assert!(!prompt.contains("--- Recent Conversation ---"));
    assert!(!prompt.contains("Additional Context:"));
    assert!(prompt.contains("Current User Message: msg"));
}

// =========================================================================
// generate — availability and fallbacks
// =========================================================================

#[tokio::test]
async fn unconfigured_assistant_returns_instructional_reply() {
    let assistant = Assistant::new(None);
    assert!(!assistant.is_available());

    let reply = assistant.generate("hi", None, &[], 800).await;
    assert_eq!(reply.text, UNAVAILABLE_REPLY);
    assert_eq!(reply.tokens_used, None);
}

#[tokio::test]
async fn successful_generation_passes_through_text_and_tokens() {
    let mock = MockLlm::new(vec![ok_generation("Here's a draft email.")]);
    let assistant = Assistant::new(Some(mock.clone() as Arc<dyn GenerateText>));
    assert!(assistant.is_available());

    let reply = assistant.generate("draft an email", None, &[], 800).await;
    assert_eq!(reply.text, "Here's a draft email.");
    assert_eq!(reply.tokens_used, Some(42));
    assert_eq!(mock.call_times().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn quota_failures_retry_with_doubling_backoff() {
    let mock = MockLlm::new(vec![Err(quota_error()), Err(quota_error()), ok_generation("third time lucky")]);
    let assistant = Assistant::new(Some(mock.clone() as Arc<dyn GenerateText>));

    let reply = assistant.generate("hi", None, &[], 800).await;
    assert_eq!(reply.text, "third time lucky");

    let times = mock.call_times();
    assert_eq!(times.len(), 3);
    let first_gap = times[1] - times[0];
    let second_gap = times[2] - times[1];
    assert_eq!(first_gap, Duration::from_secs(2));
    assert_eq!(second_gap, Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn exhausted_quota_retries_return_high_demand_reply() {
    let mock = MockLlm::new(vec![Err(quota_error()), Err(quota_error()), Err(quota_error())]);
    let assistant = Assistant::new(Some(mock.clone() as Arc<dyn GenerateText>));

    let reply = assistant.generate("hi", None, &[], 800).await;
    assert_eq!(reply.text, QUOTA_REPLY);
    assert_eq!(reply.tokens_used, None);
    assert_eq!(mock.call_times().len(), 3);
}

#[tokio::test]
async fn non_retriable_failure_aborts_immediately() {
    let mock = MockLlm::new(vec![
        Err(LlmError::ApiResponse { status: 400, body: "bad request".into() }),
        ok_generation("never reached"),
    ]);
    let assistant = Assistant::new(Some(mock.clone() as Arc<dyn GenerateText>));

    let reply = assistant.generate("hi", None, &[], 800).await;
    assert_eq!(reply.text, GENERIC_REPLY);
    assert_eq!(mock.call_times().len(), 1);
}

#[tokio::test]
async fn safety_block_maps_to_rephrase_reply() {
    let mock = MockLlm::new(vec![Err(LlmError::Blocked { reason: "SAFETY".into() })]);
    let assistant = Assistant::new(Some(mock as Arc<dyn GenerateText>));

    let reply = assistant.generate("hi", None, &[], 800).await;
    assert_eq!(reply.text, SAFETY_REPLY);
}
