use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::code::CodeSettings;
use super::*;
use crate::invoke::BatchOptions;

const EOS: &str = crate::constants::DEFAULT_EOS_TOKEN;

fn spec(value: serde_json::Value) -> VerificationSpec {
    VerificationSpec::from_value(value).expect("valid spec")
}

fn math_spec(answer: &str) -> VerificationSpec {
    spec(json!({"type": "math_verifiable", "answer": {"value": answer}}))
}

fn well_formed(body: &str) -> String {
    format!("<think>reasoning</think>{body}{EOS}")
}

async fn sandbox() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ping"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;
    server
}

fn submit_result(passed: bool) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": 0,
        "accepted": passed,
        "tests": [{"passed": passed, "exec_info": {"status": "Success"}}]
    }))
}

fn code_settings(server: &MockServer) -> CodeSettings {
    CodeSettings {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        ..CodeSettings::default()
    }
}

fn judge_settings(server: &MockServer) -> JudgeSettings {
    JudgeSettings {
        model: "judge-model".to_string(),
        base_url: Some(server.uri()),
        api_key: Some("test-key".to_string()),
        max_attempts: 1,
        ..JudgeSettings::default()
    }
}

fn chat_completion(reply: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "judge-model",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }]
    }))
}

async fn judge_catalog() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"id": "judge-model", "object": "model"}, {"id": "other", "object": "model"}]
        })))
        .mount(&server)
        .await;
    server
}

async fn judge_server(reply: &str) -> MockServer {
    let server = judge_catalog().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(chat_completion(reply))
        .mount(&server)
        .await;
    server
}

mod math_scoring {
    use super::*;

    #[tokio::test]
    async fn test_exact_answer() {
        let score = MathScorer::default()
            .score("so \\boxed{8}", &math_spec("8"))
            .await
            .unwrap();
        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn test_wrong_answer() {
        let score = MathScorer::default()
            .score("\\boxed{-1}", &math_spec("15"))
            .await
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_equivalent_expression() {
        let score = MathScorer::default()
            .score("\\boxed{7+8}", &math_spec("15"))
            .await
            .unwrap();
        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn test_numeric_reference_value() {
        let spec = spec(json!({"type": "math_verifiable", "answer": {"value": 15}}));
        let score = MathScorer::default().score("\\boxed{15}", &spec).await.unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_last_boxed_is_authoritative() {
        let scorer = MathScorer::default();
        assert_eq!(scorer.check("\\boxed{3} no wait \\boxed{4}", "4"), 1.0);
        assert_eq!(scorer.check("\\boxed{4} no wait \\boxed{3}", "4"), 0.0);
    }

    #[test]
    fn test_missing_box_scores_zero() {
        assert_eq!(MathScorer::default().check("the answer is 8", "8"), 0.0);
    }

    #[tokio::test]
    async fn test_deeply_nested_answer_scores_zero() {
        let depth = 10_000;
        let output = format!("\\boxed{{{}1{}}}", "(".repeat(depth), ")".repeat(depth));
        let score = tokio::spawn(async move {
            MathScorer::default().score(&output, &math_spec("1")).await
        })
        .await
        .expect("scoring task should not abort")
        .unwrap();
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_validation() {
        let spec = spec(json!({"type": "math_verifiable", "answer": {"wrong": 1}}));
        let err = MathScorer::default().score("\\boxed{1}", &spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

mod code_scoring {
    use super::*;

    fn code_spec() -> VerificationSpec {
        spec(json!({
            "type": "code_verifiable",
            "answer": {"test_cases": [
                {"input": "a", "output": "A"},
                {"input": "b", "output": "B"},
                {"input": "c", "output": "C"}
            ]}
        }))
    }

    #[tokio::test]
    async fn test_fractional_pass_rate() {
        let server = sandbox().await;
        for (stdin, passed) in [("a", true), ("b", true), ("c", false)] {
            Mock::given(method("POST"))
                .and(path("/submit"))
                .and(body_string_contains(format!("\"stdin\":\"{stdin}\"")))
                .respond_with(submit_result(passed))
                .expect(1)
                .mount(&server)
                .await;
        }

        let scorer = CodeScorer::connect(&code_settings(&server)).await.unwrap();
        let output = "```python\nprint(input().upper())\n```";
        let score = scorer.score(output, &code_spec()).await.unwrap();

        assert!((score - 2.0 / 3.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_scoring_runs_on_spawned_task() {
        let server = sandbox().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(submit_result(true))
            .expect(3)
            .mount(&server)
            .await;

        let scorer: Arc<dyn Scorer> =
            Arc::new(CodeScorer::connect(&code_settings(&server)).await.unwrap());
        let handle = tokio::spawn(async move {
            let output = "```python\nprint(input().upper())\n```";
            scorer.score(output, &code_spec()).await
        });

        assert_eq!(handle.await.unwrap().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_submission_carries_fenced_code() {
        let server = sandbox().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_string_contains("\"dataset\":\"custom_dataset\""))
            .and(body_string_contains("\"dataset_type\":\"CommonOJDataset\""))
            .and(body_string_contains("```python\\nprint(2)\\n```"))
            .respond_with(submit_result(true))
            .expect(3)
            .mount(&server)
            .await;

        let scorer = CodeScorer::connect(&code_settings(&server)).await.unwrap();
        let output = "```python\nprint(1)\n```\nbetter:\n```python\nprint(2)\n```";
        let score = scorer.score(output, &code_spec()).await.unwrap();

        assert_eq!(score, 1.0);
    }

    #[tokio::test]
    async fn test_missing_block_makes_no_remote_call() {
        let server = sandbox().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(submit_result(true))
            .expect(0)
            .mount(&server)
            .await;

        let scorer = CodeScorer::connect(&code_settings(&server)).await.unwrap();
        let score = scorer.score("no code here", &code_spec()).await.unwrap();

        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_sandbox_errors_count_as_failed() {
        let server = sandbox().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let scorer = CodeScorer::connect(&code_settings(&server)).await.unwrap();
        let score = scorer
            .score("```python\nprint(1)\n```", &code_spec())
            .await
            .unwrap();

        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_declared_language_is_used() {
        let server = sandbox().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_string_contains("\"language\":\"cpp\""))
            .respond_with(submit_result(true))
            .mount(&server)
            .await;

        let scorer = CodeScorer::connect(&code_settings(&server)).await.unwrap();
        let spec = spec(json!({
            "type": "code_verifiable",
            "answer": {"language": "cpp", "test_cases": [{"input": "", "output": "1"}]}
        }));

        assert_eq!(scorer.score("```python\nprint(1)\n```", &spec).await.unwrap(), 0.0);
        assert_eq!(scorer.score("```cpp\nint main(){}\n```", &spec).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_empty_base_url_fails_initialization() {
        let err = CodeScorer::connect(&CodeSettings::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);
    }

    #[tokio::test]
    async fn test_unreachable_sandbox_fails_initialization() {
        let server = MockServer::start().await;
        let err = CodeScorer::connect(&code_settings(&server)).await.unwrap_err();
        assert!(matches!(
            err,
            ScoreError::Initialization {
                task_type: TaskType::CodeVerifiable,
                ..
            }
        ));
    }
}

mod swe_scoring {
    use super::*;

    fn swe_spec(input: &str, ground_truth: &str) -> VerificationSpec {
        spec(json!({
            "type": "swe_verifiable",
            "answer": {"input": input, "ground_truth": ground_truth}
        }))
    }

    #[tokio::test]
    async fn test_identical_edit_scores_one() {
        let spec = swe_spec("a = 1\nb = 2\n", "a = 1\nb = 3\n");
        let output = "```python\na = 1\nb = 3\n```";
        assert_eq!(SweScorer.score(output, &spec).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_no_op_edit_scores_zero() {
        let spec = swe_spec("a = 1\nb = 2\n", "a = 1\nb = 3\n");
        let output = "```python\na = 1\nb = 2\n```";
        assert_eq!(SweScorer.score(output, &spec).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_partial_edit_is_fractional() {
        let spec = swe_spec(
            "fn main() {\n    let x = 1;\n    let y = 2;\n}",
            "fn main() {\n    let x = 10;\n    let y = 20;\n}",
        );
        let output = "```rust\nfn main() {\n    let x = 10;\n    let y = 2;\n}\n```";
        let score = SweScorer.score(output, &spec).await.unwrap();
        assert!((score - 0.892_655_367_231_638_4).abs() < 1e-12, "score = {score}");
    }

    #[test]
    fn test_ratio_matches_longest_blocks() {
        let score = SweScorer.check(
            "```python\ndef f(y):\n    return y * 3 + 1\n```",
            "def f(x):\n    return x + 1",
            "def f(x):\n    return x + 2",
        );
        assert!((score - 0.848_920_863_309_352_6).abs() < 1e-12, "score = {score}");
    }

    #[test]
    fn test_empty_block_scores_zero() {
        assert_eq!(SweScorer.check("```python\n\n```", "a", "b"), 0.0);
    }

    #[test]
    fn test_missing_block_scores_zero() {
        assert_eq!(SweScorer.check("just prose", "a", "b"), 0.0);
    }

    #[test]
    fn test_diff_has_no_file_header() {
        let diff = swe::unified_diff("a\nb\nc", "a\nB\nc");
        assert_eq!(diff, "@@ -1,3 +1,3 @@\n a\n-b\n+B\n c");
    }
}

mod instruction_scoring {
    use super::*;

    #[tokio::test]
    async fn test_mean_of_verdicts() {
        let spec = spec(json!({
            "type": "instruction_following",
            "answer": {
                "instruction_id_list": ["punctuation:no_comma", "change_case:english_lowercase"],
                "prompt": "write something",
                "kwargs": [null, {}]
            }
        }));
        let score = InstructionScorer::default()
            .score("Hello world", &spec)
            .await
            .unwrap();
        assert_eq!(score, 0.5);
    }

    #[tokio::test]
    async fn test_empty_instruction_list_is_validation() {
        let spec = spec(json!({
            "type": "instruction_following",
            "answer": {"instruction_id_list": [], "prompt": "", "kwargs": []}
        }));
        let err = InstructionScorer::default().score("x", &spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_unknown_instruction_is_validation() {
        let spec = spec(json!({
            "type": "instruction_following",
            "answer": {"instruction_id_list": ["language:response_language"], "kwargs": [null]}
        }));
        let err = InstructionScorer::default().score("x", &spec).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}

mod format_scoring {
    use super::*;

    #[test]
    fn test_all_checks_pass() {
        let output = well_formed("\\boxed{8}");
        assert_eq!(FormatScorer::default().check(&output, &math_spec("8")), 1.0);
    }

    #[test]
    fn test_missing_think_block() {
        let output = format!("\\boxed{{8}}{EOS}");
        assert_eq!(FormatScorer::default().check(&output, &math_spec("8")), 0.0);
    }

    #[test]
    fn test_unclosed_think_block() {
        let output = format!("<think>hmm \\boxed{{8}}{EOS}");
        assert_eq!(FormatScorer::default().check(&output, &math_spec("8")), 0.0);
    }

    #[test]
    fn test_missing_eos_token() {
        let output = "<think>r</think>\\boxed{8}";
        assert_eq!(FormatScorer::default().check(output, &math_spec("8")), 0.0);
    }

    #[test]
    fn test_cjk_is_rejected() {
        let output = well_formed("答案是 \\boxed{8}");
        assert_eq!(FormatScorer::default().check(&output, &math_spec("8")), 0.0);
    }

    #[test]
    fn test_math_requires_box() {
        let output = well_formed("8");
        assert_eq!(FormatScorer::default().check(&output, &math_spec("8")), 0.0);
    }

    #[test]
    fn test_code_requires_declared_language_block() {
        let spec = spec(json!({
            "type": "code_verifiable",
            "answer": {"language": "rust", "test_cases": []}
        }));
        let scorer = FormatScorer::default();
        assert_eq!(scorer.check(&well_formed("```python\nx\n```"), &spec), 0.0);
        assert_eq!(scorer.check(&well_formed("```rust\nx\n```"), &spec), 1.0);
    }

    #[test]
    fn test_custom_eos_token() {
        let scorer = FormatScorer::new("</s>");
        let spec = spec(json!({"type": "swe_verifiable", "answer": {"input": "", "ground_truth": ""}}));
        assert_eq!(scorer.check("<think>r</think>done</s>", &spec), 1.0);
    }
}

mod judge_scoring {
    use super::*;

    fn judge_spec() -> VerificationSpec {
        spec(json!({"type": "llm_judge", "answer": {"value": "Paris"}}))
    }

    #[test]
    fn test_affirmative_replies() {
        assert!(judge::is_affirmative("True"));
        assert!(judge::is_affirmative("\"true\""));
        assert!(judge::is_affirmative("  TRUE \n"));
        assert!(!judge::is_affirmative("False"));
        assert!(!judge::is_affirmative("True, because"));
        assert!(!judge::is_affirmative("\"  true  \""));
    }

    #[test]
    fn test_prompt_embeds_both_sides() {
        let prompt = judge::judge_prompt("it is {ground_truth}", "Paris");
        assert!(prompt.contains("<Model Response>\nit is {ground_truth}\n</Model Response>"));
        assert!(prompt.contains("<Reference Answer>\nParis\n</Reference Answer>"));
        assert!(prompt.ends_with("and \"False\" otherwise"));
    }

    #[tokio::test]
    async fn test_true_reply_scores_one() {
        let server = judge_server("True").await;
        let judge = JudgeScorer::connect(&judge_settings(&server)).await.unwrap();
        assert_eq!(judge.score("Paris.", &judge_spec()).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_false_reply_scores_zero() {
        let server = judge_server("False").await;
        let judge = JudgeScorer::connect(&judge_settings(&server)).await.unwrap();
        assert_eq!(judge.score("Lyon.", &judge_spec()).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = judge_catalog().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("\"model\":\"judge-model\""))
            .and(body_string_contains("\"max_tokens\":100"))
            .and(body_string_contains("Paris"))
            .respond_with(chat_completion("True"))
            .expect(1)
            .mount(&server)
            .await;

        let judge = JudgeScorer::connect(&judge_settings(&server)).await.unwrap();
        judge.score("Paris.", &judge_spec()).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_model_fails_initialization() {
        let server = judge_server("True").await;
        let settings = JudgeSettings {
            model: "missing-model".to_string(),
            ..judge_settings(&server)
        };
        let err = JudgeScorer::connect(&settings).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_initialization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = JudgeScorer::connect(&judge_settings(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert!(err.to_string().contains("authentication failed"));
    }

    #[tokio::test]
    #[serial]
    async fn test_missing_api_key_fails_initialization() {
        let previous = env::var(judge::FALLBACK_API_KEY_ENV).ok();
        // SAFETY: Test code only, serialized with other env-mutating tests.
        unsafe { env::remove_var(judge::FALLBACK_API_KEY_ENV) };

        let server = judge_server("True").await;
        let settings = JudgeSettings {
            api_key: None,
            ..judge_settings(&server)
        };
        let err = JudgeScorer::connect(&settings).await.unwrap_err();

        if let Some(value) = previous {
            // SAFETY: Test code only, serialized with other env-mutating tests.
            unsafe { env::set_var(judge::FALLBACK_API_KEY_ENV, value) };
        }
        assert_eq!(err.kind(), ErrorKind::Initialization);
    }

    #[tokio::test]
    async fn test_server_error_is_verification_kind() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "judge-model"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let judge = JudgeScorer::connect(&judge_settings(&server)).await.unwrap();
        let err = judge.score("Paris.", &judge_spec()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Verification);
    }
}

mod registry_and_engine {
    use super::*;

    #[tokio::test]
    async fn test_route_reuses_instances() {
        let registry = VerifierRegistry::new(VerifierSettings::default());
        let first = registry.route(TaskType::MathVerifiable).await.unwrap();
        let second = registry.route(TaskType::MathVerifiable).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.task_type(), TaskType::MathVerifiable);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let registry = Arc::new(VerifierRegistry::new(VerifierSettings::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.route(TaskType::SweVerifiable).await })
            })
            .collect();

        let mut scorers = Vec::new();
        for handle in handles {
            scorers.push(handle.await.unwrap().unwrap());
        }
        assert!(scorers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn test_failed_construction_is_not_cached() {
        let server = MockServer::start().await;
        let registry = VerifierRegistry::new(VerifierSettings {
            code: code_settings(&server),
            ..VerifierSettings::default()
        });

        let err = registry.route(TaskType::CodeVerifiable).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert!(registry.cached(TaskType::CodeVerifiable).await.is_none());

        Mock::given(method("GET"))
            .and(path("/v1/ping"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(registry.route(TaskType::CodeVerifiable).await.is_ok());
    }

    #[tokio::test]
    async fn test_reward_with_format_blending() {
        let engine = RewardEngine::new(VerifierSettings::default(), Some(FormatScorer::default()));
        let output = well_formed("\\boxed{8}");
        assert!((engine.score(&output, &math_spec("8")).await.unwrap() - 1.0).abs() < 1e-12);

        let unformatted = "\\boxed{8}";
        assert!((engine.score(unformatted, &math_spec("8")).await.unwrap() - 0.9).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_reward_without_format() {
        let engine = RewardEngine::new(VerifierSettings::default(), None);
        assert_eq!(engine.score("\\boxed{8}", &math_spec("8")).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_unsupported_type_is_rejected_before_scoring() {
        let engine = RewardEngine::new(VerifierSettings::default(), None);
        let err = engine
            .score_json("x", r#"{"type": "poetry", "answer": {}}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::UnsupportedType { ref value } if value == "poetry"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation() {
        let engine = RewardEngine::new(VerifierSettings::default(), None);
        for raw in ["not json", r#"{"type": "math_verifiable"}"#, "[1, 2]"] {
            let err = engine.score_json("x", raw).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "input: {raw}");
        }
    }

    #[tokio::test]
    async fn test_batch_keeps_order_and_isolates_failures() {
        let engine = Arc::new(RewardEngine::new(VerifierSettings::default(), None));
        let code = spec(json!({
            "type": "code_verifiable",
            "answer": {"test_cases": [{"input": "", "output": ""}]}
        }));
        let swe = spec(json!({
            "type": "swe_verifiable",
            "answer": {"input": "a\n", "ground_truth": "b\n"}
        }));

        let batch = vec![
            ("\\boxed{8}".to_string(), math_spec("8")),
            ("\\boxed{-1}".to_string(), math_spec("15")),
            ("```python\nprint()\n```".to_string(), code),
            ("```text\nb\n```".to_string(), swe),
        ];

        let scores = engine.score_batch(batch, BatchOptions::new(2, -1.0)).await;
        assert_eq!(scores, vec![1.0, 0.0, -1.0, 1.0]);
    }

    #[tokio::test]
    async fn test_local_scorers_are_deterministic() {
        let engine = RewardEngine::new(VerifierSettings::default(), Some(FormatScorer::default()));
        let output = well_formed("\\boxed{\\frac{1}{2}}");
        let spec = math_spec("0.5");

        let first = engine.score(&output, &spec).await.unwrap();
        for _ in 0..5 {
            assert_eq!(engine.score(&output, &spec).await.unwrap(), first);
        }
    }
}
