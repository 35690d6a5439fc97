//! End-to-end tests: the real router on a socket, driven by the client SDK.

mod common;

use std::time::Duration;

use rl_verifier::client::{ClientConfig, ClientError, VerificationInfo, VerifierClient};
use rl_verifier::constants::DEFAULT_EOS_TOKEN;
use rl_verifier::gateway::PingResponse;
use rl_verifier::scoring::{CodeSettings, VerifierSettings};
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::harness::{TestServerConfig, spawn_test_server};

fn well_formed(body: &str) -> String {
    format!("<think>working</think>{body}{DEFAULT_EOS_TOKEN}")
}

async fn connect(url: String) -> VerifierClient {
    VerifierClient::connect(ClientConfig::new([url]))
        .await
        .expect("client should connect")
}

#[tokio::test]
async fn test_ping_endpoint() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");

    let ping: PingResponse = reqwest::get(format!("{}/ping", server.url()))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(ping.status, "ok");
    assert_eq!(ping.message, "RL Verifier service is running");
}

#[tokio::test]
async fn test_math_reward_with_format() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = connect(server.url()).await;
    let info = json!({"type": "math_verifiable", "answer": {"value": "15"}});

    let correct = client
        .verify(&well_formed("so \\boxed{7+8}"), info.clone())
        .await
        .unwrap();
    assert!((correct - 1.0).abs() < 1e-12);

    let unformatted = client.verify("\\boxed{15}", info.clone()).await.unwrap();
    assert!((unformatted - 0.9).abs() < 1e-12);

    let wrong = client.verify(&well_formed("\\boxed{-1}"), info).await.unwrap();
    assert!((wrong - 0.1).abs() < 1e-12);
}

#[tokio::test]
async fn test_code_reward_through_sandbox() {
    let sandbox = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ping"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&sandbox)
        .await;
    for (stdin, passed) in [("1 2", true), ("3 4", true), ("5 6", false)] {
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_string_contains(format!("\"stdin\":\"{stdin}\"")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accepted": passed,
                "tests": [{"passed": passed}]
            })))
            .mount(&sandbox)
            .await;
    }

    let config = TestServerConfig {
        settings: VerifierSettings {
            code: CodeSettings {
                base_url: sandbox.uri(),
                timeout: Duration::from_secs(5),
                ..CodeSettings::default()
            },
            ..VerifierSettings::default()
        },
        ..TestServerConfig::default()
    }
    .without_format();
    let server = spawn_test_server(config).await.expect("Server should start");
    let client = connect(server.url()).await;

    let info = json!({
        "type": "code_verifiable",
        "answer": {"test_cases": [
            {"input": "1 2", "output": "3"},
            {"input": "3 4", "output": "7"},
            {"input": "5 6", "output": "11"}
        ]}
    });
    let output = "```python\na, b = map(int, input().split())\nprint(a + b)\n```";

    let score = client.verify(output, info).await.unwrap();
    assert!((score - 0.6667).abs() < 1e-4);
}

#[tokio::test]
async fn test_instruction_following_reward() {
    let server = spawn_test_server(TestServerConfig::default().without_format())
        .await
        .expect("Server should start");
    let client = connect(server.url()).await;

    let info = json!({
        "type": "instruction_following",
        "answer": {
            "instruction_id_list": ["punctuation:no_comma", "length_constraints:number_words"],
            "prompt": "Describe the sea in under ten words.",
            "kwargs": [null, {"relation": "less than", "num_words": 10}]
        }
    });

    let score = client.verify("The sea is wide and blue", info).await.unwrap();
    assert_eq!(score, 1.0);
}

#[tokio::test]
async fn test_error_statuses_reach_the_client() {
    let server = spawn_test_server(TestServerConfig::default())
        .await
        .expect("Server should start");
    let client = connect(server.url()).await;

    let err = client
        .verify("x", json!({"type": "poetry", "answer": {}}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ref body) if body.contains("poetry")));

    let err = client
        .verify("x", json!({"type": "llm_judge", "answer": {"value": "y"}}))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Verification(_)));
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let server = spawn_test_server(TestServerConfig::default().without_format())
        .await
        .expect("Server should start");
    let client = connect(server.url()).await;

    let math = |value: &str| {
        VerificationInfo::from(json!({"type": "math_verifiable", "answer": {"value": value}}))
    };
    let batch = vec![
        ("\\boxed{8}".to_string(), math("8")),
        ("\\boxed{-1}".to_string(), math("15")),
        ("\\boxed{1}".to_string(), VerificationInfo::from("not json")),
        ("\\boxed{\\frac{1}{2}}".to_string(), math("0.5")),
    ];

    let scores = client.verify_batch(batch, 3, -1.0, false).await;
    assert_eq!(scores, vec![1.0, 0.0, -1.0, 1.0]);
}
