use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::types::TestCase;

pub const CUSTOM_DATASET: &str = "custom_dataset";
pub const COMMON_OJ_DATASET: &str = "CommonOJDataset";

const PROBLEM_CONTENT: &str = "Optional: Problem description";

/// Body of `POST /submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub dataset: String,
    pub id: usize,
    pub completion: String,
    pub config: TestConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    pub dataset_type: String,
    pub language: String,
    pub provided_data: ProvidedData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidedData {
    pub id: usize,
    pub content: String,
    pub test: Vec<ProvidedTest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidedTest {
    pub input: StdinPayload,
    pub output: StdoutPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdinPayload {
    pub stdin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdoutPayload {
    pub stdout: String,
}

impl SubmitRequest {
    /// One submission pairing `completion` with a single test case.
    pub fn for_test_case(id: usize, completion: String, language: &str, case: &TestCase) -> Self {
        Self {
            dataset: CUSTOM_DATASET.to_string(),
            id,
            completion,
            config: TestConfig {
                dataset_type: COMMON_OJ_DATASET.to_string(),
                language: language.to_string(),
                provided_data: ProvidedData {
                    id,
                    content: PROBLEM_CONTENT.to_string(),
                    test: vec![ProvidedTest {
                        input: StdinPayload {
                            stdin: case.input.clone(),
                        },
                        output: StdoutPayload {
                            stdout: case.output.clone(),
                        },
                    }],
                },
            },
        }
    }
}

/// Response of `POST /submit`. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub tests: Vec<TestOutcome>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TestOutcome {
    pub passed: bool,
    #[serde(default)]
    pub exec_info: Option<Value>,
}

impl SubmitResponse {
    /// The submission passes iff its first reported test passed.
    pub fn first_test_passed(&self) -> bool {
        self.tests.first().is_some_and(|t| t.passed)
    }
}
