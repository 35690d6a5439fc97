use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::error::ScoreError;
use crate::constants::DEFAULT_CODE_LANGUAGE;

/// Declared task type of a verification spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Boxed math answer checked for symbolic equivalence.
    MathVerifiable,
    /// Fenced code executed against stdin/stdout test cases.
    CodeVerifiable,
    /// Patch similarity against a reference edit.
    SweVerifiable,
    /// Free-form answer graded by a judge model.
    LlmJudge,
    /// Response checked against a list of instructions.
    InstructionFollowing,
}

impl TaskType {
    /// Every supported task type.
    pub const ALL: [TaskType; 5] = [
        TaskType::MathVerifiable,
        TaskType::CodeVerifiable,
        TaskType::SweVerifiable,
        TaskType::LlmJudge,
        TaskType::InstructionFollowing,
    ];

    /// Wire name, as used in the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::MathVerifiable => "math_verifiable",
            TaskType::CodeVerifiable => "code_verifiable",
            TaskType::SweVerifiable => "swe_verifiable",
            TaskType::LlmJudge => "llm_judge",
            TaskType::InstructionFollowing => "instruction_following",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ScoreError::UnsupportedType {
                value: s.to_string(),
            })
    }
}

/// How to check one model output: a task type plus its expected-answer payload.
///
/// The payload stays untyped until a scorer asks for its own shape through
/// [`VerificationSpec::answer_as`], so one spec type serves every task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationSpec {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub answer: Value,
}

impl VerificationSpec {
    pub fn new(task_type: TaskType, answer: Value) -> Self {
        Self { task_type, answer }
    }

    /// Parses a JSON-encoded spec, classifying every failure as validation.
    ///
    /// Order of checks: parsable JSON, then presence of `answer` and `type`, then a
    /// supported `type` value.
    pub fn from_json(raw: &str) -> Result<Self, ScoreError> {
        let value: Value = serde_json::from_str(raw).map_err(|_| {
            ScoreError::validation("the verification info must be in parsable JSON format")
        })?;
        Self::from_value(value)
    }

    /// Same as [`from_json`](Self::from_json) for an already-decoded value.
    pub fn from_value(value: Value) -> Result<Self, ScoreError> {
        let Value::Object(mut map) = value else {
            return Err(ScoreError::validation(
                "the verification info must be a JSON object",
            ));
        };

        let (Some(answer), Some(raw_type)) = (map.remove("answer"), map.remove("type")) else {
            return Err(ScoreError::validation(
                "the verification info must contain 'answer' and 'type' fields",
            ));
        };

        let task_type = match raw_type {
            Value::String(s) => s.parse()?,
            other => {
                return Err(ScoreError::UnsupportedType {
                    value: other.to_string(),
                });
            }
        };

        Ok(Self { task_type, answer })
    }

    /// Decodes the answer payload into the shape expected by a scorer.
    pub fn answer_as<T: DeserializeOwned>(&self) -> Result<T, ScoreError> {
        T::deserialize(&self.answer).map_err(|e| {
            ScoreError::validation(format!(
                "answer payload does not match {}: {}",
                self.task_type, e
            ))
        })
    }

    /// Language declared for code answers, defaulting to python.
    pub fn code_language(&self) -> &str {
        self.answer
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CODE_LANGUAGE)
    }
}

/// Reference answer used by the math and judge scorers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceAnswer {
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
}

/// One stdin/stdout pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeAnswer {
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub language: Option<String>,
}

impl CodeAnswer {
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_CODE_LANGUAGE)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SweAnswer {
    pub input: String,
    pub ground_truth: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructionAnswer {
    pub instruction_id_list: Vec<String>,
    #[serde(default)]
    pub prompt: String,
    /// Per-instruction parameters, aligned with `instruction_id_list`.
    #[serde(default)]
    pub kwargs: Vec<Option<Map<String, Value>>>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}
