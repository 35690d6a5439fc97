//! Instruction-following compliance checks.
//!
//! A response is checked against a list of instruction ids (IFEval naming, e.g.
//! `length_constraints:number_words`), each with its own keyword arguments. The scorer
//! only sees the [`InstructionChecker`] contract; [`BuiltinChecker`] implements the
//! lexical instructions that need no language model.

mod checks;


use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

pub use checks::{Instruction, Relation};

/// Keyword arguments of one instruction.
pub type InstructionKwargs = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstructionError {
    #[error("unknown instruction id '{0}'")]
    UnknownInstruction(String),

    #[error("instruction '{instruction}' is missing argument '{argument}'")]
    MissingArgument {
        instruction: &'static str,
        argument: &'static str,
    },

    #[error("instruction '{instruction}' has invalid argument '{argument}': {reason}")]
    InvalidArgument {
        instruction: &'static str,
        argument: &'static str,
        reason: String,
    },
}

/// Contract of an instruction-compliance backend.
pub trait InstructionChecker: Send + Sync {
    /// Returns one verdict per instruction id, in order.
    fn check(
        &self,
        prompt: &str,
        instruction_ids: &[String],
        kwargs: &[Option<InstructionKwargs>],
        response: &str,
    ) -> Result<Vec<bool>, InstructionError>;
}

/// Built-in checker covering the lexical IFEval instructions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinChecker;

impl InstructionChecker for BuiltinChecker {
    fn check(
        &self,
        _prompt: &str,
        instruction_ids: &[String],
        kwargs: &[Option<InstructionKwargs>],
        response: &str,
    ) -> Result<Vec<bool>, InstructionError> {
        let empty = InstructionKwargs::new();

        instruction_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| {
                let instruction: Instruction = id.parse()?;
                let args = kwargs.get(idx).and_then(Option::as_ref).unwrap_or(&empty);
                let followed = instruction.evaluate(response, args)?;
                debug!(instruction = id.as_str(), followed, "instruction checked");
                Ok(followed)
            })
            .collect()
    }
}
