//! Runtime execution errors.

use musiccoder_core::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// `R2` moved the tape pointer below zero.
    #[error("pointer moved left of 0")]
    PointerUnderflow { span: Span },
}

impl ExecError {
    pub fn span(&self) -> Span {
        match self {
            ExecError::PointerUnderflow { span } => *span,
        }
    }
}
