use musiccoder_core::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unmatched `:|` at token {index}")]
    UnmatchedClose { index: usize, span: Span },

    #[error("unmatched `|:` at token {index}")]
    UnmatchedOpen { index: usize, span: Span },
}

impl ResolveError {
    pub fn span(&self) -> Span {
        match self {
            ResolveError::UnmatchedClose { span, .. } => *span,
            ResolveError::UnmatchedOpen { span, .. } => *span,
        }
    }
}
