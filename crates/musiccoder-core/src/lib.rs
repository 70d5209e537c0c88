//! Shared source, span, and diagnostics types for the MusicCoder runtime.

pub mod diagnostics;
pub mod source;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use source::Source;
pub use span::{Location, Span, Spanned};
