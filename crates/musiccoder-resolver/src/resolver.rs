use indexmap::IndexMap;
use musiccoder_lexer::{LoopMode, SpannedToken, Token};

use crate::error::ResolveError;

/// Metadata attached to a `LoopStart` index during resolution, copied
/// from the `LoopEnd` token it was paired with.
///
/// This is resolver *output*. The executor copies it by value into its
/// own mutable loop-info table at the start of a run and back-mutates
/// `skip_count` there — this struct itself carries no `skip_count`,
/// since that field is runtime state, not something the resolver can
/// know about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopInfo {
    pub mode: LoopMode,
    pub count: Option<u32>,
    pub infinite: bool,
    pub use_next_cell: bool,
}

/// A bijective pairing between `LoopStart` and `LoopEnd` token indices.
/// Holds both directions in one table: `get(s) == Some(e)` and
/// `get(e) == Some(s)` for every matched pair.
#[derive(Clone, Debug, Default)]
pub struct LoopMap {
    pairs: IndexMap<usize, usize>,
}

impl LoopMap {
    pub fn get(&self, index: usize) -> Option<usize> {
        self.pairs.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// The output of a resolver pass: the loop map plus loop-info table,
/// keyed by `LoopStart` index.
#[derive(Clone, Debug, Default)]
pub struct Resolution {
    pub loop_map: LoopMap,
    pub loop_info: IndexMap<usize, LoopInfo>,
}

/// Resolve loop structure over a token stream in a single linear sweep
/// with a stack of `LoopStart` indices.
///
/// Pure and total over a well-nested program: its output depends only
/// on the token sequence. `UnmatchedClose` is raised eagerly on the
/// first unpaired `LoopEnd`; `UnmatchedOpen` is raised after the sweep,
/// reporting the earliest still-open `LoopStart`.
pub fn resolve(tokens: &[SpannedToken]) -> Result<Resolution, ResolveError> {
    let mut stack: Vec<usize> = Vec::new();
    let mut loop_map = IndexMap::new();
    let mut loop_info = IndexMap::new();

    for (index, spanned) in tokens.iter().enumerate() {
        match &spanned.token {
            Token::LoopStart => stack.push(index),
            Token::LoopEnd {
                mode,
                count,
                infinite,
                use_next_cell,
            } => {
                let start = stack.pop().ok_or(ResolveError::UnmatchedClose {
                    index,
                    span: spanned.span,
                })?;
                loop_map.insert(start, index);
                loop_map.insert(index, start);
                loop_info.insert(
                    start,
                    LoopInfo {
                        mode: *mode,
                        count: *count,
                        infinite: *infinite,
                        use_next_cell: *use_next_cell,
                    },
                );
            }
            _ => {}
        }
    }

    if let Some(&first_unmatched) = stack.first() {
        return Err(ResolveError::UnmatchedOpen {
            index: first_unmatched,
            span: tokens[first_unmatched].span,
        });
    }

    Ok(Resolution {
        loop_map: LoopMap { pairs: loop_map },
        loop_info,
    })
}
