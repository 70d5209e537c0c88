use logos::Logos;
use musiccoder_core::{Source, Span};
use thiserror::Error;

use crate::token::{
    decode_loop_end_suffix, parse_note, RawKind, SpannedToken, Token,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("invalid note `{text}`")]
    InvalidNote { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::InvalidNote { span, .. } => *span,
        }
    }
}

/// Strip `<!-- ... >` comments (non-greedy, may span newlines) from
/// source text before lexing.
///
/// This mirrors the original interpreter's
/// `re.sub(r'<!--[^>]*>', '', src, flags=re.DOTALL)`: it does not
/// require the closing delimiter to be `-->`, just the next `>` after
/// the opening `<!--`.
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("<!--") {
        out.push_str(&rest[..start]);
        let after_marker = &rest[start + 4..];
        match after_marker.find('>') {
            Some(end) => rest = &after_marker[end + 1..],
            None => {
                // Unterminated comment: the rest of the source is consumed.
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Tokenizer for MusicCoder source text.
///
/// Wraps a `logos`-generated lexer over the comment-stripped text and
/// resolves each raw lexeme into the semantic [`Token`]s of [`crate::token`].
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, RawKind>,
}

impl<'src> Lexer<'src> {
    /// Create a lexer over already comment-stripped text.
    pub fn new(cleaned: &'src str) -> Self {
        Self {
            inner: RawKind::lexer(cleaned),
        }
    }

    /// Strip comments from `source` and lex the result.
    pub fn from_source(source: &'src Source) -> String {
        strip_comments(&source.content)
    }

    fn span(&self) -> Span {
        let range = self.inner.span();
        Span::new(range.start, range.end)
    }

    /// Tokenize the entire input, returning the full token stream.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, LexError> {
        let mut tokens = Vec::new();

        while let Some(result) = self.inner.next() {
            let span = self.span();
            match result {
                Ok(RawKind::LoopStart) => tokens.push(SpannedToken::new(Token::LoopStart, span)),
                Ok(RawKind::LoopEnd(raw)) => {
                    let (mode, count, infinite, use_next_cell) = decode_loop_end_suffix(&raw);
                    tokens.push(SpannedToken::new(
                        Token::LoopEnd {
                            mode,
                            count,
                            infinite,
                            use_next_cell,
                        },
                        span,
                    ));
                }
                Ok(RawKind::RestRight) => tokens.push(SpannedToken::new(Token::RestRight, span)),
                Ok(RawKind::RestLeft) => tokens.push(SpannedToken::new(Token::RestLeft, span)),
                Ok(RawKind::Bar) => unreachable!("bar lines are skipped by the lexer"),
                Ok(RawKind::NoteRaw(raw)) => {
                    let parsed = parse_note(&raw).ok_or_else(|| LexError::InvalidNote {
                        text: raw.clone(),
                        span,
                    })?;
                    let midi = parsed.base + (parsed.octave + 1) * 12;
                    if !(0..=127).contains(&midi) {
                        return Err(LexError::InvalidNote { text: raw, span });
                    }
                    tokens.push(SpannedToken::new(
                        Token::Note {
                            midi: midi as u8,
                            staccato: parsed.staccato,
                            legato: parsed.legato,
                        },
                        span,
                    ));
                }
                // Unmatched text is skipped silently, per spec.
                Err(()) => {}
            }
        }

        Ok(tokens)
    }
}

/// Strip comments and tokenize `source` in one call — the convenience
/// entry point the rest of the runtime uses.
pub fn lex(source: &Source) -> Result<Vec<SpannedToken>, LexError> {
    let cleaned = strip_comments(&source.content);
    Lexer::new(&cleaned).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::LoopMode;

    fn lex_str(src: &str) -> Vec<Token> {
        let cleaned = strip_comments(src);
        Lexer::new(&cleaned)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn strips_comments_spanning_newlines() {
        let cleaned = strip_comments("C4 <!-- a comment\nspanning lines > D4");
        assert_eq!(cleaned, "C4  D4");
    }

    #[test]
    fn comment_insertion_does_not_change_token_stream() {
        let a = lex_str("C4 D4 E4");
        let b = lex_str("C4 <!-- hi --> D4 <!-- there --> E4");
        assert_eq!(a, b);
    }

    #[test]
    fn lexes_basic_program() {
        let tokens = lex_str("|: C5 :|x3 C5.");
        assert_eq!(
            tokens,
            vec![
                Token::LoopStart,
                Token::Note {
                    midi: 72,
                    staccato: false,
                    legato: false
                },
                Token::LoopEnd {
                    mode: LoopMode::Fixed(3),
                    count: Some(3),
                    infinite: false,
                    use_next_cell: false,
                },
                Token::Note {
                    midi: 72,
                    staccato: true,
                    legato: false
                },
            ]
        );
    }

    #[test]
    fn bar_lines_are_discarded() {
        let tokens = lex_str("| C4 | D4 |");
        assert_eq!(
            tokens,
            vec![
                Token::Note {
                    midi: 60,
                    staccato: false,
                    legato: false
                },
                Token::Note {
                    midi: 62,
                    staccato: false,
                    legato: false
                },
            ]
        );
    }

    #[test]
    fn boundary_notes() {
        assert_eq!(lex_str("C-1"), vec![Token::Note {
            midi: 0,
            staccato: false,
            legato: false,
        }]);
        assert_eq!(lex_str("G9"), vec![Token::Note {
            midi: 127,
            staccato: false,
            legato: false,
        }]);
    }

    #[test]
    fn out_of_range_note_is_rejected() {
        let cleaned = strip_comments("G#9");
        let err = Lexer::new(&cleaned).tokenize().unwrap_err();
        assert!(matches!(err, LexError::InvalidNote { .. }));
    }

    #[test]
    fn unmatched_text_is_skipped_silently() {
        let tokens = lex_str("C4 @@@ D4");
        assert_eq!(
            tokens,
            vec![
                Token::Note { midi: 60, staccato: false, legato: false },
                Token::Note { midi: 62, staccato: false, legato: false },
            ]
        );
    }

    #[test]
    fn case_insensitive_loop_and_rest_marks() {
        let tokens = lex_str("r4 r2");
        assert_eq!(tokens, vec![Token::RestRight, Token::RestLeft]);
    }
}
