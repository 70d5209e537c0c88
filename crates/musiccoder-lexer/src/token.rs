use logos::Logos;
use musiccoder_core::Span;

/// The resolved mode of a loop, decided once at lex time from the
/// `LoopEnd` suffix and mirrored into the matching `LoopStart` by the
/// resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopMode {
    /// No suffix: classical `[`/`]`, gated on the current cell.
    Brainfuck,
    /// `xN` suffix, `N >= 1`: run the body exactly `N` times.
    Fixed(u32),
    /// `x00` suffix: run forever.
    Infinite,
    /// `R4` suffix: iteration count resolved at loop entry, either from
    /// trailing unsuffixed notes or from the cell right of the pointer.
    TapeDriven,
}

/// A semantic token produced by the [`Lexer`](crate::lexer::Lexer).
///
/// This is the stable boundary the notation<->MusicXML converters (out
/// of scope here) observe: any future addition to this enum is a schema
/// extension, not a breaking change to existing variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    LoopStart,
    LoopEnd {
        mode: LoopMode,
        count: Option<u32>,
        infinite: bool,
        use_next_cell: bool,
    },
    /// `R2`: moves the tape pointer left by one cell.
    RestLeft,
    /// `R4`: moves the tape pointer right by one cell.
    RestRight,
    Note {
        midi: u8,
        staccato: bool,
        legato: bool,
    },
}

/// A [`Token`] with the source span it was lexed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

impl SpannedToken {
    pub fn new(token: Token, span: Span) -> Self {
        Self { token, span }
    }
}

/// Decode a `LoopEnd` lexeme's optional suffix (`xN`, `x00`, or `R4`,
/// whitespace-tolerant before the suffix) into `(mode, count, infinite,
/// use_next_cell)`.
///
/// `raw` is the full matched text including the leading `:|`. A
/// malformed `x...` suffix (non-integer `N`) falls back to
/// `LoopMode::Brainfuck`, per spec: this is a non-error, not a lex
/// failure. `x00` is `Infinite`; any other non-negative decimal `N`
/// (including `x0`) is `Fixed(N)` — the original interpreter places no
/// lower bound on `N` here, and a `Fixed(0)` loop already runs its body
/// exactly once under the executor's decrement-at-`LoopEnd` semantics,
/// so no separate zero-iteration case is needed.
pub(crate) fn decode_loop_end_suffix(raw: &str) -> (LoopMode, Option<u32>, bool, bool) {
    let suffix = raw[2..].trim_start();

    if suffix.is_empty() {
        return (LoopMode::Brainfuck, None, false, false);
    }

    if suffix.eq_ignore_ascii_case("r4") {
        return (LoopMode::TapeDriven, None, false, true);
    }

    if let Some(digits) = suffix
        .strip_prefix('x')
        .or_else(|| suffix.strip_prefix('X'))
    {
        if digits == "00" {
            return (LoopMode::Infinite, None, true, false);
        }
        if let Ok(n) = digits.parse::<u32>() {
            return (LoopMode::Fixed(n), Some(n), false, false);
        }
    }

    (LoopMode::Brainfuck, None, false, false)
}

/// A decoded `A`-`G` note lexeme, prior to MIDI range validation.
pub(crate) struct ParsedNote {
    pub base: i32,
    pub octave: i32,
    pub staccato: bool,
    pub legato: bool,
}

/// Base chromatic value (0-11) for a recognized pitch-class spelling.
/// Only the spellings in spec.md's table are recognized; enharmonic
/// spellings outside it (e.g. `Cb`, `E#`) are not, matching the
/// original interpreter's explicit pitch-class table.
fn base_value(letter: char, accidental: Option<char>) -> Option<i32> {
    let letter = letter.to_ascii_uppercase();
    let accidental = accidental.map(|a| a.to_ascii_uppercase());
    match (letter, accidental) {
        ('C', None) => Some(0),
        ('C', Some('#')) | ('D', Some('B')) => Some(1),
        ('D', None) => Some(2),
        ('D', Some('#')) | ('E', Some('B')) => Some(3),
        ('E', None) => Some(4),
        ('F', None) => Some(5),
        ('F', Some('#')) | ('G', Some('B')) => Some(6),
        ('G', None) => Some(7),
        ('G', Some('#')) | ('A', Some('B')) => Some(8),
        ('A', None) => Some(9),
        ('A', Some('#')) | ('B', Some('B')) => Some(10),
        ('B', None) => Some(11),
        _ => None,
    }
}

/// Parse a full note lexeme (e.g. `"C#-1.."`) matched by the lexer's
/// note pattern into pitch-class/octave/articulation parts. Returns
/// `None` when the pitch class itself is unrecognized or the octave
/// text fails to parse as an integer.
pub(crate) fn parse_note(raw: &str) -> Option<ParsedNote> {
    let mut chars = raw.chars().peekable();
    let letter = chars.next()?;

    let accidental = match chars.peek() {
        Some('#') => {
            chars.next();
            Some('#')
        }
        Some('b') | Some('B') => {
            chars.next();
            Some('B')
        }
        _ => None,
    };

    let base = base_value(letter, accidental)?;

    let mut octave_str = String::new();
    if let Some('-') = chars.peek() {
        octave_str.push(chars.next().unwrap());
    }
    if let Some(c) = chars.peek() {
        if c.is_ascii_digit() {
            octave_str.push(chars.next().unwrap());
        }
    }

    let octave = if octave_str.is_empty() {
        4
    } else {
        octave_str.parse::<i32>().ok()?
    };

    let rest: String = chars.collect();
    let staccato = rest.contains('.');
    let legato = rest.contains('_');

    Some(ParsedNote {
        base,
        octave,
        staccato,
        legato,
    })
}

/// Raw lexeme kinds matched directly against source text. The
/// `Lexer` wrapper turns these into the semantic [`Token`]s above,
/// resolving note pitch and loop-suffix data along the way.
#[derive(Logos, Clone, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub(crate) enum RawKind {
    #[token("|:")]
    LoopStart,

    #[regex(r":\|(?:\s*(?:[xX][0-9]+|[Rr]4))?", |lex| lex.slice().to_string(), priority = 4)]
    LoopEnd(String),

    #[regex(r"[Rr]4", priority = 3)]
    RestRight,

    #[regex(r"[Rr]2", priority = 3)]
    RestLeft,

    /// Bar line: purely cosmetic, discarded rather than tokenized.
    #[token("|", logos::skip)]
    Bar,

    #[regex(r"[A-Ga-g](?:#|[bB])?-?[0-9]?[._]*", |lex| lex.slice().to_string(), priority = 2)]
    NoteRaw(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_loop_end() {
        assert_eq!(
            decode_loop_end_suffix(":|"),
            (LoopMode::Brainfuck, None, false, false)
        );
    }

    #[test]
    fn decodes_fixed_loop_end() {
        assert_eq!(
            decode_loop_end_suffix(":|x3"),
            (LoopMode::Fixed(3), Some(3), false, false)
        );
    }

    #[test]
    fn decodes_fixed_zero_loop_end() {
        assert_eq!(
            decode_loop_end_suffix(":|x0"),
            (LoopMode::Fixed(0), Some(0), false, false)
        );
    }

    #[test]
    fn decodes_infinite_loop_end() {
        assert_eq!(
            decode_loop_end_suffix(":|x00"),
            (LoopMode::Infinite, None, true, false)
        );
    }

    #[test]
    fn decodes_tape_driven_loop_end_with_whitespace() {
        assert_eq!(
            decode_loop_end_suffix(":| R4"),
            (LoopMode::TapeDriven, None, false, true)
        );
    }

    #[test]
    fn malformed_count_falls_back_to_brainfuck() {
        assert_eq!(
            decode_loop_end_suffix(":|xNaN"),
            (LoopMode::Brainfuck, None, false, false)
        );
    }

    #[test]
    fn parses_sharp_and_flat_enharmonics() {
        let cs = parse_note("C#4").unwrap();
        let db = parse_note("Db4").unwrap();
        assert_eq!(cs.base, db.base);
    }

    #[test]
    fn rejects_unlisted_enharmonic_spelling() {
        assert!(parse_note("Cb4").is_none());
        assert!(parse_note("E#4").is_none());
    }

    #[test]
    fn parses_negative_octave_and_suffixes() {
        let note = parse_note("C-1.").unwrap();
        assert_eq!(note.base, 0);
        assert_eq!(note.octave, -1);
        assert!(note.staccato);
        assert!(!note.legato);
    }
}
