//! Tokenizer that lifts MusicCoder source text into a token stream.

mod lexer;
pub mod token;

pub use lexer::{lex, strip_comments, LexError, Lexer};
pub use token::{LoopMode, SpannedToken, Token};
