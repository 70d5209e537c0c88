//! The tape-machine executor: the third and final stage of the
//! MusicCoder pipeline, driving a resolved token stream to completion
//! against a growable byte tape.

mod error;
mod exec;
mod tape;

pub use error::ExecError;
pub use exec::Executor;
pub use tape::{Tape, INITIAL_LEN};
