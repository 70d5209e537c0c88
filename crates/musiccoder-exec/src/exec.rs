//! The tape-machine interpreter: the dispatch loop that drives `pc`
//! across the resolved token stream.

use std::collections::HashMap;
use std::io::{Read, Write};

use musiccoder_lexer::{LoopMode, SpannedToken, Token};
use musiccoder_resolver::Resolution;

use crate::error::ExecError;
use crate::tape::Tape;

/// Loop-info entry owned by the executor. Copied by value from the
/// resolver's output at the start of a run; `skip_count` is the one
/// field the executor itself writes, once a `TapeDriven` loop resolves
/// its trailing-note counter at entry.
#[derive(Clone, Copy, Debug)]
struct RuntimeLoopInfo {
    mode: LoopMode,
    count: Option<u32>,
    use_next_cell: bool,
    skip_count: usize,
}

/// The interpreter's full mutable state for a single run.
pub struct Executor<'a> {
    tokens: &'a [SpannedToken],
    resolution: &'a Resolution,
    loop_info: HashMap<usize, RuntimeLoopInfo>,
    tape: Tape,
    ptr: usize,
    prev_val: i32,
    /// `LoopStart` pc -> remaining iterations; `-1` means infinite.
    active_loops: HashMap<usize, i64>,
    pc: usize,
    debug: bool,
}

impl<'a> Executor<'a> {
    pub fn new(tokens: &'a [SpannedToken], resolution: &'a Resolution, debug: bool) -> Self {
        let loop_info = resolution
            .loop_info
            .iter()
            .map(|(&start, info)| {
                (
                    start,
                    RuntimeLoopInfo {
                        mode: info.mode,
                        count: info.count,
                        use_next_cell: info.use_next_cell,
                        skip_count: 0,
                    },
                )
            })
            .collect();

        Self {
            tokens,
            resolution,
            loop_info,
            tape: Tape::new(),
            ptr: 0,
            prev_val: 0,
            active_loops: HashMap::new(),
            pc: 0,
            debug,
        }
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Run to completion (`pc` falls off the end of the stream) or the
    /// first fatal error.
    pub fn run(&mut self, out: &mut impl Write, input: &mut impl Read) -> Result<(), ExecError> {
        while self.pc < self.tokens.len() {
            if self.debug {
                self.trace();
            }
            self.step(out, input)?;
            self.pc += 1;
        }
        Ok(())
    }

    fn trace(&self) {
        let token = &self.tokens[self.pc].token;
        eprintln!(
            "DEBUG: PC={}, Token={}, Ptr={}, Val={}, PrevNote={}",
            self.pc,
            token_label(token),
            self.ptr,
            self.tape.peek(self.ptr),
            self.prev_val,
        );
    }

    fn step(&mut self, out: &mut impl Write, input: &mut impl Read) -> Result<(), ExecError> {
        match self.tokens[self.pc].token {
            Token::RestLeft => self.exec_rest_left()?,
            Token::RestRight => self.exec_rest_right(),
            Token::LoopStart => self.exec_loop_start(),
            Token::LoopEnd { .. } => self.exec_loop_end(),
            Token::Note {
                midi,
                staccato,
                legato,
            } => self.exec_note(midi, staccato, legato, out, input),
        }
        Ok(())
    }

    fn exec_rest_left(&mut self) -> Result<(), ExecError> {
        if self.ptr == 0 {
            return Err(ExecError::PointerUnderflow {
                span: self.tokens[self.pc].span,
            });
        }
        self.ptr -= 1;
        self.prev_val = 0;
        Ok(())
    }

    fn exec_rest_right(&mut self) {
        self.ptr += 1;
        self.tape.grow_to(self.ptr);
        self.prev_val = 0;
    }

    fn exec_loop_start(&mut self) {
        let start = self.pc;
        let info = *self
            .loop_info
            .get(&start)
            .expect("resolver populated every LoopStart's info");

        if let LoopMode::Brainfuck = info.mode {
            if self.tape.get(self.ptr) == 0 {
                let end = self
                    .resolution
                    .loop_map
                    .get(start)
                    .expect("resolver matched every LoopStart");
                self.pc = end;
            }
            return;
        }

        if self.active_loops.contains_key(&start) {
            return;
        }

        match info.mode {
            LoopMode::Infinite => {
                self.active_loops.insert(start, -1);
            }
            LoopMode::Fixed(n) => {
                self.active_loops.insert(start, i64::from(n));
            }
            LoopMode::TapeDriven => {
                let end = self
                    .resolution
                    .loop_map
                    .get(start)
                    .expect("resolver matched every LoopStart");
                let (count, skip_count) = self.resolve_tape_driven_count(end);
                self.active_loops.insert(start, count);
                self.loop_info.get_mut(&start).unwrap().skip_count = skip_count;
            }
            LoopMode::Brainfuck => unreachable!("handled above"),
        }
    }

    /// Determine a `TapeDriven` loop's iteration count at entry: either
    /// from a contiguous run of unsuffixed trailing notes (interval-sum
    /// accumulator), or from the cell right of the pointer when no such
    /// run exists.
    fn resolve_tape_driven_count(&self, end: usize) -> (i64, usize) {
        let mut cursor = end + 1;
        let mut local_prev: i64 = 0;
        let mut accumulator: i64 = 0;
        let mut has_note = false;

        while cursor < self.tokens.len() {
            let Token::Note {
                midi,
                staccato,
                legato,
            } = self.tokens[cursor].token
            else {
                break;
            };
            if staccato || legato {
                break;
            }
            has_note = true;
            let value = i64::from(midi);
            if value > local_prev {
                accumulator += value;
            } else if value < local_prev {
                accumulator -= value;
            }
            local_prev = value;
            cursor += 1;
        }

        if has_note {
            (accumulator, cursor - (end + 1))
        } else {
            let count = i64::from(self.tape.peek(self.ptr + 1));
            (count, 0)
        }
    }

    fn exec_loop_end(&mut self) {
        let end = self.pc;
        let start = self
            .resolution
            .loop_map
            .get(end)
            .expect("resolver matched every LoopEnd");
        let info = *self
            .loop_info
            .get(&start)
            .expect("resolver populated every LoopStart's info");

        if let LoopMode::Brainfuck = info.mode {
            if self.tape.get(self.ptr) != 0 {
                self.pc = start;
            }
            return;
        }

        match self.active_loops.get(&start).copied() {
            Some(-1) => self.pc = start,
            Some(remaining) => {
                let remaining = remaining - 1;
                if remaining > 0 {
                    self.active_loops.insert(start, remaining);
                    self.pc = start;
                } else {
                    self.active_loops.remove(&start);
                    let skip_count = self.loop_info.get(&start).map_or(0, |i| i.skip_count);
                    self.pc += skip_count;
                }
            }
            None => {}
        }
    }

    fn exec_note(
        &mut self,
        midi: u8,
        staccato: bool,
        legato: bool,
        out: &mut impl Write,
        input: &mut impl Read,
    ) {
        let c = i32::from(midi);
        let mut effective_prev = c;

        if c > self.prev_val {
            let cell = self.tape.get(self.ptr);
            self.tape.set(self.ptr, cell.wrapping_add(midi));
        } else if c < self.prev_val {
            let cell = self.tape.get(self.ptr);
            self.tape.set(self.ptr, cell.wrapping_sub(midi));
        } else if let Some((next_midi, next_staccato, next_legato)) = self.peek_next_note() {
            let diff = i32::from(next_midi) - c;
            let cell = self.tape.get(self.ptr);
            let new_cell = if diff >= 0 {
                cell.wrapping_add(diff as u8)
            } else {
                cell.wrapping_sub((-diff) as u8)
            };
            self.tape.set(self.ptr, new_cell);

            if next_staccato {
                self.staccato_write(out);
            }
            if next_legato {
                self.legato_read(input);
            }

            self.pc += 1; // consume the next note; the dispatch loop's trailing +1 clears it
            effective_prev = i32::from(next_midi);
        }

        self.prev_val = effective_prev;

        if staccato {
            self.staccato_write(out);
        }
        if legato {
            self.legato_read(input);
        }
    }

    fn peek_next_note(&self) -> Option<(u8, bool, bool)> {
        let idx = self.pc + 1;
        match self.tokens.get(idx).map(|t| t.token) {
            Some(Token::Note {
                midi,
                staccato,
                legato,
            }) => Some((midi, staccato, legato)),
            _ => None,
        }
    }

    fn staccato_write(&self, out: &mut impl Write) {
        let byte = self.tape.get(self.ptr);
        let _ = out.write_all(&[byte]);
    }

    fn legato_read(&mut self, input: &mut impl Read) {
        let mut buf = [0u8; 1];
        match input.read(&mut buf) {
            Ok(1) => self.tape.set(self.ptr, buf[0]),
            _ => self.tape.set(self.ptr, 0),
        }
    }
}

fn token_label(token: &Token) -> &'static str {
    match token {
        Token::LoopStart => "LOOP_START",
        Token::LoopEnd { .. } => "LOOP_END",
        Token::RestLeft => "REST_H",
        Token::RestRight => "REST_Q",
        Token::Note { .. } => "NOTE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use musiccoder_lexer::lex;
    use musiccoder_resolver::resolve;

    fn run_program(src: &str) -> Vec<u8> {
        let source = musiccoder_core::Source::from_string("test", src.to_string());
        let tokens = lex(&source).unwrap();
        let resolution = resolve(&tokens).unwrap();
        let mut exec = Executor::new(&tokens, &resolution, false);
        let mut out = Vec::new();
        let mut input: &[u8] = &[];
        exec.run(&mut out, &mut input).unwrap();
        out
    }

    #[test]
    fn scenario_1_c5_c5_staccato() {
        let out = run_program("C5 C5.");
        assert_eq!(out, vec![0x48]); // 'H'
    }

    #[test]
    fn scenario_2_a4_a4_staccato() {
        let out = run_program("A4 A4.");
        assert_eq!(out, vec![0x45]); // 'E'
    }

    #[test]
    fn scenario_3_fixed_loop_then_trailing_equal_note() {
        // Only the first pass through the body adds 72 to tape[0]: every
        // later pass (the 2nd/3rd iterations, then the trailing `C5.`)
        // hits `c == prev_val` with `LoopEnd`/end-of-stream as the next
        // token, so the equal-interval look-ahead finds no successor and
        // performs no arithmetic.
        let out = run_program("|: C5 :|x3 C5.");
        assert_eq!(out, vec![0x48]); // 'H' = 72
    }

    #[test]
    fn scenario_4_rests_move_pointer_between_cells() {
        let out = run_program("C4 R4 C4 R4 C4.");
        assert_eq!(out, vec![0x3C]); // '<' = 60
    }

    #[test]
    fn scenario_5_tape_driven_loop_with_trailing_counter_notes() {
        // Accumulator resolves to 150 iterations (D5=74 ascending from 0,
        // then E5=76 ascending from 74), but only the loop's first pass
        // adds C5=72 to tape[0]: every later pass hits `c == prev_val`
        // with `LoopEnd` as the next token, so the look-ahead performs no
        // arithmetic and tape[0] stays 72 for the remaining 149 passes.
        let out = run_program("|: C5 :| R4 D5 E5");
        let source = musiccoder_core::Source::from_string("test", "|: C5 :| R4 D5 E5".to_string());
        let tokens = lex(&source).unwrap();
        let resolution = resolve(&tokens).unwrap();
        let mut exec = Executor::new(&tokens, &resolution, false);
        let mut sink = Vec::new();
        let mut input: &[u8] = &[];
        exec.run(&mut sink, &mut input).unwrap();
        assert_eq!(exec.tape().get(0), 72);
        assert!(out.is_empty());
    }

    #[test]
    fn scenario_6_infinite_loop_trace_is_not_exercised_but_mode_resolves() {
        let source = musiccoder_core::Source::from_string("test", "|: A5. :|x00".to_string());
        let tokens = lex(&source).unwrap();
        let resolution = resolve(&tokens).unwrap();
        assert!(resolution
            .loop_info
            .values()
            .any(|i| i.infinite));
    }

    #[test]
    fn pointer_underflow_is_fatal() {
        let source = musiccoder_core::Source::from_string("test", "R2".to_string());
        let tokens = lex(&source).unwrap();
        let resolution = resolve(&tokens).unwrap();
        let mut exec = Executor::new(&tokens, &resolution, false);
        let mut out = Vec::new();
        let mut input: &[u8] = &[];
        let err = exec.run(&mut out, &mut input).unwrap_err();
        assert!(matches!(err, ExecError::PointerUnderflow { .. }));
    }

    #[test]
    fn tape_grows_past_30000_cells_via_repeated_rest_right() {
        let src = "R4 ".repeat(30_010);
        let source = musiccoder_core::Source::from_string("test", src);
        let tokens = lex(&source).unwrap();
        let resolution = resolve(&tokens).unwrap();
        let mut exec = Executor::new(&tokens, &resolution, false);
        let mut out = Vec::new();
        let mut input: &[u8] = &[];
        exec.run(&mut out, &mut input).unwrap();
        assert!(exec.tape().len() > 30_000);
    }

    #[test]
    fn fixed_one_matches_unlooped_body() {
        let looped = run_program("|: C5. :|x1");
        let bare = run_program("C5.");
        assert_eq!(looped, bare);
    }

    #[test]
    fn fixed_zero_still_runs_body_once() {
        // `x0` decodes to `Fixed(0)`; the body already ran its first pass
        // by the time `LoopEnd` decrements the count to -1 and exits, so
        // it behaves the same as `x1` / no loop at all, not zero passes.
        let looped = run_program("|: C5. :|x0");
        let bare = run_program("C5.");
        assert_eq!(looped, bare);
    }

    #[test]
    fn brainfuck_loop_with_zero_cell_runs_zero_times() {
        let out = run_program("|: C5. :|");
        assert!(out.is_empty());
    }

    #[test]
    fn legato_reads_from_input_and_defaults_to_zero_on_eof() {
        let source = musiccoder_core::Source::from_string("test", "C4_".to_string());
        let tokens = lex(&source).unwrap();
        let resolution = resolve(&tokens).unwrap();

        let mut exec = Executor::new(&tokens, &resolution, false);
        let mut out = Vec::new();
        let mut input: &[u8] = b"Z";
        exec.run(&mut out, &mut input).unwrap();
        assert_eq!(exec.tape().get(0), b'Z');

        let mut exec_eof = Executor::new(&tokens, &resolution, false);
        let mut out2 = Vec::new();
        let mut empty: &[u8] = &[];
        exec_eof.run(&mut out2, &mut empty).unwrap();
        assert_eq!(exec_eof.tape().get(0), 0);
    }
}
