//! I/O operations: the only operations that touch bytes in flight. Each
//! exposes `operator` (called from the step loop) plus the host-facing
//! `handle_read` / `handle_eof` / `get_write_buffer` / `handle_write` hooks.

use std::sync::Arc;

use super::{Operation, ReasonForBlockedOperation};
use crate::frame::InputOutputOperationContext;
use crate::value::{first_absorbing, Value};

pub enum IoOutcome {
    Done(Value),
    Blocked(ReasonForBlockedOperation),
}

pub fn execute(op: &Operation, operands: &[Value], ctx: &mut InputOutputOperationContext) -> IoOutcome {
    match op {
        Operation::ReadStaticOctets(expected) => read_static(expected, ctx),
        Operation::ReadOctetsUntilTerminator { .. } => read_until_terminator(ctx),
        Operation::ReadInt32Native => read_int32_native(ctx),
        Operation::ReadIntFromAscii => read_int_from_ascii(ctx),
        Operation::WriteStaticOctets(bytes) => write_fixed(ctx, bytes, Value::Octets(bytes.clone())),
        Operation::WriteInt32Native => write_int32_native(operands, ctx),
        Operation::WriteOctets => write_octets(operands, ctx),
        Operation::WriteOctetsWithEscape {
            escaped_char,
            escape_sequence,
        } => write_octets_with_escape(operands, ctx, *escaped_char, escape_sequence),
        Operation::TerminateListIfReadAhead(term) => terminate_if_read_ahead(term, ctx),
        _ => unreachable!("non-I/O operation routed to io::execute"),
    }
}

fn read_static(expected: &Arc<Vec<u8>>, ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if ctx.buffer.len() < expected.len() {
        return if ctx.eof {
            IoOutcome::Done(Value::protocol_mismatch("eof before static octets completed"))
        } else {
            IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForRead)
        };
    }
    if ctx.buffer.as_slice() == expected.as_slice() {
        IoOutcome::Done(Value::Octets(expected.clone()))
    } else {
        IoOutcome::Done(Value::protocol_mismatch("static octets did not match"))
    }
}

fn read_until_terminator(ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if ctx.ready {
        return IoOutcome::Done(Value::octets(std::mem::take(&mut ctx.buffer)));
    }
    if ctx.eof {
        return IoOutcome::Done(Value::protocol_mismatch("eof before terminator"));
    }
    IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForRead)
}

fn read_int32_native(ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if ctx.buffer.len() < 4 {
        return if ctx.eof {
            IoOutcome::Done(Value::protocol_mismatch("eof before Int32 completed"))
        } else {
            IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForRead)
        };
    }
    let bytes: [u8; 4] = ctx.buffer[..4].try_into().expect("checked length above");
    IoOutcome::Done(Value::Int32(i32::from_ne_bytes(bytes)))
}

fn read_int_from_ascii(ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if ctx.ready || ctx.eof {
        if ctx.buffer.is_empty() {
            return IoOutcome::Done(Value::protocol_mismatch("no digits before terminator"));
        }
        return match std::str::from_utf8(&ctx.buffer)
            .ok()
            .and_then(|s| s.parse::<i32>().ok())
        {
            Some(n) => IoOutcome::Done(Value::Int32(n)),
            None => IoOutcome::Done(Value::protocol_mismatch("ascii integer overflow")),
        };
    }
    IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForRead)
}

fn write_fixed(ctx: &mut InputOutputOperationContext, bytes: &[u8], done: Value) -> IoOutcome {
    if !ctx.ready {
        ctx.buffer = bytes.to_vec();
        ctx.ready = true;
    }
    if ctx.write_consumed >= ctx.buffer.len() {
        IoOutcome::Done(done)
    } else {
        IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForWrite)
    }
}

fn write_int32_native(operands: &[Value], ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if let Some(e) = first_absorbing(operands) {
        return IoOutcome::Done(e);
    }
    let n = match operands[0].as_int32() {
        Ok(n) => n,
        Err(e) => return IoOutcome::Done(e),
    };
    write_fixed(ctx, &n.to_ne_bytes(), Value::Int32(n))
}

fn write_octets(operands: &[Value], ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if let Some(e) = first_absorbing(operands) {
        return IoOutcome::Done(e);
    }
    let bytes = match operands[0].as_octets() {
        Ok(b) => b.clone(),
        Err(e) => return IoOutcome::Done(e),
    };
    write_fixed(ctx, &bytes, Value::Octets(bytes.clone()))
}

fn write_octets_with_escape(
    operands: &[Value],
    ctx: &mut InputOutputOperationContext,
    escaped_char: u8,
    escape_sequence: &Arc<Vec<u8>>,
) -> IoOutcome {
    if let Some(e) = first_absorbing(operands) {
        return IoOutcome::Done(e);
    }
    let bytes = match operands[0].as_octets() {
        Ok(b) => b.clone(),
        Err(e) => return IoOutcome::Done(e),
    };
    if !ctx.ready {
        let mut escaped = Vec::with_capacity(bytes.len());
        for &b in bytes.iter() {
            if b == escaped_char {
                escaped.extend_from_slice(escape_sequence);
            } else {
                escaped.push(b);
            }
        }
        ctx.buffer = escaped;
        ctx.ready = true;
    }
    if ctx.write_consumed >= ctx.buffer.len() {
        IoOutcome::Done(Value::Octets(bytes))
    } else {
        IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForWrite)
    }
}

fn terminate_if_read_ahead(_term: &Arc<Vec<u8>>, ctx: &mut InputOutputOperationContext) -> IoOutcome {
    if ctx.ready {
        return IoOutcome::Done(Value::ControlFlow(
            crate::value::ControlFlowInstruction::InterruptGenerator,
        ));
    }
    if ctx.mismatched || ctx.eof {
        return IoOutcome::Done(Value::Bool(false));
    }
    IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForRead)
}

/// How many bytes of `input` this operation consumes, and what it does with them.
/// Called by the runner when a continuation is blocked on `WaitingForRead`.
pub fn handle_read(op: &Operation, ctx: &mut InputOutputOperationContext, input: &[u8]) -> usize {
    match op {
        Operation::ReadStaticOctets(expected) => {
            let need = expected.len().saturating_sub(ctx.buffer.len());
            let take = need.min(input.len());
            ctx.buffer.extend_from_slice(&input[..take]);
            take
        }
        Operation::ReadInt32Native => {
            let need = 4usize.saturating_sub(ctx.buffer.len());
            let take = need.min(input.len());
            ctx.buffer.extend_from_slice(&input[..take]);
            take
        }
        Operation::ReadIntFromAscii => {
            let mut consumed = 0;
            for &byte in input {
                if byte.is_ascii_digit() {
                    ctx.buffer.push(byte);
                    consumed += 1;
                } else {
                    ctx.ready = true;
                    break;
                }
            }
            consumed
        }
        Operation::ReadOctetsUntilTerminator { terminator, escape } => {
            scan_until_terminator(ctx, terminator, escape.as_ref(), input)
        }
        Operation::TerminateListIfReadAhead(term) => scan_lookahead(ctx, term, input),
        _ => 0,
    }
}

fn scan_until_terminator(
    ctx: &mut InputOutputOperationContext,
    terminator: &Arc<Vec<u8>>,
    escape: Option<&(u8, Arc<Vec<u8>>)>,
    input: &[u8],
) -> usize {
    let max_needed = terminator
        .len()
        .max(escape.map(|(_, seq)| seq.len()).unwrap_or(0))
        .max(1);
    let mut consumed = 0;
    for &byte in input {
        consumed += 1;
        ctx.scratch.push(byte);

        if let Some((esc_char, esc_seq)) = escape {
            if ctx.scratch.ends_with(esc_seq.as_slice()) {
                let cut = ctx.scratch.len() - esc_seq.len();
                let prefix: Vec<u8> = ctx.scratch.drain(..cut).collect();
                ctx.buffer.extend(prefix);
                ctx.scratch.clear();
                ctx.buffer.push(*esc_char);
                continue;
            }
        }
        if ctx.scratch.ends_with(terminator.as_slice()) {
            let cut = ctx.scratch.len() - terminator.len();
            let prefix: Vec<u8> = ctx.scratch.drain(..cut).collect();
            ctx.buffer.extend(prefix);
            ctx.scratch.clear();
            ctx.ready = true;
            break;
        }
        if ctx.scratch.len() > max_needed - 1 {
            let flush = ctx.scratch.len() - (max_needed - 1);
            let prefix: Vec<u8> = ctx.scratch.drain(..flush).collect();
            ctx.buffer.extend(prefix);
        }
    }
    consumed
}

fn scan_lookahead(ctx: &mut InputOutputOperationContext, term: &Arc<Vec<u8>>, input: &[u8]) -> usize {
    let mut consumed = 0;
    for &byte in input {
        let candidate_len = ctx.scratch.len() + 1;
        if candidate_len > term.len() || term[ctx.scratch.len()] != byte {
            // Mismatch: bytes tried so far were only peeked, never reported
            // to the host as consumed, so there is nothing to roll back.
            ctx.mismatched = true;
            return consumed;
        }
        ctx.scratch.push(byte);
        consumed += 1;
        if ctx.scratch.len() == term.len() {
            ctx.ready = true;
            break;
        }
    }
    consumed
}

pub fn get_write_buffer<'a>(ctx: &'a InputOutputOperationContext) -> &'a [u8] {
    &ctx.buffer[ctx.write_consumed.min(ctx.buffer.len())..]
}

pub fn handle_write(ctx: &mut InputOutputOperationContext, n: usize) {
    ctx.write_consumed = (ctx.write_consumed + n).min(ctx.buffer.len());
}

pub fn handle_eof(ctx: &mut InputOutputOperationContext) {
    ctx.eof = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::InputOutputOperationContext;

    #[test]
    fn terminate_if_read_ahead_full_match_interrupts_generator() {
        let term: Arc<Vec<u8>> = Arc::new(b"END".to_vec());
        let mut ctx = InputOutputOperationContext::default();
        scan_lookahead(&mut ctx, &term, b"END");
        let outcome = terminate_if_read_ahead(&term, &mut ctx);
        assert!(matches!(
            outcome,
            IoOutcome::Done(Value::ControlFlow(
                crate::value::ControlFlowInstruction::InterruptGenerator
            ))
        ));
    }

    #[test]
    fn terminate_if_read_ahead_mismatch_stops_without_eof() {
        let term: Arc<Vec<u8>> = Arc::new(b"END".to_vec());
        let mut ctx = InputOutputOperationContext::default();
        scan_lookahead(&mut ctx, &term, b"EX");
        assert!(ctx.mismatched);
        let outcome = terminate_if_read_ahead(&term, &mut ctx);
        assert!(matches!(outcome, IoOutcome::Done(Value::Bool(false))));
    }

    #[test]
    fn terminate_if_read_ahead_blocks_on_partial_prefix_match() {
        let term: Arc<Vec<u8>> = Arc::new(b"END".to_vec());
        let mut ctx = InputOutputOperationContext::default();
        scan_lookahead(&mut ctx, &term, b"EN");
        let outcome = terminate_if_read_ahead(&term, &mut ctx);
        assert!(matches!(
            outcome,
            IoOutcome::Blocked(ReasonForBlockedOperation::WaitingForRead)
        ));
    }

    #[test]
    fn terminate_if_read_ahead_eof_on_partial_match_is_false() {
        let term: Arc<Vec<u8>> = Arc::new(b"END".to_vec());
        let mut ctx = InputOutputOperationContext::default();
        scan_lookahead(&mut ctx, &term, b"EN");
        handle_eof(&mut ctx);
        let outcome = terminate_if_read_ahead(&term, &mut ctx);
        assert!(matches!(outcome, IoOutcome::Done(Value::Bool(false))));
    }
}
