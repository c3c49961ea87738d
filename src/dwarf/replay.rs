//! Replays the instructions of an FDE up to a program counter.
//!
//! The rows of the CFI table are never materialized. We walk the instructions
//! in order, tracking the location of the current row and the CFA offset, and
//! stop once the location has moved past the pc we are interested in. The
//! instructions are emitted in non-decreasing location order, so whatever
//! offset is committed at that point is the one in effect at the pc.


use super::cursor::Cursor;
use super::parse::{CommonFrameBaseline, FrameWorkingSet, Instruction, DW_CFA_def_cfa_offset_sf};
use crate::config::OffsetRule;
use crate::error::{Error, Result};

/// Computes the CFA at `pc` for a frame whose stack pointer is `sp`.
#[instrument(level = "debug", skip(baseline, frame), err)]
pub fn resolve(
    baseline: &CommonFrameBaseline,
    frame: &FrameWorkingSet<'_>,
    pc: u64,
    sp: u64,
    offset_rule: OffsetRule,
) -> Result<u64> {
    let mut loc = frame.initial_location;
    let mut offset = baseline.cfa_offset;
    trace!(
        "loc: {loc:#x}..{:#x} {:x?}",
        loc.wrapping_add(frame.address_range),
        frame.instructions
    );

    let data = &mut Cursor::new(frame.instructions, frame.endian);
    while !data.is_empty() {
        let opcode = data.read_u8()?;

        let positional =
            !(opcode == DW_CFA_def_cfa_offset_sf && offset_rule == OffsetRule::Unconditional);
        if positional && loc > pc {
            trace!("loc {loc:#x} is past pc, stopping");
            break;
        }

        match Instruction::parse(opcode, data)? {
            Instruction::DefCfaOffsetSf(factored_offset) => {
                offset = factored_offset.wrapping_mul(baseline.data_alignment_factor);
                trace!("offset: {offset}");
            }
            Instruction::AdvanceLoc(delta) => {
                loc = advance(loc, delta.into(), baseline.code_alignment_factor)?;
                trace!("loc: {loc:#x}");
            }
            Instruction::AdvanceLoc1(delta) => {
                loc = advance(loc, delta.into(), baseline.code_alignment_factor)?;
                trace!("loc: {loc:#x}");
            }
            Instruction::AdvanceLoc2(delta) => {
                loc = advance(loc, delta.into(), baseline.code_alignment_factor)?;
                trace!("loc: {loc:#x}");
            }
            _ => return Err(Error::UnsupportedCfaOp(opcode)),
        }
    }

    Ok((sp as i64).wrapping_add(offset) as u64)
}

/// Moves `loc` by `delta * code_alignment_factor`. A location that leaves
/// the address space means the FDE is corrupt.
fn advance(loc: u64, delta: i64, code_alignment_factor: u64) -> Result<u64> {
    i64::try_from(code_alignment_factor)
        .ok()
        .and_then(|factor| delta.checked_mul(factor))
        .and_then(|step| loc.checked_add_signed(step))
        .ok_or(Error::LocationOverflow { loc })
}
