//! Evaluation of DWARF location expressions.
//!
//! Source: https://dwarfstd.org/doc/DWARF5.pdf §2.5 DWARF Expressions
//!
//! An expression is bytecode for a little stack machine. Each operation pushes
//! or pops entries on the stack, and the entry left on top at the end is the
//! result. We only execute what compilers emit for variables that live at a
//! fixed offset from the canonical frame address:
//! ```text
//! DW_OP_call_frame_cfa
//! DW_OP_consts -24
//! DW_OP_plus
//! ```
#![allow(non_upper_case_globals)]

#[cfg(test)]
mod tests;

use alloc::vec::Vec;

use super::cursor::{Cursor, Endian};
use super::leb128::read_ileb128;
use crate::error::{Error, Result};

/// Everything an expression may ask about the frame it is evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExprContext {
    pub canonical_frame_address: u64,
}

/// An operation we know how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// The single operand of the DW_OP_consts operation provides a signed
    /// LEB128 integer constant.
    Consts(i64),
    /// The DW_OP_plus operation pops the top two stack values, adds them
    /// together, and pushes the result.
    Plus,
    /// The DW_OP_call_frame_cfa operation pushes the value of the CFA,
    /// obtained from the Call Frame Information.
    CallFrameCfa,
}

impl Operation {
    /// Decodes the operation starting with `opcode`, reading its operands
    /// from `data`.
    pub fn parse(opcode: u8, data: &mut Cursor<'_>) -> Result<Self> {
        Ok(match opcode {
            DW_OP_consts => Operation::Consts(read_ileb128(data)?),
            DW_OP_plus => Operation::Plus,
            DW_OP_call_frame_cfa => Operation::CallFrameCfa,
            _ => return Err(Error::UnsupportedExprOp(opcode)),
        })
    }
}

struct Stack(Vec<i64>);

impl Stack {
    fn push(&mut self, value: i64) {
        self.0.push(value);
    }

    /// Pops the top two entries, returned as `(top, below_top)`.
    fn pop2(&mut self) -> Result<(i64, i64)> {
        let depth = self.0.len();
        match (self.0.pop(), self.0.pop()) {
            (Some(top), Some(below)) => Ok((top, below)),
            _ => Err(Error::StackUnderflow { needed: 2, depth }),
        }
    }
}

/// Runs `expr` to completion and returns the address it computes.
///
/// The stack has to hold exactly one entry at the end. There is no partial
/// result, the first unsupported operation ends evaluation.
#[instrument(level = "trace", skip(expr), ret, err)]
pub fn evaluate(expr: &[u8], ctx: ExprContext) -> Result<u64> {
    // operands here are LEB128 only, so byte order never matters
    let data = &mut Cursor::new(expr, Endian::NATIVE);
    let mut stack = Stack(Vec::new());

    while !data.is_empty() {
        trace!("stack: {:?}", stack.0);
        let opcode = data.read_u8()?;
        match Operation::parse(opcode, data)? {
            Operation::Consts(n) => stack.push(n),
            Operation::Plus => {
                // `below op top` for non-commutative operators like DW_OP_minus
                let (top, below) = stack.pop2()?;
                stack.push(below.wrapping_add(top));
            }
            Operation::CallFrameCfa => stack.push(ctx.canonical_frame_address as i64),
        }
    }

    match stack.0[..] {
        [value] => Ok(value as u64),
        _ => Err(Error::InvalidExpression {
            depth: stack.0.len(),
        }),
    }
}

pub const DW_OP_addr: u8 = 0x03;
pub const DW_OP_deref: u8 = 0x06;
pub const DW_OP_const1u: u8 = 0x08;
pub const DW_OP_const1s: u8 = 0x09;
pub const DW_OP_const2u: u8 = 0x0a;
pub const DW_OP_const2s: u8 = 0x0b;
pub const DW_OP_const4u: u8 = 0x0c;
pub const DW_OP_const4s: u8 = 0x0d;
pub const DW_OP_const8u: u8 = 0x0e;
pub const DW_OP_const8s: u8 = 0x0f;
pub const DW_OP_constu: u8 = 0x10;
pub const DW_OP_consts: u8 = 0x11;
pub const DW_OP_dup: u8 = 0x12;
pub const DW_OP_drop: u8 = 0x13;
pub const DW_OP_over: u8 = 0x14;
pub const DW_OP_pick: u8 = 0x15;
pub const DW_OP_swap: u8 = 0x16;
pub const DW_OP_rot: u8 = 0x17;
pub const DW_OP_abs: u8 = 0x19;
pub const DW_OP_and: u8 = 0x1a;
pub const DW_OP_div: u8 = 0x1b;
pub const DW_OP_minus: u8 = 0x1c;
pub const DW_OP_mod: u8 = 0x1d;
pub const DW_OP_mul: u8 = 0x1e;
pub const DW_OP_neg: u8 = 0x1f;
pub const DW_OP_not: u8 = 0x20;
pub const DW_OP_or: u8 = 0x21;
pub const DW_OP_plus: u8 = 0x22;
pub const DW_OP_plus_uconst: u8 = 0x23;
pub const DW_OP_shl: u8 = 0x24;
pub const DW_OP_shr: u8 = 0x25;
pub const DW_OP_shra: u8 = 0x26;
pub const DW_OP_xor: u8 = 0x27;
pub const DW_OP_bra: u8 = 0x28;
pub const DW_OP_eq: u8 = 0x29;
pub const DW_OP_ge: u8 = 0x2a;
pub const DW_OP_gt: u8 = 0x2b;
pub const DW_OP_le: u8 = 0x2c;
pub const DW_OP_lt: u8 = 0x2d;
pub const DW_OP_ne: u8 = 0x2e;
pub const DW_OP_skip: u8 = 0x2f;
/// `DW_OP_lit0` through `DW_OP_lit31` are `DW_OP_lit0 + n`.
pub const DW_OP_lit0: u8 = 0x30;
/// `DW_OP_reg0` through `DW_OP_reg31` are `DW_OP_reg0 + n`.
pub const DW_OP_reg0: u8 = 0x50;
/// `DW_OP_breg0` through `DW_OP_breg31` are `DW_OP_breg0 + n`.
pub const DW_OP_breg0: u8 = 0x70;
pub const DW_OP_regx: u8 = 0x90;
pub const DW_OP_fbreg: u8 = 0x91;
pub const DW_OP_bregx: u8 = 0x92;
pub const DW_OP_piece: u8 = 0x93;
pub const DW_OP_deref_size: u8 = 0x94;
pub const DW_OP_nop: u8 = 0x96;
pub const DW_OP_call_frame_cfa: u8 = 0x9c;
pub const DW_OP_stack_value: u8 = 0x9f;
pub const DW_OP_lo_user: u8 = 0xe0;
pub const DW_OP_hi_user: u8 = 0xff;
