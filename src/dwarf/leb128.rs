//! Little Endian Base 128, the variable length integers used all over DWARF.
//!
//! Every byte carries seven bits of the value, least significant group first.
//! The top bit of a byte is set when another byte follows. For the signed
//! flavor, bit 6 of the last byte is the sign bit and gets extended.
//!
//! Values that need more than 64 bits are rejected instead of silently
//! wrapping, which also bounds a decode to ten bytes.


use super::cursor::Cursor;
use crate::error::{Error, Result};

const CONTINUATION_BIT: u8 = 0b1000_0000;
const SIGN_BIT: u8 = 0b0100_0000;
const LOW_BITS: u8 = !CONTINUATION_BIT;

pub fn read_uleb128(data: &mut Cursor<'_>) -> Result<u64> {
    let mut result = 0;
    let mut shift = 0;
    loop {
        let byte = data.read_u8()?;
        // the tenth group only has room for a single bit
        if shift == 63 && byte > 1 {
            return Err(Error::Leb128Overflow);
        }
        result |= u64::from(byte & LOW_BITS) << shift;
        if byte & CONTINUATION_BIT == 0 {
            break;
        }
        shift += 7;
    }
    Ok(result)
}

pub fn read_ileb128(data: &mut Cursor<'_>) -> Result<i64> {
    let mut result = 0;
    let mut shift = 0;
    loop {
        let byte = data.read_u8()?;
        if shift == 63 && byte != 0 && byte != LOW_BITS {
            return Err(Error::Leb128Overflow);
        }
        result |= i64::from(byte & LOW_BITS) << shift;
        shift += 7;
        if byte & CONTINUATION_BIT == 0 {
            if shift < 64 && byte & SIGN_BIT != 0 {
                result |= -1 << shift;
            }
            break;
        }
    }
    Ok(result)
}
