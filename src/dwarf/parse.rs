//! Implements parsing of DWARF call frame information.
//!
//! Source: https://dwarfstd.org/doc/DWARF5.pdf §6.4 Call Frame Information
//!
//! The CFI is a very large table of the following structure:
//! ```text
//! LOC CFA R0 R1 ... RN
//! L0
//! L1
//! ...
//! LN
//! ```
//!
//! It is not stored as a table. The `.debug_frame` section is a sequence of
//! records, each starting with a 4 byte length. A Common Information Entry
//! (CIE) holds what many functions share: alignment factors, the return
//! address column and the instructions producing the first row. A Frame
//! Description Entry (FDE) covers the address range of one function and holds
//! the instructions that build the rows for that range, starting from the row
//! of its CIE.
//!
//! We only understand the plain version 3 CIE without augmentation, and out
//! of all the columns we only track the CFA offset.
#![allow(non_upper_case_globals)]

#[cfg(test)]
mod tests;

use alloc::collections::BTreeMap;

use super::cursor::{Cursor, Endian};
use super::leb128::{read_ileb128, read_uleb128};
use crate::error::{Error, Result};

/// The `CIE_id` that marks a record as a CIE in `.debug_frame`.
pub const CIE_ID: u32 = 0xffff_ffff;
/// An initial length with this value announces the 64-bit DWARF format.
const DWARF64_LENGTH: u32 = 0xffff_ffff;
/// `CIE_pointer`, `initial_location` and `address_range`.
const FDE_HEADER_LEN: u32 = 4 + 8 + 8;
const SUPPORTED_CIE_VERSION: u8 = 3;

/// The baseline row of a CIE.
///
/// This is everything an FDE needs from its CIE, so it can be parsed once
/// and shared between all lookups that hit FDEs pointing at the same CIE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonFrameBaseline {
    /// A constant that is factored out of all advance location instructions.
    /// The resulting value is (operand * code_alignment_factor).
    pub code_alignment_factor: u64,
    /// A constant that is factored out of certain offset instructions. The
    /// resulting value is (operand * data_alignment_factor).
    pub data_alignment_factor: i64,
    /// Which column in the rule table represents the return address of the
    /// function. Note that this column might not correspond to an actual
    /// machine register.
    pub return_address_register: u8,
    pub cfa_register: u64,
    pub cfa_offset: i64,
    /// Where the return address is saved, relative to the CFA, if the
    /// initial instructions say so.
    pub return_address_offset: Option<i64>,
}

/// One FDE, bound to a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWorkingSet<'a> {
    /// Offset of the FDE in the section.
    pub offset: usize,
    /// Offset of the CIE this FDE belongs to.
    pub cie_offset: u32,
    /// The address of the first location associated with this table entry.
    pub initial_location: u64,
    /// The number of bytes of program instructions described by this entry.
    pub address_range: u64,
    /// A sequence of table defining instructions, borrowed from the section.
    pub instructions: &'a [u8],
    pub endian: Endian,
}

impl FrameWorkingSet<'_> {
    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.initial_location && pc - self.initial_location < self.address_range
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRecord<'a> {
    Cie { offset: usize },
    Fde(FrameWorkingSet<'a>),
}

/// The subset of call frame instructions we can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    //-------- 6.4.2.1 Row Creation Instructions
    //
    /// The DW_CFA_advance_loc instruction takes a single operand (encoded with
    /// the opcode) that represents a constant delta. The required action is to
    /// create a new table row with a location value that is computed by
    /// taking the current entry’s location value and adding the value of
    /// delta * code_alignment_factor.
    AdvanceLoc(u8),
    /// Identical to DW_CFA_advance_loc except for the encoding and size of the
    /// delta operand, which is a single byte and read as signed here.
    AdvanceLoc1(i8),
    /// Identical to DW_CFA_advance_loc except for the encoding and size of the
    /// delta operand, which is two bytes in section byte order and read as
    /// signed here.
    AdvanceLoc2(i16),
    //
    //-------- 6.4.2.2 CFA Definition Instructions
    //
    /// The DW_CFA_def_cfa instruction takes two unsigned LEB128 operands
    /// representing a register number and a (non-factored) offset. The required
    /// action is to define the current CFA rule to use the provided register
    /// and offset.
    DefCfa { register: u64, offset: u64 },
    /// The DW_CFA_def_cfa_offset_sf instruction takes a signed LEB128 operand
    /// representing a factored offset. The resulting offset is
    /// factored_offset * data_alignment_factor.
    DefCfaOffsetSf(i64),
    //
    //-------- 6.4.2.3 Register Rule Instructions
    //
    /// The DW_CFA_offset instruction takes two operands: a register number
    /// (encoded with the opcode) and a constant representing a factored
    /// offset. The offset is read as signed LEB128.
    Offset { register: u8, factored_offset: i64 },
    //
    //-------- 6.4.2.5 Padding Instruction
    //
    /// The DW_CFA_nop instruction has no operands and no required actions. It
    /// is used as padding to make a CIE or FDE an appropriate size.
    Nop,
}

impl Instruction {
    /// Decodes the instruction starting with `opcode`, reading its operands
    /// from `data`. Anything outside of [`Instruction`] is an
    /// [`Error::UnsupportedCfaOp`].
    pub fn parse(opcode: u8, data: &mut Cursor<'_>) -> Result<Self> {
        let operand = opcode & LOW_6_BITS;
        Ok(match opcode >> 6 {
            DW_CFA_advance_loc_hi => Instruction::AdvanceLoc(operand),
            DW_CFA_offset_hi => Instruction::Offset {
                register: operand,
                factored_offset: read_ileb128(data)?,
            },
            DW_CFA_restore_hi => return Err(Error::UnsupportedCfaOp(opcode)),
            _ => match opcode {
                DW_CFA_nop => Instruction::Nop,
                DW_CFA_advance_loc1 => Instruction::AdvanceLoc1(data.read_i8()?),
                DW_CFA_advance_loc2 => Instruction::AdvanceLoc2(data.read_i16()?),
                DW_CFA_def_cfa => Instruction::DefCfa {
                    register: read_uleb128(data)?,
                    offset: read_uleb128(data)?,
                },
                DW_CFA_def_cfa_offset_sf => Instruction::DefCfaOffsetSf(read_ileb128(data)?),
                _ => return Err(Error::UnsupportedCfaOp(opcode)),
            },
        })
    }
}

/// A `.debug_frame` section and its byte order.
#[derive(Debug, Clone, Copy)]
pub struct FrameRegion<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> FrameRegion<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn records(&self) -> FrameRecords<'a> {
        FrameRecords {
            data: Cursor::new(self.data, self.endian),
            len: self.data.len(),
            done: false,
        }
    }

    /// Finds the FDE whose address range covers `pc`.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn find_fde(&self, pc: u64, max_entries: usize) -> Result<FrameWorkingSet<'a>> {
        for (scanned, record) in self.records().enumerate() {
            if scanned >= max_entries {
                return Err(Error::TooManyEntries { limit: max_entries });
            }
            match record? {
                FrameRecord::Cie { offset } => trace!("skipping CIE at {offset:#x}"),
                FrameRecord::Fde(fde) if fde.contains(pc) => {
                    debug!(
                        "found FDE at {:#x} covering {:#x}..{:#x}",
                        fde.offset,
                        fde.initial_location,
                        fde.initial_location.wrapping_add(fde.address_range)
                    );
                    return Ok(fde);
                }
                FrameRecord::Fde(_) => {}
            }
        }
        Err(Error::PcNotCovered(pc))
    }

    /// Parses the CIE at `offset` and runs its initial instructions.
    #[instrument(level = "debug", skip(self), err)]
    pub fn parse_cie(&self, offset: u32) -> Result<CommonFrameBaseline> {
        let data = &mut Cursor::new(self.data, self.endian);
        data.skip(offset as usize)?;

        let length = data.read_u32()?;
        if length == DWARF64_LENGTH {
            return Err(Error::Dwarf64Unsupported {
                offset: offset as usize,
            });
        }
        if length < 4 {
            return Err(Error::EntryTooShort {
                offset: offset as usize,
                length,
            });
        }
        let data = &mut Cursor::new(data.read_bytes(length as usize)?, self.endian);
        trace!("CIE (without len): {:x?}", data.rest());

        if data.read_u32()? != CIE_ID {
            return Err(Error::NotACie { offset });
        }

        let version = data.read_u8()?;
        if version != SUPPORTED_CIE_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        // A null-terminated augmentation string. Only the empty string keeps
        // the layout we know how to read.
        let augmentation = data.read_u8()?;
        if augmentation != 0 {
            return Err(Error::UnsupportedAugmentation(augmentation));
        }

        let mut baseline = CommonFrameBaseline {
            code_alignment_factor: read_uleb128(data)?,
            data_alignment_factor: read_ileb128(data)?,
            return_address_register: data.read_u8()?,
            cfa_register: 0,
            cfa_offset: 0,
            return_address_offset: None,
        };
        baseline.execute_initial_instructions(data)?;

        trace!("{baseline:?}");
        Ok(baseline)
    }
}

impl CommonFrameBaseline {
    /// Runs the initial instructions of a CIE, which have to end exactly at
    /// the end of the entry.
    fn execute_initial_instructions(&mut self, data: &mut Cursor<'_>) -> Result<()> {
        while !data.is_empty() {
            let opcode = data.read_u8()?;
            let instruction = Instruction::parse(opcode, data)?;
            trace!("initial instruction: {instruction:?}");
            match instruction {
                Instruction::DefCfa { register, offset } => {
                    self.cfa_register = register;
                    self.cfa_offset = offset as i64;
                }
                Instruction::Nop => {}
                Instruction::Offset {
                    register,
                    factored_offset,
                } if register == self.return_address_register => {
                    self.return_address_offset =
                        Some(factored_offset.wrapping_mul(self.data_alignment_factor));
                }
                _ => return Err(Error::UnsupportedCfaOp(opcode)),
            }
        }
        Ok(())
    }
}

/// Iterates over the CIEs and FDEs of a section, in order.
///
/// Stops after the first error.
pub struct FrameRecords<'a> {
    data: Cursor<'a>,
    len: usize,
    done: bool,
}

impl<'a> FrameRecords<'a> {
    fn parse_record(&mut self) -> Result<FrameRecord<'a>> {
        let offset = self.len - self.data.remaining();
        let endian = self.data.endian();

        let length = self.data.read_u32()?;
        if length == DWARF64_LENGTH {
            return Err(Error::Dwarf64Unsupported { offset });
        }
        if length < 4 {
            return Err(Error::EntryTooShort { offset, length });
        }
        let entry = &mut Cursor::new(self.data.read_bytes(length as usize)?, endian);

        let id = entry.read_u32()?;
        if id == CIE_ID {
            return Ok(FrameRecord::Cie { offset });
        }

        if length < FDE_HEADER_LEN {
            return Err(Error::FdeTooShort { offset, length });
        }
        Ok(FrameRecord::Fde(FrameWorkingSet {
            offset,
            cie_offset: id,
            initial_location: entry.read_u64()?,
            address_range: entry.read_u64()?,
            instructions: entry.rest(),
            endian,
        }))
    }
}

impl<'a> Iterator for FrameRecords<'a> {
    type Item = Result<FrameRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.data.is_empty() {
            return None;
        }
        let record = self.parse_record();
        self.done = record.is_err();
        Some(record)
    }
}

/// Parsed CIE baselines of one section, keyed by their offset.
///
/// Only valid for the section it was filled from.
#[derive(Debug, Default)]
pub struct BaselineCache {
    baselines: BTreeMap<u32, CommonFrameBaseline>,
}

impl BaselineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }

    pub fn get_or_parse(
        &mut self,
        region: &FrameRegion<'_>,
        offset: u32,
    ) -> Result<CommonFrameBaseline> {
        if let Some(baseline) = self.baselines.get(&offset) {
            return Ok(*baseline);
        }
        let baseline = region.parse_cie(offset)?;
        self.baselines.insert(offset, baseline);
        Ok(baseline)
    }
}

const LOW_6_BITS: u8 = u8::MAX >> 2;

const DW_CFA_advance_loc_hi: u8 = 0x01;
const DW_CFA_offset_hi: u8 = 0x02;
const DW_CFA_restore_hi: u8 = 0x03;

pub const DW_CFA_nop: u8 = 0;
pub const DW_CFA_set_loc: u8 = 0x01;
pub const DW_CFA_advance_loc1: u8 = 0x02;
pub const DW_CFA_advance_loc2: u8 = 0x03;
pub const DW_CFA_advance_loc4: u8 = 0x04;
pub const DW_CFA_offset_extended: u8 = 0x05;
pub const DW_CFA_restore_extended: u8 = 0x06;
pub const DW_CFA_undefined: u8 = 0x07;
pub const DW_CFA_same_value: u8 = 0x08;
pub const DW_CFA_register: u8 = 0x09;
pub const DW_CFA_remember_state: u8 = 0x0a;
pub const DW_CFA_restore_state: u8 = 0x0b;
pub const DW_CFA_def_cfa: u8 = 0x0c;
pub const DW_CFA_def_cfa_register: u8 = 0x0d;
pub const DW_CFA_def_cfa_offset: u8 = 0x0e;
pub const DW_CFA_def_cfa_expression: u8 = 0x0f;
pub const DW_CFA_expression: u8 = 0x10;
pub const DW_CFA_offset_extended_sf: u8 = 0x11;
pub const DW_CFA_def_cfa_sf: u8 = 0x12;
pub const DW_CFA_def_cfa_offset_sf: u8 = 0x13;
pub const DW_CFA_val_offset: u8 = 0x14;
pub const DW_CFA_val_offset_sf: u8 = 0x15;
pub const DW_CFA_val_expression: u8 = 0x16;
pub const DW_CFA_lo_user: u8 = 0x1c;
pub const DW_CFA_hi_user: u8 = 0x3f;
/// `DW_CFA_advance_loc` with a delta of `n` is `DW_CFA_advance_loc + n`.
pub const DW_CFA_advance_loc: u8 = DW_CFA_advance_loc_hi << 6;
/// `DW_CFA_offset` for register `n` is `DW_CFA_offset + n`.
pub const DW_CFA_offset: u8 = DW_CFA_offset_hi << 6;
/// `DW_CFA_restore` for register `n` is `DW_CFA_restore + n`.
pub const DW_CFA_restore: u8 = DW_CFA_restore_hi << 6;
