//! The boundary to whatever parses `.debug_info`.
//!
//! We don't parse debugging information entries ourselves. Whoever does hands
//! us an [`Entry`], and we pull the location expression out of it.
#![allow(non_upper_case_globals)]

use alloc::vec::Vec;

use super::expr::{self, ExprContext};
use crate::error::{Error, Result};

/// The name of an attribute (`DW_AT_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DwAt(pub u16);

pub const DW_AT_name: DwAt = DwAt(0x03);
pub const DW_AT_location: DwAt = DwAt(0x02);
pub const DW_AT_frame_base: DwAt = DwAt(0x40);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeValue<'a> {
    /// `DW_FORM_block*`, how DWARF 2 and 3 store expressions.
    Block(&'a [u8]),
    /// `DW_FORM_exprloc`
    Exprloc(&'a [u8]),
    Udata(u64),
    Sdata(i64),
    String(&'a str),
}

/// A debugging information entry.
pub trait Entry {
    fn attribute(&self, attr: DwAt) -> Option<AttributeValue<'_>>;
}

/// An entry that is just a list of its attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEntry<'a> {
    pub fields: Vec<(DwAt, AttributeValue<'a>)>,
}

impl<'a> FieldEntry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attr: DwAt, value: AttributeValue<'a>) -> Self {
        self.fields.push((attr, value));
        self
    }
}

impl Entry for FieldEntry<'_> {
    fn attribute(&self, attr: DwAt) -> Option<AttributeValue<'_>> {
        self.fields
            .iter()
            .find(|(name, _)| *name == attr)
            .map(|(_, value)| *value)
    }
}

/// Computes the address of the variable described by `entry`, relative to
/// the frame with the canonical frame address `cfa`.
///
/// An entry without a location expression is [`Error::NoLocation`].
pub fn location<E: Entry + ?Sized>(entry: &E, cfa: u64) -> Result<u64> {
    let expression = match entry.attribute(DW_AT_location) {
        Some(AttributeValue::Block(bytes) | AttributeValue::Exprloc(bytes)) => bytes,
        _ => return Err(Error::NoLocation),
    };
    expr::evaluate(
        expression,
        ExprContext {
            canonical_frame_address: cfa,
        },
    )
}
