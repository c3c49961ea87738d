//! this implements the stuff necessary to find the canonical frame address of a
//! frame from DWARF call frame information.
//!
//! # how it works
//! we get the raw debug sections from somewhere (see [`divination`] if the
//! somewhere is our own executable). to find the CFA for a pc, we walk the
//! `.debug_frame` records until we find the FDE covering the pc, parse the CIE
//! it points to, and replay the FDE's instructions (yes, that shit is
//! basically a programming language) until we have moved past the pc.
//!
//! with a CFA in hand, the location of a variable is another little program
//! (a DWARF expression), see [`expr`].
//!
//! See https://dwarfstd.org/doc/DWARF5.pdf for more information if more
//! information is desired.

pub mod cursor;
#[cfg(feature = "std")]
pub mod divination;
pub mod entry;
pub mod expr;
pub mod leb128;
pub mod parse;
pub mod replay;


use cursor::Endian;
use expr::ExprContext;
use parse::{BaselineCache, FrameRegion};

use crate::config::Config;
use crate::error::Result;

/// The debug sections of one object, as handed to us by a loader.
///
/// Missing sections are empty slices. The data is never modified, so a
/// `DebugData` can be queried from many threads at once.
#[derive(Debug, Clone, Copy)]
pub struct DebugData<'a> {
    abbrev: &'a [u8],
    info: &'a [u8],
    str: &'a [u8],
    frame: &'a [u8],
    endian: Endian,
    config: Config,
}

impl<'a> DebugData<'a> {
    pub fn new(
        abbrev: &'a [u8],
        info: &'a [u8],
        str: &'a [u8],
        frame: &'a [u8],
        endian: Endian,
    ) -> Self {
        Self {
            abbrev,
            info,
            str,
            frame,
            endian,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// `.debug_abbrev`
    pub fn abbrev(&self) -> &'a [u8] {
        self.abbrev
    }

    /// `.debug_info`
    pub fn info(&self) -> &'a [u8] {
        self.info
    }

    /// `.debug_str`
    pub fn str(&self) -> &'a [u8] {
        self.str
    }

    pub fn frame_region(&self) -> FrameRegion<'a> {
        FrameRegion::new(self.frame, self.endian)
    }

    /// Computes the canonical frame address of the function executing at
    /// `pc`, whose stack pointer is currently `sp`.
    #[instrument(level = "debug", skip(self), err(level = "debug"))]
    pub fn canonical_frame_address(&self, pc: u64, sp: u64) -> Result<u64> {
        let region = self.frame_region();
        let frame = region.find_fde(pc, self.config.max_entries)?;
        let baseline = region.parse_cie(frame.cie_offset)?;
        replay::resolve(&baseline, &frame, pc, sp, self.config.offset_rule)
    }

    /// Like [`DebugData::canonical_frame_address`], but CIEs are only parsed
    /// once. `cache` must only ever be used with this `DebugData`.
    #[instrument(level = "debug", skip(self, cache), err(level = "debug"))]
    pub fn canonical_frame_address_cached(
        &self,
        cache: &mut BaselineCache,
        pc: u64,
        sp: u64,
    ) -> Result<u64> {
        let region = self.frame_region();
        let frame = region.find_fde(pc, self.config.max_entries)?;
        let baseline = cache.get_or_parse(&region, frame.cie_offset)?;
        replay::resolve(&baseline, &frame, pc, sp, self.config.offset_rule)
    }

    /// Evaluates a location expression for a frame with the given CFA.
    pub fn evaluate_location(&self, expr: &[u8], canonical_frame_address: u64) -> Result<u64> {
        expr::evaluate(
            expr,
            ExprContext {
                canonical_frame_address,
            },
        )
    }
}
