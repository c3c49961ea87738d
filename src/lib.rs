//! Finds the canonical frame address of a frame from DWARF call frame
//! information, and the location of variables relative to it.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let image = cfawind::Image::open_self()?;
//! let data = image.debug_data()?;
//! let cfa = data.canonical_frame_address(0x2023, 0x10000)?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

#[macro_use]
extern crate tracing;

#[cfg(target_arch = "x86_64")]
pub mod arch;
pub mod config;
pub mod dwarf;
mod error;
#[cfg(unix)]
pub mod identify;

pub use config::{Config, OffsetRule};
#[cfg(feature = "std")]
pub use dwarf::divination::{Image, LoadError};
pub use dwarf::{cursor::Endian, parse::BaselineCache, DebugData};
pub use error::{Error, ErrorKind, Result};
