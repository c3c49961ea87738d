//! # divination
//!
//! the practice of seeking knowledge of the future or the unknown by
//! supernatural means.
//!
//! we ask supernatural means (the operating system) where our own executable
//! lives, and then ask the object file where the dwarves are.
//!
//! the debug sections are looked up by their ELF names. for Mach-O, the
//! `object` crate maps `.debug_frame` to `__debug_frame` for us. a section that
//! is not there is simply empty, lots of binaries don't carry `.debug_frame`.

use std::fmt;
use std::path::{Path, PathBuf};

use object::{Object, ObjectSection};

use super::cursor::Endian;
use super::DebugData;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to find the path of the current executable")]
    CurrentExe(#[source] std::io::Error),
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse object file")]
    Object(#[from] object::Error),
}

const SECTIONS: [&str; 4] = [".debug_abbrev", ".debug_info", ".debug_str", ".debug_frame"];

/// An object file read into memory.
pub struct Image {
    path: PathBuf,
    data: Vec<u8>,
}

impl Image {
    /// Reads the executable of the current process.
    pub fn open_self() -> Result<Self, LoadError> {
        let path = std::env::current_exe().map_err(LoadError::CurrentExe)?;
        Self::open(path)
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;
        trace!("read {} bytes", data.len());
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finds the debug sections in the image.
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()), err)]
    pub fn debug_data(&self) -> Result<DebugData<'_>, LoadError> {
        let file = object::File::parse(&*self.data)?;
        let endian = if file.is_little_endian() {
            Endian::Little
        } else {
            Endian::Big
        };

        let mut sections: [&[u8]; 4] = Default::default();
        for (name, data) in SECTIONS.iter().zip(sections.iter_mut()) {
            *data = section(&file, name)?;
        }
        let [abbrev, info, str, frame] = sections;

        Ok(DebugData::new(abbrev, info, str, frame, endian))
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .finish()
    }
}

fn section<'data>(file: &object::File<'data>, name: &str) -> Result<&'data [u8], LoadError> {
    match file.section_by_name(name) {
        Some(section) => {
            let data = section.data()?;
            trace!("{name}: {} bytes", data.len());
            Ok(data)
        }
        None => {
            trace!("{name} is missing");
            Ok(&[])
        }
    }
}
