use crate::error::{Error, Result};

/// The byte order of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    #[cfg(target_endian = "little")]
    pub const NATIVE: Endian = Endian::Little;
    #[cfg(target_endian = "big")]
    pub const NATIVE: Endian = Endian::Big;
}

impl Default for Endian {
    fn default() -> Self {
        Self::NATIVE
    }
}

/// A read position in a borrowed byte buffer.
///
/// Reads never panic, running out of bytes is an [`Error::UnexpectedEof`].
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self { data, endian }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// The bytes that have not been read yet.
    pub fn rest(&self) -> &'a [u8] {
        self.data
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_bytes(&mut self, amount: usize) -> Result<&'a [u8]> {
        if self.data.len() < amount {
            return Err(Error::UnexpectedEof {
                wanted: amount,
                remaining: self.data.len(),
            });
        }
        let (result, rest) = self.data.split_at(amount);
        self.data = rest;
        Ok(result)
    }

    pub fn skip(&mut self, amount: usize) -> Result<()> {
        self.read_bytes(amount).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let [byte] = self.read_array()?;
        Ok(byte)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_array()?;
        Ok(match self.endian {
            Endian::Little => u16::from_le_bytes(bytes),
            Endian::Big => u16::from_be_bytes(bytes),
        })
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.read_u16().map(|v| v as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_array()?;
        Ok(match self.endian {
            Endian::Little => u32::from_le_bytes(bytes),
            Endian::Big => u32::from_be_bytes(bytes),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.read_array()?;
        Ok(match self.endian {
            Endian::Little => u64::from_le_bytes(bytes),
            Endian::Big => u64::from_be_bytes(bytes),
        })
    }
}
