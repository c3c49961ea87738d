/// Why a frame lookup or expression evaluation failed.
///
/// All of these are fatal for the query that produced them. The input is an
/// already loaded, immutable byte buffer, so retrying can never help.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("index out of bounds, tried to read {wanted} bytes from {remaining}")]
    UnexpectedEof { wanted: usize, remaining: usize },
    #[error("LEB128 value does not fit into 64 bits")]
    Leb128Overflow,
    #[error("64-bit DWARF entry at offset {offset:#x} is not supported")]
    Dwarf64Unsupported { offset: usize },
    #[error("entry at offset {offset:#x} too short: length {length}")]
    EntryTooShort { offset: usize, length: u32 },
    #[error("frame description entry at offset {offset:#x} too short: length {length}")]
    FdeTooShort { offset: usize, length: u32 },
    #[error("no common information entry found at offset {offset:#x}")]
    NotACie { offset: u32 },
    #[error("unsupported CIE version: {0}")]
    UnsupportedVersion(u8),
    #[error("unsupported CIE augmentation: {0:#x}")]
    UnsupportedAugmentation(u8),
    #[error("unsupported CFA operation: {0:#04x}")]
    UnsupportedCfaOp(u8),
    #[error("unsupported location operation: {0:#04x}")]
    UnsupportedExprOp(u8),
    #[error("location operation needs {needed} operands, stack has {depth}")]
    StackUnderflow { needed: usize, depth: usize },
    #[error("invalid location expression: stack depth {depth} at end")]
    InvalidExpression { depth: usize },
    #[error("frame data does not cover pc {0:#x}")]
    PcNotCovered(u64),
    #[error("entry has no location attribute")]
    NoLocation,
    #[error("advancing the location from {loc:#x} overflows")]
    LocationOverflow { loc: u64 },
    #[error("gave up after scanning {limit} entries")]
    TooManyEntries { limit: usize },
}

/// The broad class of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A read ran out of bytes before it completed.
    Truncated,
    /// A version, augmentation or opcode outside of what we understand.
    Unsupported,
    /// The data is structurally broken.
    Malformed,
    /// Nothing answers the question.
    NotFound,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnexpectedEof { .. } => ErrorKind::Truncated,
            Error::Dwarf64Unsupported { .. }
            | Error::UnsupportedVersion(_)
            | Error::UnsupportedAugmentation(_)
            | Error::UnsupportedCfaOp(_)
            | Error::UnsupportedExprOp(_) => ErrorKind::Unsupported,
            Error::Leb128Overflow
            | Error::EntryTooShort { .. }
            | Error::FdeTooShort { .. }
            | Error::NotACie { .. }
            | Error::StackUnderflow { .. }
            | Error::InvalidExpression { .. }
            | Error::LocationOverflow { .. }
            | Error::TooManyEntries { .. } => ErrorKind::Malformed,
            Error::PcNotCovered(_) | Error::NoLocation => ErrorKind::NotFound,
        }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
