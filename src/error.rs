//! Error types for the CCP device model.

use thiserror::Error;

/// A single failure kind covering every way a CCP request can fail.
///
/// The queue executor translates any of these into an `ERROR` status plus
/// the `ERROR` interrupt-status bit, and stops draining the owning queue.
#[derive(Debug, Error)]
pub enum CcpError {
    #[error("LSB access out of bounds: addr={addr:#x} len={len} (LSB is {bound} bytes)")]
    LsbOutOfBounds {
        addr: u32,
        len: u32,
        bound: u32,
    },

    #[error("unsupported {engine} function combination: {detail}")]
    UnsupportedFunction {
        engine: &'static str,
        detail: String,
    },

    #[error("crypto primitive failure in {engine}: {detail}")]
    CryptoFailure {
        engine: &'static str,
        detail: String,
    },

    #[error("host I/O failure at addr={addr:#x} len={len}")]
    HostIo { addr: u32, len: u32 },

    #[error("malformed descriptor: {detail}")]
    MalformedDescriptor { detail: String },

    #[error("system memory transfers are not implemented by this model")]
    SystemMemoryUnsupported,

    #[error("partial transfer of {actual} of {requested} requested bytes without an explicit sink")]
    ShortTransfer { requested: usize, actual: usize },
}

pub type CcpResult<T> = Result<T, CcpError>;
