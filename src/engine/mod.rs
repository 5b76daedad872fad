//! Per-engine request processors and the dispatch table that selects among
//! them.

pub mod aes;
pub mod ecc;
pub mod passthru;
pub mod rsa;
pub mod sha;
pub mod zlib;

use crate::descriptor::{Descriptor, Engine};
use crate::error::CcpError;
use crate::io::{AesProxy, HostIo};
use crate::lsb::LocalStorageBuffer;
use crate::trace::TraceSink;
use crate::transfer::XferBackends;

pub use self::sha::ShaStreamState;
pub use self::zlib::ZlibStreamState;

/// Bundles everything an engine processor needs beyond the descriptor
/// itself: the device's shared mutable state and its external
/// collaborators.
pub struct EngineInputs<'a> {
    pub lsb: &'a mut LocalStorageBuffer,
    pub host_io: &'a mut dyn HostIo,
    pub cb_written_last: &'a mut u32,
    pub sha_ctx: &'a mut Option<ShaStreamState>,
    pub zlib_ctx: &'a mut Option<ZlibStreamState>,
    pub aes_proxy: Option<&'a mut dyn AesProxy>,
    pub trace: &'a mut dyn TraceSink,
}

impl<'a> EngineInputs<'a> {
    /// Reborrows the backends the transfer engine needs, leaving the rest of
    /// `self` (streaming contexts, trace sink) free for the caller to use
    /// alongside an open [`crate::transfer::TransferContext`].
    pub fn xfer_backends(&mut self) -> XferBackends<'_> {
        XferBackends {
            lsb: self.lsb,
            host_io: self.host_io,
            cb_written_last: self.cb_written_last,
        }
    }
}

/// Executes one descriptor against the engine it selects.
pub fn process(desc: &Descriptor, inputs: &mut EngineInputs<'_>) -> Result<(), CcpError> {
    match desc.engine {
        Engine::Passthru => passthru::process(desc, inputs),
        Engine::Sha => sha::process(desc, inputs),
        Engine::Aes => aes::process(desc, inputs),
        Engine::Rsa => rsa::process(desc, inputs),
        Engine::Ecc => ecc::process(desc, inputs),
        Engine::ZlibDecompress => zlib::process(desc, inputs),
        Engine::XtsAes128 | Engine::Des3 => Err(CcpError::UnsupportedFunction {
            engine: desc.engine.name(),
            detail: "engine not implemented by this model".into(),
        }),
    }
}
