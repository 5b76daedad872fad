//! ZLIB_DECOMPRESS engine: a single logical zlib-wrapped inflate stream that
//! can span many descriptors.
//!
//! Grounded on `pspDevCcpReqZlibProcess`. The engine-specific function bits
//! are ignored, same as the source (`(void)uFunc;`). `Z_DEF_WBITS` there
//! resolves to the standard positive `MAX_WBITS`, i.e. the zlib-wrapped
//! format with its two-byte header and trailing Adler-32, not raw deflate.

use flate2::{Decompress, FlushDecompress, Status};

use crate::descriptor::Descriptor;
use crate::engine::EngineInputs;
use crate::error::CcpError;
use crate::transfer::TransferContext;

const ENGINE: &str = "ZLIB_DECOMPRESS";

const CHUNK_LEN: usize = 4096;

/// The one streaming inflate context the device may have in flight at a
/// time, persisted across descriptors between `init` and `eom`.
pub struct ZlibStreamState {
    decompress: Decompress,
}

impl ZlibStreamState {
    fn new() -> Self {
        ZlibStreamState {
            decompress: Decompress::new(true),
        }
    }
}

pub fn process(desc: &Descriptor, inputs: &mut EngineInputs<'_>) -> Result<(), CcpError> {
    let dst = desc.dst.ok_or_else(|| CcpError::MalformedDescriptor {
        detail: "ZLIB descriptor missing destination fields".into(),
    })?;
    // The source hands the transfer context an effectively unbounded write
    // budget (`UINT32_MAX`); the real limit is however much the stream
    // decompresses to.
    let mut ctx = TransferContext::new(desc.addr_src, desc.src_mem_type, desc.cb_src, dst.addr, dst.mem_type, u32::MAX, false);
    let mut backends = inputs.xfer_backends();

    if desc.init {
        *inputs.zlib_ctx = Some(ZlibStreamState::new());
    }
    let state = inputs.zlib_ctx.as_mut().ok_or_else(|| CcpError::MalformedDescriptor {
        detail: "ZLIB stream read before init".into(),
    })?;

    let mut in_buf = [0u8; CHUNK_LEN];
    let mut out_buf = [0u8; CHUNK_LEN];
    let mut off_decomp = 0usize;

    let mut left = desc.cb_src as usize;
    while left > 0 {
        let this = left.min(CHUNK_LEN);
        ctx.read(&mut in_buf[..this], &mut backends, None)?;

        let mut in_off = 0usize;
        while in_off < this {
            let before_in = state.decompress.total_in();
            let before_out = state.decompress.total_out();
            let status = state
                .decompress
                .decompress(&in_buf[in_off..this], &mut out_buf[off_decomp..], FlushDecompress::None)
                .map_err(|e| CcpError::CryptoFailure {
                    engine: ENGINE,
                    detail: e.to_string(),
                })?;
            let consumed = (state.decompress.total_in() - before_in) as usize;
            let produced = (state.decompress.total_out() - before_out) as usize;
            in_off += consumed;
            off_decomp += produced;

            if off_decomp == CHUNK_LEN {
                ctx.write(&out_buf, &mut backends, None)?;
                off_decomp = 0;
            }
            if status == Status::StreamEnd {
                break;
            }
            if consumed == 0 && produced == 0 {
                // No forward progress possible without more input than this
                // chunk holds; move on to the next source chunk.
                break;
            }
        }

        left -= this;
    }

    if off_decomp > 0 {
        ctx.write(&out_buf[..off_decomp], &mut backends, None)?;
    }

    if desc.eom {
        inputs.zlib_ctx.take();
    }

    Ok(())
}
