//! PASSTHRU engine: byte copy and 256-bit byteswap.
//!
//! Grounded on `pspDevCcpReqPassthruProcess`. Only `{bitwise = NOOP,
//! byteswap ∈ {NOOP, 256BIT with cbSrc == 32}, reflect = 0}` is accepted;
//! every other combination fails the request outright, matching the
//! source's single `if` gate.

use crate::descriptor::Descriptor;
use crate::engine::EngineInputs;
use crate::error::CcpError;
use crate::trace::{trace_evt, Severity};
use crate::transfer::TransferContext;

const ENGINE: &str = "PASSTHRU";

// function bit layout: byteswap(0-1) | bitwise(2-4) | reflect(5-7). This
// crate's own reconstruction (see descriptor.rs), kept local to this module
// since no other engine shares it.
const BYTESWAP_MASK: u16 = 0x3;
const BITWISE_SHIFT: u16 = 2;
const BITWISE_MASK: u16 = 0x7;
const REFLECT_SHIFT: u16 = 5;
const REFLECT_MASK: u16 = 0x7;

const BYTESWAP_NOOP: u16 = 0;
const BYTESWAP_256BIT: u16 = 2;
const BITWISE_NOOP: u16 = 0;

const CHUNK_LEN: usize = 4096;

pub fn process(desc: &Descriptor, inputs: &mut EngineInputs<'_>) -> Result<(), CcpError> {
    let byteswap = desc.function & BYTESWAP_MASK;
    let bitwise = (desc.function >> BITWISE_SHIFT) & BITWISE_MASK;
    let reflect = (desc.function >> REFLECT_SHIFT) & REFLECT_MASK;

    let accepted = bitwise == BITWISE_NOOP
        && reflect == 0
        && (byteswap == BYTESWAP_NOOP || (byteswap == BYTESWAP_256BIT && desc.cb_src == 32));
    if !accepted {
        trace_evt!(
            inputs.trace,
            Severity::Error,
            ENGINE,
            "unsupported combination bitwise={bitwise} byteswap={byteswap} reflect={reflect} cb_src={}",
            desc.cb_src
        );
        return Err(CcpError::UnsupportedFunction {
            engine: ENGINE,
            detail: format!("bitwise={bitwise} byteswap={byteswap} reflect={reflect}"),
        });
    }

    let dst = desc.dst.ok_or_else(|| CcpError::MalformedDescriptor {
        detail: "PASSTHRU descriptor missing destination fields".into(),
    })?;
    let write_reversed = byteswap == BYTESWAP_256BIT;
    let mut ctx = TransferContext::new(
        desc.addr_src,
        desc.src_mem_type,
        desc.cb_src,
        dst.addr,
        dst.mem_type,
        desc.cb_src,
        write_reversed,
    );

    let mut backends = inputs.xfer_backends();
    let mut left = desc.cb_src as usize;
    let mut buf = [0u8; CHUNK_LEN];
    while left > 0 {
        let this = left.min(CHUNK_LEN);
        ctx.read(&mut buf[..this], &mut backends, None)?;
        ctx.write(&buf[..this], &mut backends, None)?;
        left -= this;
    }

    Ok(())
}
