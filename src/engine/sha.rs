//! SHA engine: multi-part SHA-256/SHA-384 bound to an LSB slot.
//!
//! Grounded on `pspDevCcpReqShaProcess`. A streaming digest context is
//! created lazily the first time one is absent — *not* gated on the `init`
//! flag, reproducing the source's live `#else` branch (the `#if 0` branch
//! that would have obeyed `fInit` literally is dead code there and is not
//! reproduced here). The digest is written to the destination LSB slot
//! byte-reversed, since downstream code reads it back via a 256-bit
//! byteswap passthru.

use sha2::{Digest, Sha256, Sha384};

use crate::descriptor::Descriptor;
use crate::engine::EngineInputs;
use crate::error::CcpError;
use crate::trace::{trace_evt, Severity};
use crate::transfer::TransferContext;

const ENGINE: &str = "SHA";

const SHA_TYPE_MASK: u16 = 0xf;
const SHA_TYPE_256: u16 = 2;
const SHA_TYPE_384: u16 = 3;

const CHUNK_LEN: usize = 256;

/// The one streaming SHA context the device may have in flight at a time.
pub enum ShaStreamState {
    Sha256(Box<Sha256>),
    Sha384(Box<Sha384>),
}

impl ShaStreamState {
    fn update(&mut self, data: &[u8]) {
        match self {
            ShaStreamState::Sha256(ctx) => ctx.update(data),
            ShaStreamState::Sha384(ctx) => ctx.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            ShaStreamState::Sha256(ctx) => ctx.finalize().to_vec(),
            ShaStreamState::Sha384(ctx) => ctx.finalize().to_vec(),
        }
    }

    fn digest_len(sha_type: u16) -> usize {
        if sha_type == SHA_TYPE_256 {
            32
        } else {
            48
        }
    }
}

pub fn process(desc: &Descriptor, inputs: &mut EngineInputs<'_>) -> Result<(), CcpError> {
    let sha_type = desc.function & SHA_TYPE_MASK;
    if sha_type != SHA_TYPE_256 && sha_type != SHA_TYPE_384 {
        trace_evt!(
            inputs.trace,
            Severity::Error,
            ENGINE,
            "unimplemented SHA type {sha_type} init={} eom={}",
            desc.init,
            desc.eom
        );
        return Err(CcpError::UnsupportedFunction {
            engine: ENGINE,
            detail: format!("sha type {sha_type} not implemented"),
        });
    }

    let cb_digest = ShaStreamState::digest_len(sha_type);
    let mut ctx = TransferContext::new_sha(
        desc.addr_src,
        desc.src_mem_type,
        desc.cb_src,
        desc.src_mem_type.lsb_ctx_id,
        cb_digest as u32,
    )?;

    // The LSB's pre-existing content for this slot is the "initial SHA
    // state" the real hardware would resume from; this model ignores it,
    // same as the source, which only ever consults the `Option` for
    // existence, never `init`.
    if inputs.sha_ctx.is_none() {
        *inputs.sha_ctx = Some(if sha_type == SHA_TYPE_256 {
            ShaStreamState::Sha256(Box::new(Sha256::new()))
        } else {
            ShaStreamState::Sha384(Box::new(Sha384::new()))
        });
    }

    let mut backends = inputs.xfer_backends();
    let mut left = desc.cb_src as usize;
    let mut buf = [0u8; CHUNK_LEN];
    while left > 0 {
        let this = left.min(CHUNK_LEN);
        ctx.read(&mut buf[..this], &mut backends, None)?;
        inputs
            .sha_ctx
            .as_mut()
            .expect("sha context created above")
            .update(&buf[..this]);
        left -= this;
    }

    if desc.eom {
        let state = inputs.sha_ctx.take().expect("sha context created above");
        let digest = state.finalize();
        ctx.write(&digest, &mut backends, None)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{CcpAddr, MemKind, MemType};
    use crate::descriptor::Engine;
    use crate::io::HostIo;
    use crate::lsb::LocalStorageBuffer;
    use crate::trace::NullTraceSink;

    struct VecHostIo(Vec<u8>);
    impl HostIo for VecHostIo {
        fn psp_addr_read(&mut self, addr: u32, dst: &mut [u8]) -> Result<(), CcpError> {
            let addr = addr as usize;
            dst.copy_from_slice(&self.0[addr..addr + dst.len()]);
            Ok(())
        }
        fn psp_addr_write(&mut self, _addr: u32, _src: &[u8]) -> Result<(), CcpError> {
            Ok(())
        }
    }

    fn mt() -> MemType {
        MemType {
            kind: MemKind::Local,
            lsb_ctx_id: 7,
            fixed: false,
        }
    }

    fn desc(cb_src: u32, init: bool, eom: bool, src_addr: u32) -> Descriptor {
        Descriptor {
            engine: Engine::Sha,
            function: SHA_TYPE_256,
            init,
            eom,
            cb_src,
            addr_src: CcpAddr::from_hi_lo(0, src_addr),
            src_mem_type: mt(),
            dst: None,
            sha_bits: Some((0, 0)),
            addr_key: CcpAddr::from_hi_lo(0, 0),
            key_mem_type: mt(),
            raw_dword0: 0,
        }
    }

    #[test]
    fn multi_part_sha256_matches_reference_reversed() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(b"ab".to_vec());
        host.0.extend_from_slice(b"c");
        let mut cb_written = 0u32;
        let mut sha_ctx = None;
        let mut zlib_ctx = None;
        let mut trace = NullTraceSink;

        {
            let mut inputs = EngineInputs {
                lsb: &mut lsb,
                host_io: &mut host,
                cb_written_last: &mut cb_written,
                sha_ctx: &mut sha_ctx,
                zlib_ctx: &mut zlib_ctx,
                aes_proxy: None,
                trace: &mut trace,
            };
            let d = desc(2, true, false, 0);
            process(&d, &mut inputs).unwrap();
        }
        {
            let mut inputs = EngineInputs {
                lsb: &mut lsb,
                host_io: &mut host,
                cb_written_last: &mut cb_written,
                sha_ctx: &mut sha_ctx,
                zlib_ctx: &mut zlib_ctx,
                aes_proxy: None,
                trace: &mut trace,
            };
            let d = desc(1, false, true, 2);
            process(&d, &mut inputs).unwrap();
        }

        let mut expected = Sha256::digest(b"abc").to_vec();
        expected.reverse();
        let mut out = [0u8; 32];
        lsb.read(LocalStorageBuffer::slot_addr(7), &mut out).unwrap();
        assert_eq!(out.to_vec(), expected);
        assert!(sha_ctx.is_none());
    }

    #[test]
    fn unsupported_sha_type_fails() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(vec![0u8; 8]);
        let mut cb_written = 0u32;
        let mut sha_ctx = None;
        let mut zlib_ctx = None;
        let mut trace = NullTraceSink;
        let mut inputs = EngineInputs {
            lsb: &mut lsb,
            host_io: &mut host,
            cb_written_last: &mut cb_written,
            sha_ctx: &mut sha_ctx,
            zlib_ctx: &mut zlib_ctx,
            aes_proxy: None,
            trace: &mut trace,
        };
        let mut d = desc(1, true, true, 0);
        d.function = 0xf;
        assert!(process(&d, &mut inputs).is_err());
    }
}
