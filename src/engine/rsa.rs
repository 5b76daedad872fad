//! RSA engine: unpadded modular exponentiation over little-endian integers.
//!
//! Grounded on `pspDevCcpReqRsaProcess`. Two sizes are supported: 2048-bit
//! (`sz == 256`) and 4096-bit (`sz == 512`), both with `mode == 0`. The key
//! area holds the exponent but only `sz / 2` bytes of it are read — an
//! apparent device quirk preserved verbatim (see `DESIGN.md` and
//! `spec.md` §9).

use num_bigint::BigUint;

use crate::descriptor::Descriptor;
use crate::engine::EngineInputs;
use crate::error::CcpError;
use crate::trace::{trace_evt, Severity};
use crate::transfer::TransferContext;

const ENGINE: &str = "RSA";

// function bit layout: size(0-9) | mode(10-11). This crate's own
// reconstruction, local to this module.
const SZ_MASK: u16 = 0x3ff;
const MODE_SHIFT: u16 = 10;
const MODE_MASK: u16 = 0x3;

pub fn process(desc: &Descriptor, inputs: &mut EngineInputs<'_>) -> Result<(), CcpError> {
    let sz = desc.function & SZ_MASK;
    let mode = (desc.function >> MODE_SHIFT) & MODE_MASK;

    let valid_size = (sz == 256 && desc.cb_src == 512) || (sz == 512 && desc.cb_src == 1024);
    if mode != 0 || !valid_size {
        trace_evt!(inputs.trace, Severity::Error, ENGINE, "unimplemented mode={mode} sz={sz} cb_src={}", desc.cb_src);
        return Err(CcpError::UnsupportedFunction {
            engine: ENGINE,
            detail: format!("mode={mode} sz={sz} cb_src={}", desc.cb_src),
        });
    }
    let sz = sz as usize;

    // The key area holds the exponent, but only half of `sz` bytes of it —
    // kept as-is, see module doc comment.
    let mut exp_buf = vec![0u8; sz / 2];
    match desc.key_mem_type.kind {
        crate::address::MemKind::Local => inputs.host_io.psp_addr_read(desc.addr_key.as_u32(), &mut exp_buf)?,
        crate::address::MemKind::Lsb => inputs.lsb.read(desc.addr_key.as_u32(), &mut exp_buf)?,
        crate::address::MemKind::System => return Err(CcpError::SystemMemoryUnsupported),
    }
    let exponent = BigUint::from_bytes_le(&exp_buf);

    let dst = desc.dst.ok_or_else(|| CcpError::MalformedDescriptor {
        detail: "RSA descriptor missing destination fields".into(),
    })?;
    let mut ctx = TransferContext::new(desc.addr_src, desc.src_mem_type, desc.cb_src, dst.addr, dst.mem_type, sz as u32, false);
    let mut backends = inputs.xfer_backends();

    // Source buffer holds the modulus (little-endian, `sz` bytes) followed
    // by the message (also `sz` bytes).
    let mut data = vec![0u8; desc.cb_src as usize];
    ctx.read(&mut data, &mut backends, None)?;
    let modulus = BigUint::from_bytes_le(&data[..sz]);
    let message = BigUint::from_bytes_le(&data[sz..]);

    let result = message.modpow(&exponent, &modulus);
    let mut result_le = result.to_bytes_le();
    if result_le.len() > sz {
        return Err(CcpError::CryptoFailure {
            engine: ENGINE,
            detail: format!("result length {} exceeds {sz}", result_le.len()),
        });
    }
    result_le.resize(sz, 0);

    ctx.write(&result_le, &mut backends, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{CcpAddr, MemKind, MemType};
    use crate::descriptor::{DstFields, Engine};
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
        fn psp_addr_write(&mut self, addr: u32, src: &[u8]) -> Result<(), CcpError> {
            let addr = addr as usize;
            if addr + src.len() > self.0.len() {
                self.0.resize(addr + src.len(), 0);
            }
            self.0[addr..addr + src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    fn mt() -> MemType {
        MemType {
            kind: MemKind::Local,
            lsb_ctx_id: 0,
            fixed: false,
        }
    }

    #[test]
    fn rsa_2048_modexp_matches_textbook_computation() {
        // Tiny "toy" modulus/exponent/message pair dressed up to 2048-bit
        // wire widths: everything above the low bytes is zero, so the
        // little-endian modexp reduces to ordinary integer arithmetic we
        // can check by hand.
        let modulus_val = 3233u32; // 61 * 53
        let exponent_val = 17u32;
        let message_val = 65u32;
        let expected = BigUint::from(message_val).modpow(&BigUint::from(exponent_val), &BigUint::from(modulus_val));

        let mut host = VecHostIo(vec![0u8; 4096]);
        host.0[0..4].copy_from_slice(&modulus_val.to_le_bytes());
        host.0[256..260].copy_from_slice(&message_val.to_le_bytes());

        let mut lsb = LocalStorageBuffer::new();
        let mut exp_buf = [0u8; 128];
        exp_buf[0..4].copy_from_slice(&exponent_val.to_le_bytes());
        lsb.write(0, &exp_buf).unwrap();

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

        let d = Descriptor {
            engine: Engine::Rsa,
            function: 256, // sz=256, mode=0
            init: false,
            eom: false,
            cb_src: 512,
            addr_src: CcpAddr::from_hi_lo(0, 0),
            src_mem_type: mt(),
            dst: Some(DstFields {
                addr: CcpAddr::from_hi_lo(0, 2048),
                mem_type: mt(),
            }),
            sha_bits: None,
            addr_key: CcpAddr::from_hi_lo(0, 0),
            key_mem_type: MemType {
                kind: MemKind::Lsb,
                lsb_ctx_id: 0,
                fixed: false,
            },
            raw_dword0: 0,
        };
        process(&d, &mut inputs).unwrap();

        let out = &host.0[2048..2048 + 256];
        let got = BigUint::from_bytes_le(out);
        assert_eq!(got, expected);
    }

    #[test]
    fn unsupported_size_fails() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(vec![0u8; 4096]);
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
        let d = Descriptor {
            engine: Engine::Rsa,
            function: 128,
            init: false,
            eom: false,
            cb_src: 256,
            addr_src: CcpAddr::from_hi_lo(0, 0),
            src_mem_type: mt(),
            dst: Some(DstFields {
                addr: CcpAddr::from_hi_lo(0, 2048),
                mem_type: mt(),
            }),
            sha_bits: None,
            addr_key: CcpAddr::from_hi_lo(0, 0),
            key_mem_type: mt(),
            raw_dword0: 0,
        };
        assert!(process(&d, &mut inputs).is_err());
    }
}
