//! Cross-address-space data transfer engine.
//!
//! A [`TransferContext`] streams bytes between a source and destination
//! window, each independently in `{SYSTEM, LOCAL, LSB}` space. SYSTEM is
//! accepted at construction time (mirroring the source, which registers a
//! reader/writer for it) but every read/write against it fails immediately,
//! since this model has no x86 physical memory to transfer through.

use crate::address::{CcpAddr, MemKind, MemType};
use crate::error::CcpError;
use crate::io::HostIo;
use crate::lsb::LocalStorageBuffer;

/// Bundles the device-owned state a transfer needs to actually move bytes:
/// the LSB, the host I/O collaborator, and the `cbWrittenLast` counter that
/// LOCAL writes accumulate into.
pub struct XferBackends<'a> {
    pub lsb: &'a mut LocalStorageBuffer,
    pub host_io: &'a mut dyn HostIo,
    pub cb_written_last: &'a mut u32,
}

pub struct TransferContext {
    src_kind: MemKind,
    addr_src: CcpAddr,
    cb_read_left: u32,
    dst_kind: MemKind,
    addr_dst: CcpAddr,
    cb_write_left: u32,
    write_reversed: bool,
}

impl TransferContext {
    /// `addr_dst`/`dst_kind` are not used when this context is for a SHA
    /// write (callers pass the LSB-slot-derived destination instead via
    /// [`TransferContext::new_sha`]).
    pub fn new(
        addr_src: CcpAddr,
        src_mem_type: MemType,
        cb_read: u32,
        addr_dst: CcpAddr,
        dst_mem_type: MemType,
        cb_write: u32,
        write_reversed: bool,
    ) -> Self {
        let mut ctx = TransferContext {
            src_kind: src_mem_type.kind,
            addr_src,
            cb_read_left: cb_read,
            dst_kind: dst_mem_type.kind,
            addr_dst,
            cb_write_left: cb_write,
            write_reversed,
        };
        if write_reversed {
            ctx.addr_dst = ctx.addr_dst.checked_add(ctx.cb_write_left as u64);
        }
        ctx
    }

    /// A SHA write always targets the LSB at `lsb_ctx_id * 32`; there is no
    /// destination mem-type field to decode.
    pub fn new_sha(
        addr_src: CcpAddr,
        src_mem_type: MemType,
        cb_read: u32,
        lsb_ctx_id: u8,
        cb_write: u32,
    ) -> Result<Self, CcpError> {
        if lsb_ctx_id as usize >= crate::lsb::LSB_SLOT_COUNT {
            return Err(CcpError::MalformedDescriptor {
                detail: format!("SHA LSB context id {lsb_ctx_id} out of range"),
            });
        }
        let addr_dst = CcpAddr::from_hi_lo(0, LocalStorageBuffer::slot_addr(lsb_ctx_id));
        Ok(Self::new(
            addr_src,
            src_mem_type,
            cb_read,
            addr_dst,
            MemType {
                kind: MemKind::Lsb,
                lsb_ctx_id: 0,
                fixed: false,
            },
            cb_write,
            true,
        ))
    }

    fn mem_read(
        kind: MemKind,
        addr: u32,
        dst: &mut [u8],
        backends: &mut XferBackends<'_>,
    ) -> Result<(), CcpError> {
        match kind {
            MemKind::System => Err(CcpError::SystemMemoryUnsupported),
            MemKind::Lsb => backends.lsb.read(addr, dst),
            MemKind::Local => backends.host_io.psp_addr_read(addr, dst),
        }
    }

    fn mem_write(
        kind: MemKind,
        addr: u32,
        src: &[u8],
        backends: &mut XferBackends<'_>,
    ) -> Result<(), CcpError> {
        match kind {
            MemKind::System => Err(CcpError::SystemMemoryUnsupported),
            MemKind::Lsb => backends.lsb.write(addr, src),
            MemKind::Local => {
                backends.host_io.psp_addr_write(addr, src)?;
                *backends.cb_written_last += src.len() as u32;
                Ok(())
            }
        }
    }

    /// Reads up to `dst.len()` bytes, clamped to the remaining read budget.
    /// Fails if the clamped length is shorter than requested unless
    /// `actual` is supplied, making partial transfer an explicit opt-in.
    pub fn read(
        &mut self,
        dst: &mut [u8],
        backends: &mut XferBackends<'_>,
        actual: Option<&mut usize>,
    ) -> Result<(), CcpError> {
        let requested = dst.len();
        let this_read = requested.min(self.cb_read_left as usize);
        if this_read == 0 || (actual.is_none() && this_read != requested) {
            return Err(CcpError::ShortTransfer {
                requested,
                actual: this_read,
            });
        }

        Self::mem_read(self.src_kind, self.addr_src.as_u32(), &mut dst[..this_read], backends)?;
        self.cb_read_left -= this_read as u32;
        self.addr_src = self.addr_src.checked_add(this_read as u64);
        if let Some(actual) = actual {
            *actual = this_read;
        }
        Ok(())
    }

    /// Writes up to `src.len()` bytes, clamped to the remaining write
    /// budget, honoring `write_reversed`.
    pub fn write(
        &mut self,
        src: &[u8],
        backends: &mut XferBackends<'_>,
        actual: Option<&mut usize>,
    ) -> Result<(), CcpError> {
        let requested = src.len();
        let this_write = requested.min(self.cb_write_left as usize);
        if this_write == 0 || (actual.is_none() && this_write != requested) {
            return Err(CcpError::ShortTransfer {
                requested,
                actual: this_write,
            });
        }

        if self.write_reversed {
            for &byte in &src[..this_write] {
                self.addr_dst = CcpAddr::from_hi_lo(0, self.addr_dst.as_u32() - 1);
                Self::mem_write(self.dst_kind, self.addr_dst.as_u32(), std::slice::from_ref(&byte), backends)?;
            }
            self.cb_write_left -= this_write as u32;
        } else {
            Self::mem_write(self.dst_kind, self.addr_dst.as_u32(), &src[..this_write], backends)?;
            self.cb_write_left -= this_write as u32;
            self.addr_dst = self.addr_dst.checked_add(this_write as u64);
        }

        if let Some(actual) = actual {
            *actual = this_write;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MemKind;

    struct VecHostIo(Vec<u8>);
    impl HostIo for VecHostIo {
        fn psp_addr_read(&mut self, addr: u32, dst: &mut [u8]) -> Result<(), CcpError> {
            let addr = addr as usize;
            dst.copy_from_slice(&self.0[addr..addr + dst.len()]);
            Ok(())
        }
        fn psp_addr_write(&mut self, addr: u32, src: &[u8]) -> Result<(), CcpError> {
            let addr = addr as usize;
            self.0[addr..addr + src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    fn mt(kind: MemKind) -> MemType {
        MemType {
            kind,
            lsb_ctx_id: 0,
            fixed: false,
        }
    }

    #[test]
    fn local_to_local_copy() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(vec![0u8; 64]);
        host.0[0..4].copy_from_slice(&[1, 2, 3, 4]);
        let mut cb_written = 0u32;
        let mut ctx = TransferContext::new(
            CcpAddr::from_hi_lo(0, 0),
            mt(MemKind::Local),
            4,
            CcpAddr::from_hi_lo(0, 16),
            mt(MemKind::Local),
            4,
            false,
        );
        let mut buf = [0u8; 4];
        let mut backends = XferBackends {
            lsb: &mut lsb,
            host_io: &mut host,
            cb_written_last: &mut cb_written,
        };
        ctx.read(&mut buf, &mut backends, None).unwrap();
        ctx.write(&buf, &mut backends, None).unwrap();
        assert_eq!(&host.0[16..20], &[1, 2, 3, 4]);
        assert_eq!(cb_written, 4);
    }

    #[test]
    fn reversed_write_lays_bytes_out_backwards() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(vec![0u8; 64]);
        let mut cb_written = 0u32;
        let mut ctx = TransferContext::new_sha(
            CcpAddr::from_hi_lo(0, 0),
            mt(MemKind::Local),
            4,
            2,
            4,
        )
        .unwrap();
        let mut backends = XferBackends {
            lsb: &mut lsb,
            host_io: &mut host,
            cb_written_last: &mut cb_written,
        };
        ctx.write(&[1, 2, 3, 4], &mut backends, None).unwrap();
        let mut out = [0u8; 4];
        lsb.read(LocalStorageBuffer::slot_addr(2), &mut out).unwrap();
        assert_eq!(out, [4, 3, 2, 1]);
    }

    #[test]
    fn partial_read_without_sink_fails() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(vec![0u8; 64]);
        let mut cb_written = 0u32;
        let mut ctx = TransferContext::new(
            CcpAddr::from_hi_lo(0, 0),
            mt(MemKind::Local),
            2,
            CcpAddr::from_hi_lo(0, 0),
            mt(MemKind::Local),
            2,
            false,
        );
        let mut buf = [0u8; 4];
        let mut backends = XferBackends {
            lsb: &mut lsb,
            host_io: &mut host,
            cb_written_last: &mut cb_written,
        };
        assert!(ctx.read(&mut buf, &mut backends, None).is_err());
    }

    #[test]
    fn system_memory_always_fails() {
        let mut lsb = LocalStorageBuffer::new();
        let mut host = VecHostIo(vec![0u8; 64]);
        let mut cb_written = 0u32;
        let mut ctx = TransferContext::new(
            CcpAddr::from_hi_lo(0, 0),
            mt(MemKind::System),
            4,
            CcpAddr::from_hi_lo(0, 0),
            mt(MemKind::Local),
            4,
            false,
        );
        let mut buf = [0u8; 4];
        let mut backends = XferBackends {
            lsb: &mut lsb,
            host_io: &mut host,
            cb_written_last: &mut cb_written,
        };
        assert!(matches!(
            ctx.read(&mut buf, &mut backends, None),
            Err(CcpError::SystemMemoryUnsupported)
        ));
    }
}
