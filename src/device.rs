//! Top-level CCP device: owns both queues, the shared local storage buffer,
//! and the streaming engine contexts that persist across descriptors.
//!
//! Grounded on `pspDevCcpInit` for the reset state and on the
//! `pspDevCcpMmio*` family for how an MMIO access is routed to a window.
//! External collaborators (host memory, the interrupt line, the optional
//! AES proxy, tracing) are never owned by this struct — they are borrowed
//! per call, the same way [`crate::engine::EngineInputs`] borrows them per
//! descriptor.

use crate::config::CcpConfig;
use crate::engine::{ShaStreamState, ZlibStreamState};
use crate::io::{AesProxy, HostIo, IrqLine};
use crate::lsb::LocalStorageBuffer;
use crate::mmio;
use crate::queue::{Queue, QueueRunCtx};
use crate::regs::CCP_V5_NUM_QUEUES;
use crate::trace::TraceSink;

/// A software model of one CCPv5 device instance.
pub struct Ccp {
    config: CcpConfig,
    queues: [Queue; CCP_V5_NUM_QUEUES],
    lsb: LocalStorageBuffer,
    cb_written_last: u32,
    sha_ctx: Option<ShaStreamState>,
    zlib_ctx: Option<ZlibStreamState>,
}

impl Ccp {
    pub fn new(config: CcpConfig) -> Self {
        Ccp {
            config,
            queues: std::array::from_fn(|_| Queue::default()),
            lsb: LocalStorageBuffer::new(),
            cb_written_last: 0,
            sha_ctx: None,
            zlib_ctx: None,
        }
    }

    pub fn lsb(&self) -> &LocalStorageBuffer {
        &self.lsb
    }

    pub fn queue(&self, idx: usize) -> &Queue {
        &self.queues[idx]
    }

    fn run_ctx<'a>(
        &'a mut self,
        host_io: &'a mut dyn HostIo,
        irq: &'a mut dyn IrqLine,
        aes_proxy: Option<&'a mut dyn AesProxy>,
        trace: &'a mut dyn TraceSink,
    ) -> QueueRunCtx<'a> {
        // When no proxy is wired up, the config flag still decides whether a
        // request that needs one fails outright or is simply never offered
        // one; either way the engine layer sees `None`.
        let aes_proxy = if self.config.aes_proxy_enabled { aes_proxy } else { None };
        QueueRunCtx {
            host_io,
            lsb: &mut self.lsb,
            cb_written_last: &mut self.cb_written_last,
            sha_ctx: &mut self.sha_ctx,
            zlib_ctx: &mut self.zlib_ctx,
            aes_proxy,
            trace,
            irq,
            irq_prio_id: self.config.irq_id.prio_id,
            irq_dev_id: self.config.irq_id.dev_id,
        }
    }

    /// Window 1 register read (global region + both per-queue banks).
    #[allow(clippy::too_many_arguments)]
    pub fn mmio_read(
        &mut self,
        off: u32,
        len: usize,
        host_io: &mut dyn HostIo,
        irq: &mut dyn IrqLine,
        aes_proxy: Option<&mut dyn AesProxy>,
        trace: &mut dyn TraceSink,
    ) -> u32 {
        let mut ctx = self.run_ctx(host_io, irq, aes_proxy, trace);
        mmio::mmio_read(off, len, &mut self.queues, &mut ctx)
    }

    /// Window 1 register write.
    #[allow(clippy::too_many_arguments)]
    pub fn mmio_write(
        &mut self,
        off: u32,
        len: usize,
        val: u32,
        host_io: &mut dyn HostIo,
        irq: &mut dyn IrqLine,
        aes_proxy: Option<&mut dyn AesProxy>,
        trace: &mut dyn TraceSink,
    ) {
        let mut ctx = self.run_ctx(host_io, irq, aes_proxy, trace);
        mmio::mmio_write(off, len, val, &mut self.queues, &mut ctx)
    }

    /// Window 2 register read (the separate status window).
    pub fn mmio_read_2(&self, off: u32, len: usize) -> u32 {
        mmio::mmio_read_2(off, len, self.cb_written_last)
    }
}
