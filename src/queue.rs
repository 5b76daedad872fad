//! A single request queue: its registers plus the drain loop that walks
//! descriptors from `req_head` to `req_tail`.
//!
//! Grounded on `pspDevCcpQueueRunMaybe`. Head advances linearly by
//! [`DESCRIPTOR_LEN`] per descriptor; the source's own wraparound-masking
//! block is guarded by `#if 0` with a comment that every attempt to enable
//! it broke either the on-chip or off-chip bootloader, so it is not
//! reproduced here either (see `DESIGN.md`).

use zerocopy::AsBytes;

use crate::descriptor::{Descriptor, RawDescriptor, DESCRIPTOR_LEN};
use crate::engine::{self, EngineInputs, ShaStreamState, ZlibStreamState};
use crate::io::{AesProxy, HostIo, IrqLine};
use crate::lsb::LocalStorageBuffer;
use crate::regs::{
    CCP_V5_Q_REG_CTRL_HALT, CCP_V5_Q_REG_ISTS_COMPLETION, CCP_V5_Q_REG_ISTS_ERROR, CCP_V5_Q_REG_ISTS_Q_EMPTY, CCP_V5_Q_REG_ISTS_Q_STOP,
    CCP_V5_Q_REG_STATUS_ERROR, CCP_V5_Q_REG_STATUS_SUCCESS,
};
use crate::trace::{trace_evt, Severity, TraceSink};

const ORIGIN: &str = "QUEUE";

/// One of the two independent request queues a device exposes.
pub struct Queue {
    pub ctrl: u32,
    pub req_head: u32,
    pub req_tail: u32,
    pub status: u32,
    pub ien: u32,
    pub ists: u32,
    pub enabled: bool,
}

impl Default for Queue {
    fn default() -> Self {
        Queue {
            ctrl: CCP_V5_Q_REG_CTRL_HALT,
            req_head: 0,
            req_tail: 0,
            status: CCP_V5_Q_REG_STATUS_SUCCESS,
            ien: 0,
            ists: 0,
            enabled: false,
        }
    }
}

/// Everything a queue's drain loop needs to actually run requests, gathered
/// in one place so the MMIO front-end doesn't have to repeat the list.
pub struct QueueRunCtx<'a> {
    pub host_io: &'a mut dyn HostIo,
    pub lsb: &'a mut LocalStorageBuffer,
    pub cb_written_last: &'a mut u32,
    pub sha_ctx: &'a mut Option<ShaStreamState>,
    pub zlib_ctx: &'a mut Option<ZlibStreamState>,
    pub aes_proxy: Option<&'a mut dyn AesProxy>,
    pub trace: &'a mut dyn TraceSink,
    pub irq: &'a mut dyn IrqLine,
    pub irq_prio_id: u8,
    pub irq_dev_id: u8,
}

impl Queue {
    /// Drains every descriptor currently between `req_head` and `req_tail`,
    /// stopping at the first one that fails to decode or to process.
    pub fn run_maybe(&mut self, ctx: &mut QueueRunCtx<'_>) {
        if !self.enabled {
            return;
        }

        self.ctrl &= !CCP_V5_Q_REG_CTRL_HALT;

        let tail = self.req_tail;
        let mut head = self.req_head;

        while tail != head {
            let mut raw = RawDescriptor::new_zeroed();
            let decoded = ctx
                .host_io
                .psp_addr_read(head, raw.as_bytes_mut())
                .map_err(|_| crate::error::CcpError::MalformedDescriptor {
                    detail: format!("failed to read request from {head:#x}"),
                })
                .and_then(|()| Descriptor::decode(&raw));

            let result = match decoded {
                Ok(desc) => {
                    let mut inputs = EngineInputs {
                        lsb: ctx.lsb,
                        host_io: ctx.host_io,
                        cb_written_last: ctx.cb_written_last,
                        sha_ctx: ctx.sha_ctx,
                        zlib_ctx: ctx.zlib_ctx,
                        aes_proxy: ctx.aes_proxy.as_deref_mut(),
                        trace: ctx.trace,
                    };
                    engine::process(&desc, &mut inputs)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    self.status = CCP_V5_Q_REG_STATUS_SUCCESS;
                    self.ists |= CCP_V5_Q_REG_ISTS_COMPLETION;
                }
                Err(e) => {
                    trace_evt!(ctx.trace, Severity::Error, ORIGIN, "request at {head:#x} failed: {e}");
                    self.status = CCP_V5_Q_REG_STATUS_ERROR;
                    self.ists |= CCP_V5_Q_REG_ISTS_ERROR;
                    break;
                }
            }

            head += DESCRIPTOR_LEN as u32;
        }

        self.req_head = head;
        self.ctrl |= CCP_V5_Q_REG_CTRL_HALT;
        self.ists |= CCP_V5_Q_REG_ISTS_Q_STOP;
        if tail == head {
            self.ists |= CCP_V5_Q_REG_ISTS_Q_EMPTY;
        }

        if self.ien & self.ists != 0 {
            ctx.irq.irq_set(ctx.irq_prio_id, ctx.irq_dev_id, true);
        }
    }
}
