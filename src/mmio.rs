//! MMIO front-end: dispatches 4-byte register accesses across the two
//! windows a device exposes.
//!
//! Grounded on `pspDevCcpMmioRead`/`pspDevCcpMmioWrite`/`pspDevCcpMmioRead2`.
//! Window 1 covers a small (currently unimplemented) global region followed
//! by the per-queue banks; window 2 is the separate status window read by
//! the on-chip bootloader. Both windows ignore accesses that aren't exactly
//! 4 bytes wide, same as the source.

use crate::queue::{Queue, QueueRunCtx};
use crate::regs::{
    CCP_V5_MMIO2_OFF_CB_WRITTEN_LAST, CCP_V5_MMIO2_OFF_READY, CCP_V5_NUM_QUEUES, CCP_V5_Q_OFFSET, CCP_V5_Q_REG_CTRL, CCP_V5_Q_REG_CTRL_RUN,
    CCP_V5_Q_REG_HEAD, CCP_V5_Q_REG_IEN, CCP_V5_Q_REG_ISTS, CCP_V5_Q_REG_STATUS, CCP_V5_Q_REG_TAIL, CCP_V5_Q_SIZE,
};

/// Reads a 4-byte register in window 1 (the global + per-queue region).
/// Non-4-byte accesses and out-of-range queue indices read as zero.
pub fn mmio_read(off: u32, len: usize, queues: &mut [Queue; CCP_V5_NUM_QUEUES], run_ctx: &mut QueueRunCtx<'_>) -> u32 {
    if len != 4 {
        return 0;
    }
    if off < CCP_V5_Q_OFFSET {
        return 0;
    }

    let off = off - CCP_V5_Q_OFFSET;
    let q_idx = (off / CCP_V5_Q_SIZE) as usize;
    let reg_off = off % CCP_V5_Q_SIZE;
    let Some(q) = queues.get_mut(q_idx) else {
        return 0;
    };

    let value = match reg_off {
        CCP_V5_Q_REG_CTRL => q.ctrl,
        CCP_V5_Q_REG_HEAD => q.req_head,
        CCP_V5_Q_REG_TAIL => q.req_tail,
        CCP_V5_Q_REG_STATUS => q.status,
        CCP_V5_Q_REG_IEN => q.ien,
        CCP_V5_Q_REG_ISTS => q.ists,
        _ => 0,
    };

    // Deferred drain: the real device would run the queue asynchronously,
    // but this model is synchronous, so every read also advances it. Doing
    // this unconditionally on read (rather than on write) avoids a stack
    // overwrite a prior write-time drain caused in the on-chip bootloader.
    q.run_maybe(run_ctx);
    value
}

/// Writes a 4-byte register in window 1. Non-4-byte accesses and
/// out-of-range queue indices are ignored.
pub fn mmio_write(off: u32, len: usize, val: u32, queues: &mut [Queue; CCP_V5_NUM_QUEUES], run_ctx: &mut QueueRunCtx<'_>) {
    if len != 4 || off < CCP_V5_Q_OFFSET {
        return;
    }

    let off = off - CCP_V5_Q_OFFSET;
    let q_idx = (off / CCP_V5_Q_SIZE) as usize;
    let reg_off = off % CCP_V5_Q_SIZE;
    let Some(q) = queues.get_mut(q_idx) else {
        return;
    };

    match reg_off {
        CCP_V5_Q_REG_CTRL => {
            if val & CCP_V5_Q_REG_CTRL_RUN != 0 && !q.enabled {
                q.enabled = true;
            } else if val & CCP_V5_Q_REG_CTRL_RUN == 0 && q.enabled {
                q.enabled = false;
            }
            // The run bit always reads back clear.
            q.ctrl = val & !CCP_V5_Q_REG_CTRL_RUN;
        }
        CCP_V5_Q_REG_HEAD => q.req_head = val,
        CCP_V5_Q_REG_TAIL => q.req_tail = val,
        CCP_V5_Q_REG_STATUS => q.status = val,
        CCP_V5_Q_REG_IEN => q.ien = val,
        CCP_V5_Q_REG_ISTS => {
            // Set bits clear the corresponding interrupt-status bit.
            q.ists &= !val;
            if q.ien & q.ists == 0 {
                run_ctx.irq.irq_set(run_ctx.irq_prio_id, run_ctx.irq_dev_id, false);
            }
        }
        _ => {}
    }

    // Only drain here if at least one interrupt is enabled, to avoid
    // running a request before the guest has finished writing every
    // register it cares about.
    if q.ien != 0 {
        q.run_maybe(run_ctx);
    }
}

/// Reads a 4-byte register in window 2 (the separate status window).
pub fn mmio_read_2(off: u32, len: usize, cb_written_last: u32) -> u32 {
    if len != 4 {
        return 0;
    }
    match off {
        CCP_V5_MMIO2_OFF_CB_WRITTEN_LAST => cb_written_last,
        CCP_V5_MMIO2_OFF_READY => 1,
        _ => 0,
    }
}
