//! MMIO register layout constants.
//!
//! Offsets mirror the CCPv5 register banks: a small global region, followed
//! by two fixed-stride per-queue banks in window 1, plus a second,
//! smaller status window.

/// Base offset (within window 1) of the first per-queue register bank.
pub const CCP_V5_Q_OFFSET: u32 = 0x1000;
/// Stride between per-queue register banks.
pub const CCP_V5_Q_SIZE: u32 = 0x1000;
/// Number of queues modeled.
pub const CCP_V5_NUM_QUEUES: usize = 2;

/// Size of window 1 (global region + both queue banks).
pub const CCP_V5_MMIO_SIZE: u32 = CCP_V5_Q_OFFSET + CCP_V5_NUM_QUEUES as u32 * CCP_V5_Q_SIZE;

/// Size of window 2 (the status window).
pub const CCP_V5_MMIO_SIZE_2: u32 = 0x1000;

// Per-queue register offsets (relative to a queue's bank start).
pub const CCP_V5_Q_REG_CTRL: u32 = 0x00;
pub const CCP_V5_Q_REG_HEAD: u32 = 0x04;
pub const CCP_V5_Q_REG_TAIL: u32 = 0x08;
pub const CCP_V5_Q_REG_STATUS: u32 = 0x0c;
pub const CCP_V5_Q_REG_IEN: u32 = 0x10;
pub const CCP_V5_Q_REG_ISTS: u32 = 0x14;

// Control register bits.
pub const CCP_V5_Q_REG_CTRL_RUN: u32 = 1 << 0;
pub const CCP_V5_Q_REG_CTRL_HALT: u32 = 1 << 1;
const CCP_V5_Q_REG_CTRL_Q_SZ_SHIFT: u32 = 3;
const CCP_V5_Q_REG_CTRL_Q_SZ_MASK: u32 = 0x1f;

/// Extracts the declared ring size (in bytes, as a power of two) from the
/// control register. Recorded for completeness only: no code path masks
/// `head`/`tail` against it (see the queue executor's doc comment).
pub fn ctrl_q_size_get(ctrl: u32) -> u32 {
    1 << ((ctrl >> CCP_V5_Q_REG_CTRL_Q_SZ_SHIFT) & CCP_V5_Q_REG_CTRL_Q_SZ_MASK)
}

// Status register values.
pub const CCP_V5_Q_REG_STATUS_SUCCESS: u32 = 0;
pub const CCP_V5_Q_REG_STATUS_ERROR: u32 = 1;

// Interrupt-status / interrupt-enable bits.
pub const CCP_V5_Q_REG_ISTS_COMPLETION: u32 = 1 << 0;
pub const CCP_V5_Q_REG_ISTS_ERROR: u32 = 1 << 1;
pub const CCP_V5_Q_REG_ISTS_Q_STOP: u32 = 1 << 2;
pub const CCP_V5_Q_REG_ISTS_Q_EMPTY: u32 = 1 << 3;

/// Window 2 offsets.
pub const CCP_V5_MMIO2_OFF_CB_WRITTEN_LAST: u32 = 0x28;
pub const CCP_V5_MMIO2_OFF_READY: u32 = 0x38;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn q_size_decodes_power_of_two() {
        assert_eq!(ctrl_q_size_get(0), 1);
        assert_eq!(ctrl_q_size_get(2 << CCP_V5_Q_REG_CTRL_Q_SZ_SHIFT), 4);
    }
}
