//! External collaborator interfaces: host I/O, interrupt line, and the
//! optional AES hardware proxy. All out of scope for this crate's own
//! implementation (`spec.md` §1) — consumed only as traits.

use crate::error::CcpError;

/// PSP-local address space read/write, consumed by the transfer engine's
/// LOCAL memory-type path.
pub trait HostIo {
    fn psp_addr_read(&mut self, addr: u32, dst: &mut [u8]) -> Result<(), CcpError>;
    fn psp_addr_write(&mut self, addr: u32, src: &[u8]) -> Result<(), CcpError>;
}

/// The shared interrupt line the queue executor asserts on completion.
pub trait IrqLine {
    fn irq_set(&mut self, prio_id: u8, dev_id: u8, assert: bool);
}

/// Optional real-hardware proxy for AES operations whose key lives in the
/// protected LSB region (address < 0xa0), where this model cannot observe
/// the key material.
pub trait AesProxy {
    /// Executes one AES passthrough operation, returning the CCP-style
    /// status value the source reduces with `& 0x3f` before comparing to
    /// `CCP_V5_STATUS_SUCCESS`.
    #[allow(clippy::too_many_arguments)]
    fn aes_do(
        &mut self,
        dw0: u32,
        cb_src: u32,
        input: &[u8],
        output: &mut [u8],
        key_addr: u32,
        iv: Option<&[u8]>,
    ) -> Result<u32, CcpError>;
}
