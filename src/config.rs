//! Device configuration handed in by the surrounding shell.

use serde::Deserialize;

/// Priority and device id used when asserting the shared IRQ line.
///
/// The source hard-codes `idPrio = 0` and `idDev = 0x15`; kept configurable
/// here only because a library shouldn't bake in a magic number the caller
/// can't override, not because the device itself varies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IrqId {
    pub prio_id: u8,
    pub dev_id: u8,
}

impl Default for IrqId {
    fn default() -> Self {
        IrqId {
            prio_id: 0,
            dev_id: 0x15,
        }
    }
}

/// Configuration for constructing a [`crate::device::Ccp`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CcpConfig {
    /// IRQ priority/device id pair used for `irq_set` calls.
    #[serde(default)]
    pub irq_id: IrqId,
    /// Whether an [`crate::device::AesProxy`] is wired up for protected-LSB
    /// AES keys. When `false`, requests that would otherwise be forwarded
    /// to the proxy fail instead.
    #[serde(default)]
    pub aes_proxy_enabled: bool,
}
