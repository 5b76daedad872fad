//! Software emulation of a version-5 AMD PSP Cryptographic Co-Processor.
//!
//! This crate models the MMIO-visible behavior of the CCPv5 block found in
//! the PSP: two request queues, a 4KiB local storage buffer, and seven
//! request-processing engines (passthrough, SHA, AES, RSA, ECC, and ZLIB
//! inflate; XTS-AES-128 and 3DES are recognized but unimplemented). It does
//! not model DMA, bus arbitration, or timing — requests run synchronously to
//! completion against whatever host memory the embedder provides through
//! [`io::HostIo`].
//!
//! [`device::Ccp`] is the entry point: construct one with a [`config::CcpConfig`]
//! and drive it with `mmio_read`/`mmio_write`/`mmio_read_2`, supplying a
//! [`io::HostIo`], [`io::IrqLine`], optional [`io::AesProxy`], and
//! [`trace::TraceSink`] on every call.

pub mod address;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod engine;
pub mod error;
pub mod io;
pub mod lsb;
pub mod mmio;
pub mod queue;
pub mod regs;
pub mod trace;
pub mod transfer;

pub use config::CcpConfig;
pub use device::Ccp;
pub use error::CcpError;
