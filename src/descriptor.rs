//! Request descriptor wire format and decoding.
//!
//! A descriptor is exactly 32 bytes, little-endian, eight dwords. `dword0`
//! carries the engine selector and flags; `dword4`/`dword5` are a union
//! between a non-SHA destination address+memtype and a SHA message
//! bit-length, disambiguated by the decoded engine.
//!
//! The exact bit offsets below are this crate's own internally-consistent
//! reconstruction: the vendor header defining the real hardware's bit
//! assignment was not available when this model was built (see `DESIGN.md`).
//! Every descriptor this crate ever decodes was built by its own encoder
//! (`Descriptor::encode`), so self-consistency is all that's required.

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::address::{CcpAddr, MemType};
use crate::error::CcpError;

pub const DESCRIPTOR_LEN: usize = 32;

/// Raw 32-byte wire form of a request descriptor.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, AsBytes, FromZeroes, FromBytes)]
pub struct RawDescriptor {
    pub dword0: u32,
    pub cb_src: u32,
    pub addr_src_low: u32,
    pub src_hi_memtype: u32,
    pub dword4: u32,
    pub dword5: u32,
    pub addr_key_low: u32,
    pub key_hi_memtype: u32,
}

// dword0 bit layout.
const DW0_INIT_BIT: u32 = 1 << 3;
const DW0_EOM_BIT: u32 = 1 << 4;
const DW0_FUNC_SHIFT: u32 = 5;
const DW0_FUNC_MASK: u32 = 0x7fff;
const DW0_ENGINE_SHIFT: u32 = 20;
const DW0_ENGINE_MASK: u32 = 0xf;

// src_hi_memtype / key_hi_memtype / dword5 (non-SHA) share this split: low
// 16 bits are the address high half, high 16 bits are the mem-type field.
fn split_hi_memtype(raw: u32) -> (u16, u16) {
    ((raw & 0xffff) as u16, (raw >> 16) as u16)
}

fn join_hi_memtype(addr_hi: u16, memtype: u16) -> u32 {
    (addr_hi as u32) | ((memtype as u32) << 16)
}

/// The engine a descriptor invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, enumn::N)]
pub enum Engine {
    Aes = 0,
    XtsAes128 = 1,
    Des3 = 2,
    Sha = 3,
    Rsa = 4,
    Passthru = 5,
    ZlibDecompress = 6,
    Ecc = 7,
}

impl Engine {
    pub fn name(self) -> &'static str {
        match self {
            Engine::Aes => "AES",
            Engine::XtsAes128 => "XTS_AES_128",
            Engine::Des3 => "DES3",
            Engine::Sha => "SHA",
            Engine::Rsa => "RSA",
            Engine::Passthru => "PASSTHRU",
            Engine::ZlibDecompress => "ZLIB_DECOMPRESS",
            Engine::Ecc => "ECC",
        }
    }
}

/// The non-SHA destination fields: address and mem-type.
#[derive(Debug, Clone, Copy)]
pub struct DstFields {
    pub addr: CcpAddr,
    pub mem_type: MemType,
}

/// A decoded request descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub engine: Engine,
    /// Engine-specific function bits; interpretation is up to the engine.
    pub function: u16,
    pub init: bool,
    pub eom: bool,
    pub cb_src: u32,
    pub addr_src: CcpAddr,
    pub src_mem_type: MemType,
    /// Destination fields, valid for every engine except SHA.
    pub dst: Option<DstFields>,
    /// SHA message bit length (low, high), valid only for the SHA engine.
    pub sha_bits: Option<(u32, u32)>,
    pub addr_key: CcpAddr,
    pub key_mem_type: MemType,
    raw_dword0: u32,
}

impl Descriptor {
    pub fn raw_dword0(&self) -> u32 {
        self.raw_dword0
    }

    pub fn decode(raw: &RawDescriptor) -> Result<Self, CcpError> {
        let engine_bits = (raw.dword0 >> DW0_ENGINE_SHIFT) & DW0_ENGINE_MASK;
        let engine = Engine::n(engine_bits as u8).ok_or_else(|| CcpError::MalformedDescriptor {
            detail: format!("unknown engine id {engine_bits}"),
        })?;
        let function = ((raw.dword0 >> DW0_FUNC_SHIFT) & DW0_FUNC_MASK) as u16;
        let init = raw.dword0 & DW0_INIT_BIT != 0;
        let eom = raw.dword0 & DW0_EOM_BIT != 0;

        let (src_hi, src_mt_raw) = split_hi_memtype(raw.src_hi_memtype);
        let src_mem_type = MemType::decode(src_mt_raw).ok_or_else(|| CcpError::MalformedDescriptor {
            detail: format!("unknown source mem-type {src_mt_raw:#x}"),
        })?;
        let addr_src = CcpAddr::from_hi_lo(src_hi, raw.addr_src_low);

        let (addr_key_hi, key_mt_raw) = split_hi_memtype(raw.key_hi_memtype);
        let key_mem_type = MemType::decode(key_mt_raw).ok_or_else(|| CcpError::MalformedDescriptor {
            detail: format!("unknown key mem-type {key_mt_raw:#x}"),
        })?;
        let addr_key = CcpAddr::from_hi_lo(addr_key_hi, raw.addr_key_low);

        let (dst, sha_bits) = if engine == Engine::Sha {
            (None, Some((raw.dword4, raw.dword5)))
        } else {
            let (dst_hi, dst_mt_raw) = split_hi_memtype(raw.dword5);
            let dst_mem_type = MemType::decode(dst_mt_raw).ok_or_else(|| CcpError::MalformedDescriptor {
                detail: format!("unknown destination mem-type {dst_mt_raw:#x}"),
            })?;
            let addr_dst = CcpAddr::from_hi_lo(dst_hi, raw.dword4);
            (
                Some(DstFields {
                    addr: addr_dst,
                    mem_type: dst_mem_type,
                }),
                None,
            )
        };

        Ok(Descriptor {
            engine,
            function,
            init,
            eom,
            cb_src: raw.cb_src,
            addr_src,
            src_mem_type,
            dst,
            sha_bits,
            addr_key,
            key_mem_type,
            raw_dword0: raw.dword0,
        })
    }

    /// Encodes the descriptor back into wire form. Used by tests and by
    /// anything constructing synthetic requests.
    pub fn encode(
        engine: Engine,
        function: u16,
        init: bool,
        eom: bool,
        cb_src: u32,
        addr_src: CcpAddr,
        src_mem_type_raw: u16,
        dst_or_sha: DstOrSha,
        addr_key: CcpAddr,
        key_mem_type_raw: u16,
    ) -> RawDescriptor {
        let mut dword0 = (function as u32 & DW0_FUNC_MASK) << DW0_FUNC_SHIFT;
        dword0 |= (engine as u32 & DW0_ENGINE_MASK) << DW0_ENGINE_SHIFT;
        if init {
            dword0 |= DW0_INIT_BIT;
        }
        if eom {
            dword0 |= DW0_EOM_BIT;
        }

        let (dword4, dword5) = match dst_or_sha {
            DstOrSha::Dst { addr, mem_type_raw } => (
                addr.as_u32(),
                join_hi_memtype((addr.as_u64() >> 32) as u16, mem_type_raw),
            ),
            DstOrSha::Sha { bits_lo, bits_hi } => (bits_lo, bits_hi),
        };

        RawDescriptor {
            dword0,
            cb_src,
            addr_src_low: addr_src.as_u32(),
            src_hi_memtype: join_hi_memtype((addr_src.as_u64() >> 32) as u16, src_mem_type_raw),
            dword4,
            dword5,
            addr_key_low: addr_key.as_u32(),
            key_hi_memtype: join_hi_memtype((addr_key.as_u64() >> 32) as u16, key_mem_type_raw),
        }
    }
}

/// The dword4/dword5 union payload for [`Descriptor::encode`].
pub enum DstOrSha {
    Dst { addr: CcpAddr, mem_type_raw: u16 },
    Sha { bits_lo: u32, bits_hi: u32 },
}
