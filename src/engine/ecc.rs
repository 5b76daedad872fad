//! ECC engine: field arithmetic and NIST P-384 curve point operations.
//!
//! Grounded on `pspDevCcpReqEccProcess` and `pspDevCcpEccGetGroup`. The
//! source hardcodes the NIST P-384 group after checking the supplied prime
//! matches it — the "coefficient" operand's meaning was never pinned down
//! upstream (`@todo` in `pspDevCcpEccGetGroup`) and is decoded here but left
//! unused, same as the source. `CCP_V5_ENGINE_ECC_OP_ADD_CURVE` sits between
//! the field ops and the point ops in the source's size calculation but has
//! no case of its own in the dispatch `switch` — preserved here as an
//! accepted-but-unimplemented opcode rather than invented.

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::Zero;

use crate::descriptor::Descriptor;
use crate::engine::EngineInputs;
use crate::error::CcpError;
use crate::trace::{trace_evt, Severity};
use crate::transfer::TransferContext;

const ENGINE: &str = "ECC";

/// Width of one ECC operand: 576 bits, as asserted by the source's bit-count
/// bound check.
const ECC_NUM_LEN: usize = 72;
const ECC_PT_LEN: usize = ECC_NUM_LEN * 2;

/// The request buffer always holds a prime plus room for the largest
/// variant (mul-add-curve: two points, two factors, one coefficient) — the
/// source reads this as one fixed-size union regardless of opcode. This
/// crate's own reconstruction of that union's layout (see module doc).
const ECC_REQ_SLOTS: usize = 8;
const ECC_REQ_LEN: usize = ECC_NUM_LEN * ECC_REQ_SLOTS;

// function bit layout: op(0-2) | bit_count(4-13). This crate's own
// reconstruction, local to this module.
const OP_MASK: u16 = 0x7;
const BIT_COUNT_SHIFT: u16 = 4;
const BIT_COUNT_MASK: u16 = 0x3ff;

const OP_MUL_FIELD: u16 = 0;
const OP_ADD_FIELD: u16 = 1;
const OP_INV_FIELD: u16 = 2;
const OP_ADD_CURVE: u16 = 3;
const OP_MUL_CURVE: u16 = 4;
const OP_MUL_ADD_CURVE: u16 = 5;

fn fail(detail: impl Into<String>) -> CcpError {
    CcpError::CryptoFailure {
        engine: ENGINE,
        detail: detail.into(),
    }
}

fn le_num(buf: &[u8]) -> BigUint {
    BigUint::from_bytes_le(buf)
}

fn write_num(out: &mut [u8], value: &BigUint) -> Result<(), CcpError> {
    let bytes = value.to_bytes_le();
    if bytes.len() > out.len() {
        return Err(fail(format!("result occupies {} bytes, operand width is {}", bytes.len(), out.len())));
    }
    out[..bytes.len()].copy_from_slice(&bytes);
    for b in &mut out[bytes.len()..] {
        *b = 0;
    }
    Ok(())
}

fn to_signed(v: &BigUint) -> BigInt {
    BigInt::from_biguint(Sign::Plus, v.clone())
}

fn reduce(v: &BigInt, p: &BigInt) -> BigUint {
    v.mod_floor(p).to_biguint().expect("mod_floor with a positive modulus is never negative")
}

fn mod_mul(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    (a * b) % p
}

fn mod_add(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    (a + b) % p
}

fn mod_inverse(a: &BigUint, p: &BigUint) -> Result<BigUint, CcpError> {
    let a = to_signed(a);
    let p = to_signed(p);
    let egcd = a.extended_gcd(&p);
    if egcd.gcd != BigInt::from(1) {
        return Err(fail("operand has no modular inverse under the given prime"));
    }
    Ok(reduce(&egcd.x, &p))
}

/// NIST P-384 prime, little-endian (the only prime this engine accepts —
/// see `pspDevCcpEccGetGroup`).
const P384_PRIME_LE: [u8; 48] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff,
];

/// `a = p - 3`, the standard NIST short-Weierstrass choice for P-384.
///
/// Point addition/doubling under affine coordinates never needs the curve's
/// `b` coefficient, only `a`, so it is not modeled here. One consequence:
/// unlike OpenSSL's `EC_POINT_set_affine_coordinates` (which the source
/// relies on), this engine does not verify the supplied points actually lie
/// on the curve before operating on them.
struct CurveParams {
    p: BigUint,
    a: BigUint,
}

impl CurveParams {
    fn p384() -> Self {
        let p = le_num(&P384_PRIME_LE);
        let a = &p - 3u8;
        CurveParams { p, a }
    }
}

type Point = Option<(BigUint, BigUint)>;

fn point_double(params: &CurveParams, p: &Point) -> Point {
    let (x, y) = p.as_ref()?;
    if y.is_zero() {
        return None;
    }
    let three_x_sq = mod_mul(&mod_mul(x, x, &params.p), &BigUint::from(3u8), &params.p);
    let numerator = mod_add(&three_x_sq, &params.a, &params.p);
    let two_y = mod_add(y, y, &params.p);
    let inv = mod_inverse(&two_y, &params.p).ok()?;
    let lambda = mod_mul(&numerator, &inv, &params.p);
    curve_finish(params, x, y, x, &lambda)
}

fn point_add(params: &CurveParams, p: &Point, q: &Point) -> Point {
    let (px, py) = match p {
        Some(v) => v,
        None => return q.clone(),
    };
    let (qx, qy) = match q {
        Some(v) => v,
        None => return p.clone(),
    };
    if px == qx {
        return if mod_add(py, qy, &params.p).is_zero() {
            None
        } else {
            point_double(params, p)
        };
    }
    let dx = sub_mod(qx, px, &params.p);
    let dy = sub_mod(qy, py, &params.p);
    let inv = mod_inverse(&dx, &params.p).ok()?;
    let lambda = mod_mul(&dy, &inv, &params.p);
    curve_finish(params, px, py, qx, &lambda)
}

fn curve_finish(params: &CurveParams, px: &BigUint, py: &BigUint, qx: &BigUint, lambda: &BigUint) -> Point {
    let lambda_sq = mod_mul(lambda, lambda, &params.p);
    let x3 = sub_mod(&sub_mod(&lambda_sq, px, &params.p), qx, &params.p);
    let y3 = sub_mod(&mod_mul(lambda, &sub_mod(px, &x3, &params.p), &params.p), py, &params.p);
    Some((x3, y3))
}

fn sub_mod(a: &BigUint, b: &BigUint, p: &BigUint) -> BigUint {
    if a >= b {
        (a - b) % p
    } else {
        p - (b - a) % p
    }
}

fn scalar_mul(params: &CurveParams, point: &Point, scalar: &BigUint) -> Point {
    let mut result: Point = None;
    let mut addend = point.clone();
    for bit in 0..scalar.bits() {
        if scalar.bit(bit) {
            result = point_add(params, &result, &addend);
        }
        addend = point_double(params, &addend);
    }
    result
}

pub fn process(desc: &Descriptor, inputs: &mut EngineInputs<'_>) -> Result<(), CcpError> {
    let op = desc.function & OP_MASK;
    let bit_count = (desc.function >> BIT_COUNT_SHIFT) & BIT_COUNT_MASK;

    if bit_count as usize > ECC_NUM_LEN * 8 {
        trace_evt!(inputs.trace, Severity::Error, ENGINE, "uBits={bit_count} is too large");
        return Err(CcpError::UnsupportedFunction {
            engine: ENGINE,
            detail: format!("bit count {bit_count} exceeds operand width"),
        });
    }

    let cb_out = if op <= OP_ADD_CURVE { ECC_NUM_LEN } else { ECC_PT_LEN } as u32;

    let dst = desc.dst.ok_or_else(|| CcpError::MalformedDescriptor {
        detail: "ECC descriptor missing destination fields".into(),
    })?;
    let mut ctx = TransferContext::new(desc.addr_src, desc.src_mem_type, desc.cb_src, dst.addr, dst.mem_type, cb_out, false);
    let mut backends = inputs.xfer_backends();

    let mut req = vec![0u8; ECC_REQ_LEN];
    ctx.read(&mut req, &mut backends, None)?;

    let slot = |i: usize| -> &[u8] { &req[i * ECC_NUM_LEN..(i + 1) * ECC_NUM_LEN] };
    let prime = le_num(slot(0));

    let result: Result<Vec<u8>, CcpError> = match op {
        OP_MUL_FIELD => {
            let a = le_num(slot(1));
            let b = le_num(slot(2));
            let product = mod_mul(&a, &b, &prime);
            let mut out = vec![0u8; ECC_NUM_LEN];
            write_num(&mut out, &product).map(|_| out)
        }
        OP_ADD_FIELD => {
            let a = le_num(slot(1));
            let b = le_num(slot(2));
            let sum = mod_add(&a, &b, &prime);
            let mut out = vec![0u8; ECC_NUM_LEN];
            write_num(&mut out, &sum).map(|_| out)
        }
        OP_INV_FIELD => {
            let a = le_num(slot(1));
            mod_inverse(&a, &prime).and_then(|inverse| {
                let mut out = vec![0u8; ECC_NUM_LEN];
                write_num(&mut out, &inverse).map(|_| out)
            })
        }
        OP_MUL_CURVE => {
            let params = curve_for_prime(&prime)?;
            let pt = Some((le_num(slot(1)), le_num(slot(2))));
            let factor = le_num(slot(3));
            // slot(4) is the coefficient operand; decoded by the caller but
            // not consulted, same as the source.
            let result = scalar_mul(&params, &pt, &factor).ok_or_else(|| fail("curve scalar multiplication reached infinity"))?;
            let mut out = vec![0u8; ECC_PT_LEN];
            write_num(&mut out[..ECC_NUM_LEN], &result.0)?;
            write_num(&mut out[ECC_NUM_LEN..], &result.1).map(|_| out)
        }
        OP_MUL_ADD_CURVE => {
            let params = curve_for_prime(&prime)?;
            let pt1 = Some((le_num(slot(1)), le_num(slot(2))));
            let factor1 = le_num(slot(3));
            let pt2 = Some((le_num(slot(4)), le_num(slot(5))));
            let factor2 = le_num(slot(6));
            // slot(7) is the coefficient operand, unused (see above).
            let term1 = scalar_mul(&params, &pt1, &factor1);
            let term2 = scalar_mul(&params, &pt2, &factor2);
            let result = point_add(&params, &term1, &term2).ok_or_else(|| fail("curve multiply-add reached infinity"))?;
            let mut out = vec![0u8; ECC_PT_LEN];
            write_num(&mut out[..ECC_NUM_LEN], &result.0)?;
            write_num(&mut out[ECC_NUM_LEN..], &result.1).map(|_| out)
        }
        _ => {
            trace_evt!(inputs.trace, Severity::Error, ENGINE, "unimplemented/unknown operation {op}");
            Err(CcpError::UnsupportedFunction {
                engine: ENGINE,
                detail: format!("operation {op} not implemented"),
            })
        }
    };

    let out = result?;
    ctx.write(&out, &mut backends, None)
}

fn curve_for_prime(prime: &BigUint) -> Result<CurveParams, CcpError> {
    let params = CurveParams::p384();
    if *prime != params.p {
        return Err(fail("supplied prime does not match the NIST P-384 prime"));
    }
    Ok(params)
}
