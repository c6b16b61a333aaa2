//! ECDSA signature parsing and recovery.
//!
//! Only externally owned accounts are supported: the signature must be a
//! 65-byte `(r, s, v)` or a 64-byte ERC-2098 compact signature.

use alloy_primitives::{Address, B256, Bytes, Signature};

/// Errors from parsing a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureFormatError {
    /// Neither 64 nor 65 bytes.
    #[error("expected a 64 or 65 byte signature, got {0} bytes")]
    Length(usize),
    /// The bytes do not form a valid secp256k1 signature.
    #[error(transparent)]
    Malformed(#[from] alloy_primitives::SignatureError),
}

/// Parses a signature, normalizing `s` to the lower half of the curve.
///
/// Normalization flips the parity bit as needed, so the recovered signer is
/// unchanged and tokens that reject high-`s` signatures accept the result.
pub(super) fn parse_signature(bytes: &[u8]) -> Result<Signature, SignatureFormatError> {
    let signature = match bytes.len() {
        65 => Signature::from_raw(bytes)?,
        64 => Signature::from_erc2098(bytes),
        other => return Err(SignatureFormatError::Length(other)),
    };
    Ok(signature.normalized_s())
}

/// Recovers the signer of an EIP-712 digest.
pub(super) fn recover_signer(
    bytes: &[u8],
    digest: &B256,
) -> Result<(Signature, Address), SignatureFormatError> {
    let signature = parse_signature(bytes)?;
    let signer = signature.recover_address_from_prehash(digest)?;
    Ok((signature, signer))
}

/// Splits a signature into the `(v, r, s)` arguments Solidity expects.
pub(super) fn split_signature(signature: &Signature) -> (u8, B256, B256) {
    let v = 27 + u8::from(signature.v());
    let r = B256::from(signature.r().to_be_bytes::<32>());
    let s = B256::from(signature.s().to_be_bytes::<32>());
    (v, r, s)
}

/// Encodes a signature as 65 bytes `r || s || v` with `v` in `{27, 28}`,
/// the form `ecrecover`-based verifiers such as Permit2 accept.
pub(super) fn pack_signature(signature: &Signature) -> Bytes {
    let (v, r, s) = split_signature(signature);
    let mut packed = Vec::with_capacity(65);
    packed.extend_from_slice(r.as_slice());
    packed.extend_from_slice(s.as_slice());
    packed.push(v);
    packed.into()
}
