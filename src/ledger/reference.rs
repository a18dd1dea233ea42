//! Deterministic payment-reference computation.
//!
//! External payment detectors recompute this value independently to match
//! incoming transfers to a request, so the derivation must stay bit-exact
//! with the protocol: last 8 bytes of `keccak256` over the lowercased
//! concatenation of request id, salt, and payment address.

use alloy::primitives::{keccak256, Address};

use super::RequestId;

/// Compute the payment reference for `(requestId, salt, paymentAddress)`.
///
/// Pure function; the same triple always yields the same 16-hex-char value.
pub fn payment_reference(request_id: &RequestId, salt: &str, payment_address: &Address) -> String {
    // Addresses are hashed in their 0x-prefixed lowercase-hex form.
    let input = format!("{}{}{:#x}", request_id, salt, payment_address).to_lowercase();
    let hash = keccak256(input.as_bytes());
    hex::encode(&hash[24..])
}
