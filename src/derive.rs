//! Pure address derivation
//!
//! Turns a compressed secp256k1 public key into the two output formats:
//! the bech32 checksum address (ripemd160 over sha256 of the compressed
//! key, regrouped to 5-bit digits) and the EVM address (last 20 bytes of
//! keccak256 over the uncompressed curve point). No I/O, fully
//! deterministic.

use alloy_primitives::{keccak256, Address};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bech32::{u5, Variant};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Human-readable prefix of derived bech32 addresses.
pub const ADDRESS_HRP: &str = "sei";

/// Both derived representations of one public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedAddresses {
    /// Checksum-protected bech32 address ("sei1...")
    pub bech32_address: String,
    /// EVM address (0x-prefixed lowercase hex)
    pub evm_address: String,
}

/// Derive both address formats from a base64-encoded compressed public key.
///
/// Fails only on malformed input (bad base64, invalid curve point); the
/// failure is scoped to this one key and is handled by the caller like a
/// lookup miss.
pub fn derive_addresses(public_key_b64: &str) -> Result<DerivedAddresses> {
    let compressed = BASE64
        .decode(public_key_b64)
        .context("Failed to decode base64 public key")?;

    Ok(DerivedAddresses {
        bech32_address: bech32_address(&compressed)?,
        evm_address: evm_address(&compressed)?,
    })
}

/// Encode `ripemd160(sha256(key))` as a bech32 address with the `sei` prefix.
fn bech32_address(compressed: &[u8]) -> Result<String> {
    let digest = Ripemd160::digest(Sha256::digest(compressed));
    let groups = convert_bits(digest.as_slice(), 8, 5, true)?;
    let data = groups
        .into_iter()
        .map(u5::try_from_u8)
        .collect::<Result<Vec<u5>, _>>()
        .context("Digest regrouping produced an out-of-range digit")?;
    bech32::encode(ADDRESS_HRP, data, Variant::Bech32).context("Failed to encode bech32 address")
}

/// Decompress the key and hash the raw 64-byte point into an EVM address.
fn evm_address(compressed: &[u8]) -> Result<String> {
    let key = secp256k1::PublicKey::from_slice(compressed)
        .context("Public key is not a valid secp256k1 point")?;
    let uncompressed = key.serialize_uncompressed();
    // Skip the 0x04 uncompressed tag; keccak runs over x || y only.
    let hash = keccak256(&uncompressed[1..]);
    let addr = Address::from_slice(&hash[12..]);
    Ok(format!("0x{:x}", addr))
}

/// Regroup a digit string from `from_bits`-wide groups to `to_bits`-wide
/// groups, most significant bits first.
///
/// With `pad` set, a final incomplete group is zero-padded on the right.
/// With `pad` unset, leftover bits must be zero and narrower than a full
/// input group; anything else is an error, never a silent truncation.
pub fn convert_bits(data: &[u8], from_bits: u32, to_bits: u32, pad: bool) -> Result<Vec<u8>> {
    if from_bits == 0 || from_bits > 8 || to_bits == 0 || to_bits > 8 {
        anyhow::bail!("Bit group widths must be between 1 and 8");
    }

    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let maxv: u32 = (1 << to_bits) - 1;
    let mut out = Vec::new();

    for &value in data {
        if u32::from(value) >> from_bits != 0 {
            anyhow::bail!("Input value {} does not fit in {} bits", value, from_bits);
        }
        acc = (acc << from_bits) | u32::from(value);
        bits += from_bits;
        while bits >= to_bits {
            bits -= to_bits;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to_bits - bits)) & maxv) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & maxv) != 0 {
        anyhow::bail!("Leftover bits cannot be discarded without padding");
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compressed public key for secp256k1 generator point (private key 1).
    const KEY_1_B64: &str = "Anm+Zn753LusVaBilc6HCwcCm/zbLc4o2VnygVsW+BeY";
    // Compressed public key for 2*G (private key 2).
    const KEY_2_B64: &str = "AsYEf5RB7X1tMEVAbpXAfNhcd45LjO88p6usCblccJ7l";

    #[test]
    fn test_derive_known_key_1() {
        let derived = derive_addresses(KEY_1_B64).unwrap();
        assert_eq!(
            derived.bech32_address,
            "sei1w508d6qejxtdg4y5r3zarvary0c5xw7kh3xvfe"
        );
        assert_eq!(
            derived.evm_address,
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }

    #[test]
    fn test_derive_known_key_2() {
        let derived = derive_addresses(KEY_2_B64).unwrap();
        assert_eq!(
            derived.bech32_address,
            "sei1q6hag67dl53wl99vzg42z8eyzfz2xlkva0h2sd"
        );
        assert_eq!(
            derived.evm_address,
            "0x2b5ad5c4795c026514f8317c7a215e218dccd6cf"
        );
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive_addresses(KEY_1_B64).unwrap();
        let b = derive_addresses(KEY_1_B64).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_rejects_bad_base64() {
        assert!(derive_addresses("not-base64!!!").is_err());
    }

    #[test]
    fn test_derive_rejects_invalid_point() {
        // 0x05 is not a valid SEC1 tag byte
        let bogus = BASE64.encode([0x05u8; 33]);
        assert!(derive_addresses(&bogus).is_err());
    }

    #[test]
    fn test_convert_bits_padded_length() {
        // Padded output length is always the smallest multiple of to_bits
        // covering the input bit length, i.e. ceil(len * 8 / 5) groups.
        for len in 1..=20usize {
            let data = vec![0xFFu8; len];
            let out = convert_bits(&data, 8, 5, true).unwrap();
            assert_eq!(out.len(), (len * 8 + 4) / 5, "input length {}", len);
        }
    }

    #[test]
    fn test_convert_bits_no_pad_zero_leftover() {
        // 0xF8 = 11111000: one full 5-bit group, leftover bits are zero
        let out = convert_bits(&[0xF8], 8, 5, false).unwrap();
        assert_eq!(out, vec![31]);
    }

    #[test]
    fn test_convert_bits_no_pad_rejects_nonzero_leftover() {
        // 0x07 = 00000111: leftover bits are non-zero, must not be dropped
        assert!(convert_bits(&[0x07], 8, 5, false).is_err());
    }

    #[test]
    fn test_convert_bits_no_pad_exact_fit() {
        // 40 bits regroup evenly into eight 5-bit digits
        let out = convert_bits(&[0u8; 5], 8, 5, false).unwrap();
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn test_convert_bits_rejects_wide_value() {
        // 32 does not fit in a 5-bit input group
        assert!(convert_bits(&[32], 5, 8, true).is_err());
    }

    #[test]
    fn test_convert_bits_rejects_bad_widths() {
        assert!(convert_bits(&[0], 0, 5, true).is_err());
        assert!(convert_bits(&[0], 8, 9, true).is_err());
    }
}
