// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Sponsorship Gateway contributors

//! Ed25519 keypairs and strkey addresses.
//!
//! Stellar addresses are "strkeys": a version byte, the 32-byte Ed25519 key
//! material, and a CRC16-XModem checksum, base32-encoded into a 56-character
//! string. Public keys start with `G`, secret seeds with `S`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

/// Version byte for Ed25519 public keys (`G...`).
const VERSION_ED25519_PUBLIC: u8 = 6 << 3;

/// Version byte for Ed25519 secret seeds (`S...`).
const VERSION_ED25519_SEED: u8 = 18 << 3;

/// RFC 4648 base32 alphabet used by strkeys.
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Debug, Error, PartialEq)]
pub enum KeyError {
    #[error("strkey has invalid length")]
    InvalidLength,

    #[error("strkey contains an invalid character")]
    InvalidCharacter,

    #[error("strkey has an unexpected version byte")]
    InvalidVersionByte,

    #[error("strkey checksum mismatch")]
    InvalidChecksum,

    #[error("invalid Ed25519 key material")]
    InvalidKeyMaterial,
}

/// An Ed25519 keypair addressable by strkey.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS CSPRNG.
    pub fn random() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Parse a keypair from a secret seed (`S...`).
    pub fn from_secret_seed(seed: &str) -> Result<Self, KeyError> {
        let payload = decode_strkey(seed, VERSION_ED25519_SEED)?;
        Ok(Self {
            signing: SigningKey::from_bytes(&payload),
        })
    }

    /// The public address (`G...`) of this keypair.
    pub fn public_key(&self) -> String {
        encode_strkey(VERSION_ED25519_PUBLIC, &self.signing.verifying_key().to_bytes())
    }

    /// The secret seed (`S...`) of this keypair.
    pub fn secret_seed(&self) -> String {
        encode_strkey(VERSION_ED25519_SEED, &self.signing.to_bytes())
    }

    /// Sign a message, returning the raw 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    /// Signature hint: the last four bytes of the public key.
    pub fn hint(&self) -> [u8; 4] {
        let bytes = self.signing.verifying_key().to_bytes();
        [bytes[28], bytes[29], bytes[30], bytes[31]]
    }
}

/// Decode a public address (`G...`) into raw key bytes.
pub fn decode_public_key(address: &str) -> Result<[u8; 32], KeyError> {
    decode_strkey(address, VERSION_ED25519_PUBLIC)
}

/// Whether a string is a well-formed public address.
pub fn is_valid_public_key(address: &str) -> bool {
    decode_public_key(address).is_ok()
}

/// Verify a raw Ed25519 signature against a public address.
pub fn verify_signature(address: &str, message: &[u8], signature: &[u8; 64]) -> bool {
    let Ok(key_bytes) = decode_public_key(address) else {
        return false;
    };
    let Ok(verifying) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    verifying
        .verify(message, &Signature::from_bytes(signature))
        .is_ok()
}

fn encode_strkey(version: u8, payload: &[u8; 32]) -> String {
    let mut data = Vec::with_capacity(35);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = crc16_xmodem(&data);
    data.extend_from_slice(&checksum.to_le_bytes());
    base32_encode(&data)
}

fn decode_strkey(input: &str, expected_version: u8) -> Result<[u8; 32], KeyError> {
    if input.len() != 56 {
        return Err(KeyError::InvalidLength);
    }

    let data = base32_decode(input)?;
    if data.len() != 35 {
        return Err(KeyError::InvalidLength);
    }

    let (body, checksum_bytes) = data.split_at(33);
    let expected_checksum = u16::from_le_bytes([checksum_bytes[0], checksum_bytes[1]]);
    if crc16_xmodem(body) != expected_checksum {
        return Err(KeyError::InvalidChecksum);
    }

    if body[0] != expected_version {
        return Err(KeyError::InvalidVersionByte);
    }

    let mut payload = [0u8; 32];
    payload.copy_from_slice(&body[1..]);
    Ok(payload)
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = ((buffer >> bits) & 0x1f) as usize;
            out.push(BASE32_ALPHABET[index] as char);
        }
    }
    if bits > 0 {
        let index = ((buffer << (5 - bits)) & 0x1f) as usize;
        out.push(BASE32_ALPHABET[index] as char);
    }
    out
}

fn base32_decode(input: &str) -> Result<Vec<u8>, KeyError> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;

    for c in input.bytes() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or(KeyError::InvalidCharacter)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}

/// CRC16-XModem (polynomial 0x1021, initial value 0).
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_keypair_round_trips_through_strkey() {
        let kp = Keypair::random();
        let address = kp.public_key();
        let seed = kp.secret_seed();

        assert_eq!(address.len(), 56);
        assert!(address.starts_with('G'));
        assert_eq!(seed.len(), 56);
        assert!(seed.starts_with('S'));

        let restored = Keypair::from_secret_seed(&seed).unwrap();
        assert_eq!(restored.public_key(), address);
    }

    #[test]
    fn sign_and_verify() {
        let kp = Keypair::random();
        let message = b"envelope hash";
        let signature = kp.sign(message);

        assert!(verify_signature(&kp.public_key(), message, &signature));
        assert!(!verify_signature(&kp.public_key(), b"other", &signature));
        assert!(!verify_signature(
            &Keypair::random().public_key(),
            message,
            &signature
        ));
    }

    #[test]
    fn rejects_tampered_address() {
        let address = Keypair::random().public_key();

        // Flip one character in the payload region.
        let mut chars: Vec<char> = address.chars().collect();
        chars[10] = if chars[10] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();

        assert!(decode_public_key(&tampered).is_err());
    }

    #[test]
    fn rejects_wrong_version_and_length() {
        let kp = Keypair::random();
        // A seed is a valid strkey but the wrong version for an address.
        assert_eq!(
            decode_public_key(&kp.secret_seed()),
            Err(KeyError::InvalidVersionByte)
        );
        assert_eq!(decode_public_key("GSHORT"), Err(KeyError::InvalidLength));
        assert!(!is_valid_public_key(""));
    }

    #[test]
    fn hint_is_public_key_tail() {
        let kp = Keypair::random();
        let decoded = decode_public_key(&kp.public_key()).unwrap();
        assert_eq!(kp.hint(), decoded[28..32]);
    }
}
