//! Principals and Accounts
//!
//! A principal names a user or a service instance. Its textual form is the
//! lowercase base32 encoding of `crc32(bytes) || bytes`, split into groups of
//! five characters separated by dashes, e.g. `2vxsx-fae`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha224};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a principal in bytes
pub const MAX_PRINCIPAL_LEN: usize = 29;

/// Suffix byte for principals derived from a public key
const SELF_AUTHENTICATING_TAG: u8 = 0x02;

/// The anonymous principal's single byte
const ANONYMOUS_TAG: u8 = 0x04;

const BASE32_ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

const CRC32: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Errors from parsing a principal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalError {
    #[error("principal text is empty")]
    Empty,
    #[error("invalid base32 character '{0}'")]
    InvalidCharacter(char),
    #[error("principal is {0} bytes, longer than the {max} byte maximum", max = MAX_PRINCIPAL_LEN)]
    TooLong(usize),
    #[error("principal text is too short to carry a checksum")]
    MissingChecksum,
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("principal is not in canonical form (expected {0})")]
    NotCanonical(String),
}

/// A principal identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal {
    len: u8,
    bytes: [u8; MAX_PRINCIPAL_LEN],
}

impl Principal {
    /// The management principal (zero bytes)
    pub const fn management() -> Self {
        Self {
            len: 0,
            bytes: [0; MAX_PRINCIPAL_LEN],
        }
    }

    /// The principal used for unauthenticated calls
    pub const fn anonymous() -> Self {
        let mut bytes = [0; MAX_PRINCIPAL_LEN];
        bytes[0] = ANONYMOUS_TAG;
        Self { len: 1, bytes }
    }

    /// Build a principal from raw bytes
    pub fn from_slice(slice: &[u8]) -> Result<Self, PrincipalError> {
        if slice.len() > MAX_PRINCIPAL_LEN {
            return Err(PrincipalError::TooLong(slice.len()));
        }
        let mut bytes = [0; MAX_PRINCIPAL_LEN];
        bytes[..slice.len()].copy_from_slice(slice);
        Ok(Self {
            len: slice.len() as u8,
            bytes,
        })
    }

    /// Derive the principal owned by a DER-encoded public key
    pub fn self_authenticating(public_key_der: &[u8]) -> Self {
        let hash = Sha224::digest(public_key_der);
        let mut bytes = [0; MAX_PRINCIPAL_LEN];
        bytes[..28].copy_from_slice(&hash);
        bytes[28] = SELF_AUTHENTICATING_TAG;
        Self {
            len: MAX_PRINCIPAL_LEN as u8,
            bytes,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn is_anonymous(&self) -> bool {
        self.as_slice() == [ANONYMOUS_TAG]
    }

    pub fn is_self_authenticating(&self) -> bool {
        self.len as usize == MAX_PRINCIPAL_LEN && self.bytes[28] == SELF_AUTHENTICATING_TAG
    }

    fn to_text(self) -> String {
        let body = self.as_slice();
        let mut data = Vec::with_capacity(4 + body.len());
        data.extend_from_slice(&CRC32.checksum(body).to_be_bytes());
        data.extend_from_slice(body);

        let encoded = base32_encode(&data);
        let mut text = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                text.push('-');
            }
            text.push(c);
        }
        text
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(PrincipalError::Empty);
        }

        let compact: String = trimmed
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let data = base32_decode(&compact)?;
        if data.len() < 4 {
            return Err(PrincipalError::MissingChecksum);
        }

        let (checksum, body) = data.split_at(4);
        if CRC32.checksum(body).to_be_bytes() != checksum {
            return Err(PrincipalError::ChecksumMismatch);
        }

        let principal = Self::from_slice(body)?;
        let canonical = principal.to_text();
        if canonical != trimmed.to_ascii_lowercase() {
            return Err(PrincipalError::NotCanonical(canonical));
        }
        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A ledger account: an owner plus an optional 32-byte subaccount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub owner: Principal,
    #[serde(default, with = "subaccount_hex")]
    pub subaccount: Option<[u8; 32]>,
}

impl Account {
    pub fn new(owner: Principal, subaccount: Option<[u8; 32]>) -> Self {
        Self { owner, subaccount }
    }

    /// Subaccount bytes with the all-zero default filled in
    pub fn effective_subaccount(&self) -> [u8; 32] {
        self.subaccount.unwrap_or([0; 32])
    }
}

impl From<Principal> for Account {
    fn from(owner: Principal) -> Self {
        Self {
            owner,
            subaccount: None,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subaccount {
            Some(sub) if sub != [0; 32] => write!(f, "{}.{}", self.owner, hex::encode(sub)),
            _ => write!(f, "{}", self.owner),
        }
    }
}

pub(crate) mod subaccount_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<[u8; 32]>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<[u8; 32]>, D::Error> {
        let text: Option<String> = Option::deserialize(d)?;
        text.map(|t| {
            let mut out = [0u8; 32];
            hex::decode_to_slice(&t, &mut out).map_err(serde::de::Error::custom)?;
            Ok(out)
        })
        .transpose()
    }
}

fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Result<Vec<u8>, PrincipalError> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for c in text.chars() {
        let value = BASE32_ALPHABET
            .iter()
            .position(|a| *a as char == c)
            .ok_or(PrincipalError::InvalidCharacter(c))? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Ok(out)
}
