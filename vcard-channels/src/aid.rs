//! Application identifiers

use std::fmt;

use thiserror::Error;

/// Shortest AID accepted by the registry (RID only)
pub const AID_MIN_LEN: usize = 5;
/// Longest AID allowed by ISO 7816-5
pub const AID_MAX_LEN: usize = 16;

#[derive(Debug, Error, PartialEq)]
pub enum AidError {
    #[error("AID must be 5 to 16 bytes, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex in AID: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Application identifier of an installed applet
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Aid(Vec<u8>);

impl Aid {
    pub fn new(bytes: &[u8]) -> Result<Self, AidError> {
        if !(AID_MIN_LEN..=AID_MAX_LEN).contains(&bytes.len()) {
            return Err(AidError::InvalidLength(bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Parse an AID written as hex, e.g. `D0000CAFE00001`
    pub fn from_hex(s: &str) -> Result<Self, AidError> {
        Self::new(&hex::decode(s)?)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Exact length and byte match against SELECT data
    pub fn matches(&self, data: &[u8]) -> bool {
        self.0 == data
    }

    /// Partial match: SELECT data is a prefix of this AID.
    ///
    /// Empty data never matches.
    pub fn partial_matches(&self, data: &[u8]) -> bool {
        !data.is_empty() && self.0.starts_with(data)
    }
}

impl fmt::Display for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

impl fmt::Debug for Aid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aid({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_bounds() {
        assert_eq!(Aid::new(&[0xA0; 4]), Err(AidError::InvalidLength(4)));
        assert_eq!(Aid::new(&[0xA0; 17]), Err(AidError::InvalidLength(17)));
        assert!(Aid::new(&[0xA0; 5]).is_ok());
        assert!(Aid::new(&[0xA0; 16]).is_ok());
    }

    #[test]
    fn test_hex_round_trip_display() {
        let aid = Aid::from_hex("d0000cafe00001").unwrap();
        assert_eq!(aid.as_bytes(), &[0xD0, 0x00, 0x0C, 0xAF, 0xE0, 0x00, 0x01]);
        assert_eq!(aid.to_string(), "D0000CAFE00001");
        assert!(matches!(Aid::from_hex("zz"), Err(AidError::InvalidHex(_))));
    }

    #[test]
    fn test_exact_and_partial_match() {
        let aid = Aid::from_hex("D0000CAFE00001").unwrap();
        assert!(aid.matches(&[0xD0, 0x00, 0x0C, 0xAF, 0xE0, 0x00, 0x01]));
        assert!(!aid.matches(&[0xD0, 0x00, 0x0C, 0xAF, 0xE0]));
        assert!(aid.partial_matches(&[0xD0, 0x00, 0x0C, 0xAF, 0xE0]));
        assert!(aid.partial_matches(aid.as_bytes()));
        assert!(!aid.partial_matches(&[0xD0, 0x01]));
        assert!(!aid.partial_matches(&[]));
        // longer than the AID itself
        assert!(!aid.partial_matches(&[0xD0, 0x00, 0x0C, 0xAF, 0xE0, 0x00, 0x01, 0x00]));
    }
}
