//! APDU (Application Protocol Data Unit) handling
//!
//! Flat structs for ISO 7816-4 command APDUs and the responses returned for
//! them, plus the header constants the channel layer dispatches on.
//!
//! # Example
//! ```ignore
//! use vcard_channels::apdu::parse_apdu;
//!
//! // SELECT by name on logical channel 1
//! let raw = &[0x01, 0xA4, 0x04, 0x00, 0x05, 0xD0, 0x00, 0x0C, 0xAF, 0xE0];
//! let apdu = parse_apdu(raw).unwrap();
//! assert_eq!(apdu.channel(), 1);
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur during APDU parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum APDUError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("Invalid APDU length")]
    InvalidLength,

    #[error("Invalid extended APDU format")]
    InvalidExtendedFormat,
}

/// A parsed APDU command
///
/// # Fields
/// - `cla`: Class byte (carries the logical channel number)
/// - `ins`: Instruction byte
/// - `p1`, `p2`: Parameter bytes
/// - `data`: Command data (may be empty)
/// - `le`: Expected response length (None if not specified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u32>,
}

impl APDU {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self::with_data(cla, ins, p1, p2, Vec::new())
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Logical channel addressed by the class byte.
    ///
    /// With bit 6 of CLA set only the two low bits carry the channel,
    /// otherwise the low nibble does.
    pub fn channel(&self) -> u8 {
        if self.cla & cla::EXTENDED_CHANNEL != 0 {
            self.cla & 0x03
        } else {
            self.cla & 0x0F
        }
    }
}

/// Parse raw bytes into an APDU
///
/// Supports both short and extended APDU formats:
/// - Short: CLA INS P1 P2 [Lc Data] [Le]
/// - Extended: CLA INS P1 P2 00 Lc1 Lc2 Data [Le1 Le2]
pub fn parse_apdu(data: &[u8]) -> Result<APDU, APDUError> {
    if data.len() < 4 {
        return Err(APDUError::TooShort(data.len()));
    }

    let (cla, ins, p1, p2) = (data[0], data[1], data[2], data[3]);
    let remaining = &data[4..];

    if remaining.is_empty() {
        return Ok(APDU::new(cla, ins, p1, p2));
    }

    // A leading 00 followed by more bytes is an extended length field, but
    // only when the declared Lc actually lines up with the buffer.
    if remaining[0] == 0x00 && remaining.len() > 2 {
        let ext = &remaining[1..];
        let lc = ((ext[0] as usize) << 8) | (ext[1] as usize);
        if ext.len() == 2 || ext.len() == 2 + lc || ext.len() == 4 + lc {
            return parse_extended_apdu(cla, ins, p1, p2, ext);
        }
    }

    parse_short_apdu(cla, ins, p1, p2, remaining)
}

/// Parse short format APDU (Lc/Le up to 255 bytes)
fn parse_short_apdu(
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    remaining: &[u8],
) -> Result<APDU, APDUError> {
    let short_le = |b: u8| if b == 0 { 256 } else { b as u32 };

    // Le only
    if remaining.len() == 1 {
        let mut apdu = APDU::new(cla, ins, p1, p2);
        apdu.le = Some(short_le(remaining[0]));
        return Ok(apdu);
    }

    let lc = remaining[0] as usize;
    if lc == 0 || remaining.len() < 1 + lc {
        return Err(APDUError::InvalidLength);
    }
    let mut apdu = APDU::with_data(cla, ins, p1, p2, remaining[1..1 + lc].to_vec());

    match remaining.len() - 1 - lc {
        0 => Ok(apdu),
        1 => {
            apdu.le = Some(short_le(remaining[1 + lc]));
            Ok(apdu)
        }
        _ => Err(APDUError::InvalidLength),
    }
}

/// Parse extended format APDU (Lc/Le up to 65535 bytes)
fn parse_extended_apdu(
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    remaining: &[u8],
) -> Result<APDU, APDUError> {
    let word = |hi: u8, lo: u8| ((hi as u32) << 8) | (lo as u32);
    let extended_le = |w: u32| if w == 0 { 65536 } else { w };

    let first_word = word(remaining[0], remaining[1]);

    // Le only
    if remaining.len() == 2 {
        let mut apdu = APDU::new(cla, ins, p1, p2);
        apdu.le = Some(extended_le(first_word));
        return Ok(apdu);
    }

    let lc = first_word as usize;
    if remaining.len() < 2 + lc {
        return Err(APDUError::InvalidLength);
    }
    let mut apdu = APDU::with_data(cla, ins, p1, p2, remaining[2..2 + lc].to_vec());

    match remaining.len() - 2 - lc {
        0 => Ok(apdu),
        2 => {
            apdu.le = Some(extended_le(word(remaining[2 + lc], remaining[3 + lc])));
            Ok(apdu)
        }
        _ => Err(APDUError::InvalidExtendedFormat),
    }
}

/// Class byte flags
pub mod cla {
    /// Further interindustry class: channel number lives in bits 1-2 only
    pub const EXTENDED_CHANNEL: u8 = 0x40;
}

/// Instruction bytes the channel layer intercepts
pub mod ins {
    pub const SELECT: u8 = 0xA4;
    pub const MANAGE_CHANNEL: u8 = 0x70;
}

/// SELECT parameters
pub mod select {
    /// P1: select by DF name (AID)
    pub const BY_NAME: u8 = 0x04;
    /// P2: first or only occurrence
    pub const FIRST_OR_ONLY: u8 = 0x00;
    /// P2: next occurrence
    pub const NEXT: u8 = 0x02;
}

/// MANAGE CHANNEL parameters
pub mod manage_channel {
    /// P1: open a channel
    pub const OPEN: u8 = 0x00;
    /// P1: close the channel named in P2
    pub const CLOSE: u8 = 0x80;
    /// P2 on open: let the card pick the channel number
    pub const NEXT_AVAILABLE: u8 = 0x00;
}
