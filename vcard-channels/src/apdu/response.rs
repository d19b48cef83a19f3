//! APDU Response handling
//!
//! A Response is the outgoing data of an applet plus its SW1/SW2 status word.

use super::status::SW;

/// A response travelling back over the transport link
///
/// # Example
/// ```ignore
/// let response = Response::success(vec![0x01, 0x02]);
/// assert_eq!(response.to_wire(), vec![0x01, 0x02, 0x90, 0x00]);
///
/// let error = Response::error(SW::COMMAND_NOT_ALLOWED);
/// assert_eq!(error.to_wire(), vec![0x69, 0x86]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Outgoing data (without status words)
    pub data: Vec<u8>,
    /// Status word 1 (SW1)
    pub sw1: u8,
    /// Status word 2 (SW2)
    pub sw2: u8,
}

impl Response {
    /// Create a new response with data and status word
    pub fn new(data: Vec<u8>, sw: u16) -> Self {
        Self {
            data,
            sw1: (sw >> 8) as u8,
            sw2: sw as u8,
        }
    }

    /// Create a success response (0x9000) with data
    pub fn success(data: Vec<u8>) -> Self {
        Self::new(data, SW::SUCCESS)
    }

    /// Create an empty success response (0x9000)
    pub fn ok() -> Self {
        Self::success(Vec::new())
    }

    /// Create an error response (no data)
    pub fn error(sw: u16) -> Self {
        Self::new(Vec::new(), sw)
    }

    /// Get the combined status word as u16
    pub fn sw(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Encode for the wire.
    ///
    /// Data is only sent with a 61xx or 9xxx status word; any other status
    /// word goes out bare even if the applet left data behind.
    pub fn to_wire(&self) -> Vec<u8> {
        if !SW::carries_data(self.sw()) {
            return vec![self.sw1, self.sw2];
        }
        let mut result = Vec::with_capacity(self.data.len() + 2);
        result.extend_from_slice(&self.data);
        result.push(self.sw1);
        result.push(self.sw2);
        result
    }
}
