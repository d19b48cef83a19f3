//! Status Word (SW) constants for APDU responses
//!
//! ISO 7816-4 status words produced by the channel layer, using the values
//! Java Card's `ISO7816` interface assigns to them.

/// Status Word constants
pub struct SW;

impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const CONDITIONS_NOT_SATISFIED: u16 = 0x6985;
    pub const COMMAND_NOT_ALLOWED: u16 = 0x6986;
    pub const APPLET_SELECT_FAILED: u16 = 0x6999;
    pub const FUNC_NOT_SUPPORTED: u16 = 0x6A81;
    pub const RECORD_NOT_FOUND: u16 = 0x6A83;
    pub const UNKNOWN: u16 = 0x6F00;

    /// Check if a status word indicates more data available (61xx)
    #[inline]
    pub fn is_more_data(sw: u16) -> bool {
        (sw & 0xFF00) == 0x6100
    }

    /// Check whether response data travels with this status word.
    ///
    /// ISO 7816-3 only returns outgoing data alongside 61xx and 9xxx.
    #[inline]
    pub fn carries_data(sw: u16) -> bool {
        Self::is_more_data(sw) || (0x90..=0x9F).contains(&((sw >> 8) as u8))
    }
}
