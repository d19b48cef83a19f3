//! ATR (Answer To Reset) handling
//!
//! The ATR is what the reader hands to the host on power on and reset. The
//! virtual card announces T=1 and carries its identity in the historical
//! bytes.

/// Historical bytes of the default ATR, compact-TLV encoded
pub const DEFAULT_HISTORICAL_BYTES: &[u8] = &[
    0x80, // Category indicator: compact-TLV data objects follow
    0x73, // Card capabilities, 3 bytes
    0x80, // DF selection by full DF name
    0x00, // Data coding byte
    0x93, // Extended Lc/Le, logical channels assigned by card and terminal, 4 channel bits
    0x81, // Status indicator, 1 byte
    0x05, // Life cycle: operational, activated
];

/// Longest ATR ISO 7816-3 allows
pub const MAX_ATR_LEN: usize = 33;

/// Build an ATR with specific historical bytes
pub fn build_atr(historical_bytes: &[u8]) -> Vec<u8> {
    let hist_len = historical_bytes.len().min(15);
    let mut atr = Vec::with_capacity(4 + hist_len);

    // TS: direct convention
    atr.push(0x3B);
    // T0: TD1 present, K historical bytes
    atr.push(0x80 | hist_len as u8);
    // TD1: T=1, no further interface bytes
    atr.push(0x01);
    atr.extend_from_slice(&historical_bytes[..hist_len]);

    // TCK: XOR of T0 through the last historical byte, mandatory for T=1
    let tck = atr[1..].iter().fold(0u8, |acc, &b| acc ^ b);
    atr.push(tck);

    atr
}

/// ATR of the virtual card when no historical bytes are configured
pub fn default_atr() -> Vec<u8> {
    build_atr(DEFAULT_HISTORICAL_BYTES)
}
