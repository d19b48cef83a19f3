//! Card-level data returned outside of APDU exchanges

pub mod atr;

pub use atr::{build_atr, default_atr};
