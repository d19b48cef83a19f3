//! Logical channels for a virtual smart card
//!
//! This crate implements ISO/IEC 7816-4 logical channels for a virtual card
//! that attaches to the vsmartcard `vpcd` reader driver:
//! - up to 20 logical channels opened and closed with MANAGE CHANNEL
//! - SELECT by AID with exact, partial and next-occurrence matching
//! - card-wide selection rules for exclusive and multi-selectable applets
//!
//! Applets plug in through the traits in [`applet`]; the card itself is a
//! [`ChannelRuntime`], and [`vpcd::VpcdLink`] connects it to a reader.

pub mod aid;
pub mod apdu;
pub mod applet;
pub mod applets;
pub mod card;
pub mod channel;
pub mod config;
pub mod error;
pub mod runtime;
pub mod vpcd;

pub use aid::Aid;
pub use applet::{Applet, AppletKind, AppletRegistry, ExclusiveApplet, ShareableApplet};
pub use config::RuntimeConfig;
pub use error::{AppletError, ChannelError};
pub use runtime::{ChannelRuntime, Dispatcher};
