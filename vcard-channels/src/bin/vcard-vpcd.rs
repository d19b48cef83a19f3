//! Virtual card with logical channels, attached to vpcd
//!
//! Usage: vcard-vpcd
//!
//! Connects to vpcd on localhost:35963 unless VCARD_VPCD_HOST /
//! VCARD_VPCD_PORT or a config file (VCARD_CONFIG, ~/.vcard/config.json)
//! say otherwise. Set RUST_LOG=debug to trace every APDU.

use std::process;
use std::sync::Arc;

use log::{error, info};

use vcard_channels::vpcd::VpcdLink;
use vcard_channels::RuntimeConfig;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match RuntimeConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    let card = match config.build_runtime() {
        Ok(card) => Arc::new(card),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };
    info!(
        "Virtual card ready with {} applet(s)",
        card.inspect(|c| c.registry().len())
    );

    let mut link = match VpcdLink::connect(&config.host, config.port, card) {
        Ok(link) => link,
        Err(e) => {
            error!("Failed to connect to vpcd at {}:{}: {}", config.host, config.port, e);
            process::exit(1);
        }
    };

    if let Err(e) = link.run() {
        error!("{}", e);
        process::exit(1);
    }
}
