//! Command classification and routing
//!
//! Every command buffer ends up here. SELECT and MANAGE CHANNEL addressed to
//! a logical channel are handled by the channel layer itself, anything else
//! on a logical channel goes to the applet selected there, and what is left
//! is basic channel traffic.

use log::{debug, warn};

use crate::apdu::{ins, parse_apdu, select, APDU, Response};
use crate::channel::{AidLookup, AidResolver, LogicalChannels, BASIC_CHANNEL};
use crate::error::ChannelError;

/// Routing decision for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// SELECT on a logical channel, or MANAGE CHANNEL from anywhere
    ChannelManagement,
    /// Any other command addressed to a logical channel
    ChannelTargeted,
    /// Basic channel traffic, SELECT included
    Basic,
}

pub fn classify(cmd: &APDU) -> CommandClass {
    let channel = cmd.channel();
    match cmd.ins {
        ins::SELECT if channel == BASIC_CHANNEL => CommandClass::Basic,
        ins::SELECT | ins::MANAGE_CHANNEL => CommandClass::ChannelManagement,
        _ if channel != BASIC_CHANNEL => CommandClass::ChannelTargeted,
        _ => CommandClass::Basic,
    }
}

/// Routes commands and turns every failure into a status word
pub struct Dispatcher {
    channels: LogicalChannels,
    lookup: Box<dyn AidLookup>,
}

impl Dispatcher {
    /// Dispatcher using the standard exact/partial/next-occurrence matching
    pub fn new(channels: LogicalChannels) -> Self {
        Self::with_lookup(channels, Box::new(AidResolver::new()))
    }

    /// Dispatcher with a custom SELECT resolution strategy
    pub fn with_lookup(channels: LogicalChannels, lookup: Box<dyn AidLookup>) -> Self {
        Self { channels, lookup }
    }

    pub fn channels(&self) -> &LogicalChannels {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut LogicalChannels {
        &mut self.channels
    }

    /// Process one raw command and return the raw response.
    ///
    /// Never fails: errors come back as a bare status word.
    pub fn dispatch(&mut self, raw: &[u8]) -> Vec<u8> {
        let result = parse_apdu(raw)
            .map_err(ChannelError::from)
            .and_then(|cmd| self.route(&cmd));

        match result {
            Ok(response) => response.to_wire(),
            Err(e) => {
                debug!("command {:02X?} failed: {}", raw, e);
                Response::error(e.status_word()).to_wire()
            }
        }
    }

    fn route(&mut self, cmd: &APDU) -> Result<Response, ChannelError> {
        debug!(
            "APDU: CLA={:02X} INS={:02X} P1={:02X} P2={:02X} channel={}",
            cmd.cla,
            cmd.ins,
            cmd.p1,
            cmd.p2,
            cmd.channel()
        );

        match classify(cmd) {
            CommandClass::ChannelManagement if cmd.ins == ins::SELECT => self.handle_select(cmd),
            CommandClass::ChannelManagement => self.channels.manage_channel(cmd),
            CommandClass::ChannelTargeted => self.channels.forward(cmd.channel(), cmd),
            CommandClass::Basic if cmd.ins == ins::SELECT => self.handle_select(cmd),
            CommandClass::Basic => self.channels.forward(BASIC_CHANNEL, cmd),
        }
    }

    /// SELECT by name on the channel named in CLA
    fn handle_select(&mut self, cmd: &APDU) -> Result<Response, ChannelError> {
        let id = cmd.channel();
        if !self.channels.table().is_open(id) {
            return Err(ChannelError::CommandNotAllowed);
        }
        if cmd.p1 != select::BY_NAME {
            warn!("SELECT with P1={:02X} is not supported", cmd.p1);
            return Err(ChannelError::CommandNotAllowed);
        }

        let installed = self.channels.registry().aids();
        let aid = self
            .lookup
            .resolve(&installed, cmd, self.channels.selected_on(id))?;
        self.channels.select_on(id, &aid)?;
        Ok(Response::ok())
    }

    /// Drop every logical channel and any pending partial SELECT
    pub fn reset(&mut self) {
        self.channels.reset();
        self.lookup.clear();
    }
}
