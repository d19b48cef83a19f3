//! Logical channel management (ISO 7816-4 section 5.4)
//!
//! [`LogicalChannels`] bundles the channel table, the card-wide selection
//! bookkeeping and the installed applets. They change together on every
//! SELECT, MANAGE CHANNEL and reset, so they are always locked together.

pub mod manage;
pub mod resolver;
pub mod selection;
pub mod table;

pub use resolver::{AidLookup, AidResolver};
pub use selection::SelectionTracker;
pub use table::{Channel, ChannelBitmap, ChannelTable, BASIC_CHANNEL, MAX_LOGICAL_CHANNELS};

use std::panic::{self, AssertUnwindSafe};

use log::{info, warn};

use crate::aid::Aid;
use crate::apdu::{APDU, Response};
use crate::applet::{AppletKind, AppletRegistry, RegistryError};
use crate::error::ChannelError;

/// Channels, selections and applets of one card
#[derive(Default)]
pub struct LogicalChannels {
    table: ChannelTable,
    tracker: SelectionTracker,
    registry: AppletRegistry,
}

impl LogicalChannels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(
        &mut self,
        aid: Aid,
        package: impl Into<String>,
        applet: AppletKind,
    ) -> Result<(), RegistryError> {
        info!("installing applet {}", aid);
        self.registry.install(aid, package, applet)
    }

    /// Remove an applet that is not selected on any channel
    pub fn delete(&mut self, aid: &Aid) -> Result<(), ChannelError> {
        let in_use = self
            .table
            .open_ids()
            .into_iter()
            .any(|id| self.selected_on(id) == Some(aid));
        if in_use {
            return Err(ChannelError::CommandNotAllowed);
        }
        self.registry
            .delete(aid)
            .map(|_| info!("deleted applet {}", aid))
            .ok_or(ChannelError::RecordNotFound)
    }

    pub fn table(&self) -> &ChannelTable {
        &self.table
    }

    pub fn tracker(&self) -> &SelectionTracker {
        &self.tracker
    }

    pub fn registry(&self) -> &AppletRegistry {
        &self.registry
    }

    /// AID selected on channel `id`, if the channel is open and has one
    pub fn selected_on(&self, id: u8) -> Option<&Aid> {
        self.table.lookup(id).and_then(Channel::selected_aid)
    }

    /// Select `aid` on the already open channel `id`
    pub fn select_on(&mut self, id: u8, aid: &Aid) -> Result<(), ChannelError> {
        let channel = self
            .table
            .lookup_mut(id)
            .ok_or(ChannelError::CommandNotAllowed)?;
        self.tracker.select(aid, channel, &mut self.registry)
    }

    /// Hand a command to the applet selected on channel `id`.
    ///
    /// Failures raised by the applet become the response status word; only
    /// routing failures and applet panics come back as errors.
    pub fn forward(&mut self, id: u8, cmd: &APDU) -> Result<Response, ChannelError> {
        let aid = self
            .selected_on(id)
            .cloned()
            .ok_or(ChannelError::CommandNotAllowed)?;
        let installed = self
            .registry
            .get_mut(&aid)
            .ok_or(ChannelError::CommandNotAllowed)?;
        info!("channel {} -> {}", id, aid);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| installed.applet.process(cmd)))
            .map_err(|_| ChannelError::Unknown(format!("{} panicked", aid)))?;
        match outcome {
            Ok(response) => Ok(response),
            Err(e) => {
                warn!("{} failed on INS {:02X}: {}", aid, cmd.ins, e);
                Ok(Response::error(e.status_word()))
            }
        }
    }

    /// Close every channel except the basic one and drop the basic
    /// channel's selection.
    ///
    /// Deselection failures are logged and skipped so that a reset always
    /// completes.
    pub fn reset(&mut self) {
        for id in self.table.open_ids() {
            let previous = match self.table.lookup_mut(id) {
                Some(channel) => channel.unbind(),
                None => continue,
            };
            if let Some(aid) = previous {
                if let Err(e) = self.tracker.deselect(&aid, &mut self.registry) {
                    warn!("reset: deselecting {} on channel {} failed: {}", aid, id, e);
                }
            }
            self.table.close(id);
        }
        info!("logical channels reset");
    }
}

#[cfg(test)]
mod tests {
    use super::selection::tests::{aid, Journal, Recorder};
    use super::*;
    use crate::apdu::SW;
    use crate::applet::Applet;
    use crate::error::AppletError;

    struct Failing;

    impl Applet for Failing {
        fn process(&mut self, _cmd: &APDU) -> Result<Response, AppletError> {
            Err(AppletError::Internal("oops".into()))
        }
    }

    impl crate::applet::ExclusiveApplet for Failing {}

    fn channels(journal: &Journal) -> LogicalChannels {
        let mut channels = LogicalChannels::new();
        channels
            .install(aid(1), "shared", AppletKind::shareable(Recorder::new("m", journal)))
            .unwrap();
        channels
            .install(aid(2), "solo", AppletKind::exclusive(Recorder::new("x", journal)))
            .unwrap();
        channels
    }

    #[test]
    fn test_forward_requires_selection() {
        let journal = Journal::default();
        let mut channels = channels(&journal);
        let cmd = APDU::new(0x01, 0xCA, 0, 0);
        assert_eq!(channels.forward(1, &cmd), Err(ChannelError::CommandNotAllowed));
        channels.table.open_next_available().unwrap();
        assert_eq!(channels.forward(1, &cmd), Err(ChannelError::CommandNotAllowed));

        channels.select_on(1, &aid(2)).unwrap();
        let resp = channels.forward(1, &cmd).unwrap();
        assert_eq!(resp.to_wire(), b"x\x90\x00".to_vec());
    }

    #[test]
    fn test_forward_maps_applet_failure() {
        let mut channels = LogicalChannels::new();
        channels
            .install(aid(7), "broken", AppletKind::exclusive(Failing))
            .unwrap();
        channels.select_on(BASIC_CHANNEL, &aid(7)).unwrap();
        let resp = channels.forward(BASIC_CHANNEL, &APDU::new(0, 0x01, 0, 0)).unwrap();
        assert_eq!(resp.sw(), SW::UNKNOWN);
        assert_eq!(resp.to_wire(), vec![0x6F, 0x00]);
    }

    struct Panicking;

    impl Applet for Panicking {
        fn process(&mut self, _cmd: &APDU) -> Result<Response, AppletError> {
            panic!("applet bug")
        }
    }

    impl crate::applet::ExclusiveApplet for Panicking {}

    #[test]
    fn test_forward_contains_applet_panic() {
        let mut channels = LogicalChannels::new();
        channels
            .install(aid(8), "buggy", AppletKind::exclusive(Panicking))
            .unwrap();
        channels.select_on(BASIC_CHANNEL, &aid(8)).unwrap();
        let err = channels.forward(BASIC_CHANNEL, &APDU::new(0, 0x01, 0, 0)).unwrap_err();
        assert_eq!(err.status_word(), SW::UNKNOWN);
        // the card is still usable afterwards
        assert_eq!(channels.selected_on(BASIC_CHANNEL), Some(&aid(8)));
    }

    #[test]
    fn test_reset_leaves_only_basic_channel() {
        let journal = Journal::default();
        let mut channels = channels(&journal);
        channels.select_on(BASIC_CHANNEL, &aid(1)).unwrap();
        for _ in 0..3 {
            let id = channels.table.open_next_available().unwrap();
            channels.select_on(id, &aid(1)).unwrap();
        }
        let id = channels.table.open_next_available().unwrap();
        channels.select_on(id, &aid(2)).unwrap();

        channels.reset();
        assert_eq!(channels.table().open_ids(), vec![BASIC_CHANNEL]);
        assert!(channels.selected_on(BASIC_CHANNEL).is_none());
        assert!(channels.tracker().is_idle());
    }

    #[test]
    fn test_delete_refuses_selected_applet() {
        let journal = Journal::default();
        let mut channels = channels(&journal);
        channels.select_on(BASIC_CHANNEL, &aid(2)).unwrap();
        assert_eq!(channels.delete(&aid(2)), Err(ChannelError::CommandNotAllowed));
        assert_eq!(channels.delete(&aid(1)), Ok(()));
        assert_eq!(channels.delete(&aid(1)), Err(ChannelError::RecordNotFound));
        assert_eq!(channels.registry().len(), 1);
    }
}
