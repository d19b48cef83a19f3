//! MANAGE CHANNEL (INS 70)
//!
//! Opening a channel implicitly selects the applet that is selected on the
//! channel the command came in on.

use log::{info, warn};

use super::table::BASIC_CHANNEL;
use super::LogicalChannels;
use crate::aid::Aid;
use crate::apdu::{manage_channel, APDU, Response};
use crate::error::ChannelError;

impl LogicalChannels {
    /// Handle MANAGE CHANNEL open (P1=00) and close (P1=80)
    pub fn manage_channel(&mut self, cmd: &APDU) -> Result<Response, ChannelError> {
        let origin = cmd.channel();
        let channel = self
            .table
            .lookup(origin)
            .ok_or(ChannelError::ChannelNotFound(origin))?;
        let aid = channel
            .selected_aid()
            .cloned()
            .ok_or(ChannelError::FuncNotSupported)?;

        match cmd.p1 {
            manage_channel::OPEN => self.open_channel(&aid, cmd.p2),
            manage_channel::CLOSE => self.close_channel(cmd.p2),
            _ => Err(ChannelError::FuncNotSupported),
        }
    }

    fn open_channel(&mut self, aid: &Aid, target: u8) -> Result<Response, ChannelError> {
        let id = if target == manage_channel::NEXT_AVAILABLE {
            self.table.open_next_available()?
        } else {
            self.table.open_specific(target)?
        };

        let channel = self
            .table
            .lookup_mut(id)
            .ok_or(ChannelError::ChannelNotFound(id))?;
        if let Err(e) = self.tracker.select(aid, channel, &mut self.registry) {
            warn!("selecting {} on new channel {} failed, closing it", aid, id);
            self.table.close(id);
            return Err(e);
        }

        info!("channel {} opened with {}", id, aid);
        Ok(Response::success(vec![id]))
    }

    fn close_channel(&mut self, target: u8) -> Result<Response, ChannelError> {
        if target == BASIC_CHANNEL {
            return Err(ChannelError::FuncNotSupported);
        }
        let selected = self
            .table
            .lookup(target)
            .ok_or(ChannelError::ChannelNotFound(target))?
            .selected_aid()
            .cloned();

        if let Some(aid) = selected {
            self.tracker.deselect(&aid, &mut self.registry)?;
        }
        self.table.close(target);
        Ok(Response::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::super::selection::tests::{aid, Journal, Recorder};
    use super::*;
    use crate::apdu::{ins, SW};
    use crate::applet::AppletKind;

    fn open(cla: u8, target: u8) -> APDU {
        APDU::new(cla, ins::MANAGE_CHANNEL, manage_channel::OPEN, target)
    }

    fn close(cla: u8, target: u8) -> APDU {
        APDU::new(cla, ins::MANAGE_CHANNEL, manage_channel::CLOSE, target)
    }

    fn card(journal: &Journal, basic: u8) -> LogicalChannels {
        let mut channels = LogicalChannels::new();
        channels
            .install(aid(1), "shared", AppletKind::shareable(Recorder::new("m", journal)))
            .unwrap();
        channels
            .install(aid(2), "solo", AppletKind::exclusive(Recorder::new("x", journal)))
            .unwrap();
        channels.select_on(BASIC_CHANNEL, &aid(basic)).unwrap();
        channels
    }

    #[test]
    fn test_open_next_available_returns_channel_id() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        let resp = channels.manage_channel(&open(0x00, 0x00)).unwrap();
        assert_eq!(resp.to_wire(), vec![0x01, 0x90, 0x00]);
        assert_eq!(channels.selected_on(1), Some(&aid(1)));
        assert_eq!(channels.tracker().package_refs("shared"), 2);

        // opening from channel 1 inherits its selection too
        let resp = channels.manage_channel(&open(0x01, 0x00)).unwrap();
        assert_eq!(resp.to_wire(), vec![0x02, 0x90, 0x00]);
        assert_eq!(channels.tracker().package_refs("shared"), 3);
    }

    #[test]
    fn test_open_specific_channel() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        let resp = channels.manage_channel(&open(0x00, 0x05)).unwrap();
        assert_eq!(resp.to_wire(), vec![0x05, 0x90, 0x00]);
        assert_eq!(
            channels.manage_channel(&open(0x00, 0x06)),
            Err(ChannelError::ChannelUnavailable(6))
        );
    }

    #[test]
    fn test_failed_selection_rolls_back_open() {
        let journal = Journal::default();
        // exclusive applet already selected on the basic channel
        let mut channels = card(&journal, 2);
        let err = channels.manage_channel(&open(0x00, 0x00)).unwrap_err();
        assert_eq!(err, ChannelError::CommandNotAllowed);
        assert_eq!(err.status_word(), SW::COMMAND_NOT_ALLOWED);
        assert!(!channels.table().is_open(1));
        assert_eq!(channels.table().open_ids(), vec![BASIC_CHANNEL]);
    }

    #[test]
    fn test_close_channel_releases_selection() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        channels.manage_channel(&open(0x00, 0x00)).unwrap();
        let resp = channels.manage_channel(&close(0x00, 0x01)).unwrap();
        assert_eq!(resp.to_wire(), vec![0x90, 0x00]);
        assert!(!channels.table().is_open(1));
        assert_eq!(channels.tracker().package_refs("shared"), 1);
    }

    #[test]
    fn test_close_unknown_channel() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        let err = channels.manage_channel(&close(0x00, 0x04)).unwrap_err();
        assert_eq!(err, ChannelError::ChannelNotFound(4));
        assert_eq!(err.status_word(), SW::FUNC_NOT_SUPPORTED);
    }

    #[test]
    fn test_basic_channel_cannot_be_closed() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        assert_eq!(
            channels.manage_channel(&close(0x00, 0x00)),
            Err(ChannelError::FuncNotSupported)
        );
        assert!(channels.table().is_open(BASIC_CHANNEL));
    }

    #[test]
    fn test_requires_selection_on_origin_channel() {
        let journal = Journal::default();
        let mut channels = LogicalChannels::new();
        channels
            .install(aid(1), "shared", AppletKind::shareable(Recorder::new("m", &journal)))
            .unwrap();
        assert_eq!(
            channels.manage_channel(&open(0x00, 0x00)),
            Err(ChannelError::FuncNotSupported)
        );
        // origin channel 3 is not open
        assert_eq!(
            channels.manage_channel(&open(0x03, 0x00)),
            Err(ChannelError::ChannelNotFound(3))
        );
    }

    #[test]
    fn test_unknown_p1() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        let cmd = APDU::new(0x00, ins::MANAGE_CHANNEL, 0x40, 0x00);
        assert_eq!(channels.manage_channel(&cmd), Err(ChannelError::FuncNotSupported));
    }

    #[test]
    fn test_open_when_full() {
        let journal = Journal::default();
        let mut channels = card(&journal, 1);
        for _ in 1..MAX {
            channels.manage_channel(&open(0x00, 0x00)).unwrap();
        }
        assert_eq!(
            channels.manage_channel(&open(0x00, 0x00)),
            Err(ChannelError::NoChannelAvailable)
        );
        channels.manage_channel(&close(0x00, 0x09)).unwrap();
        let resp = channels.manage_channel(&open(0x00, 0x00)).unwrap();
        assert_eq!(resp.data, vec![0x09]);
    }

    const MAX: usize = super::super::MAX_LOGICAL_CHANNELS;
}
