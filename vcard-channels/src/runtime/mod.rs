//! Virtual card runtime
//!
//! [`ChannelRuntime`] is the card as the transport sees it: power control,
//! the ATR, and a command entry point. All card state sits behind one lock,
//! so a reset arriving from the control path can never interleave with a
//! command that is half way through the channel table.

pub mod dispatcher;

pub use dispatcher::{classify, CommandClass, Dispatcher};

use log::{info, warn};
use parking_lot::Mutex;

use crate::aid::Aid;
use crate::apdu::SW;
use crate::applet::{AppletKind, RegistryError};
use crate::card::atr;
use crate::channel::{LogicalChannels, BASIC_CHANNEL};
use crate::error::ChannelError;

struct CardInner {
    dispatcher: Dispatcher,
    powered: bool,
}

/// A virtual card with ISO 7816-4 logical channels
pub struct ChannelRuntime {
    inner: Mutex<CardInner>,
    atr: Vec<u8>,
    /// Select the first installed applet on the basic channel after reset
    implicit_select: bool,
}

impl ChannelRuntime {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            inner: Mutex::new(CardInner {
                dispatcher,
                powered: false,
            }),
            atr: atr::default_atr(),
            implicit_select: true,
        }
    }

    pub fn with_atr(mut self, atr: Vec<u8>) -> Self {
        self.atr = atr;
        self
    }

    pub fn with_implicit_select(mut self, enabled: bool) -> Self {
        self.implicit_select = enabled;
        self
    }

    pub fn atr(&self) -> &[u8] {
        &self.atr
    }

    pub fn is_powered(&self) -> bool {
        self.inner.lock().powered
    }

    pub fn install(
        &self,
        aid: Aid,
        package: impl Into<String>,
        applet: AppletKind,
    ) -> Result<(), RegistryError> {
        self.inner
            .lock()
            .dispatcher
            .channels_mut()
            .install(aid, package, applet)
    }

    pub fn delete(&self, aid: &Aid) -> Result<(), ChannelError> {
        self.inner.lock().dispatcher.channels_mut().delete(aid)
    }

    /// Power on the card, returning the ATR
    pub fn power_on(&self) -> Vec<u8> {
        let mut inner = self.inner.lock();
        if !inner.powered {
            self.cold_start(&mut inner);
            info!("Virtual card powered on");
        }
        self.atr.clone()
    }

    /// Power off the card
    pub fn power_off(&self) {
        let mut inner = self.inner.lock();
        inner.dispatcher.reset();
        inner.powered = false;
        info!("Virtual card powered off");
    }

    /// Reset the card, returning the ATR
    pub fn reset(&self) -> Vec<u8> {
        let mut inner = self.inner.lock();
        self.cold_start(&mut inner);
        info!("Virtual card reset");
        self.atr.clone()
    }

    fn cold_start(&self, inner: &mut CardInner) {
        inner.dispatcher.reset();
        inner.powered = true;
        if !self.implicit_select {
            return;
        }
        let channels = inner.dispatcher.channels_mut();
        if let Some(aid) = channels.registry().first().cloned() {
            match channels.select_on(BASIC_CHANNEL, &aid) {
                Ok(()) => info!("{} implicitly selected", aid),
                Err(e) => warn!("implicit selection of {} failed: {}", aid, e),
            }
        }
    }

    /// Process a raw command and return the raw response
    pub fn transmit(&self, command: &[u8]) -> Vec<u8> {
        let mut inner = self.inner.lock();
        if !inner.powered {
            return SW::CONDITIONS_NOT_SATISFIED.to_be_bytes().to_vec();
        }
        inner.dispatcher.dispatch(command)
    }

    /// Run `f` against the card state under the lock
    pub fn inspect<R>(&self, f: impl FnOnce(&LogicalChannels) -> R) -> R {
        f(self.inner.lock().dispatcher.channels())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::apdu::{ins, manage_channel};
    use crate::channel::selection::tests::{aid, Journal, Recorder};

    fn runtime(journal: &Journal) -> ChannelRuntime {
        let rt = ChannelRuntime::new(Dispatcher::new(LogicalChannels::new()));
        rt.install(aid(1), "shared", AppletKind::shareable(Recorder::new("m1", journal)))
            .unwrap();
        rt.install(aid(2), "solo", AppletKind::exclusive(Recorder::new("x2", journal)))
            .unwrap();
        rt
    }

    const OPEN_NEXT: [u8; 5] = [0x00, ins::MANAGE_CHANNEL, manage_channel::OPEN, 0x00, 0x01];

    #[test]
    fn test_unpowered_card_refuses_commands() {
        let journal = Journal::default();
        let rt = runtime(&journal);
        assert!(!rt.is_powered());
        assert_eq!(rt.transmit(&OPEN_NEXT), vec![0x69, 0x85]);
    }

    #[test]
    fn test_power_on_selects_first_applet() {
        let journal = Journal::default();
        let rt = runtime(&journal);
        let atr = rt.power_on();
        assert_eq!(atr, rt.atr());
        assert_eq!(atr[0], 0x3B);
        assert_eq!(
            rt.inspect(|c| c.selected_on(BASIC_CHANNEL).cloned()),
            Some(aid(1))
        );
        assert_eq!(rt.transmit(&OPEN_NEXT), vec![0x01, 0x90, 0x00]);
    }

    #[test]
    fn test_without_implicit_select() {
        let journal = Journal::default();
        let rt = runtime(&journal).with_implicit_select(false);
        rt.power_on();
        assert!(rt.inspect(|c| c.selected_on(BASIC_CHANNEL).is_none()));
        // nothing to inherit on the basic channel
        assert_eq!(rt.transmit(&OPEN_NEXT), vec![0x6A, 0x81]);
    }

    #[test]
    fn test_reset_closes_logical_channels() {
        let journal = Journal::default();
        let rt = runtime(&journal);
        rt.power_on();
        for _ in 0..5 {
            rt.transmit(&OPEN_NEXT);
        }
        assert_eq!(rt.inspect(|c| c.table().open_count()), 6);

        rt.reset();
        assert_eq!(rt.inspect(|c| c.table().open_ids()), vec![BASIC_CHANNEL]);
        assert_eq!(rt.inspect(|c| c.tracker().package_refs("shared")), 1);
    }

    #[test]
    fn test_power_off_releases_everything() {
        let journal = Journal::default();
        let rt = runtime(&journal);
        rt.power_on();
        rt.transmit(&OPEN_NEXT);
        rt.power_off();
        assert!(!rt.is_powered());
        assert!(rt.inspect(|c| c.tracker().is_idle()));
        assert_eq!(rt.transmit(&OPEN_NEXT), vec![0x69, 0x85]);

        rt.power_on();
        assert_eq!(rt.transmit(&OPEN_NEXT), vec![0x01, 0x90, 0x00]);
    }

    #[test]
    fn test_concurrent_reset_keeps_table_consistent() {
        let journal = Journal::default();
        let rt = Arc::new(runtime(&journal));
        rt.power_on();

        let worker = {
            let rt = Arc::clone(&rt);
            thread::spawn(move || {
                for i in 0..200u8 {
                    rt.transmit(&OPEN_NEXT);
                    rt.transmit(&[0x00, ins::MANAGE_CHANNEL, manage_channel::CLOSE, 1 + i % 19]);
                }
            })
        };
        for _ in 0..50 {
            rt.reset();
        }
        worker.join().unwrap();

        rt.reset();
        rt.inspect(|c| {
            assert_eq!(c.table().open_ids(), vec![BASIC_CHANNEL]);
            assert_eq!(c.tracker().package_refs("shared"), 1);
        });
    }
}
