//! Card-wide selection bookkeeping
//!
//! Exclusive applets are tracked by AID: one selected at most, anywhere on
//! the card. Shareable applets are counted per package, and the count tells
//! the applet whether a sibling is still active when it gets the
//! select/deselect callbacks.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use super::table::Channel;
use crate::aid::Aid;
use crate::applet::{AppletKind, AppletRegistry};
use crate::error::ChannelError;

#[derive(Debug, Default)]
pub struct SelectionTracker {
    /// Selection count per package of shareable applets, never zero
    package_refs: HashMap<String, usize>,
    /// Exclusive applets currently selected on some channel
    selected: HashSet<Aid>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `aid` and bind it to `channel`.
    ///
    /// Whatever was selected on the channel before is deselected once the
    /// new applet has accepted.
    pub fn select(
        &mut self,
        aid: &Aid,
        channel: &mut Channel,
        registry: &mut AppletRegistry,
    ) -> Result<(), ChannelError> {
        self.activate(aid, registry)?;
        info!("{} selected on channel {}", aid, channel.id());

        if let Some(previous) = channel.bind(aid.clone()) {
            self.deselect(&previous, registry)?;
        }
        Ok(())
    }

    fn activate(&mut self, aid: &Aid, registry: &mut AppletRegistry) -> Result<(), ChannelError> {
        let installed = registry.get_mut(aid).ok_or(ChannelError::RecordNotFound)?;

        match &mut installed.applet {
            AppletKind::Shareable(applet) => {
                let already_active = self.package_refs.contains_key(&installed.package);
                if !applet.select(already_active) {
                    return Err(ChannelError::AppletSelectFailed);
                }
                let refs = self.package_refs.entry(installed.package.clone()).or_insert(0);
                *refs += 1;
                debug!("package {} now referenced {} time(s)", installed.package, refs);
            }
            AppletKind::Exclusive(applet) => {
                if self.selected.contains(aid) {
                    return Err(ChannelError::CommandNotAllowed);
                }
                if !applet.select() {
                    return Err(ChannelError::AppletSelectFailed);
                }
                self.selected.insert(aid.clone());
            }
        }
        Ok(())
    }

    /// Release one selection of `aid`.
    ///
    /// This does not touch any channel; callers unbind the AID themselves.
    pub fn deselect(&mut self, aid: &Aid, registry: &mut AppletRegistry) -> Result<(), ChannelError> {
        let installed = registry.get_mut(aid).ok_or(ChannelError::CommandNotAllowed)?;

        match &mut installed.applet {
            AppletKind::Shareable(applet) => {
                let refs = self
                    .package_refs
                    .get_mut(&installed.package)
                    .ok_or(ChannelError::CommandNotAllowed)?;
                *refs -= 1;
                let still_active = *refs > 0;
                if !still_active {
                    self.package_refs.remove(&installed.package);
                }
                applet.deselect(still_active);
            }
            AppletKind::Exclusive(applet) => {
                if !self.selected.remove(aid) {
                    return Err(ChannelError::CommandNotAllowed);
                }
                applet.deselect();
            }
        }
        info!("{} deselected", aid);
        Ok(())
    }

    /// Current selection count of a shareable package
    pub fn package_refs(&self, package: &str) -> usize {
        self.package_refs.get(package).copied().unwrap_or(0)
    }

    /// Whether an exclusive applet is selected anywhere on the card
    pub fn is_exclusive_selected(&self, aid: &Aid) -> bool {
        self.selected.contains(aid)
    }

    /// True when nothing at all is selected
    pub fn is_idle(&self) -> bool {
        self.package_refs.is_empty() && self.selected.is_empty()
    }
}
