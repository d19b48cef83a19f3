//! Logical channel registry
//!
//! Owns the open/closed flag of every channel and the AID selected on each
//! open one. Channel 0 (the basic channel) is open from construction and can
//! never be closed.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::aid::Aid;
use crate::error::ChannelError;

/// Number of logical channels the card supports, basic channel included
pub const MAX_LOGICAL_CHANNELS: usize = 20;

/// Channel number of the basic channel
pub const BASIC_CHANNEL: u8 = 0;

/// Open flags for all logical channels, one bit per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBitmap(u32);

impl ChannelBitmap {
    pub const CAPACITY: usize = MAX_LOGICAL_CHANNELS;

    /// Bitmap with only the basic channel open
    pub fn new() -> Self {
        Self(1 << BASIC_CHANNEL)
    }

    pub fn is_set(&self, id: u8) -> bool {
        (id as usize) < Self::CAPACITY && self.0 & (1 << id) != 0
    }

    fn set(&mut self, id: u8) {
        self.0 |= 1 << id;
    }

    fn clear(&mut self, id: u8) {
        self.0 &= !(1 << id);
    }

    /// Lowest closed channel, if any
    pub fn next_clear(&self) -> Option<u8> {
        (0..Self::CAPACITY as u8).find(|&id| !self.is_set(id))
    }

    /// True if any non-basic channel in `1..=id` is open
    pub fn any_open_up_to(&self, id: u8) -> bool {
        (1..=id).any(|i| self.is_set(i))
    }

    pub fn count(&self) -> usize {
        self.0.count_ones() as usize
    }
}

impl Default for ChannelBitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// An open logical channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    id: u8,
    selected: Option<Aid>,
}

impl Channel {
    fn new(id: u8) -> Self {
        Self { id, selected: None }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// AID of the applet currently selected on this channel
    pub fn selected_aid(&self) -> Option<&Aid> {
        self.selected.as_ref()
    }

    /// Bind `aid` to the channel, returning the previous selection
    pub(crate) fn bind(&mut self, aid: Aid) -> Option<Aid> {
        self.selected.replace(aid)
    }

    pub(crate) fn unbind(&mut self) -> Option<Aid> {
        self.selected.take()
    }
}

/// Fixed-capacity table of logical channels
#[derive(Debug)]
pub struct ChannelTable {
    handles: ChannelBitmap,
    channels: BTreeMap<u8, Channel>,
}

impl ChannelTable {
    pub fn new() -> Self {
        let mut channels = BTreeMap::new();
        channels.insert(BASIC_CHANNEL, Channel::new(BASIC_CHANNEL));
        Self {
            handles: ChannelBitmap::new(),
            channels,
        }
    }

    /// Open the lowest-numbered closed channel
    pub fn open_next_available(&mut self) -> Result<u8, ChannelError> {
        let id = self
            .handles
            .next_clear()
            .ok_or(ChannelError::NoChannelAvailable)?;
        self.open(id);
        Ok(id)
    }

    /// Open a channel chosen by the terminal.
    ///
    /// The request is refused when any non-basic channel numbered at or
    /// below `id` is already open, not only `id` itself.
    pub fn open_specific(&mut self, id: u8) -> Result<u8, ChannelError> {
        if id == BASIC_CHANNEL || id as usize >= MAX_LOGICAL_CHANNELS {
            return Err(ChannelError::ChannelUnavailable(id));
        }
        if self.handles.any_open_up_to(id) {
            debug!("logical channel {} refused, table {:?}", id, self.handles);
            return Err(ChannelError::ChannelUnavailable(id));
        }
        self.open(id);
        Ok(id)
    }

    fn open(&mut self, id: u8) {
        self.handles.set(id);
        self.channels.insert(id, Channel::new(id));
        info!("logical channel {} opened", id);
    }

    /// Close a channel and drop it from the table.
    ///
    /// Closing a channel that is not open, or the basic channel, does
    /// nothing and returns `None`.
    pub fn close(&mut self, id: u8) -> Option<Channel> {
        if id == BASIC_CHANNEL {
            return None;
        }
        let channel = self.channels.remove(&id)?;
        self.handles.clear(id);
        match channel.selected_aid() {
            Some(aid) => info!("logical channel {} closed ({})", id, aid),
            None => info!("logical channel {} closed", id),
        }
        Some(channel)
    }

    pub fn lookup(&self, id: u8) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn lookup_mut(&mut self, id: u8) -> Option<&mut Channel> {
        self.channels.get_mut(&id)
    }

    pub fn is_open(&self, id: u8) -> bool {
        self.handles.is_set(id)
    }

    /// Ids of every open channel, ascending
    pub fn open_ids(&self) -> Vec<u8> {
        self.channels.keys().copied().collect()
    }

    pub fn open_count(&self) -> usize {
        self.handles.count()
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}
