//! AID resolution for SELECT by name
//!
//! First-occurrence SELECT looks for an exact match before falling back to
//! a prefix match. A prefix match is remembered so that a later
//! next-occurrence SELECT can walk on to the following applet that shares
//! the prefix.

use log::debug;

use crate::aid::Aid;
use crate::apdu::{select, APDU};
use crate::error::ChannelError;

/// Strategy used by the dispatcher to pick the applet a SELECT targets
pub trait AidLookup: Send {
    /// Resolve the applet for a SELECT by name.
    ///
    /// `installed` is the registry in installation order and `current` the
    /// AID selected on the channel the command arrived on.
    fn resolve(
        &mut self,
        installed: &[Aid],
        cmd: &APDU,
        current: Option<&Aid>,
    ) -> Result<Aid, ChannelError>;

    /// Forget any state kept between commands
    fn clear(&mut self);
}

/// Exact, partial and next-occurrence AID matching.
///
/// There is a single pending partial SELECT for the whole card, not one per
/// channel: a partial SELECT on one channel replaces the prefix another
/// channel was iterating over.
#[derive(Debug, Default)]
pub struct AidResolver {
    pending_partial: Option<Vec<u8>>,
}

impl AidResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix remembered from the last partial SELECT
    pub fn pending_partial(&self) -> Option<&[u8]> {
        self.pending_partial.as_deref()
    }

    fn first_occurrence(&mut self, installed: &[Aid], data: &[u8]) -> Result<Aid, ChannelError> {
        if let Some(aid) = installed.iter().find(|aid| aid.matches(data)) {
            self.pending_partial = None;
            return Ok(aid.clone());
        }
        if let Some(aid) = installed.iter().find(|aid| aid.partial_matches(data)) {
            debug!("partial select {} -> {}", hex::encode_upper(data), aid);
            self.pending_partial = Some(data.to_vec());
            return Ok(aid.clone());
        }
        Err(ChannelError::RecordNotFound)
    }

    fn next_occurrence(&self, installed: &[Aid], current: Option<&Aid>) -> Result<Aid, ChannelError> {
        let prefix = self.pending_partial.as_deref().ok_or(ChannelError::RecordNotFound)?;
        let current = current.ok_or(ChannelError::RecordNotFound)?;
        let start = installed
            .iter()
            .position(|aid| aid == current)
            .ok_or(ChannelError::RecordNotFound)?;

        // One lap at most: stop before coming back around to `current`.
        let count = installed.len();
        (1..count)
            .map(|step| &installed[(start + step) % count])
            .find(|aid| aid.partial_matches(prefix))
            .cloned()
            .ok_or(ChannelError::RecordNotFound)
    }
}

impl AidLookup for AidResolver {
    fn resolve(
        &mut self,
        installed: &[Aid],
        cmd: &APDU,
        current: Option<&Aid>,
    ) -> Result<Aid, ChannelError> {
        match cmd.p2 {
            select::FIRST_OR_ONLY => self.first_occurrence(installed, &cmd.data),
            select::NEXT => self.next_occurrence(installed, current),
            _ => Err(ChannelError::RecordNotFound),
        }
    }

    fn clear(&mut self) {
        self.pending_partial = None;
    }
}
