//! Sample applets shipped with the vpcd binary
//!
//! Both answer every command with 9000 and log their selection callbacks,
//! which is enough to exercise logical channels from a PC/SC client.

use log::info;

use crate::aid::Aid;
use crate::apdu::{APDU, Response};
use crate::applet::{Applet, AppletKind, ExclusiveApplet, ShareableApplet};
use crate::error::AppletError;

/// Multi-selectable applet
pub struct MultiSelectableApplet {
    aid: Aid,
}

impl MultiSelectableApplet {
    pub fn new(aid: Aid) -> Self {
        Self { aid }
    }
}

impl Applet for MultiSelectableApplet {
    fn process(&mut self, _cmd: &APDU) -> Result<Response, AppletError> {
        Ok(Response::ok())
    }
}

impl ShareableApplet for MultiSelectableApplet {
    fn select(&mut self, already_active: bool) -> bool {
        if already_active {
            info!("{} selected", self.aid);
        } else {
            info!("{} selected (first)", self.aid);
        }
        true
    }

    fn deselect(&mut self, still_active: bool) {
        if still_active {
            info!("{} deselected", self.aid);
        } else {
            info!("{} deselected (last)", self.aid);
        }
    }
}

/// Applet that can only be selected on one channel at a time
pub struct NonMultiSelectableApplet {
    aid: Aid,
}

impl NonMultiSelectableApplet {
    pub fn new(aid: Aid) -> Self {
        Self { aid }
    }
}

impl Applet for NonMultiSelectableApplet {
    fn process(&mut self, _cmd: &APDU) -> Result<Response, AppletError> {
        Ok(Response::ok())
    }
}

impl ExclusiveApplet for NonMultiSelectableApplet {
    fn select(&mut self) -> bool {
        info!("{} selected", self.aid);
        true
    }

    fn deselect(&mut self) {
        info!("{} deselected", self.aid);
    }
}

/// Build the sample applet for `aid`
pub fn sample(aid: Aid, shareable: bool) -> AppletKind {
    if shareable {
        AppletKind::shareable(MultiSelectableApplet::new(aid))
    } else {
        AppletKind::exclusive(NonMultiSelectableApplet::new(aid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_kinds() {
        let aid = Aid::from_hex("D0000CAFE00001").unwrap();
        assert!(sample(aid.clone(), true).is_shareable());
        assert!(!sample(aid, false).is_shareable());
    }

    #[test]
    fn test_samples_accept_everything() {
        let aid = Aid::from_hex("D0000CAFE00002").unwrap();
        let mut applet = sample(aid, false);
        let resp = applet.process(&APDU::new(0x00, 0xCA, 0x00, 0x00)).unwrap();
        assert_eq!(resp.to_wire(), vec![0x90, 0x00]);
    }
}
