//! Applet runtime seam
//!
//! The channel layer never looks inside an applet. It only needs to know
//! whether the applet may be selected on several channels at once, which is
//! carried by the [`AppletKind`] tag, and how to hand it a command.

use thiserror::Error;

use crate::aid::Aid;
use crate::apdu::{APDU, Response};
use crate::error::AppletError;

/// Command processing shared by every applet
pub trait Applet: Send {
    /// Process a command routed to this applet.
    ///
    /// `Err(AppletError::Status(sw))` plays the role of an ISO exception.
    fn process(&mut self, cmd: &APDU) -> Result<Response, AppletError>;
}

/// An applet that may only be selected on one channel at a time
pub trait ExclusiveApplet: Applet {
    /// Returns false to refuse selection
    fn select(&mut self) -> bool {
        true
    }

    fn deselect(&mut self) {}
}

/// A multi-selectable applet.
///
/// Selection state is tracked per package, so `already_active` and
/// `still_active` report whether any applet of the same package is selected
/// on another channel.
pub trait ShareableApplet: Applet {
    fn select(&mut self, already_active: bool) -> bool;

    fn deselect(&mut self, still_active: bool);
}

/// Installed applet, tagged with its selection capability
pub enum AppletKind {
    Exclusive(Box<dyn ExclusiveApplet>),
    Shareable(Box<dyn ShareableApplet>),
}

impl AppletKind {
    pub fn exclusive(applet: impl ExclusiveApplet + 'static) -> Self {
        AppletKind::Exclusive(Box::new(applet))
    }

    pub fn shareable(applet: impl ShareableApplet + 'static) -> Self {
        AppletKind::Shareable(Box::new(applet))
    }

    pub fn is_shareable(&self) -> bool {
        matches!(self, AppletKind::Shareable(_))
    }

    pub fn process(&mut self, cmd: &APDU) -> Result<Response, AppletError> {
        match self {
            AppletKind::Exclusive(applet) => applet.process(cmd),
            AppletKind::Shareable(applet) => applet.process(cmd),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an applet with AID {0} is already installed")]
    DuplicateAid(Aid),
}

/// An applet instance together with its identity
pub struct InstalledApplet {
    pub aid: Aid,
    /// Applets built from the same package share one selection count
    pub package: String,
    pub applet: AppletKind,
}

/// Installed applets in installation order.
///
/// The order is what SELECT walks, so it has to stay stable across calls.
#[derive(Default)]
pub struct AppletRegistry {
    applets: Vec<InstalledApplet>,
}

impl AppletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(
        &mut self,
        aid: Aid,
        package: impl Into<String>,
        applet: AppletKind,
    ) -> Result<(), RegistryError> {
        if self.get(&aid).is_some() {
            return Err(RegistryError::DuplicateAid(aid));
        }
        self.applets.push(InstalledApplet {
            aid,
            package: package.into(),
            applet,
        });
        Ok(())
    }

    pub fn delete(&mut self, aid: &Aid) -> Option<InstalledApplet> {
        let index = self.applets.iter().position(|a| &a.aid == aid)?;
        Some(self.applets.remove(index))
    }

    pub fn get(&self, aid: &Aid) -> Option<&InstalledApplet> {
        self.applets.iter().find(|a| &a.aid == aid)
    }

    pub fn get_mut(&mut self, aid: &Aid) -> Option<&mut InstalledApplet> {
        self.applets.iter_mut().find(|a| &a.aid == aid)
    }

    /// Snapshot of the installed AIDs in installation order
    pub fn aids(&self) -> Vec<Aid> {
        self.applets.iter().map(|a| a.aid.clone()).collect()
    }

    pub fn first(&self) -> Option<&Aid> {
        self.applets.first().map(|a| &a.aid)
    }

    pub fn len(&self) -> usize {
        self.applets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applets.is_empty()
    }
}
