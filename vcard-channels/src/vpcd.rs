//! vpcd transport link
//!
//! vpcd (from vsmartcard) is the PC/SC reader driver on the host side; the
//! virtual card connects to it over TCP. Every message in both directions is
//! a 2-byte big-endian length followed by that many bytes. A one-byte
//! message from vpcd is a control code, anything longer is a command APDU.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::runtime::ChannelRuntime;

/// Control codes sent by vpcd
pub mod ctrl {
    pub const OFF: u8 = 0;
    pub const ON: u8 = 1;
    pub const RESET: u8 = 2;
    pub const ATR: u8 = 4;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame of {0} bytes does not fit a 16-bit length")]
    FrameTooLarge(usize),
}

/// Read one frame. `Ok(None)` means the peer closed the connection.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError> {
    let mut len = [0u8; 2];
    match reader.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut payload = vec![0u8; u16::from_be_bytes(len) as usize];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError> {
    let len = u16::try_from(payload.len()).map_err(|_| TransportError::FrameTooLarge(payload.len()))?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// A card attached to vpcd over some byte stream
pub struct VpcdLink<S> {
    stream: S,
    card: Arc<ChannelRuntime>,
}

impl VpcdLink<TcpStream> {
    pub fn connect(host: &str, port: u16, card: Arc<ChannelRuntime>) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        info!("Connected to vpcd at {}:{}", host, port);
        Ok(Self::new(stream, card))
    }
}

impl<S: Read + Write> VpcdLink<S> {
    pub fn new(stream: S, card: Arc<ChannelRuntime>) -> Self {
        Self { stream, card }
    }

    /// Handle one message. Returns false once vpcd has hung up.
    pub fn serve_one(&mut self) -> Result<bool, TransportError> {
        let message = match read_frame(&mut self.stream)? {
            Some(message) => message,
            None => return Ok(false),
        };

        let reply = if message.len() == 1 {
            self.control(message[0])
        } else {
            debug!("APDU: {:02X?}", message);
            let response = self.card.transmit(&message);
            debug!("Response: {:02X?}", response);
            response
        };
        write_frame(&mut self.stream, &reply)?;
        Ok(true)
    }

    /// Serve until vpcd closes the connection
    pub fn run(&mut self) -> Result<(), TransportError> {
        while self.serve_one()? {}
        info!("vpcd closed the connection");
        Ok(())
    }

    fn control(&self, code: u8) -> Vec<u8> {
        match code {
            ctrl::OFF => {
                debug!("CMD: OFF");
                self.card.power_off();
            }
            ctrl::ON => {
                debug!("CMD: ON");
                self.card.power_on();
            }
            ctrl::RESET => {
                debug!("CMD: RESET");
                self.card.reset();
            }
            ctrl::ATR => debug!("CMD: ATR"),
            other => warn!("Unknown vpcd control code {}", other),
        }
        self.card.atr().to_vec()
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
