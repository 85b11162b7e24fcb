//! Byte Transport Contract
//!
//! The parser never owns the physical link. It writes through a [`Transport`]
//! and is told about received bytes, write confirmations and closure through
//! [`TransportEvent`]s.

pub mod recording;

pub use recording::RecordingTransport;

use crate::error::Result;

/// Byte-level output side of a serial link
pub trait Transport: Send {
    /// Hand bytes to the link for writing
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Whether the link is currently open
    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Events emitted by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes received from the device
    Data(Vec<u8>),
    /// Bytes confirmed written to the device
    DataWritten(Vec<u8>),
    /// The link was closed
    Closed,
}
