//! In-memory transport that records everything written to it

use std::sync::{Arc, Mutex, MutexGuard};

use super::Transport;
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    writes: Vec<Vec<u8>>,
    open: bool,
    fail_writes: bool,
}

/// Shared handle onto a recording transport
///
/// Clones observe the same state, so a test or replay tool can keep one
/// handle while the parser owns another.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingTransport {
    /// A transport that reports itself open
    pub fn open() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                open: true,
                ..Inner::default()
            })),
        }
    }

    /// A transport that reports itself closed
    pub fn closed() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_open(&self, open: bool) {
        self.lock().open = open;
    }

    /// Make subsequent writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Every write, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    /// Every write as lossy text, in order
    pub fn written_text(&self) -> Vec<String> {
        self.lock()
            .writes
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).to_string())
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        self.lock().writes.clear();
    }
}

impl Transport for RecordingTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if !inner.open {
            return Err(Error::TransportClosed);
        }
        if inner.fail_writes {
            return Err(Error::TransportWriteFailed {
                reason: "write rejected".to_string(),
            });
        }
        inner.writes.push(data.to_vec());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }
}
