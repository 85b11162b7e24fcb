//! Virtual Line Buffer
//!
//! Turns the raw byte stream into logical lines. Bytes are replayed through a
//! [`LineEmulator`]; only a real CR-LF pair completes a line, since shells emit
//! lone carriage returns mid-line while redrawing.

use super::emulator::{LineEmulator, VirtualTerminal};

/// How a single incoming byte is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    /// `\r`, fed to the emulator
    CarriageReturn,
    /// `\n` directly after `\r`, completes a line
    CarriageReturnLineFeed,
    /// Anything else, fed to the emulator
    Ordinary,
}

/// Line assembler over a terminal emulator
#[derive(Debug)]
pub struct VirtualLineBuffer<E: LineEmulator = VirtualTerminal> {
    emulator: E,
    /// Last byte seen was `\r`; survives across reads
    previous_was_cr: bool,
}

impl VirtualLineBuffer<VirtualTerminal> {
    pub fn new() -> Self {
        Self::with_emulator(VirtualTerminal::new())
    }
}

impl Default for VirtualLineBuffer<VirtualTerminal> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: LineEmulator> VirtualLineBuffer<E> {
    pub fn with_emulator(emulator: E) -> Self {
        Self {
            emulator,
            previous_was_cr: false,
        }
    }

    /// Classify a byte given the byte before it
    pub fn classify(&self, byte: u8) -> ByteClass {
        match byte {
            b'\r' => ByteClass::CarriageReturn,
            b'\n' if self.previous_was_cr => ByteClass::CarriageReturnLineFeed,
            _ => ByteClass::Ordinary,
        }
    }

    /// Process one byte, returning the completed line on CR-LF
    pub fn push_byte(&mut self, byte: u8) -> Option<String> {
        let class = self.classify(byte);
        self.previous_was_cr = class == ByteClass::CarriageReturn;

        match class {
            ByteClass::CarriageReturnLineFeed => Some(self.take_rendered()),
            ByteClass::CarriageReturn | ByteClass::Ordinary => {
                self.emulator.write(byte);
                None
            }
        }
    }

    /// Consume the rendered content, resetting the emulator
    pub fn take_rendered(&mut self) -> String {
        let content = self.emulator.rendered_content();
        self.emulator.clear();
        content
    }

    /// The last rendered row, trimmed
    pub fn last_line(&self) -> String {
        self.emulator.last_line()
    }

    /// The partial row left of the cursor, untrimmed
    pub fn cursor_line(&self) -> String {
        self.emulator.cursor_line()
    }

    /// Forget any partially rendered line
    pub fn reset(&mut self) {
        self.emulator.clear();
        self.previous_was_cr = false;
    }
}
