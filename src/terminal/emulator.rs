//! Terminal Emulation Primitive
//!
//! Replays shell output one byte at a time through a `vte` state machine so
//! that text the remote shell redraws (carriage returns, backspaces, cursor
//! movement, erase-in-line) is captured the way a user would see it.

use std::fmt;
use vte::{Params, Parser, Perform};

/// Line-buffering terminal primitive consumed by the line buffer
pub trait LineEmulator {
    /// Interpret a single byte; the effect is applied before returning
    fn write(&mut self, byte: u8);

    /// All rendered rows as one trimmed string, rows joined by `\n`
    fn rendered_content(&self) -> String;

    /// The row under the cursor, trimmed
    fn last_line(&self) -> String;

    /// The row under the cursor up to the cursor column, blanks included
    fn cursor_line(&self) -> String {
        self.last_line()
    }

    /// Drop all rendered content and home the cursor
    fn clear(&mut self);
}

/// `vte`-backed emulator without autowrap
pub struct VirtualTerminal {
    parser: Parser,
    screen: Screen,
}

impl VirtualTerminal {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            screen: Screen::default(),
        }
    }

    /// Current cursor position as (row, column)
    pub fn cursor(&self) -> (usize, usize) {
        (self.screen.row, self.screen.col)
    }
}

impl Default for VirtualTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VirtualTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualTerminal")
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}

impl LineEmulator for VirtualTerminal {
    fn write(&mut self, byte: u8) {
        self.parser.advance(&mut self.screen, &[byte]);
    }

    fn rendered_content(&self) -> String {
        self.screen
            .rows
            .iter()
            .map(|row| row.iter().collect::<String>().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    fn last_line(&self) -> String {
        self.screen
            .rows
            .get(self.screen.row)
            .map(|row| row.iter().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    fn cursor_line(&self) -> String {
        let row = self
            .screen
            .rows
            .get(self.screen.row)
            .map(Vec::as_slice)
            .unwrap_or_default();
        (0..self.screen.col)
            .map(|col| row.get(col).copied().unwrap_or(' '))
            .collect()
    }

    fn clear(&mut self) {
        self.screen = Screen::default();
    }
}

/// Rendered rows plus cursor
#[derive(Debug, Default)]
struct Screen {
    rows: Vec<Vec<char>>,
    row: usize,
    col: usize,
}

impl Screen {
    fn current_row(&mut self) -> &mut Vec<char> {
        if self.rows.len() <= self.row {
            self.rows.resize_with(self.row + 1, Vec::new);
        }
        &mut self.rows[self.row]
    }

    fn put(&mut self, c: char) {
        let col = self.col;
        let row = self.current_row();
        if row.len() < col {
            row.resize(col, ' ');
        }
        if col < row.len() {
            row[col] = c;
        } else {
            row.push(c);
        }
        self.col += 1;
    }

    fn erase_in_line(&mut self, mode: u16) {
        let col = self.col;
        let row = self.current_row();
        match mode {
            0 => row.truncate(col),
            1 => {
                let end = (col + 1).min(row.len());
                row[..end].iter_mut().for_each(|c| *c = ' ');
            }
            _ => row.clear(),
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0 => {
                self.erase_in_line(0);
                self.rows.truncate(self.row + 1);
            }
            1 => {
                let row = self.row;
                for above in self.rows.iter_mut().take(row) {
                    above.clear();
                }
                self.erase_in_line(1);
            }
            _ => self.rows.clear(),
        }
    }

    fn delete_chars(&mut self, count: usize) {
        let col = self.col;
        let row = self.current_row();
        if col < row.len() {
            let end = (col + count).min(row.len());
            row.drain(col..end);
        }
    }

    fn insert_blanks(&mut self, count: usize) {
        let col = self.col;
        let row = self.current_row();
        if col <= row.len() {
            row.splice(col..col, std::iter::repeat(' ').take(count));
        }
    }
}

/// First value of the nth parameter, 0 when absent
fn param(params: &Params, index: usize) -> u16 {
    params
        .iter()
        .nth(index)
        .and_then(|p| p.first().copied())
        .unwrap_or(0)
}

/// Parameter with the usual "0 means 1" rule for counts and positions
fn count(params: &Params, index: usize) -> usize {
    usize::from(param(params, index).max(1))
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.put(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\r' => self.col = 0,
            // LF, VT and FF all move down a row
            0x0A..=0x0C => {
                self.row += 1;
                self.current_row();
            }
            0x08 => self.col = self.col.saturating_sub(1),
            b'\t' => self.col = (self.col / 8 + 1) * 8,
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, _intermediates: &[u8], ignore: bool, action: char) {
        if ignore {
            return;
        }

        match action {
            'K' => self.erase_in_line(param(params, 0)),
            'J' => self.erase_in_display(param(params, 0)),
            'C' => self.col += count(params, 0),
            'D' => self.col = self.col.saturating_sub(count(params, 0)),
            'G' => self.col = count(params, 0) - 1,
            'A' => self.row = self.row.saturating_sub(count(params, 0)),
            'B' => self.row += count(params, 0),
            'H' | 'f' => {
                self.row = count(params, 0) - 1;
                self.col = count(params, 1) - 1;
            }
            'P' => self.delete_chars(count(params, 0)),
            '@' => self.insert_blanks(count(params, 0)),
            // SGR and everything else carries no text
            _ => {}
        }
    }
}
