use crate::attribute::Attribute;
use crate::buffer::{HEIGHT, TextBuffer, WIDTH};
use core::fmt;

/// Stand-in for characters the code page cannot show.
const REPLACEMENT: u8 = 0xFE;

/// A terminal-like cursor over a [`TextBuffer`].
///
/// Lines wrap at the right edge; writing past the bottom row scrolls.
#[derive(Debug)]
pub struct TextWriter<'a> {
    buffer: TextBuffer<'a>,
    row: usize,
    col: usize,
    attr: Attribute,
}

impl<'a> TextWriter<'a> {
    #[must_use]
    pub const fn new(buffer: TextBuffer<'a>, attr: Attribute) -> Self {
        Self {
            buffer,
            row: 0,
            col: 0,
            attr,
        }
    }

    /// Continue at `row`, e.g. below markers written directly to the buffer.
    #[must_use]
    pub const fn at_row(mut self, row: usize) -> Self {
        self.row = if row < HEIGHT { row } else { HEIGHT - 1 };
        self.col = 0;
        self
    }

    /// Attribute for the cells written from now on.
    pub const fn set_attribute(&mut self, attr: Attribute) {
        self.attr = attr;
    }

    #[must_use]
    pub const fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    #[must_use]
    pub const fn buffer(&self) -> &TextBuffer<'a> {
        &self.buffer
    }

    pub fn write_byte(&mut self, byte: u8) {
        if byte == b'\n' {
            self.new_line();
            return;
        }
        if self.col >= WIDTH {
            self.new_line();
        }
        self.buffer.put(self.row, self.col, byte, self.attr);
        self.col += 1;
    }

    fn new_line(&mut self) {
        self.col = 0;
        if self.row + 1 < HEIGHT {
            self.row += 1;
        } else {
            self.buffer.scroll_up(self.attr);
        }
    }
}

impl fmt::Write for TextWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            let byte = match c {
                '\n' => b'\n',
                ' '..='~' => c as u8,
                _ => REPLACEMENT,
            };
            self.write_byte(byte);
        }
        Ok(())
    }
}
