use crate::attribute::Attribute;
use core::marker::PhantomData;
use core::ptr::NonNull;

/// Physical address of the color text buffer.
pub const VGA_TEXT_ADDRESS: usize = 0xB_8000;

pub const WIDTH: usize = 80;
pub const HEIGHT: usize = 25;

const CELLS: usize = WIDTH * HEIGHT;

/// Volatile access to a 80×25 grid of text cells.
///
/// Writes outside the grid are dropped.
#[derive(Debug)]
pub struct TextBuffer<'a> {
    cells: NonNull<u16>,
    _cells: PhantomData<&'a mut [u16; CELLS]>,
}

impl<'a> TextBuffer<'a> {
    /// A grid backed by ordinary memory.
    #[must_use]
    pub fn new(cells: &'a mut [u16; CELLS]) -> Self {
        Self {
            cells: NonNull::from(cells).cast::<u16>(),
            _cells: PhantomData,
        }
    }
}

impl TextBuffer<'static> {
    /// The hardware text buffer.
    ///
    /// # Safety
    /// `0xB8000` must be identity mapped, the display must be in 80×25 text
    /// mode, and no other `TextBuffer` over it may be alive.
    #[must_use]
    pub const unsafe fn vga() -> Self {
        Self {
            // SAFETY: non-zero constant.
            cells: unsafe { NonNull::new_unchecked(VGA_TEXT_ADDRESS as *mut u16) },
            _cells: PhantomData,
        }
    }
}

impl TextBuffer<'_> {
    #[inline]
    const fn index(row: usize, col: usize) -> Option<usize> {
        if row < HEIGHT && col < WIDTH {
            Some(row * WIDTH + col)
        } else {
            None
        }
    }

    #[inline]
    fn store(&mut self, index: usize, value: u16) {
        // SAFETY: `index < CELLS` at every call site.
        unsafe { self.cells.add(index).write_volatile(value) }
    }

    #[inline]
    fn load(&self, index: usize) -> u16 {
        // SAFETY: `index < CELLS` at every call site.
        unsafe { self.cells.add(index).read_volatile() }
    }

    /// Encode a character and attribute into a cell value.
    #[must_use]
    pub const fn encode(byte: u8, attr: Attribute) -> u16 {
        ((attr.into_bits() as u16) << 8) | byte as u16
    }

    /// Write one character. Returns `false` if the position is off screen.
    pub fn put(&mut self, row: usize, col: usize, byte: u8, attr: Attribute) -> bool {
        match Self::index(row, col) {
            Some(i) => {
                self.store(i, Self::encode(byte, attr));
                true
            }
            None => false,
        }
    }

    /// Write `text` starting at (`row`, `col`), clipped at the end of the row.
    ///
    /// Returns the number of cells written.
    pub fn write_at(&mut self, row: usize, col: usize, text: &str, attr: Attribute) -> usize {
        text.bytes()
            .enumerate()
            .take_while(|&(i, byte)| self.put(row, col + i, byte, attr))
            .count()
    }

    /// The raw value of a cell.
    #[must_use]
    pub fn cell(&self, row: usize, col: usize) -> Option<u16> {
        Self::index(row, col).map(|i| self.load(i))
    }

    /// Blank a single row.
    pub fn clear_row(&mut self, row: usize, attr: Attribute) {
        if row >= HEIGHT {
            return;
        }
        let blank = Self::encode(b' ', attr);
        for col in 0..WIDTH {
            self.store(row * WIDTH + col, blank);
        }
    }

    /// Blank the whole screen.
    pub fn clear(&mut self, attr: Attribute) {
        for row in 0..HEIGHT {
            self.clear_row(row, attr);
        }
    }

    /// Move every row up by one and blank the last row.
    pub fn scroll_up(&mut self, attr: Attribute) {
        for i in WIDTH..CELLS {
            let value = self.load(i);
            self.store(i - WIDTH, value);
        }
        self.clear_row(HEIGHT - 1, attr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Color;

    #[test]
    fn cells_hold_attribute_and_character() {
        let mut cells = [0u16; CELLS];
        let mut screen = TextBuffer::new(&mut cells);
        let attr = Attribute::colors(Color::White, Color::Blue);

        assert!(screen.put(0, 0, b'O', attr));
        assert!(screen.put(0, 1, b'K', attr));
        assert!(!screen.put(HEIGHT, 0, b'!', attr));
        assert!(!screen.put(0, WIDTH, b'!', attr));

        assert_eq!(screen.cell(0, 0), Some(0x1F4F));
        assert_eq!(screen.cell(0, 1), Some(0x1F4B));
        assert_eq!(screen.cell(HEIGHT, 0), None);
    }

    #[test]
    fn write_at_clips_at_the_row_end() {
        let mut cells = [0u16; CELLS];
        let mut screen = TextBuffer::new(&mut cells);
        let attr = Attribute::new();

        assert_eq!(screen.write_at(3, WIDTH - 2, "abc", attr), 2);
        assert_eq!(screen.cell(3, WIDTH - 1), Some(0x0762));
        assert_eq!(screen.cell(4, 0), Some(0));
    }

    #[test]
    fn scrolling_moves_rows_up() {
        let mut cells = [0u16; CELLS];
        let mut screen = TextBuffer::new(&mut cells);
        let attr = Attribute::new();
        screen.clear(attr);
        screen.write_at(1, 0, "second", attr);

        screen.scroll_up(attr);

        assert_eq!(screen.cell(0, 0), Some(TextBuffer::encode(b's', attr)));
        assert_eq!(screen.cell(HEIGHT - 1, 0), Some(TextBuffer::encode(b' ', attr)));
    }
}
