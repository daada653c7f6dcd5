use bitfield_struct::bitfield;

/// The 16 colors of the default VGA palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

impl Color {
    #[inline]
    #[must_use]
    pub const fn from_bits(value: u8) -> Self {
        match value & 0x0F {
            0 => Self::Black,
            1 => Self::Blue,
            2 => Self::Green,
            3 => Self::Cyan,
            4 => Self::Red,
            5 => Self::Magenta,
            6 => Self::Brown,
            7 => Self::LightGray,
            8 => Self::DarkGray,
            9 => Self::LightBlue,
            10 => Self::LightGreen,
            11 => Self::LightCyan,
            12 => Self::LightRed,
            13 => Self::Pink,
            14 => Self::Yellow,
            _ => Self::White,
        }
    }

    #[inline]
    #[must_use]
    pub const fn into_bits(self) -> u8 {
        self as u8
    }
}

/// Cell attribute byte.
///
/// Only the eight dark colors are valid backgrounds; bit 7 blinks the cell.
#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct Attribute {
    #[bits(4, default = Color::LightGray)]
    pub foreground: Color,
    #[bits(3, default = Color::Black)]
    pub background: Color,
    pub blink: bool,
}

impl Attribute {
    #[must_use]
    pub const fn colors(foreground: Color, background: Color) -> Self {
        Self::new()
            .with_foreground(foreground)
            .with_background(background)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_like_the_hardware() {
        assert_eq!(Attribute::colors(Color::White, Color::Blue).into_bits(), 0x1F);
        assert_eq!(Attribute::new().into_bits(), 0x07);
        assert_eq!(
            Attribute::colors(Color::Yellow, Color::Red)
                .with_blink(true)
                .into_bits(),
            0xCE
        );
    }

    #[test]
    fn decodes_raw_bytes() {
        let attr = Attribute::from_bits(0x4F);
        assert_eq!(attr.foreground(), Color::White);
        assert_eq!(attr.background(), Color::Red);
        assert!(!attr.blink());
    }
}
