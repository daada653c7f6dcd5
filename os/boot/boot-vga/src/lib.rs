//! # VGA Text Mode Diagnostics
//!
//! Writes characters straight into the VGA text buffer so a stage can show
//! that it got somewhere, even with no debug console attached.
//!
//! ```text
//! 0xB8000  row 0: [attr|char][attr|char] ... 80 cells
//!          row 1: ...
//!          ...    25 rows, one u16 per cell, character in the low byte
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod attribute;
mod buffer;
mod writer;

pub use attribute::{Attribute, Color};
pub use buffer::{HEIGHT, TextBuffer, VGA_TEXT_ADDRESS, WIDTH};
pub use writer::TextWriter;
