//! Text measurement for the builtin PDF fonts.
//!
//! Only the standard 14 fonts are used, so no font files are embedded.
//! Widths come from the Adobe AFM metrics (units per 1000 em) for printable
//! ASCII; other characters use an average advance. Times is measured with
//! the Helvetica tables scaled down slightly, which is close enough for line
//! breaking.

use serde::{Deserialize, Serialize};

use crate::style::{ComputedStyle, FontFamily};

/// Helvetica advances for `' '..='~'`.
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a..m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n..z
    334, 260, 334, 584, // '{'..'~'
];

/// Helvetica-Bold advances for `' '..='~'`.
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0..9
    333, 333, 584, 584, 584, 611, 975, // ':'..'@'
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // A..M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N..Z
    333, 278, 333, 584, 556, 333, // '['..'`'
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // a..m
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // n..z
    389, 280, 389, 584, // '{'..'~'
];

/// Advance used for characters outside the tables.
const FALLBACK_ADVANCE: u16 = 556;

/// Courier is fixed-pitch.
const COURIER_ADVANCE: u16 = 600;

/// Fraction of the font size from the top of the em box to the baseline.
pub const ASCENT: f32 = 0.8;

/// One concrete builtin face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FontFace {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl Default for FontFace {
    fn default() -> Self {
        Self {
            family: FontFamily::SansSerif,
            bold: false,
            italic: false,
        }
    }
}

impl FontFace {
    pub fn from_style(style: &ComputedStyle) -> Self {
        Self {
            family: style.font_family,
            bold: style.is_bold(),
            italic: style.is_italic(),
        }
    }

    /// Advance of `c` in thousandths of an em.
    fn advance(&self, c: char) -> f32 {
        if self.family == FontFamily::Monospace {
            return COURIER_ADVANCE as f32;
        }
        let table = if self.bold {
            &HELVETICA_BOLD
        } else {
            &HELVETICA
        };
        let width = match c {
            ' '..='~' => table[c as usize - 0x20],
            '\u{00A0}' => table[0],
            '\t' => table[0] * 4,
            _ => FALLBACK_ADVANCE,
        } as f32;
        match self.family {
            FontFamily::Serif => width * 0.94,
            _ => width,
        }
    }
}

/// Width of `text` in points when set in `face` at `size` points.
pub fn measure_text_width(text: &str, face: FontFace, size: f32) -> f32 {
    text.chars().map(|c| face.advance(c)).sum::<f32>() * size / 1000.0
}
