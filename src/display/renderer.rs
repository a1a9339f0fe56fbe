//! Glyph layout for the two-line panel.
//!
//! The panel's custom character set holds eight partial-fill glyphs at codes
//! 0x00..=0x07, from one pixel row up to a full cell.

use super::{CharacterMatrix, LevelMatrix, BAR_COUNT, LEVEL_COUNT, ROWS};

const BLANK: u8 = b' ';
const UNPRINTABLE: u8 = b'?';

/// Glyph for each level, top row first. Levels 0-7 fill the bottom cell,
/// levels 8-15 keep it full and grow into the top cell.
pub const BAR_CHARS: [[u8; LEVEL_COUNT]; ROWS] = [
    [
        BLANK, BLANK, BLANK, BLANK, BLANK, BLANK, BLANK, BLANK, 0x0, 0x1, 0x2, 0x3, 0x4, 0x5,
        0x6, 0x7,
    ],
    [
        0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0x7, 0x7, 0x7, 0x7, 0x7, 0x7, 0x7, 0x7,
    ],
];

/// Top and bottom glyph for one level. Out-of-range levels are clamped.
pub fn glyph_pair(level: u8) -> (u8, u8) {
    let level = (level as usize).min(LEVEL_COUNT - 1);
    (BAR_CHARS[0][level], BAR_CHARS[1][level])
}

/// Stateless conversion of levels or overlay text into panel cells.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisplayRenderer;

impl DisplayRenderer {
    pub fn new() -> Self {
        Self
    }

    /// One vertical bar per column.
    pub fn render(&self, levels: &LevelMatrix) -> CharacterMatrix {
        let mut cells = [[BLANK; BAR_COUNT]; ROWS];
        for (col, &level) in levels.levels().iter().enumerate() {
            let (top, bottom) = glyph_pair(level);
            cells[0][col] = top;
            cells[1][col] = bottom;
        }
        CharacterMatrix::new(cells)
    }

    /// Text on the top row, a horizontal bar of `fill` columns below it.
    ///
    /// One cell per character; anything outside printable ASCII shows as `?`.
    pub fn render_overlay(&self, text: &str, fill: usize) -> CharacterMatrix {
        let mut cells = [[BLANK; BAR_COUNT]; ROWS];
        for (cell, ch) in cells[0].iter_mut().zip(text.chars()) {
            *cell = if ch == ' ' || ch.is_ascii_graphic() {
                ch as u8
            } else {
                UNPRINTABLE
            };
        }
        for (col, cell) in cells[1].iter_mut().enumerate().take(fill.min(BAR_COUNT)) {
            // Thin on the left, thick on the right
            *cell = (col / 2) as u8;
        }
        CharacterMatrix::new(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glyph_pair_boundaries() {
        assert_eq!(glyph_pair(0), (BLANK, 0x0));
        assert_eq!(glyph_pair(7), (BLANK, 0x7));
        assert_eq!(glyph_pair(8), (0x0, 0x7));
        assert_eq!(glyph_pair((LEVEL_COUNT - 1) as u8), (0x7, 0x7));
        // Clamped rather than indexing out of range
        assert_eq!(glyph_pair(LEVEL_COUNT as u8), (0x7, 0x7));
        assert_eq!(glyph_pair(u8::MAX), (0x7, 0x7));
    }

    #[test]
    fn test_render_levels() {
        let mut levels = [0u8; BAR_COUNT];
        levels[0] = 3;
        levels[1] = 12;
        levels[15] = 15;

        let matrix = DisplayRenderer::new().render(&LevelMatrix::new(levels));
        let rows = matrix.rows();
        assert_eq!((rows[0][0], rows[1][0]), (BLANK, 0x3));
        assert_eq!((rows[0][1], rows[1][1]), (0x4, 0x7));
        assert_eq!((rows[0][2], rows[1][2]), (BLANK, 0x0));
        assert_eq!((rows[0][15], rows[1][15]), (0x7, 0x7));
    }

    #[test]
    fn test_render_overlay() {
        let matrix = DisplayRenderer::new().render_overlay("Volume: 50%", 8);
        let rows = matrix.rows();
        assert_eq!(&rows[0], b"Volume: 50%     ");
        assert_eq!(&rows[1][..8], &[0, 0, 1, 1, 2, 2, 3, 3]);
        assert!(rows[1][8..].iter().all(|&c| c == BLANK));
    }

    #[test]
    fn test_render_overlay_truncates_and_clamps() {
        let matrix = DisplayRenderer::new().render_overlay("A much longer label than fits", 40);
        let rows = matrix.rows();
        assert_eq!(&rows[0], b"A much longer la");
        assert_eq!(rows[1][15], 7);

        let empty = DisplayRenderer::new().render_overlay("", 0);
        assert_eq!(empty, CharacterMatrix::blank());
    }

    #[test]
    fn test_render_overlay_non_ascii() {
        let matrix = DisplayRenderer::new().render_overlay("Lautst\u{e4}rke: 50%\t", 0);
        // One cell per character, never a split UTF-8 sequence or a glyph code
        assert_eq!(&matrix.rows()[0], b"Lautst?rke: 50%?");
    }
}
