//! Spectrum analysis and panel rendering.

pub mod renderer;
pub mod spectrum;

pub use renderer::{glyph_pair, DisplayRenderer};
pub use spectrum::{level_for, BandTable, SpectrumAnalyzer, BAR_RANGE};

/// Display columns.
pub const BAR_COUNT: usize = 16;
/// Display rows.
pub const ROWS: usize = 2;
/// Discrete bar heights, `0..LEVEL_COUNT`.
pub const LEVEL_COUNT: usize = 16;

/// Bar height of every column for one analysed frame. Each level spans both rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelMatrix {
    levels: [u8; BAR_COUNT],
}

impl LevelMatrix {
    pub fn new(levels: [u8; BAR_COUNT]) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[u8; BAR_COUNT] {
        &self.levels
    }

    pub fn level(&self, column: usize) -> u8 {
        self.levels[column]
    }
}

/// Cell codes exactly as written to the panel, top row first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacterMatrix {
    cells: [[u8; BAR_COUNT]; ROWS],
}

impl CharacterMatrix {
    pub fn new(cells: [[u8; BAR_COUNT]; ROWS]) -> Self {
        Self { cells }
    }

    /// All spaces; clears the panel.
    pub fn blank() -> Self {
        Self::new([[b' '; BAR_COUNT]; ROWS])
    }

    /// Build from up to 32 row-major bytes, space padded.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut matrix = Self::blank();
        for (i, &byte) in bytes.iter().take(BAR_COUNT * ROWS).enumerate() {
            matrix.cells[i / BAR_COUNT][i % BAR_COUNT] = byte;
        }
        matrix
    }

    pub fn rows(&self) -> &[[u8; BAR_COUNT]; ROWS] {
        &self.cells
    }

    /// Row-major cell bytes.
    pub fn to_bytes(&self) -> [u8; BAR_COUNT * ROWS] {
        let mut out = [b' '; BAR_COUNT * ROWS];
        out[..BAR_COUNT].copy_from_slice(&self.cells[0]);
        out[BAR_COUNT..].copy_from_slice(&self.cells[1]);
        out
    }
}

impl Default for CharacterMatrix {
    fn default() -> Self {
        Self::blank()
    }
}
