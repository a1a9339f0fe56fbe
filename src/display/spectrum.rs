//! Windowed FFT analysis of one frame into per-column bar levels.

use super::{LevelMatrix, BAR_COUNT, LEVEL_COUNT};
use crate::error::{Error, Result};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// FFT bin boundaries of each display column, roughly 1.54^i.
/// Bin j sits near j * 44100 / 4096 Hz, so the bars span ~10 Hz to ~11 kHz.
pub const BAR_RANGE: [usize; BAR_COUNT + 1] = [
    1, 2, 3, 4, 6, 9, 13, 21, 32, 49, 76, 117, 181, 279, 431, 664, 1024,
];

/// Natural log of the peak magnitude that maps to a full bar.
const LOG_FULL_SCALE: f32 = 7.0;

/// Boundaries of each band as FFT bin indices: band `b` covers `[bounds[b], bounds[b + 1])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandTable {
    bounds: Vec<usize>,
}

impl BandTable {
    /// Validate a boundary list against the transform length.
    pub fn new(bounds: &[usize], frame_len: usize) -> Result<Self> {
        if bounds.len() < 2 {
            return Err(Error::Initialization(
                "band table needs at least two boundaries".to_string(),
            ));
        }
        if bounds[0] < 1 {
            return Err(Error::Initialization(
                "band table must not include the DC bin".to_string(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Initialization(format!(
                "band boundaries must be strictly increasing: {:?}",
                bounds
            )));
        }
        let last = bounds[bounds.len() - 1];
        if last > frame_len / 2 {
            return Err(Error::Initialization(format!(
                "band boundary {} exceeds the Nyquist bin {}",
                last,
                frame_len / 2
            )));
        }
        Ok(Self {
            bounds: bounds.to_vec(),
        })
    }

    pub fn band_count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Bin range of one band.
    pub fn band(&self, index: usize) -> std::ops::Range<usize> {
        self.bounds[index]..self.bounds[index + 1]
    }
}

/// Converts frames into bar levels. The FFT is planned once, at construction.
pub struct SpectrumAnalyzer {
    frame_len: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    bands: BandTable,
}

impl SpectrumAnalyzer {
    /// Analyzer using the built-in [`BAR_RANGE`] table.
    pub fn new(frame_len: usize) -> Result<Self> {
        let bands = BandTable::new(&BAR_RANGE, frame_len)?;
        Self::with_bands(frame_len, bands)
    }

    pub fn with_bands(frame_len: usize, bands: BandTable) -> Result<Self> {
        if bands.band_count() != BAR_COUNT {
            return Err(Error::Initialization(format!(
                "expected {} bands, got {}",
                BAR_COUNT,
                bands.band_count()
            )));
        }

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        // Hamming window, emphasises the centre of the frame
        let window = (0..frame_len)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f32 / frame_len as f32).cos())
            .collect();

        Ok(Self {
            frame_len,
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); frame_len],
            scratch,
            bands,
        })
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Analyze one complete frame.
    ///
    /// Panics if `frame` is not exactly one frame long.
    pub fn analyze(&mut self, frame: &[f32]) -> LevelMatrix {
        assert_eq!(
            frame.len(),
            self.frame_len,
            "analysis requires a complete frame"
        );

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let mut levels = [0u8; BAR_COUNT];
        for (b, level) in levels.iter_mut().enumerate() {
            // |X[j]| equals the half-complex pairing sqrt(out[j]^2 + out[N-j]^2)
            let peak = self.buffer[self.bands.band(b)]
                .iter()
                .map(|c| c.norm())
                .fold(0.0f32, f32::max);
            *level = level_for(peak);
        }

        LevelMatrix::new(levels)
    }
}

/// Map a band's peak magnitude onto `0..LEVEL_COUNT` on a log scale.
pub fn level_for(peak: f32) -> u8 {
    if !peak.is_finite() || peak <= 0.0 {
        return 0;
    }
    let scaled = peak.ln() / LOG_FULL_SCALE * (LEVEL_COUNT - 1) as f32;
    scaled.clamp(0.0, (LEVEL_COUNT - 1) as f32) as u8
}
