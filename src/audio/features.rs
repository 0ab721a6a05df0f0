use std::collections::VecDeque;

/// Number of raw volume readings averaged into the reported volume.
pub const VOLUME_HISTORY_SIZE: usize = 10;

const LOW_BAND_END: f32 = 0.1;
const MID_BAND_END: f32 = 0.5;

/// Normalized energy of the three frequency bands.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandLevels {
    pub low: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandLevels {
    pub fn average(&self) -> f32 {
        (self.low + self.mid + self.high) / 3.0
    }
}

/// Result of analysing one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Features {
    /// Unsmoothed RMS of the sample, 0.0-1.0
    pub raw_volume: f32,
    /// Moving average of the last raw volumes
    pub volume: f32,
    pub bands: BandLevels,
}

/// Turns a byte-frequency sample into volume and band energies.
///
/// Volume is the RMS over every bin, smoothed with a simple moving average
/// so single-frame spikes don't flash the visuals. Bands are contiguous
/// index ranges: low `[0, 10%)`, mid `[10%, 50%)`, high `[50%, 100%)`.
pub struct AudioFeatureExtractor {
    volume_history: VecDeque<f32>,
    history_size: usize,
}

impl AudioFeatureExtractor {
    pub fn new() -> Self {
        Self::with_history_size(VOLUME_HISTORY_SIZE)
    }

    pub fn with_history_size(history_size: usize) -> Self {
        let history_size = history_size.max(1);
        Self {
            volume_history: VecDeque::with_capacity(history_size),
            history_size,
        }
    }

    pub fn process(&mut self, sample: &[u8]) -> Features {
        let raw_volume = Self::raw_volume(sample);

        self.volume_history.push_back(raw_volume);
        if self.volume_history.len() > self.history_size {
            self.volume_history.pop_front();
        }
        let volume = self.volume_history.iter().sum::<f32>() / self.volume_history.len() as f32;

        Features {
            raw_volume,
            volume,
            bands: Self::band_levels(sample),
        }
    }

    /// RMS over all bins, normalized to 0.0-1.0.
    pub fn raw_volume(sample: &[u8]) -> f32 {
        if sample.is_empty() {
            return 0.0;
        }

        let sum_sq: f32 = sample.iter().map(|&b| (b as f32) * (b as f32)).sum();
        (sum_sq / sample.len() as f32).sqrt() / 255.0
    }

    pub fn band_levels(sample: &[u8]) -> BandLevels {
        let len = sample.len();
        let low_end = (len as f32 * LOW_BAND_END) as usize;
        let mid_end = (len as f32 * MID_BAND_END) as usize;

        BandLevels {
            low: Self::average_range(sample, 0, low_end),
            mid: Self::average_range(sample, low_end, mid_end),
            high: Self::average_range(sample, mid_end, len),
        }
    }

    /// Clears the smoothing window, e.g. after switching input sources.
    pub fn reset(&mut self) {
        self.volume_history.clear();
    }

    fn average_range(data: &[u8], start: usize, end: usize) -> f32 {
        let end = end.min(data.len());
        if start >= end {
            return 0.0;
        }

        let sum: u32 = data[start..end].iter().map(|&b| b as u32).sum();
        sum as f32 / (end - start) as f32 / 255.0
    }
}

impl Default for AudioFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_volume_is_normalized_rms() {
        assert_eq!(AudioFeatureExtractor::raw_volume(&[255; 64]), 1.0);
        assert_eq!(AudioFeatureExtractor::raw_volume(&[0; 64]), 0.0);

        // RMS of [0, 255] is 255 / sqrt(2)
        let rms = AudioFeatureExtractor::raw_volume(&[0, 255]);
        assert!((rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_converges_to_constant_input() {
        let mut extractor = AudioFeatureExtractor::new();

        // Start from a loud burst so convergence is observable
        for _ in 0..VOLUME_HISTORY_SIZE {
            extractor.process(&[255; 100]);
        }

        let quiet = [51u8; 100];
        let expected = AudioFeatureExtractor::raw_volume(&quiet);
        let mut last = None;
        for _ in 0..VOLUME_HISTORY_SIZE {
            last = Some(extractor.process(&quiet));
        }

        let features = last.unwrap();
        assert!((features.volume - expected).abs() < 1e-6);
        assert!((features.volume - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_dampens_single_spike() {
        let mut extractor = AudioFeatureExtractor::new();
        for _ in 0..9 {
            extractor.process(&[0; 100]);
        }

        let spike = extractor.process(&[255; 100]);
        assert_eq!(spike.raw_volume, 1.0);
        assert!((spike.volume - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_band_partition_by_index() {
        // 100 bins: low = 0..10, mid = 10..50, high = 50..100
        let mut sample = vec![0u8; 100];
        sample[..10].fill(255);
        sample[10..50].fill(51);

        let bands = AudioFeatureExtractor::band_levels(&sample);
        assert_eq!(bands.low, 1.0);
        assert!((bands.mid - 0.2).abs() < 1e-6);
        assert_eq!(bands.high, 0.0);
        assert!((bands.average() - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_empty_and_tiny_samples_do_not_divide_by_zero() {
        let mut extractor = AudioFeatureExtractor::new();
        let empty = extractor.process(&[]);
        assert_eq!(empty.raw_volume, 0.0);
        assert_eq!(empty.bands, BandLevels::default());

        // With 5 bins the low band is empty and must read as silence
        let bands = AudioFeatureExtractor::band_levels(&[200; 5]);
        assert_eq!(bands.low, 0.0);
        assert!(bands.mid > 0.0 && bands.high > 0.0);
        assert!(bands.average().is_finite());
    }

    #[test]
    fn test_ten_bins_give_non_empty_bands() {
        let bands = AudioFeatureExtractor::band_levels(&[255; 10]);
        assert_eq!(bands.low, 1.0);
        assert_eq!(bands.mid, 1.0);
        assert_eq!(bands.high, 1.0);
    }
}
