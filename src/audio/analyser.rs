use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::AudioError;

/// Byte-frequency analyser for the capture path.
///
/// Keeps the latest `fft_size` time-domain samples and, on demand, produces
/// one byte per frequency bin: Hann-windowed FFT magnitude, smoothed over
/// time, mapped from `[min_decibels, max_decibels]` onto `0..=255`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    time_buffer: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothing_time_constant: f32,
    min_decibels: f32,
    max_decibels: f32,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Result<Self, AudioError> {
        Self::with_params(fft_size, 0.8, -100.0, -30.0)
    }

    pub fn with_params(
        fft_size: usize,
        smoothing_time_constant: f32,
        min_decibels: f32,
        max_decibels: f32,
    ) -> Result<Self, AudioError> {
        if fft_size < 32 || !fft_size.is_power_of_two() {
            return Err(AudioError::InitializationFailure(format!(
                "fft size must be a power of two >= 32, got {}",
                fft_size
            )));
        }
        if min_decibels >= max_decibels {
            return Err(AudioError::InitializationFailure(format!(
                "decibel range is empty: [{}, {}]",
                min_decibels, max_decibels
            )));
        }

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Ok(Self {
            fft_size,
            fft,
            window: Self::hann_window(fft_size),
            time_buffer: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing_time_constant: smoothing_time_constant.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
        })
    }

    fn hann_window(size: usize) -> Vec<f32> {
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Appends samples, keeping only the newest `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.len() >= self.fft_size {
            let start = samples.len() - self.fft_size;
            self.time_buffer.copy_from_slice(&samples[start..]);
            return;
        }

        self.time_buffer.drain(..samples.len());
        self.time_buffer.extend_from_slice(samples);
    }

    /// Fills `out` with one byte per bin for the current time buffer.
    pub fn byte_frequency_data(&mut self, out: &mut Vec<u8>) {
        for (slot, (&x, &w)) in self
            .scratch
            .iter_mut()
            .zip(self.time_buffer.iter().zip(self.window.iter()))
        {
            *slot = Complex::new(x * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.smoothing_time_constant;
        let min_db = self.min_decibels;
        let range = self.max_decibels - min_db;
        let scale = 1.0 / self.fft_size as f32;

        out.clear();
        out.extend(self.smoothed.iter_mut().zip(self.scratch.iter()).map(|(smoothed, c)| {
            let magnitude = c.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            if !smoothed.is_finite() {
                *smoothed = 0.0;
            }

            if *smoothed <= 0.0 {
                return 0;
            }
            let db = 20.0 * smoothed.log10();
            (255.0 * (db - min_db) / range).clamp(0.0, 255.0) as u8
        }));
    }

    /// Zeros the time buffer and the temporal smoothing state.
    pub fn reset(&mut self) {
        self.time_buffer.fill(0.0);
        self.smoothed.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(bin: usize, fft_size: usize, amplitude: f32) -> Vec<f32> {
        (0..fft_size)
            .map(|n| {
                amplitude
                    * (2.0 * std::f32::consts::PI * bin as f32 * n as f32 / fft_size as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_rejects_bad_fft_size() {
        assert!(matches!(
            SpectrumAnalyser::new(500),
            Err(AudioError::InitializationFailure(_))
        ));
        assert!(SpectrumAnalyser::new(16).is_err());
        assert!(SpectrumAnalyser::new(512).is_ok());
    }

    #[test]
    fn test_silence_reads_zero() {
        let mut analyser = SpectrumAnalyser::new(256).unwrap();
        analyser.push_samples(&[0.0; 256]);

        let mut bins = Vec::new();
        analyser.byte_frequency_data(&mut bins);
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(512).unwrap();
        analyser.push_samples(&sine(32, 512, 0.5));

        let mut bins = Vec::new();
        analyser.byte_frequency_data(&mut bins);

        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|&(_, b)| *b)
            .map(|(i, _)| i)
            .unwrap();
        assert!((31..=33).contains(&peak));
        assert!(bins[32] > bins[200]);
    }

    #[test]
    fn test_push_keeps_newest_samples() {
        let mut analyser = SpectrumAnalyser::new(32).unwrap();
        analyser.push_samples(&[1.0; 40]);
        analyser.push_samples(&[0.0; 32]);

        let mut bins = Vec::new();
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));

        analyser.push_samples(&[1.0; 8]);
        analyser.byte_frequency_data(&mut bins);
        assert!(bins[0] > 0);
    }
}
