use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};

use super::analyser::SpectrumAnalyser;
use super::AudioSample;
use crate::error::AudioError;

/// A running input: mono sample blocks arriving from the device callback.
pub struct InputStream {
    pub receiver: Receiver<Vec<f32>>,
    pub sample_rate: u32,
    pub device_name: String,
}

/// Hardware seam for the capture path.
pub trait CaptureDevice {
    /// Opens the device and starts streaming. May be refused.
    fn open(&mut self) -> Result<InputStream, AudioError>;

    /// Stops the stream and releases the device. Safe to call repeatedly.
    fn close(&mut self);
}

/// Default input device of the default cpal host.
pub struct CpalInputDevice {
    stream: Option<Stream>,
}

impl CpalInputDevice {
    pub fn new() -> Self {
        Self { stream: None }
    }

    fn build_stream(
        device: &Device,
        config: &StreamConfig,
        format: SampleFormat,
        sender: Sender<Vec<f32>>,
    ) -> Result<Stream, AudioError> {
        let channels = config.channels as usize;
        let on_error = |err: cpal::StreamError| warn!("Audio stream error: {}", err);

        let stream = match format {
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    send_mono(&sender, data.iter().copied(), channels);
                },
                on_error,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    send_mono(&sender, data.iter().map(|&s| s as f32 / 32768.0), channels);
                },
                on_error,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    send_mono(
                        &sender,
                        data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0),
                        channels,
                    );
                },
                on_error,
                None,
            ),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        };

        stream.map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::PermissionDenied,
            cpal::BuildStreamError::BackendSpecific { err }
                if err.description.to_lowercase().contains("permission") =>
            {
                AudioError::PermissionDenied
            }
            other => AudioError::Stream(other.to_string()),
        })
    }
}

impl Default for CpalInputDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Mixes interleaved frames down to mono and forwards them to the tick thread.
fn send_mono<I: Iterator<Item = f32>>(sender: &Sender<Vec<f32>>, data: I, channels: usize) {
    let samples: Vec<f32> = data.collect();
    let mono: Vec<f32> = if channels <= 1 {
        samples
    } else {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if sender.send(mono).is_err() {
        debug!("Capture receiver dropped, discarding audio block");
    }
}

impl CaptureDevice for CpalInputDevice {
    fn open(&mut self) -> Result<InputStream, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoInputDevice)?;

        let supported = device.default_input_config().map_err(|e| match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => AudioError::NoInputDevice,
            other => AudioError::InitializationFailure(other.to_string()),
        })?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {}", device_name);
        info!("Audio config: {:?}", supported);

        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let stream = Self::build_stream(&device, &config, format, sender)?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
        self.stream = Some(stream);

        Ok(InputStream {
            receiver,
            sample_rate,
            device_name,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!("Failed to pause input stream on close: {}", e);
            }
        }
    }
}

/// Input fed from a channel instead of hardware.
///
/// Used for offline rehearsal (the host decodes a file and pushes blocks) and
/// for exercising the capture path without a microphone.
pub struct ChannelInputDevice {
    receiver: Receiver<Vec<f32>>,
    sample_rate: u32,
    refusal: Option<AudioError>,
    open: bool,
}

impl ChannelInputDevice {
    pub fn new(sample_rate: u32) -> (Self, Sender<Vec<f32>>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let device = Self {
            receiver,
            sample_rate,
            refusal: None,
            open: false,
        };
        (device, sender)
    }

    /// A device that always refuses to open with `error`.
    pub fn refusing(error: AudioError) -> Self {
        let (mut device, _) = Self::new(44_100);
        device.refusal = Some(error);
        device
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl CaptureDevice for ChannelInputDevice {
    fn open(&mut self) -> Result<InputStream, AudioError> {
        if let Some(err) = &self.refusal {
            return Err(err.clone());
        }
        self.open = true;
        Ok(InputStream {
            receiver: self.receiver.clone(),
            sample_rate: self.sample_rate,
            device_name: "channel input".to_string(),
        })
    }

    fn close(&mut self) {
        self.open = false;
    }
}

/// Static compressor applied after the gain stage.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
}

impl Compressor {
    pub fn new(threshold_db: f32, ratio: f32) -> Self {
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
        }
    }

    pub fn process(&self, sample: f32) -> f32 {
        let magnitude = sample.abs();
        if magnitude <= f32::EPSILON {
            return sample;
        }

        let level_db = 20.0 * magnitude.log10();
        if level_db <= self.threshold_db {
            return sample;
        }

        let out_db = self.threshold_db + (level_db - self.threshold_db) / self.ratio;
        10f32.powf(out_db / 20.0).copysign(sample)
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(-24.0, 12.0)
    }
}

/// Details of a successful acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct Connected {
    pub device_name: String,
    pub sample_rate: u32,
}

enum SignalPath {
    /// Nothing requested yet
    Pending,
    Live(InputStream),
    /// Zero-amplitude oscillator standing in for a refused or missing device
    Synthetic(AudioError),
    Disposed,
}

/// Microphone (or substitute) feeding the byte-frequency analyser.
///
/// Live path: device → gain → compressor → analyser. When the device is
/// refused the source keeps a silent synthetic path, so `sample` always
/// produces a full-length buffer.
pub struct AudioCaptureSource {
    device: Box<dyn CaptureDevice>,
    analyser: SpectrumAnalyser,
    compressor: Compressor,
    path: SignalPath,
    enabled: bool,
    gain: f32,
    block: Vec<f32>,
}

impl AudioCaptureSource {
    pub fn new(device: Box<dyn CaptureDevice>, analyser: SpectrumAnalyser, compressor: Compressor) -> Self {
        Self {
            device,
            analyser,
            compressor,
            path: SignalPath::Pending,
            enabled: false,
            gain: 1.0,
            block: Vec::new(),
        }
    }

    pub fn acquire(&mut self) -> Result<Connected, AudioError> {
        match &self.path {
            SignalPath::Disposed => {
                return Err(AudioError::InitializationFailure(
                    "capture source already disposed".to_string(),
                ))
            }
            SignalPath::Live(input) => {
                return Ok(Connected {
                    device_name: input.device_name.clone(),
                    sample_rate: input.sample_rate,
                })
            }
            _ => {}
        }

        match self.device.open() {
            Ok(input) => {
                let connected = Connected {
                    device_name: input.device_name.clone(),
                    sample_rate: input.sample_rate,
                };
                info!("🎤 Microphone connected: {} @ {} Hz", connected.device_name, connected.sample_rate);
                self.analyser.reset();
                self.path = SignalPath::Live(input);
                self.enabled = true;
                Ok(connected)
            }
            Err(err) => {
                warn!("Microphone unavailable ({}), using synthetic input", err);
                self.path = SignalPath::Synthetic(err.clone());
                self.enabled = false;
                Err(err)
            }
        }
    }

    /// Enables or disables the live input. Before a connection exists this
    /// retries acquisition instead and returns its failure, if any.
    /// On success returns the resulting enabled state.
    pub fn toggle(&mut self, enabled: bool) -> Result<bool, AudioError> {
        match self.path {
            SignalPath::Disposed => Err(AudioError::InitializationFailure(
                "capture source already disposed".to_string(),
            )),
            SignalPath::Live(_) => {
                self.enabled = enabled;
                info!("Microphone {}", if enabled { "enabled" } else { "disabled" });
                Ok(self.enabled)
            }
            SignalPath::Pending | SignalPath::Synthetic(_) => {
                if enabled {
                    self.acquire()?;
                }
                Ok(self.enabled)
            }
        }
    }

    /// Drops input that arrived since the last tick without analysing it.
    /// Returns the number of blocks discarded.
    pub fn discard_pending(&self) -> usize {
        match &self.path {
            SignalPath::Live(input) => input.receiver.try_iter().count(),
            _ => 0,
        }
    }

    /// Pulls pending input through gain, compressor and analyser into `out`.
    pub fn sample(&mut self, out: &mut AudioSample) {
        let SignalPath::Live(input) = &self.path else {
            out.clear();
            out.resize(self.analyser.frequency_bin_count(), 0);
            return;
        };

        if !self.enabled {
            self.discard_pending();
            out.clear();
            out.resize(self.analyser.frequency_bin_count(), 0);
            return;
        }

        self.block.clear();
        while let Ok(data) = input.receiver.try_recv() {
            self.block.extend(data);
        }

        let gain = self.gain;
        let compressor = self.compressor;
        for s in self.block.iter_mut() {
            *s = compressor.process(*s * gain);
        }
        self.analyser.push_samples(&self.block);
        self.analyser.byte_frequency_data(out);
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_live(&self) -> bool {
        matches!(self.path, SignalPath::Live(_))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self.path, SignalPath::Disposed)
    }

    /// The error that forced the synthetic path, if any.
    pub fn degradation(&self) -> Option<&AudioError> {
        match &self.path {
            SignalPath::Synthetic(err) => Some(err),
            _ => None,
        }
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    /// Ordered teardown: input, then gain stage, then the device itself.
    pub fn dispose(&mut self) {
        if self.is_disposed() {
            return;
        }

        // Dropping the receiver disconnects the input
        self.path = SignalPath::Disposed;
        self.enabled = false;
        self.block.clear();

        self.gain = 1.0;
        self.analyser.reset();

        self.device.close();
        info!("Audio capture disposed");
    }
}

impl Drop for AudioCaptureSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(device: ChannelInputDevice) -> AudioCaptureSource {
        AudioCaptureSource::new(
            Box::new(device),
            SpectrumAnalyser::new(256).unwrap(),
            Compressor::default(),
        )
    }

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| 0.5 * (2.0 * std::f32::consts::PI * 8.0 * n as f32 / 256.0).sin())
            .collect()
    }

    #[test]
    fn test_denied_device_falls_back_to_silent_path() {
        let mut source = source_with(ChannelInputDevice::refusing(AudioError::PermissionDenied));

        assert_eq!(source.acquire(), Err(AudioError::PermissionDenied));
        assert!(!source.is_live());
        assert_eq!(source.degradation(), Some(&AudioError::PermissionDenied));

        let mut sample = Vec::new();
        source.sample(&mut sample);
        assert_eq!(sample.len(), 128);
        assert!(sample.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_live_tone_reaches_analyser() {
        let (device, sender) = ChannelInputDevice::new(44_100);
        let mut source = source_with(device);

        let connected = source.acquire().unwrap();
        assert_eq!(connected.sample_rate, 44_100);
        assert!(source.is_live() && source.is_enabled());

        sender.send(tone(256)).unwrap();
        let mut sample = Vec::new();
        source.sample(&mut sample);
        assert!(sample[8] > 0);
    }

    #[test]
    fn test_toggle_flips_flag_without_teardown() {
        let (device, sender) = ChannelInputDevice::new(48_000);
        let mut source = source_with(device);
        source.acquire().unwrap();

        assert_eq!(source.toggle(false), Ok(false));
        assert!(source.is_live());

        sender.send(tone(256)).unwrap();
        let mut sample = Vec::new();
        source.sample(&mut sample);
        assert!(sample.iter().all(|&b| b == 0));
        assert!(sender.is_empty());

        assert_eq!(source.toggle(true), Ok(true));
    }

    #[test]
    fn test_toggle_before_connection_retries_acquire() {
        let (device, _sender) = ChannelInputDevice::new(48_000);
        let mut source = source_with(device);
        assert!(!source.is_live());

        assert_eq!(source.toggle(true), Ok(true));
        assert!(source.is_live());
    }

    #[test]
    fn test_toggle_reports_failed_acquire() {
        let failure = AudioError::InitializationFailure("no analyser".to_string());
        let mut source = source_with(ChannelInputDevice::refusing(failure.clone()));

        assert_eq!(source.toggle(true), Err(failure.clone()));
        assert_eq!(source.degradation(), Some(&failure));
        assert_eq!(source.toggle(false), Ok(false));
    }

    #[test]
    fn test_discard_pending_empties_input() {
        let (device, sender) = ChannelInputDevice::new(48_000);
        let mut source = source_with(device);
        assert_eq!(source.discard_pending(), 0);

        source.acquire().unwrap();
        for _ in 0..5 {
            sender.send(tone(256)).unwrap();
        }
        assert_eq!(source.discard_pending(), 5);
        assert!(sender.is_empty());
    }

    #[test]
    fn test_gain_scales_input_before_analysis() {
        let quiet: Vec<f32> = tone(256).iter().map(|s| s * 0.02).collect();
        let bins_at = |gain: f32| {
            let (device, sender) = ChannelInputDevice::new(44_100);
            let mut source = source_with(device);
            source.acquire().unwrap();
            source.set_gain(gain);
            sender.send(quiet.clone()).unwrap();
            let mut sample = Vec::new();
            source.sample(&mut sample);
            sample
        };

        let unity = bins_at(1.0);
        let boosted = bins_at(4.0);
        assert!(unity[8] > 0);
        assert!(boosted[8] > unity[8]);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (device, _sender) = ChannelInputDevice::new(48_000);
        let mut source = source_with(device);
        source.acquire().unwrap();
        source.set_gain(7.0);

        source.dispose();
        source.dispose();
        assert!(source.is_disposed());
        assert_eq!(source.gain(), 1.0);
        assert!(source.toggle(true).is_err());
        assert!(source.acquire().is_err());
    }

    #[test]
    fn test_compressor_reduces_loud_samples_only() {
        let compressor = Compressor::default();
        assert_eq!(compressor.process(0.01), 0.01);
        assert_eq!(compressor.process(0.0), 0.0);

        let loud = compressor.process(-1.0);
        assert!(loud < 0.0);
        assert!(loud.abs() < 0.1);
    }
}
