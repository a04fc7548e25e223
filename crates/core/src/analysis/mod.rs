use std::{
    collections::VecDeque,
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{audio::FrequencyAnalyzer, PlayerError, Result};

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;

/// Settings requested when a tap is connected to the output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    pub fft_size: usize,
    pub smoothing: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing: 0.8,
        }
    }
}

/// Byte-scaled magnitude spectrum over the most recent `fft_size` samples.
///
/// The output mirrors what host media pipelines expose for visualisation:
/// a Blackman-windowed FFT, temporal smoothing between blocks, conversion to
/// decibels and a linear mapping of `[-100 dB, -30 dB]` onto `0..=255`.
pub struct SpectrumAnalyser {
    settings: AnalyserSettings,
    window: Vec<f32>,
    recent: VecDeque<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(settings: AnalyserSettings) -> Result<Self> {
        let size = settings.fft_size;
        if !size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&size) {
            return Err(PlayerError::InvalidInput(
                "fft size must be a power of two between 32 and 32768",
            ));
        }
        if !(0.0..=1.0).contains(&settings.smoothing) {
            return Err(PlayerError::InvalidInput(
                "smoothing must lie within [0, 1]",
            ));
        }

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let fft = FftResources {
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        };

        Ok(Self {
            settings,
            window: (0..size).map(|n| blackman(n, size)).collect(),
            recent: VecDeque::from(vec![0.0; size]),
            smoothed: vec![0.0; size / 2],
            bytes: vec![0; size / 2],
            fft,
        })
    }

    pub fn settings(&self) -> AnalyserSettings {
        self.settings
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.settings.fft_size / 2
    }

    /// Latest byte-scaled spectrum, one entry per bin.
    pub fn byte_frequency_data(&self) -> &[u8] {
        &self.bytes
    }

    /// Clears history so the next track starts from silence.
    pub fn reset(&mut self) {
        self.recent.iter_mut().for_each(|sample| *sample = 0.0);
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
        self.bytes.iter_mut().for_each(|value| *value = 0);
    }

    /// Consumes a block of mono samples and refreshes the spectrum.
    pub fn process_block(&mut self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Err(PlayerError::InvalidInput(
                "analysis requires at least one sample",
            ));
        }

        let size = self.settings.fft_size;
        for &sample in samples.iter().skip(samples.len().saturating_sub(size)) {
            self.recent.pop_front();
            self.recent.push_back(sample);
        }

        for (index, (slot, sample)) in self.fft.input.iter_mut().zip(&self.recent).enumerate() {
            *slot = sample * self.window[index];
        }

        self.fft
            .plan
            .process_with_scratch(&mut self.fft.input, &mut self.fft.spectrum, &mut self.fft.scratch)
            .map_err(|err| PlayerError::msg(format!("fft failed: {err}")))?;

        let tau = self.settings.smoothing;
        let scale = 255.0 / (MAX_DECIBELS - MIN_DECIBELS);
        for (bin, (smoothed, byte)) in self.smoothed.iter_mut().zip(&mut self.bytes).enumerate() {
            let magnitude = self.fft.spectrum[bin].norm() / size as f32;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            let decibels = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            *byte = (scale * (decibels - MIN_DECIBELS)).clamp(0.0, 255.0) as u8;
        }

        Ok(())
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("settings", &self.settings)
            .field("bins", &self.bytes.len())
            .finish()
    }
}

fn blackman(index: usize, len: usize) -> f32 {
    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}

/// Shared, thread-safe view over a [`SpectrumAnalyser`].
///
/// The owner of the audio output feeds it with [`AnalysisHandle::push_samples`];
/// everyone else only reads through [`FrequencyAnalyzer`].
#[derive(Clone)]
pub struct AnalysisHandle {
    shared: Arc<Mutex<SpectrumAnalyser>>,
}

impl AnalysisHandle {
    pub fn new(settings: AnalyserSettings) -> Result<Self> {
        Ok(Self {
            shared: Arc::new(Mutex::new(SpectrumAnalyser::new(settings)?)),
        })
    }

    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        self.lock()?.process_block(samples)
    }

    pub fn reset(&self) -> Result<()> {
        self.lock()?.reset();
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SpectrumAnalyser>> {
        self.shared
            .lock()
            .map_err(|_| PlayerError::msg("spectrum analyser has been poisoned"))
    }
}

#[cfg(test)]
impl AnalysisHandle {
    /// Poisons the lock the way a panicking writer would.
    pub(crate) fn poison(&self) {
        let shared = Arc::clone(&self.shared);
        let _ = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("writer panicked while holding the analyser");
        })
        .join();
    }
}

impl FrequencyAnalyzer for AnalysisHandle {
    fn frequency_bin_count(&self) -> usize {
        self.lock()
            .map(|analyser| analyser.frequency_bin_count())
            .unwrap_or(0)
    }

    fn read_frequency_data(&self, out: &mut Vec<u8>) -> Result<()> {
        let analyser = self.lock()?;
        out.clear();
        out.extend_from_slice(analyser.byte_frequency_data());
        Ok(())
    }
}

impl fmt::Debug for AnalysisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(bin: usize, size: usize, amplitude: f32) -> Vec<f32> {
        (0..size)
            .map(|n| amplitude * (2.0 * PI * bin as f32 * n as f32 / size as f32).sin())
            .collect()
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut analyser = SpectrumAnalyser::new(AnalyserSettings::default()).unwrap();
        analyser.process_block(&[0.0; 512]).unwrap();

        assert_eq!(analyser.frequency_bin_count(), 256);
        assert!(analyser.byte_frequency_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(AnalyserSettings::default()).unwrap();
        let block = tone(40, 512, 0.01);
        for _ in 0..20 {
            analyser.process_block(&block).unwrap();
        }

        let bytes = analyser.byte_frequency_data();
        let peak = bytes
            .iter()
            .enumerate()
            .max_by_key(|(_, value)| **value)
            .map(|(bin, _)| bin)
            .unwrap();
        assert!((39..=41).contains(&peak), "peak landed in bin {peak}");
        assert!(bytes[peak] > 100);
    }

    #[test]
    fn smoothing_decays_gradually() {
        let mut analyser = SpectrumAnalyser::new(AnalyserSettings::default()).unwrap();
        let block = tone(10, 512, 0.005);
        for _ in 0..20 {
            analyser.process_block(&block).unwrap();
        }
        let loud = analyser.byte_frequency_data()[10];

        analyser.process_block(&[0.0; 512]).unwrap();
        let after = analyser.byte_frequency_data()[10];
        assert!(after > 0 && after < loud);
    }

    #[test]
    fn rejects_invalid_sizes() {
        let settings = AnalyserSettings {
            fft_size: 500,
            smoothing: 0.8,
        };
        assert!(SpectrumAnalyser::new(settings).is_err());
    }

    #[test]
    fn handle_reads_through_the_trait() {
        let handle = AnalysisHandle::new(AnalyserSettings::default()).unwrap();
        handle.push_samples(&tone(20, 512, 0.5)).unwrap();

        let mut out = Vec::new();
        handle.read_frequency_data(&mut out).unwrap();
        assert_eq!(out.len(), handle.frequency_bin_count());
        assert!(out.iter().any(|&b| b > 0));
    }

    #[test]
    fn poisoned_handle_reports_errors() {
        let handle = AnalysisHandle::new(AnalyserSettings::default()).unwrap();
        handle.poison();

        assert!(handle.reset().is_err());
        assert!(handle.push_samples(&[0.0; 8]).is_err());
        assert_eq!(handle.frequency_bin_count(), 0);
    }
}
