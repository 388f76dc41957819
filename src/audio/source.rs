//! Decoded sound buffers and listener geometry

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use glam::Vec3;
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, Source};
use thiserror::Error;

/// Reserved load name that produces a generated tone instead of reading a file
pub const TEST_SOUND: &str = "test_sound";

/// Sample rate of the generated tone
pub const TEST_TONE_RATE: u32 = 44_100;
/// Pitch of the generated tone in hertz
pub const TEST_TONE_FREQUENCY: f32 = 440.0;
const TEST_TONE_AMPLITUDE: f32 = 0.3;

/// Distance between the listener's ears
pub const EAR_SPACING: f32 = 0.2;

/// Errors that can occur during audio operations
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available: {0}")]
    NoDevice(String),
    #[error("failed to open sound {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode sound {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },
    #[error("sound {path} has {channels} channels, expected 1 or 2")]
    UnsupportedChannels { path: PathBuf, channels: u16 },
    #[error("sound {0} holds no samples")]
    Empty(PathBuf),
}

/// Fully decoded PCM data, shared by every source playing it
#[derive(Debug, Clone)]
pub struct SoundBuffer {
    channels: u16,
    sample_rate: u32,
    samples: Arc<[f32]>,
}

impl SoundBuffer {
    /// Decode a mono or stereo file into memory
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AudioError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| AudioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|source| AudioError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let channels = decoder.channels();
        let sample_rate = decoder.sample_rate();
        if !(1..=2).contains(&channels) {
            return Err(AudioError::UnsupportedChannels {
                path: path.to_path_buf(),
                channels,
            });
        }

        let samples: Arc<[f32]> = decoder.collect();
        if samples.is_empty() {
            return Err(AudioError::Empty(path.to_path_buf()));
        }

        let buffer = Self {
            channels,
            sample_rate,
            samples,
        };
        log::info!(
            "Decoded {}: {} Hz, {} channel(s), {:.2} s",
            path.display(),
            sample_rate,
            channels,
            buffer.duration().as_secs_f32()
        );
        Ok(buffer)
    }

    /// One second of a mono 440 Hz sine at 30% amplitude
    pub fn test_tone() -> Self {
        let samples = (0..TEST_TONE_RATE)
            .map(|i| {
                let t = i as f32 / TEST_TONE_RATE as f32;
                TEST_TONE_AMPLITUDE * (std::f32::consts::TAU * TEST_TONE_FREQUENCY * t).sin()
            })
            .collect();
        Self {
            channels: 1,
            sample_rate: TEST_TONE_RATE,
            samples,
        }
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Playback length
    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / usize::from(self.channels);
        Duration::from_secs_f64(frames as f64 / f64::from(self.sample_rate))
    }

    /// A fresh playable source over the buffer's samples
    pub(crate) fn to_source(&self) -> SamplesBuffer {
        SamplesBuffer::new(self.channels, self.sample_rate, self.samples.to_vec())
    }
}

/// World positions of the listener's ears
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ears {
    pub left: Vec3,
    pub right: Vec3,
}

impl Ears {
    /// Place the ears either side of `position`, across the view direction
    ///
    /// A degenerate orientation (forward parallel to up) falls back to +X as
    /// the listener's right.
    pub fn from_listener(position: Vec3, forward: Vec3, up: Vec3) -> Self {
        let right = forward.cross(up).try_normalize().unwrap_or(Vec3::X);
        let offset = right * (EAR_SPACING * 0.5);
        Self {
            left: position - offset,
            right: position + offset,
        }
    }
}

impl Default for Ears {
    fn default() -> Self {
        Self::from_listener(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_shape() {
        let tone = SoundBuffer::test_tone();
        assert_eq!(tone.channels(), 1);
        assert_eq!(tone.sample_rate(), TEST_TONE_RATE);
        assert_eq!(tone.samples().len(), TEST_TONE_RATE as usize);
        assert_eq!(tone.duration(), Duration::from_secs(1));

        assert_eq!(tone.samples()[0], 0.0);
        let peak = tone.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= TEST_TONE_AMPLITUDE && peak > 0.29);
    }

    #[test]
    fn test_tone_frequency() {
        // A 440 Hz sine crosses zero upwards 440 times in one second
        let tone = SoundBuffer::test_tone();
        let rising = tone
            .samples()
            .windows(2)
            .filter(|w| w[0] < 0.0 && w[1] >= 0.0)
            .count();
        assert!((439..=440).contains(&rising), "{rising} rising crossings");
    }

    #[test]
    fn test_missing_file() {
        let result = SoundBuffer::from_file("does/not/exist.wav");
        assert!(matches!(result, Err(AudioError::Io { .. })));
    }

    #[test]
    fn test_garbage_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(matches!(
            SoundBuffer::from_file(&path),
            Err(AudioError::Decode { .. })
        ));
    }

    #[test]
    fn test_default_ears() {
        // Looking down -Z with +Y up, the right ear sits on +X
        let ears = Ears::default();
        assert!(ears.left.abs_diff_eq(Vec3::new(-0.1, 0.0, 0.0), 1e-6));
        assert!(ears.right.abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_ears_follow_listener() {
        let position = Vec3::new(3.0, 1.0, 0.0);
        let ears = Ears::from_listener(position, Vec3::X, Vec3::Y);
        assert!(ears.right.abs_diff_eq(Vec3::new(3.0, 1.0, 0.1), 1e-6));
        assert!(((ears.left + ears.right) * 0.5).abs_diff_eq(position, 1e-6));
        assert!((ears.left.distance(ears.right) - EAR_SPACING).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_orientation() {
        let ears = Ears::from_listener(Vec3::ZERO, Vec3::Y, Vec3::Y);
        assert!(ears.right.abs_diff_eq(Vec3::new(0.1, 0.0, 0.0), 1e-6));
    }
}
