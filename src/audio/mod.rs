//! Audio system for playing sounds
//!
//! Built on top of the rodio audio library. Sounds are decoded into buffers
//! once and played as positional sources heard from a single listener.

mod manager;
mod source;

pub use manager::{AudioManager, SoundId, SourceId};
pub use source::{
    AudioError, EAR_SPACING, Ears, SoundBuffer, TEST_SOUND, TEST_TONE_FREQUENCY, TEST_TONE_RATE,
};
