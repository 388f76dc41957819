//! Audio manager for managing audio output and sources

use std::path::Path;

use glam::Vec3;
use rodio::{OutputStream, OutputStreamBuilder, SpatialSink, mixer::Mixer};
use rustc_hash::FxHashMap;

use super::source::{AudioError, Ears, SoundBuffer, TEST_SOUND};

macro_rules! audio_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// The "absent" sentinel
            pub const NONE: Self = Self(0);

            pub const fn raw(self) -> u32 {
                self.0
            }

            pub const fn is_none(self) -> bool {
                self.0 == 0
            }

            pub const fn is_some(self) -> bool {
                self.0 != 0
            }
        }
    };
}

audio_id!(
    /// Loaded sound buffer id
    SoundId
);
audio_id!(
    /// Playing source id
    SourceId
);

/// Hands out ids starting at 1, so 0 stays free as the sentinel
#[derive(Debug, Clone, Copy)]
pub(crate) struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub(crate) const fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.checked_add(1).unwrap_or(1);
        id
    }
}

/// Owns the output stream, decoded buffers and playing sources
pub struct AudioManager {
    /// The output stream (must be kept alive)
    _stream: OutputStream,
    /// The mixer for creating sinks
    mixer: Mixer,
    buffers: FxHashMap<SoundId, SoundBuffer>,
    sources: FxHashMap<SourceId, SpatialSink>,
    buffer_ids: IdAllocator,
    source_ids: IdAllocator,
    ears: Ears,
}

impl AudioManager {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns an error if no audio output device is available
    pub fn init() -> Result<Self, AudioError> {
        let stream = OutputStreamBuilder::from_default_device()
            .map_err(|e| AudioError::NoDevice(e.to_string()))?
            .open_stream()
            .map_err(|e| AudioError::NoDevice(e.to_string()))?;
        let mixer = stream.mixer().clone();

        log::info!("Audio output opened");

        Ok(Self {
            _stream: stream,
            mixer,
            buffers: FxHashMap::default(),
            sources: FxHashMap::default(),
            buffer_ids: IdAllocator::new(),
            source_ids: IdAllocator::new(),
            ears: Ears::default(),
        })
    }

    /// Decode a sound into a new buffer
    ///
    /// The name [`TEST_SOUND`] generates a one second 440 Hz tone instead of
    /// reading a file.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<SoundId, AudioError> {
        let path = path.as_ref();
        let buffer = if path == Path::new(TEST_SOUND) {
            log::info!("Generated 440 Hz test tone");
            SoundBuffer::test_tone()
        } else {
            SoundBuffer::from_file(path)?
        };

        let id = SoundId(self.buffer_ids.allocate());
        self.buffers.insert(id, buffer);
        log::debug!("Loaded {} as buffer {}", path.display(), id.raw());
        Ok(id)
    }

    /// Start a buffer playing once at the origin
    ///
    /// Returns [`SourceId::NONE`] for the sentinel or an unknown buffer.
    pub fn play(&mut self, buffer: SoundId) -> SourceId {
        if buffer.is_none() {
            log::warn!("Cannot play the empty sound id");
            return SourceId::NONE;
        }
        let Some(sound) = self.buffers.get(&buffer) else {
            log::warn!("Cannot play unknown sound {}", buffer.raw());
            return SourceId::NONE;
        };
        let source = sound.to_source();

        self.prune_finished();

        let sink = SpatialSink::connect_new(
            &self.mixer,
            Vec3::ZERO.to_array(),
            self.ears.left.to_array(),
            self.ears.right.to_array(),
        );
        sink.append(source);
        sink.play();

        let id = SourceId(self.source_ids.allocate());
        self.sources.insert(id, sink);
        log::debug!("Playing buffer {} on source {}", buffer.raw(), id.raw());
        id
    }

    /// Stop and release a source; the sentinel or an unknown id is ignored
    pub fn stop(&mut self, source: SourceId) {
        if let Some(sink) = self.sources.remove(&source) {
            sink.stop();
            log::debug!("Stopped source {}", source.raw());
        }
    }

    /// Move a playing source; the sentinel or an unknown id is ignored
    pub fn set_source_position(&mut self, source: SourceId, position: Vec3) {
        if let Some(sink) = self.sources.get(&source) {
            sink.set_emitter_position(position.to_array());
        }
    }

    /// Place the listener, updating every playing source's ears
    pub fn set_listener(&mut self, position: Vec3, forward: Vec3, up: Vec3) {
        self.ears = Ears::from_listener(position, forward, up);
        for sink in self.sources.values() {
            sink.set_left_ear_position(self.ears.left.to_array());
            sink.set_right_ear_position(self.ears.right.to_array());
        }
    }

    /// Current listener ears
    pub const fn ears(&self) -> Ears {
        self.ears
    }

    /// Forget a buffer; sources already playing it keep their own copy
    pub fn delete_buffer(&mut self, buffer: SoundId) {
        if self.buffers.remove(&buffer).is_some() {
            log::debug!("Deleted buffer {}", buffer.raw());
        }
    }

    /// Drop sources that have played to the end
    pub fn prune_finished(&mut self) {
        self.sources.retain(|_, sink| !sink.empty());
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of sources still tracked, finished or not
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Stop every source, drop every buffer and close the output stream
    pub fn shutdown(mut self) {
        for (_, sink) in self.sources.drain() {
            sink.stop();
        }
        self.buffers.clear();
        log::info!("Audio shut down");
    }
}

impl std::fmt::Debug for AudioManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioManager")
            .field("buffer_count", &self.buffers.len())
            .field("source_count", &self.sources.len())
            .field("ears", &self.ears)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_skip_sentinel() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), 1);
        assert_eq!(ids.allocate(), 2);
    }

    #[test]
    fn test_ids_wrap_past_sentinel() {
        let mut ids = IdAllocator { next: u32::MAX };
        assert_eq!(ids.allocate(), u32::MAX);
        assert_eq!(ids.allocate(), 1);
    }

    #[test]
    fn test_sentinel_ids() {
        assert!(SoundId::NONE.is_none());
        assert!(SourceId::default().is_none());
        assert!(SourceId(7).is_some());
        assert_eq!(SoundId(3).raw(), 3);
    }
}
