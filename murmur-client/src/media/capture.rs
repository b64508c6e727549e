use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// What the user asked to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureKind {
    /// Microphone only.
    Voice,
    /// Microphone and camera.
    Video,
    Screen,
}

impl CaptureKind {
    pub fn slot(&self) -> MediaSlot {
        match self {
            Self::Voice | Self::Video => MediaSlot::Camera,
            Self::Screen => MediaSlot::Screen,
        }
    }
}

impl fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Screen => "screen",
        };
        f.write_str(name)
    }
}

/// The two independently replaceable capture streams of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSlot {
    /// Microphone plus optional camera.
    Camera,
    Screen,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MediaError {
    #[error("{0} capture was denied")]
    PermissionDenied(CaptureKind),

    #[error("{kind} capture is unavailable: {reason}")]
    Unavailable { kind: CaptureKind, reason: String },
}

/// Source of local capture streams (microphone, camera, screen).
#[async_trait]
pub trait CaptureDevice: Send + Sync + 'static {
    async fn open(&self, kind: CaptureKind) -> Result<CaptureStream, MediaError>;
}

/// One acquired capture: up to one audio and one video track.
///
/// Released exactly once: by the session when its last user detaches, when an
/// acquisition is cancelled, or at the latest when the stream is dropped.
pub struct CaptureStream {
    kind: CaptureKind,
    audio: Option<Arc<TrackLocalStaticSample>>,
    video: Option<Arc<TrackLocalStaticSample>>,
    released: Arc<AtomicBool>,
}

impl CaptureStream {
    pub fn new(
        kind: CaptureKind,
        audio: Option<Arc<TrackLocalStaticSample>>,
        video: Option<Arc<TrackLocalStaticSample>>,
    ) -> Self {
        Self {
            kind,
            audio,
            video,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> CaptureKind {
        self.kind
    }

    pub fn audio(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.audio.as_ref()
    }

    pub fn video(&self) -> Option<&Arc<TrackLocalStaticSample>> {
        self.video.as_ref()
    }

    /// Shared flag that flips once the stream is released.
    pub fn release_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            debug!(
                "Released {} capture ({})",
                self.kind,
                self.track_ids().join(", ")
            );
        }
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.audio
            .iter()
            .chain(self.video.iter())
            .map(|t| t.id().to_owned())
            .collect()
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("kind", &self.kind)
            .field("tracks", &self.track_ids())
            .field("released", &self.is_released())
            .finish()
    }
}
