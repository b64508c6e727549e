use crate::media::{CaptureDevice, CaptureKind, CaptureStream, MediaError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Opus frame that decodes to 20 ms of silence.
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];
const AUDIO_FRAME: Duration = Duration::from_millis(20);
const VIDEO_FRAME: Duration = Duration::from_millis(33);

/// In-process capture device for headless clients and tests.
///
/// Produces Opus/VP8 tracks fed with placeholder frames. Individual kinds can
/// be denied to exercise the permission path.
pub struct SyntheticCapture {
    denied: HashSet<CaptureKind>,
    delay: Duration,
    pump: bool,
    opened: Mutex<Vec<(CaptureKind, Arc<AtomicBool>)>>,
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self {
            denied: HashSet::new(),
            delay: Duration::ZERO,
            pump: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Tracks exist but no frames are written.
    pub fn silent() -> Self {
        Self {
            pump: false,
            ..Self::new()
        }
    }

    pub fn deny(mut self, kind: CaptureKind) -> Self {
        self.denied.insert(kind);
        self
    }

    /// Simulates a slow permission prompt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every stream handed out so far, with its release flag.
    pub async fn opened(&self) -> Vec<(CaptureKind, Arc<AtomicBool>)> {
        self.opened.lock().await.clone()
    }

    fn track(
        mime_type: &str,
        clock_rate: u32,
        channels: u16,
        stream_id: &str,
    ) -> Arc<TrackLocalStaticSample> {
        let kind = if channels > 0 { "audio" } else { "video" };
        Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                clock_rate,
                channels,
                ..Default::default()
            },
            format!("{}-{}", kind, Uuid::new_v4()),
            stream_id.to_owned(),
        ))
    }

    fn spawn_pump(
        track: Arc<TrackLocalStaticSample>,
        frame: Bytes,
        every: Duration,
        released: Arc<AtomicBool>,
    ) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            while !released.load(Ordering::Acquire) {
                ticker.tick().await;
                let sample = Sample {
                    data: frame.clone(),
                    duration: every,
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    trace!("Dropped synthetic frame: {}", e);
                }
            }
        });
    }
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticCapture {
    async fn open(&self, kind: CaptureKind) -> Result<CaptureStream, MediaError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.denied.contains(&kind) {
            return Err(MediaError::PermissionDenied(kind));
        }

        let stream_id = format!("{}-{}", kind, Uuid::new_v4());
        let audio = matches!(kind, CaptureKind::Voice | CaptureKind::Video)
            .then(|| Self::track(MIME_TYPE_OPUS, 48000, 2, &stream_id));
        let video = matches!(kind, CaptureKind::Video | CaptureKind::Screen)
            .then(|| Self::track(MIME_TYPE_VP8, 90000, 0, &stream_id));

        let stream = CaptureStream::new(kind, audio.clone(), video.clone());
        let released = stream.release_flag();

        if self.pump {
            if let Some(track) = audio {
                let frame = Bytes::from_static(OPUS_SILENCE);
                Self::spawn_pump(track, frame, AUDIO_FRAME, released.clone());
            }
            if let Some(track) = video {
                let frame = Bytes::from_static(&[0u8; 16]);
                Self::spawn_pump(track, frame, VIDEO_FRAME, released.clone());
            }
        }

        debug!("Opened synthetic {} capture {}", kind, stream_id);
        self.opened.lock().await.push((kind, released));
        Ok(stream)
    }
}
