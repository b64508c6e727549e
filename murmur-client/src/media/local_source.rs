use crate::media::{CaptureStream, MediaSlot};
use std::sync::Arc;
use tracing::debug;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// A track offered for sending, tagged with the slot it comes from.
#[derive(Clone)]
pub struct ActiveTrack {
    pub slot: MediaSlot,
    pub track: Arc<TrackLocalStaticSample>,
}

impl ActiveTrack {
    pub fn id(&self) -> &str {
        self.track.id()
    }
}

struct SlotState {
    stream: Arc<CaptureStream>,
    /// Links currently sending at least one track of this stream.
    attachments: usize,
    /// Held from install until the user stops the capture.
    owner_held: bool,
}

impl SlotState {
    fn is_unused(&self) -> bool {
        !self.owner_held && self.attachments == 0
    }
}

/// Capture streams shared by every link of a session.
///
/// Each slot is reference counted: the user's hold plus one per attached
/// link. The stream is released when the count reaches zero.
#[derive(Default)]
pub struct LocalMediaSource {
    camera: Option<SlotState>,
    screen: Option<SlotState>,
}

impl LocalMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, slot: MediaSlot) -> &Option<SlotState> {
        match slot {
            MediaSlot::Camera => &self.camera,
            MediaSlot::Screen => &self.screen,
        }
    }

    fn slot_mut(&mut self, slot: MediaSlot) -> &mut Option<SlotState> {
        match slot {
            MediaSlot::Camera => &mut self.camera,
            MediaSlot::Screen => &mut self.screen,
        }
    }

    /// Puts `stream` in `slot`, releasing any stream it replaces.
    ///
    /// Attachments carry over: links holding the old stream keep their count
    /// and are expected to switch tracks right after.
    pub fn install(&mut self, slot: MediaSlot, stream: CaptureStream) {
        let stream = Arc::new(stream);
        let previous = self.slot_mut(slot).take();

        let attachments = match previous {
            Some(old) => {
                old.stream.release();
                old.attachments
            }
            None => 0,
        };

        debug!("Installed {:?} capture ({} links attached)", slot, attachments);
        *self.slot_mut(slot) = Some(SlotState {
            stream,
            attachments,
            owner_held: true,
        });
    }

    /// Drops the user's hold; the stream goes once no link sends it.
    pub fn release(&mut self, slot: MediaSlot) {
        let Some(state) = self.slot_mut(slot) else {
            return;
        };
        state.owner_held = false;
        self.collect(slot);
    }

    pub fn attach(&mut self, slot: MediaSlot) {
        if let Some(state) = self.slot_mut(slot) {
            state.attachments += 1;
        }
    }

    pub fn detach(&mut self, slot: MediaSlot) {
        if let Some(state) = self.slot_mut(slot) {
            state.attachments = state.attachments.saturating_sub(1);
        }
        self.collect(slot);
    }

    fn collect(&mut self, slot: MediaSlot) {
        let entry = self.slot_mut(slot);
        if entry.as_ref().is_some_and(SlotState::is_unused) {
            if let Some(state) = entry.take() {
                state.stream.release();
            }
        }
    }

    /// Whether the user currently holds `slot`.
    pub fn is_active(&self, slot: MediaSlot) -> bool {
        self.slot(slot).as_ref().is_some_and(|s| s.owner_held)
    }

    pub fn attachments(&self, slot: MediaSlot) -> usize {
        self.slot(slot).as_ref().map_or(0, |s| s.attachments)
    }

    pub fn stream(&self, slot: MediaSlot) -> Option<Arc<CaptureStream>> {
        self.slot(slot).as_ref().map(|s| Arc::clone(&s.stream))
    }

    /// Audio every link should send right now.
    pub fn active_audio(&self) -> Option<ActiveTrack> {
        self.held(MediaSlot::Camera)
            .and_then(|stream| stream.audio().cloned())
            .map(|track| ActiveTrack {
                slot: MediaSlot::Camera,
                track,
            })
    }

    /// Video every link should send right now. Screen share wins over the camera.
    pub fn active_video(&self) -> Option<ActiveTrack> {
        [MediaSlot::Screen, MediaSlot::Camera]
            .into_iter()
            .find_map(|slot| {
                self.held(slot)
                    .and_then(|stream| stream.video().cloned())
                    .map(|track| ActiveTrack { slot, track })
            })
    }

    fn held(&self, slot: MediaSlot) -> Option<&CaptureStream> {
        self.slot(slot)
            .as_ref()
            .filter(|s| s.owner_held)
            .map(|s| s.stream.as_ref())
    }
}
