use crate::{
    CoordMode, EventKind, MouseButton, PixelColor, PointerSample, Position, RecordedEvent,
    RecorderConfig,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Reads pixel colors from the screen at classification time.
///
/// The real implementation lives in the shell (GDI on Windows, a screen grab
/// elsewhere); the core only depends on this seam so classification stays
/// testable without a display.
pub trait PixelSampler: Send + Sync {
    fn color_at(&self, position: Position) -> PixelColor;
}

/// A sampler that always reports black, for headless and test use
#[derive(Debug, Default)]
pub struct NullSampler;

impl PixelSampler for NullSampler {
    fn color_at(&self, _position: Position) -> PixelColor {
        PixelColor::BLACK
    }
}

/// Classifier state for the current gesture
#[derive(Debug, Clone, Copy)]
enum GestureState {
    /// No button is held
    Idle,

    /// A button is held; waiting for the release to classify
    Pending {
        button: MouseButton,
        down_pos: Position,
        down_time_ms: u64,
        /// Last position reported by a Move sample. Stays at `down_pos`
        /// until a Move arrives, which forces a Click on release.
        last_pos: Position,
    },
}

/// Turns a strictly ordered stream of low-level pointer samples into
/// classified events, one per press-to-release gesture.
///
/// Classification is distance-gated only: a release closer than the drag
/// threshold to the press point is a Click no matter how long the button
/// was held. The configured time threshold is informational and never
/// consulted.
pub struct GestureClassifier {
    state: GestureState,
    distance_threshold_px: f64,
    coord_mode: CoordMode,
    record_movement: bool,
    move_sample_ms: u64,
    last_move_emit_ms: u64,
    last_move_pos: Option<Position>,
    sampler: Arc<dyn PixelSampler>,
}

/// Minimum displacement for an intermediate Move event to be worth recording
const MOVE_MIN_DISTANCE_PX: f64 = 2.0;

impl GestureClassifier {
    pub fn new(config: &RecorderConfig, sampler: Arc<dyn PixelSampler>) -> Self {
        Self {
            state: GestureState::Idle,
            distance_threshold_px: config.drag_threshold_px as f64,
            coord_mode: config.coord_mode,
            record_movement: config.record_movement,
            move_sample_ms: config.move_sample_ms,
            last_move_emit_ms: 0,
            last_move_pos: None,
            sampler,
        }
    }

    /// Feed one raw sample; returns a classified event when one completes.
    ///
    /// Out-of-order samples (Move or ButtonUp with no preceding ButtonDown)
    /// are input-layer noise and are discarded without error.
    pub fn offer(&mut self, sample: PointerSample) -> Option<RecordedEvent> {
        match sample {
            PointerSample::ButtonDown {
                button,
                position,
                timestamp_ms,
            } => {
                if let GestureState::Pending { button: held, .. } = self.state {
                    // The matching release was lost; drop the stale gesture.
                    warn!(?held, "discarding unterminated gesture on new button press");
                }
                self.state = GestureState::Pending {
                    button,
                    down_pos: position,
                    down_time_ms: timestamp_ms,
                    last_pos: position,
                };
                None
            }
            PointerSample::Move {
                position,
                timestamp_ms,
            } => {
                if let GestureState::Pending { last_pos, .. } = &mut self.state {
                    *last_pos = position;
                }
                self.maybe_record_move(position, timestamp_ms)
            }
            PointerSample::ButtonUp {
                button, timestamp_ms, ..
            } => self.classify_release(button, timestamp_ms),
        }
    }

    /// Discard any in-flight gesture, e.g. when a new session starts
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.last_move_emit_ms = 0;
        self.last_move_pos = None;
    }

    fn classify_release(&mut self, button: MouseButton, up_time_ms: u64) -> Option<RecordedEvent> {
        let GestureState::Pending {
            button: down_button,
            down_pos,
            down_time_ms,
            last_pos,
        } = self.state
        else {
            trace!("button release with no preceding press, discarding");
            return None;
        };

        self.state = GestureState::Idle;

        let dist = down_pos.distance_to(last_pos);
        let held_ms = up_time_ms.saturating_sub(down_time_ms);

        // Colors are read here rather than at press time so samples that
        // never complete a gesture cost no screen reads.
        let kind = if dist < self.distance_threshold_px {
            EventKind::Click {
                position: down_pos,
                color: self.sampler.color_at(down_pos),
            }
        } else {
            EventKind::Drag {
                start: down_pos,
                end: last_pos,
                start_color: self.sampler.color_at(down_pos),
                end_color: self.sampler.color_at(last_pos),
            }
        };

        if button != down_button {
            trace!(?button, ?down_button, "release button differs from press, keeping press button");
        }
        debug!(?kind, dist, held_ms, "classified gesture");

        Some(RecordedEvent {
            timestamp_ms: down_time_ms,
            button: down_button,
            coord_mode: self.coord_mode,
            kind,
        })
    }

    fn maybe_record_move(&mut self, position: Position, timestamp_ms: u64) -> Option<RecordedEvent> {
        if !self.record_movement {
            return None;
        }
        if timestamp_ms.saturating_sub(self.last_move_emit_ms) < self.move_sample_ms {
            return None;
        }
        if let Some(last) = self.last_move_pos {
            if last.distance_to(position) < MOVE_MIN_DISTANCE_PX {
                return None;
            }
        }

        self.last_move_emit_ms = timestamp_ms;
        self.last_move_pos = Some(position);

        Some(RecordedEvent {
            timestamp_ms,
            button: MouseButton::Left,
            coord_mode: self.coord_mode,
            kind: EventKind::Move { position },
        })
    }
}
