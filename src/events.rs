use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a position on the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Euclidean distance to another position
    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Represents a pixel color sampled from the screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PixelColor {
    pub const BLACK: PixelColor = PixelColor { r: 0, g: 0, b: 0 };

    /// Format as an AHK hex literal, e.g. `0x1A2B3C`
    pub fn to_hex(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Represents the type of mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MouseButton::Left => "Left",
            MouseButton::Right => "Right",
            MouseButton::Middle => "Middle",
        };
        write!(f, "{}", s)
    }
}

/// The coordinate reference frame the replay runtime interprets positions in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoordMode {
    #[default]
    Screen,
    Window,
    Client,
}

impl fmt::Display for CoordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordMode::Screen => "Screen",
            CoordMode::Window => "Window",
            CoordMode::Client => "Client",
        };
        write!(f, "{}", s)
    }
}

/// A raw pointer sample from the capture layer, before classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum PointerSample {
    /// A mouse button was pressed
    ButtonDown {
        button: MouseButton,
        position: Position,
        timestamp_ms: u64,
    },

    /// The pointer moved
    Move { position: Position, timestamp_ms: u64 },

    /// A mouse button was released
    ButtonUp {
        button: MouseButton,
        position: Position,
        timestamp_ms: u64,
    },
}

impl PointerSample {
    pub fn timestamp_ms(&self) -> u64 {
        match self {
            PointerSample::ButtonDown { timestamp_ms, .. }
            | PointerSample::Move { timestamp_ms, .. }
            | PointerSample::ButtonUp { timestamp_ms, .. } => *timestamp_ms,
        }
    }
}

/// The classified payload of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A single click at one point
    Click { position: Position, color: PixelColor },

    /// A press-move-release drag between two points
    Drag {
        start: Position,
        end: Position,
        start_color: PixelColor,
        end_color: PixelColor,
    },

    /// An intermediate pointer movement (only emitted when movement
    /// recording is enabled)
    Move { position: Position },
}

/// A single classified gesture with timing and capture metadata.
///
/// Events are immutable once classified; a session only ever appends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Monotonic capture time in milliseconds; only ever used to compute
    /// the delay to the neighboring event, never emitted verbatim
    pub timestamp_ms: u64,

    /// The button that produced the gesture
    pub button: MouseButton,

    /// The coordinate mode active when the event was captured
    pub coord_mode: CoordMode,

    /// The classified gesture payload
    pub kind: EventKind,
}

impl RecordedEvent {
    /// Human-readable description of this event, for the shell's event log
    pub fn description(&self) -> String {
        match &self.kind {
            EventKind::Click { position, color } => {
                format!(
                    "{} Click at {} color={}",
                    self.button,
                    position,
                    color.to_hex()
                )
            }
            EventKind::Drag { start, end, .. } => {
                format!("{} Drag from {} to {}", self.button, start, end)
            }
            EventKind::Move { position } => format!("Move to {}", position),
        }
    }
}
