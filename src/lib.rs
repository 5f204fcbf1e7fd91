//! Macro recorder and AutoHotkey v2 code generator
//!
//! This crate records a timed sequence of mouse interactions (clicks and
//! drags) and deterministically compiles each recording session into an
//! AutoHotkey v2 subroutine that replays it. Raw pointer samples flow from
//! the capture layer through a drag classifier into the session manager
//! over one ordered channel; a stopped session is handed to the code
//! generator, which emits the script text the shell displays and saves.
//!
//! OS-level input hooks, pixel reading, and script execution live in the
//! surrounding shell; this crate only depends on them through the
//! [`PixelSampler`] seam and the [`SampleSink`] handle.

pub mod classifier;
pub mod codegen;
pub mod error;
pub mod events;
pub mod recorder;
pub mod session;

pub use classifier::*;
pub use codegen::*;
pub use error::*;
pub use events::*;
pub use recorder::*;
pub use session::*;
