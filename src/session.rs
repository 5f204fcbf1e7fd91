use crate::{RecordedEvent, RecorderConfig, RecorderError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path, time::SystemTime};
use tracing::{debug, info};

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Still recording, events may be appended
    Open,
    /// Finalized; events are frozen
    Closed,
}

/// One bounded recording run, compiled to exactly one generated subroutine.
///
/// Events are stored in capture order; inter-event delays in the generated
/// script are derived from consecutive timestamp gaps. The configuration is
/// latched at Start and cannot change for the session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique id, epoch milliseconds of Start
    pub id: u64,

    /// The subroutine name the generated code will carry
    pub name: String,

    /// Timestamp of Start (epoch milliseconds)
    pub started_at_ms: u64,

    /// The recorder configuration latched at Start
    pub config: RecorderConfig,

    /// The recorded events, insertion order = capture order
    pub events: Vec<RecordedEvent>,

    /// Whether this session is still open
    pub state: SessionState,
}

impl Session {
    fn new(id: u64, name: String, config: RecorderConfig) -> Self {
        Self {
            id,
            name,
            started_at_ms: id,
            config,
            events: Vec::new(),
            state: SessionState::Open,
        }
    }

    /// Append an event in capture order
    fn add_event(&mut self, event: RecordedEvent) {
        self.events.push(event);
    }

    /// Transition Open -> Closed; events are frozen afterwards
    fn finish(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Save the session to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        info!("Saving session {:?} to {:?}", self.name, path.as_ref());
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

/// Owns the single currently-open session and enforces the
/// Idle -> Open -> Closed state machine.
///
/// A closed session is returned by value from `stop`; a later `start`
/// creates a new session, never reopens an old one.
#[derive(Debug, Default)]
pub struct SessionManager {
    current: Option<Session>,
    session_counter: u32,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session, latching the given config for its lifetime
    pub fn start(&mut self, config: RecorderConfig) -> Result<&Session> {
        if self.current.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        self.session_counter += 1;
        let id = epoch_ms();
        let name = config.session_name(self.session_counter);
        info!(id, name = %name, "starting recording session");

        Ok(self.current.insert(Session::new(id, name, config)))
    }

    /// Append an event to the open session
    pub fn record_event(&mut self, event: RecordedEvent) -> Result<()> {
        let session = self.current.as_mut().ok_or(RecorderError::NoActiveSession)?;
        debug!("recording event: {}", event.description());
        session.add_event(event);
        Ok(())
    }

    /// Close the open session and hand it to the caller by value
    pub fn stop(&mut self) -> Result<Session> {
        let mut session = self.current.take().ok_or(RecorderError::NotRecording)?;
        session.finish();
        info!(
            id = session.id,
            events = session.events.len(),
            "stopped recording session"
        );
        Ok(session)
    }

    pub fn is_recording(&self) -> bool {
        self.current.is_some()
    }

    /// The open session, if any
    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl RecorderConfig {
    fn session_name(&self, counter: u32) -> String {
        match self.naming {
            crate::NamingScheme::Timestamp => {
                format!(
                    "{}_{}",
                    self.macro_prefix,
                    Local::now().format("%Y%m%d_%H%M%S")
                )
            }
            crate::NamingScheme::Incremental => {
                format!("{}_{:03}", self.macro_prefix, counter)
            }
        }
    }
}
