use crate::{
    CoordMode, EventKind, MouseButton, RecordedEvent, RecorderError, Result, Session,
};
use std::{fs::File, io::Write, path::Path};
use tracing::info;

/// Compiles closed sessions into AutoHotkey v2 source text.
///
/// Generation is pure: two calls over equal sessions produce byte-identical
/// output, and a session that is still open is rejected rather than read
/// mid-mutation.
pub struct CodeGenerator;

impl CodeGenerator {
    /// Generate a complete script (header plus one subroutine) for a session
    pub fn generate(session: &Session) -> Result<String> {
        let body = Self::generate_subroutine(session)?;
        let header = Self::generate_header(Self::coord_mode_for(session), session.config.replay_speed);
        Ok(format!("{}\n{}\n", header, body))
    }

    /// The AHK v2 script header: version directive, coordinate modes for the
    /// mouse and pixel subsystems, and the default mouse speed
    pub fn generate_header(coord_mode: CoordMode, replay_speed: u32) -> String {
        format!(
            "#Requires AutoHotkey v2.0\n\
             CoordMode \"Mouse\", \"{mode}\"\n\
             CoordMode \"Pixel\", \"{mode}\"\n\
             SetDefaultMouseSpeed {speed}\n",
            mode = coord_mode,
            speed = replay_speed,
        )
    }

    /// Generate the subroutine for a session, without the header.
    ///
    /// Fails with `SessionNotFinalized` unless the session is Closed; only a
    /// frozen event list can be compiled deterministically.
    pub fn generate_subroutine(session: &Session) -> Result<String> {
        if !session.is_closed() {
            return Err(RecorderError::SessionNotFinalized);
        }

        let mut lines = vec![format!("{}() {{", sanitize_identifier(&session.name))];

        if session.events.is_empty() {
            lines.push("    ; No events recorded".to_string());
        } else {
            let floor = session.config.delay_floor_ms;
            let mut prev_ts: Option<u64> = None;
            for event in &session.events {
                if let Some(prev) = prev_ts {
                    let gap = event.timestamp_ms.saturating_sub(prev);
                    lines.push(format!("    Sleep {}", gap.max(floor)));
                }
                Self::push_event_lines(event, &mut lines);
                prev_ts = Some(event.timestamp_ms);
            }
        }

        lines.push("}".to_string());
        Ok(lines.join("\n"))
    }

    /// Generate one script containing every given session as a subroutine
    pub fn generate_full_script(sessions: &[Session]) -> Result<String> {
        let coord_mode = sessions
            .first()
            .map(Self::coord_mode_for)
            .unwrap_or_default();
        let replay_speed = sessions.first().map(|s| s.config.replay_speed).unwrap_or(0);

        let mut parts = vec![Self::generate_header(coord_mode, replay_speed)];
        for session in sessions {
            parts.push(Self::generate_subroutine(session)?);
            parts.push(String::new());
        }

        if let Some(last) = sessions.last() {
            parts.push("; Call the last recorded macro:".to_string());
            parts.push(format!("; {}()", sanitize_identifier(&last.name)));
        }

        Ok(parts.join("\n"))
    }

    fn push_event_lines(event: &RecordedEvent, lines: &mut Vec<String>) {
        match &event.kind {
            EventKind::Click { position, color } => {
                let comment = format!("  ; color={} at record time", color.to_hex());
                match event.button {
                    MouseButton::Left => {
                        lines.push(format!("    Click {}, {}{}", position.x, position.y, comment))
                    }
                    button => lines.push(format!(
                        "    Click \"{}\", {}, {}{}",
                        button, position.x, position.y, comment
                    )),
                }
            }
            EventKind::Drag {
                start,
                end,
                start_color,
                end_color,
            } => {
                lines.push(format!(
                    "    MouseClickDrag \"{}\", {}, {}, {}, {}  ; start color={}",
                    event.button,
                    start.x,
                    start.y,
                    end.x,
                    end.y,
                    start_color.to_hex()
                ));
                lines.push(format!("    ; end color={}", end_color.to_hex()));
            }
            EventKind::Move { position } => {
                lines.push(format!("    MouseMove {}, {}", position.x, position.y))
            }
        }
    }

    /// Mixed coordinate modes within one session are a known limitation;
    /// the whole subroutine is emitted under the first event's mode.
    fn coord_mode_for(session: &Session) -> CoordMode {
        session
            .events
            .first()
            .map(|e| e.coord_mode)
            .unwrap_or(session.config.coord_mode)
    }
}

/// Reduce a session name to a legal AHK v2 identifier
fn sanitize_identifier(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match cleaned.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("Macro_{}", cleaned),
        Some(_) => cleaned,
        None => "Macro".to_string(),
    }
}

/// The running script text the shell displays and saves.
///
/// The first appended session brings the header with it; later sessions are
/// appended as bare subroutines separated by a blank line.
#[derive(Debug, Default)]
pub struct ScriptBuffer {
    text: String,
}

impl ScriptBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Compile a closed session and append it to the buffer
    pub fn append_session(&mut self, session: &Session) -> Result<()> {
        if self.is_empty() {
            self.text = CodeGenerator::generate(session)?;
        } else {
            let subroutine = CodeGenerator::generate_subroutine(session)?;
            self.text.truncate(self.text.trim_end().len());
            self.text.push_str("\n\n");
            self.text.push_str(&subroutine);
            self.text.push('\n');
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Save the buffer as an .ahk script file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        info!("Saving script to {:?}", path.as_ref());
        let mut file = File::create(path)?;
        file.write_all(self.text.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PixelColor, Position, RecorderConfig, SessionState};

    fn click(x: i32, y: i32, t: u64) -> RecordedEvent {
        RecordedEvent {
            timestamp_ms: t,
            button: MouseButton::Left,
            coord_mode: CoordMode::Screen,
            kind: EventKind::Click {
                position: Position { x, y },
                color: PixelColor { r: 0xAA, g: 0xBB, b: 0xCC },
            },
        }
    }

    fn drag(x1: i32, y1: i32, x2: i32, y2: i32, t: u64) -> RecordedEvent {
        RecordedEvent {
            timestamp_ms: t,
            button: MouseButton::Left,
            coord_mode: CoordMode::Screen,
            kind: EventKind::Drag {
                start: Position { x: x1, y: y1 },
                end: Position { x: x2, y: y2 },
                start_color: PixelColor { r: 0x11, g: 0x22, b: 0x33 },
                end_color: PixelColor { r: 0x44, g: 0x55, b: 0x66 },
            },
        }
    }

    fn closed_session(events: Vec<RecordedEvent>) -> Session {
        closed_session_with(events, RecorderConfig::default())
    }

    fn closed_session_with(events: Vec<RecordedEvent>, config: RecorderConfig) -> Session {
        Session {
            id: 1,
            name: "TestMacro".to_string(),
            started_at_ms: 1,
            config,
            events,
            state: SessionState::Closed,
        }
    }

    #[test]
    fn test_header_contents() {
        let header = CodeGenerator::generate_header(CoordMode::Window, 0);
        assert!(header.starts_with("#Requires AutoHotkey v2.0\n"));
        assert!(header.contains("CoordMode \"Mouse\", \"Window\""));
        assert!(header.contains("CoordMode \"Pixel\", \"Window\""));
        assert!(header.contains("SetDefaultMouseSpeed 0"));
    }

    #[test]
    fn test_open_session_is_rejected() {
        let mut session = closed_session(vec![]);
        session.state = SessionState::Open;
        assert!(matches!(
            CodeGenerator::generate(&session),
            Err(RecorderError::SessionNotFinalized)
        ));
    }

    #[test]
    fn test_empty_session_is_valid_noop_macro() {
        let session = closed_session(vec![]);
        let code = CodeGenerator::generate(&session).expect("generate should succeed");
        assert!(code.contains("#Requires AutoHotkey v2.0"));
        assert!(code.contains("TestMacro() {"));
        assert!(code.contains("    ; No events recorded"));
        assert!(code.trim_end().ends_with('}'));
    }

    #[test]
    fn test_generate_is_deterministic() {
        let session = closed_session(vec![click(10, 20, 0), drag(1, 2, 300, 400, 500)]);
        let first = CodeGenerator::generate(&session).unwrap();
        let second = CodeGenerator::generate(&session.clone()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_two_clicks_worked_example() {
        // Two clicks 1200ms apart, floor 0: exactly one Sleep statement
        let session = closed_session(vec![click(100, 100, 0), click(200, 200, 1200)]);
        let code = CodeGenerator::generate(&session).unwrap();

        let expected = "#Requires AutoHotkey v2.0\n\
                        CoordMode \"Mouse\", \"Screen\"\n\
                        CoordMode \"Pixel\", \"Screen\"\n\
                        SetDefaultMouseSpeed 0\n\
                        \n\
                        TestMacro() {\n    \
                        Click 100, 100  ; color=0xAABBCC at record time\n    \
                        Sleep 1200\n    \
                        Click 200, 200  ; color=0xAABBCC at record time\n\
                        }\n";
        assert_eq!(code, expected);
        assert_eq!(code.matches("Sleep").count(), 1);
    }

    #[test]
    fn test_delay_floor_applies() {
        let config = RecorderConfig {
            delay_floor_ms: 50,
            ..RecorderConfig::default()
        };
        // Events 5ms apart; the floor wins
        let session = closed_session_with(vec![click(0, 0, 100), click(1, 1, 105)], config);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains("    Sleep 50\n"));
        assert!(!code.contains("Sleep 5\n"));
    }

    #[test]
    fn test_delay_never_negative_on_clock_jitter() {
        // Second timestamp precedes the first; saturates to the floor
        let session = closed_session(vec![click(0, 0, 500), click(1, 1, 400)]);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains("    Sleep 0\n"));
    }

    #[test]
    fn test_drag_statement_and_color_comments() {
        let session = closed_session(vec![drag(10, 20, 110, 220, 0)]);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains(
            "    MouseClickDrag \"Left\", 10, 20, 110, 220  ; start color=0x112233\n"
        ));
        assert!(code.contains("    ; end color=0x445566\n"));
    }

    #[test]
    fn test_non_left_click_names_button() {
        let mut event = click(5, 6, 0);
        event.button = MouseButton::Right;
        let session = closed_session(vec![event]);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains("    Click \"Right\", 5, 6  ; color=0xAABBCC at record time"));
    }

    #[test]
    fn test_move_statement() {
        let event = RecordedEvent {
            timestamp_ms: 0,
            button: MouseButton::Left,
            coord_mode: CoordMode::Screen,
            kind: EventKind::Move {
                position: Position { x: 7, y: 8 },
            },
        };
        let session = closed_session(vec![event]);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains("    MouseMove 7, 8\n"));
    }

    #[test]
    fn test_header_uses_first_event_coord_mode() {
        let mut event = click(1, 1, 0);
        event.coord_mode = CoordMode::Client;
        let session = closed_session(vec![event]);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains("CoordMode \"Mouse\", \"Client\""));
    }

    #[test]
    fn test_empty_session_falls_back_to_config_coord_mode() {
        let config = RecorderConfig {
            coord_mode: CoordMode::Window,
            ..RecorderConfig::default()
        };
        let session = closed_session_with(vec![], config);
        let code = CodeGenerator::generate(&session).unwrap();
        assert!(code.contains("CoordMode \"Mouse\", \"Window\""));
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("Macro_20240101_123456"), "Macro_20240101_123456");
        assert_eq!(sanitize_identifier("My Macro!"), "MyMacro");
        assert_eq!(sanitize_identifier("2024_run"), "Macro_2024_run");
        assert_eq!(sanitize_identifier("!!!"), "Macro");
        assert_eq!(sanitize_identifier(""), "Macro");
    }

    #[test]
    fn test_full_script_multiple_sessions() {
        let mut a = closed_session(vec![click(1, 1, 0)]);
        a.name = "First".to_string();
        let mut b = closed_session(vec![click(2, 2, 0)]);
        b.name = "Second".to_string();

        let code = CodeGenerator::generate_full_script(&[a, b]).unwrap();
        assert_eq!(code.matches("#Requires AutoHotkey v2.0").count(), 1);
        assert!(code.contains("First() {"));
        assert!(code.contains("Second() {"));
        assert!(code.contains("; Call the last recorded macro:\n; Second()"));
    }

    #[test]
    fn test_script_buffer_single_header() {
        let mut a = closed_session(vec![click(1, 1, 0)]);
        a.name = "First".to_string();
        let mut b = closed_session(vec![click(2, 2, 0)]);
        b.name = "Second".to_string();

        let mut buffer = ScriptBuffer::new();
        assert!(buffer.is_empty());

        buffer.append_session(&a).expect("append should succeed");
        buffer.append_session(&b).expect("append should succeed");

        let text = buffer.text();
        assert_eq!(text.matches("#Requires AutoHotkey v2.0").count(), 1);
        assert!(text.contains("First() {"));
        assert!(text.contains("Second() {"));
        // Blank line separates the subroutines
        assert!(text.contains("}\n\nSecond() {"));
    }

    #[test]
    fn test_script_buffer_save() {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = temp_dir.path().join("macro.ahk");

        let mut buffer = ScriptBuffer::new();
        buffer.append_session(&closed_session(vec![click(1, 1, 0)])).unwrap();
        buffer.save(&path).expect("save should succeed");

        let written = std::fs::read_to_string(&path).expect("read should succeed");
        assert_eq!(written, buffer.text());
    }
}
