//! Terminal keyboard input.
//!
//! Puts the terminal in raw mode and turns `crossterm` key events into the
//! key identifiers the input mapper understands. Raw mode is restored by a
//! guard, so every exit path from [`run_keyboard`] leaves the terminal
//! usable.

use std::io;

use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use crossterm::ExecutableCommand;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::session::manager::ESCAPE_KEY;
use crate::session::SharedSession;
use crate::{AppError, Result};

/// Identifier reported for key releases. It is never bound, so releasing a
/// key stops motion.
pub const KEY_UP: &str = "KeyUp";

/// What a terminal key event means to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    /// A key identifier to feed the mapper.
    Key(String),
    /// The operator asked to end the session.
    Quit,
}

/// Translate a terminal key event.
///
/// Printable characters map to themselves (case preserved), named keys to
/// their names (`Escape`, `ArrowUp`, ...), and `Ctrl-C` / `Ctrl-D` to
/// [`KeyInput::Quit`].
#[must_use]
pub fn key_input(event: &KeyEvent) -> KeyInput {
    if event.kind == KeyEventKind::Release {
        return KeyInput::Key(KEY_UP.to_owned());
    }

    if event.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(event.code, KeyCode::Char('c' | 'd'))
    {
        return KeyInput::Quit;
    }

    let name = match event.code {
        KeyCode::Char(c) => return KeyInput::Key(c.to_string()),
        KeyCode::Esc => ESCAPE_KEY,
        KeyCode::Enter => "Enter",
        KeyCode::Backspace => "Backspace",
        KeyCode::Tab => "Tab",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Right => "ArrowRight",
        KeyCode::Up => "ArrowUp",
        KeyCode::Down => "ArrowDown",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::PageUp => "PageUp",
        KeyCode::PageDown => "PageDown",
        KeyCode::Delete => "Delete",
        KeyCode::Insert => "Insert",
        KeyCode::F(n) => return KeyInput::Key(format!("F{n}")),
        _ => "Unidentified",
    };
    KeyInput::Key(name.to_owned())
}

/// Keyboard protocol flags requested from terminals that support them.
///
/// Unix terminals only report key releases once `REPORT_EVENT_TYPES` is
/// pushed; without it a released key never produces [`KEY_UP`].
#[must_use]
pub fn enhancement_flags() -> KeyboardEnhancementFlags {
    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
}

struct RawModeGuard {
    enhanced: bool,
}

impl RawModeGuard {
    fn enable() -> Result<Self> {
        enable_raw_mode().map_err(|err| AppError::Io(format!("failed to enable raw mode: {err}")))?;

        let enhanced = match supports_keyboard_enhancement() {
            Ok(true) => match io::stdout().execute(PushKeyboardEnhancementFlags(enhancement_flags())) {
                Ok(_) => true,
                Err(err) => {
                    warn!(%err, "failed to enable key release reporting");
                    false
                }
            },
            Ok(false) => {
                warn!("terminal does not report key releases; motion holds until another key");
                false
            }
            Err(err) => {
                debug!(%err, "keyboard enhancement query failed");
                false
            }
        };

        Ok(Self { enhanced })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enhanced {
            if let Err(err) = io::stdout().execute(PopKeyboardEnhancementFlags) {
                warn!(%err, "failed to restore keyboard protocol");
            }
        }
        if let Err(err) = disable_raw_mode() {
            warn!(%err, "failed to restore terminal mode");
        }
    }
}

/// Read keys until the operator quits, `ct` is cancelled, or input ends.
///
/// Cancels `ct` itself when the operator quits so the rest of the process
/// shuts down too.
///
/// # Errors
///
/// Returns `AppError::Io` if the terminal cannot be put in raw mode or the
/// event stream fails.
pub async fn run_keyboard(session: SharedSession, ct: CancellationToken) -> Result<()> {
    let _raw = RawModeGuard::enable()?;
    let mut events = EventStream::new();
    info!("keyboard teleop ready (Ctrl-C to quit)");

    loop {
        tokio::select! {
            biased;

            () = ct.cancelled() => break,

            next = events.next() => {
                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(err)) => {
                        return Err(AppError::Io(format!("terminal event stream failed: {err}")));
                    }
                    None => {
                        debug!("terminal event stream ended");
                        break;
                    }
                };

                let Event::Key(key) = event else {
                    continue;
                };

                match key_input(&key) {
                    KeyInput::Quit => {
                        info!("quit requested from keyboard");
                        ct.cancel();
                        break;
                    }
                    KeyInput::Key(id) => {
                        let command = session.lock().await.handle_key(&id);
                        debug!(key = %id, ?command, "key handled");
                    }
                }
            }
        }
    }

    Ok(())
}
