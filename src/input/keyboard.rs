use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::keymap;

/// Result of one read from the live input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawKey {
    Code(i32),
    /// The terminal was resized; read again.
    Resize,
    /// Nothing arrived before the timeout (or the wait was interrupted).
    NoInput,
}

/// The live keyboard.
pub trait KeySource {
    /// Wait up to `timeout_ms` for a key (negative blocks, zero polls).
    fn read_key(&mut self, timeout_ms: i32) -> io::Result<RawKey>;
    /// Throw away anything typed but not yet read.
    fn flush(&mut self);
}

/// Turn a key press into a read result.  Raw mode delivers Ctrl-C as a key
/// rather than SIGINT, so it raises the interrupt flag here.
pub fn translate(key: &KeyEvent, interrupt: &AtomicBool) -> Option<RawKey> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        interrupt.store(true, Ordering::Relaxed);
        return Some(RawKey::NoInput);
    }
    keymap::key_code(key).map(RawKey::Code)
}

/// Longest single wait while blocked, so an interrupt is noticed promptly.
const SLICE: Duration = Duration::from_millis(250);

/// Keyboard read through crossterm.  Expects the terminal in raw mode.
pub struct Keyboard {
    interrupt: Arc<AtomicBool>,
}

impl Keyboard {
    pub fn new(interrupt: Arc<AtomicBool>) -> Self {
        Self { interrupt }
    }
}

impl KeySource for Keyboard {
    fn read_key(&mut self, timeout_ms: i32) -> io::Result<RawKey> {
        let deadline = u64::try_from(timeout_ms)
            .ok()
            .map(|ms| Instant::now() + Duration::from_millis(ms));
        loop {
            let wait = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()).min(SLICE),
                None => SLICE,
            };
            if event::poll(wait)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        if let Some(raw) = translate(&key, &self.interrupt) {
                            return Ok(raw);
                        }
                    }
                    Event::Resize(..) => return Ok(RawKey::Resize),
                    _ => {}
                }
            }
            if self.interrupt.load(Ordering::Relaxed) {
                return Ok(RawKey::NoInput);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(RawKey::NoInput);
            }
        }
    }

    fn flush(&mut self) {
        while event::poll(Duration::ZERO).unwrap_or(false) {
            if event::read().is_err() {
                break;
            }
        }
    }
}
