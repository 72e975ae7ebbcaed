//! Keystroke buffering.
//!
//! Events are read, in order of priority, from:
//!
//! 1. the unget queue (pushback and lookahead, never skipped),
//! 2. the macro queue (macros, `push` and `exec`; skipped while macro
//!    events are ignored),
//! 3. the live keyboard, routed through the [`Monitor`] while it is active
//!    so that mailbox changes can end a wait without eating a keystroke.

pub mod keyboard;
pub mod prompt;

use crate::debug_log;
use crate::event_queue::{EventQueue, MACRO_GROWTH, UNGET_GROWTH};
use crate::keymap::{ctrl, KeyEvent, KEY_ESCAPE, META_BIT, OP_END_COND, OP_NULL};
use crate::monitor::{Monitor, PollOutcome};
use crate::screen::Screen;
use crate::signals::Host;

use self::keyboard::{KeySource, RawKey};

pub struct Input {
    unget: EventQueue,
    macros: EventQueue,
    /// Milliseconds a live read waits: negative blocks, zero polls.
    timeout_ms: i32,
    ignore_macro_events: bool,
    /// Treat high-bit input as ESC followed by the key.
    meta_key: bool,
    keys: Box<dyn KeySource>,
    host: Box<dyn Host>,
    screen: Box<dyn Screen>,
    monitor: Monitor,
}

impl Input {
    pub fn new(
        keys: Box<dyn KeySource>,
        host: Box<dyn Host>,
        screen: Box<dyn Screen>,
        monitor: Monitor,
    ) -> Self {
        Self {
            unget: EventQueue::new(UNGET_GROWTH),
            macros: EventQueue::new(MACRO_GROWTH),
            timeout_ms: -1,
            ignore_macro_events: false,
            meta_key: false,
            keys,
            host,
            screen,
            monitor,
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut Monitor {
        &mut self.monitor
    }

    pub fn screen_mut(&mut self) -> &mut dyn Screen {
        self.screen.as_mut()
    }

    pub fn timeout(&self) -> i32 {
        self.timeout_ms
    }

    /// Set the live-read timeout, returning the old one so it can be
    /// restored.
    pub fn set_timeout(&mut self, ms: i32) -> i32 {
        std::mem::replace(&mut self.timeout_ms, ms)
    }

    pub fn set_meta_key(&mut self, on: bool) {
        self.meta_key = on;
    }

    pub fn set_ignore_macro_events(&mut self, on: bool) {
        self.ignore_macro_events = on;
    }

    /// Run `f` with the macro queue set aside, e.g. for a prompt that must
    /// read what the user types rather than what a macro supplies.
    pub fn without_macros<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.ignore_macro_events, true);
        let out = f(self);
        self.ignore_macro_events = saved;
        out
    }

    pub fn pending_macros(&self) -> usize {
        self.macros.len()
    }

    pub fn pending_ungets(&self) -> usize {
        self.unget.len()
    }

    /// Read the next event.
    ///
    /// Returns `KeyEvent::TIMEOUT` when nothing arrived in time (including a
    /// wait cut short by a mailbox change) and `KeyEvent::ERROR` for Ctrl-G
    /// or an interrupt.
    pub fn next_event(&mut self) -> KeyEvent {
        if let Some(event) = self.unget.pop() {
            return event;
        }
        if !self.ignore_macro_events {
            if let Some(event) = self.macros.pop() {
                return event;
            }
        }

        self.host.clear_interrupt();
        let ch = self.read_live();

        if self.host.interrupted() {
            self.query_exit();
            return KeyEvent::ERROR;
        }

        let Some(ch) = ch else {
            // Timeout, resize without a timeout set, or the terminal is gone.
            if !self.host.stdin_is_tty() {
                debug_log!("input: stdin is not a terminal and supplied no input");
                self.host.exit(1);
            }
            return KeyEvent::TIMEOUT;
        };

        if self.meta_key && (META_BIT..=0xff).contains(&ch) {
            // ALT-x arrives as ESC-x
            self.unget_event(ch & !META_BIT, OP_NULL);
            return KeyEvent::key(KEY_ESCAPE);
        }

        if ch == ctrl(b'G') {
            return KeyEvent::ERROR;
        }
        KeyEvent::key(ch)
    }

    fn read_live(&mut self) -> Option<i32> {
        loop {
            let read = if self.monitor.is_active() {
                self.read_monitored()
            } else {
                self.keys.read_key(self.timeout_ms)
            };
            match read {
                Ok(RawKey::Code(ch)) => return Some(ch),
                Ok(RawKey::Resize) => continue,
                Ok(RawKey::NoInput) => return None,
                Err(e) => {
                    debug_log!("input: keyboard read failed: {}", e);
                    return None;
                }
            }
        }
    }

    fn read_monitored(&mut self) -> std::io::Result<RawKey> {
        // The terminal layer may hold input already taken off stdin, which
        // polling stdin would not see.
        let key = self.keys.read_key(0)?;
        if key != RawKey::NoInput {
            return Ok(key);
        }
        match self.monitor.poll(self.timeout_ms) {
            Ok(PollOutcome::InputReady | PollOutcome::Inactive) => self.keys.read_key(self.timeout_ms),
            Ok(PollOutcome::FilesChanged | PollOutcome::NoEvent) => Ok(RawKey::NoInput),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Ok(RawKey::NoInput),
            Err(e) => Err(e),
        }
    }

    /// Queue an event for a macro, `push` or `exec`.  Never used for
    /// interactive keystrokes.
    pub fn push_macro(&mut self, ch: i32, op: i32) {
        self.macros.push(KeyEvent::new(ch, op));
    }

    /// Put an event back so it is the next one read.
    pub fn unget_event(&mut self, ch: i32, op: i32) {
        self.unget.push(KeyEvent::new(ch, op));
    }

    /// Put a string back so it is read again in its original order.
    pub fn unget_string(&mut self, s: &str) {
        for c in s.chars().rev() {
            self.unget_event(c as i32, OP_NULL);
        }
    }

    /// Abandon the rest of a macro, up to and including its next
    /// end-of-conditional barrier.  Pushed-back events go too.
    pub fn flush_macro_to_endcond(&mut self) {
        self.unget.clear();
        self.macros.pop_through(OP_END_COND);
    }

    /// Drop pushed-back events up to and including an end-of-conditional
    /// barrier.
    pub fn flush_unget_to_endcond(&mut self) {
        self.unget.pop_through(OP_END_COND);
    }

    /// Empty both queues and discard typed-ahead input.
    pub fn flush_all(&mut self) {
        self.unget.clear();
        self.macros.clear();
        self.keys.flush();
    }

    /// Update the screen, unless a macro is still running.
    pub fn refresh(&mut self, force: bool) {
        if !self.macros.is_empty() && !force && !self.ignore_macro_events {
            return;
        }
        if let Err(e) = self.screen.refresh() {
            debug_log!("input: screen refresh failed: {}", e);
        }
    }
}
