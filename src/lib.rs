//! Keystroke buffering and mailbox change monitoring for a terminal mail
//! client.
//!
//! [`input::Input`] hands out key events from pushback, macro and live
//! sources.  While it waits on the keyboard, [`monitor::Monitor`] watches the
//! open mailboxes through inotify so the caller hears about new mail without
//! losing a keystroke.

pub mod log;

pub mod config;
pub mod event_queue;
pub mod input;
pub mod keymap;
pub mod mailbox;
pub mod monitor;
pub mod screen;
pub mod signals;

#[cfg(test)]
mod testing;
