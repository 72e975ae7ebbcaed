use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::terminal;
use crossterm::tty::IsTty;
use signal_hook::consts::signal::{SIGINT, SIGWINCH};

use crate::debug_log;

/// The process environment the input loop depends on.
pub trait Host {
    /// An interrupt (SIGINT) arrived since the last `clear_interrupt`.
    fn interrupted(&self) -> bool;
    fn clear_interrupt(&mut self);
    /// Report and clear "the terminal was resized".
    fn take_resized(&mut self) -> bool;
    fn stdin_is_tty(&self) -> bool;
    /// Leave the program.  Only returns in tests.
    fn exit(&mut self, code: i32);
}

/// Signal flags set asynchronously and sampled by the input loop.
#[derive(Debug, Clone)]
pub struct Signals {
    interrupt: Arc<AtomicBool>,
    resized: Arc<AtomicBool>,
}

impl Signals {
    pub fn install() -> io::Result<Self> {
        let interrupt = Arc::new(AtomicBool::new(false));
        let resized = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGINT, Arc::clone(&interrupt))?;
        signal_hook::flag::register(SIGWINCH, Arc::clone(&resized))?;
        Ok(Self { interrupt, resized })
    }

    /// Flag the keyboard watches while blocked.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }
}

/// The real process: signal flags plus terminal teardown on exit.
pub struct ProcessHost {
    signals: Signals,
}

impl ProcessHost {
    pub fn new(signals: Signals) -> Self {
        Self { signals }
    }
}

impl Host for ProcessHost {
    fn interrupted(&self) -> bool {
        self.signals.interrupt.load(Ordering::Relaxed)
    }

    fn clear_interrupt(&mut self) {
        self.signals.interrupt.store(false, Ordering::Relaxed);
    }

    fn take_resized(&mut self) -> bool {
        self.signals.resized.swap(false, Ordering::Relaxed)
    }

    fn stdin_is_tty(&self) -> bool {
        io::stdin().is_tty()
    }

    fn exit(&mut self, code: i32) {
        debug_log!("exiting with status {}", code);
        let _ = terminal::disable_raw_mode();
        std::process::exit(code);
    }
}
