//! Scripted stand-ins for the keyboard, process, screen and kernel channel.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::event::KeyEvent as TermKeyEvent;
use inotify::WatchMask;

use crate::input::keyboard::{self, KeySource, RawKey};
use crate::input::Input;
use crate::monitor::notifier::{ChangeRecord, Notifier, Ready};
use crate::monitor::Monitor;
use crate::screen::{ColorRole, Screen};
use crate::signals::Host;

/// One scripted keyboard read.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Key(i32),
    /// A terminal key press, translated the way the real keyboard does.
    Press(TermKeyEvent),
    Resize,
    NoInput,
    /// SIGINT arrives during the wait.
    Interrupt,
}

#[derive(Debug, Default)]
pub struct KeysState {
    pub script: VecDeque<Step>,
    pub timeouts: Vec<i32>,
    pub flushes: usize,
}

#[derive(Debug)]
pub struct HostState {
    pub interrupt: bool,
    pub resized: bool,
    pub tty: bool,
    pub exits: Vec<i32>,
}

#[derive(Debug)]
pub struct ScreenState {
    pub ops: Vec<String>,
    pub written: Vec<String>,
    pub refreshes: usize,
    pub beeps: usize,
    pub cols: u16,
    pub fail_refresh: bool,
}

impl ScreenState {
    /// Everything written, concatenated.
    pub fn text(&self) -> String {
        self.written.concat()
    }
}

#[derive(Debug, Default)]
pub struct NotifierState {
    pub open: bool,
    pub opens: usize,
    pub next_wd: i32,
    pub watches: HashMap<i32, (PathBuf, WatchMask)>,
    pub removed: Vec<i32>,
    pub ready: VecDeque<io::Result<Ready>>,
    pub pending: Vec<ChangeRecord>,
    pub waits: Vec<i32>,
    pub fail_add: bool,
}

struct ScriptedKeys {
    state: Rc<RefCell<KeysState>>,
    host: Rc<RefCell<HostState>>,
}

impl KeySource for ScriptedKeys {
    fn read_key(&mut self, timeout_ms: i32) -> io::Result<RawKey> {
        let mut state = self.state.borrow_mut();
        state.timeouts.push(timeout_ms);
        Ok(match state.script.pop_front() {
            Some(Step::Key(ch)) => RawKey::Code(ch),
            Some(Step::Press(key)) => {
                let interrupt = AtomicBool::new(false);
                let raw = keyboard::translate(&key, &interrupt).unwrap_or(RawKey::NoInput);
                if interrupt.load(Ordering::Relaxed) {
                    self.host.borrow_mut().interrupt = true;
                }
                raw
            }
            Some(Step::Resize) => RawKey::Resize,
            Some(Step::Interrupt) => {
                self.host.borrow_mut().interrupt = true;
                RawKey::NoInput
            }
            Some(Step::NoInput) | None => RawKey::NoInput,
        })
    }

    fn flush(&mut self) {
        self.state.borrow_mut().flushes += 1;
    }
}

struct FakeHost(Rc<RefCell<HostState>>);

impl Host for FakeHost {
    fn interrupted(&self) -> bool {
        self.0.borrow().interrupt
    }

    fn clear_interrupt(&mut self) {
        self.0.borrow_mut().interrupt = false;
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.0.borrow_mut().resized)
    }

    fn stdin_is_tty(&self) -> bool {
        self.0.borrow().tty
    }

    fn exit(&mut self, code: i32) {
        self.0.borrow_mut().exits.push(code);
    }
}

struct RecordingScreen(Rc<RefCell<ScreenState>>);

impl Screen for RecordingScreen {
    fn set_color(&mut self, role: ColorRole) {
        self.0.borrow_mut().ops.push(format!("color {:?}", role));
    }

    fn add_str(&mut self, s: &str) {
        let mut state = self.0.borrow_mut();
        state.ops.push(format!("add {}", s));
        state.written.push(s.to_string());
    }

    fn move_to(&mut self, row: u16, col: u16) {
        self.0.borrow_mut().ops.push(format!("move {} {}", row, col));
    }

    fn clear_to_eol(&mut self) {
        self.0.borrow_mut().ops.push("clrtoeol".to_string());
    }

    fn redraw_full(&mut self) {
        self.0.borrow_mut().ops.push("redraw".to_string());
    }

    fn refresh(&mut self) -> io::Result<()> {
        let mut state = self.0.borrow_mut();
        state.refreshes += 1;
        if state.fail_refresh {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        Ok(())
    }

    fn beep(&mut self) {
        self.0.borrow_mut().beeps += 1;
    }

    fn cols(&self) -> u16 {
        self.0.borrow().cols
    }
}

/// In-memory kernel channel.  Every watch gets a fresh descriptor.
pub struct FakeNotifier(Rc<RefCell<NotifierState>>);

impl FakeNotifier {
    pub fn new() -> (Self, Rc<RefCell<NotifierState>>) {
        let state = Rc::new(RefCell::new(NotifierState {
            next_wd: 1,
            ..Default::default()
        }));
        (Self(Rc::clone(&state)), state)
    }
}

impl Notifier for FakeNotifier {
    fn open(&mut self) -> io::Result<()> {
        let mut s = self.0.borrow_mut();
        s.open = true;
        s.opens += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.0.borrow_mut().open = false;
    }

    fn is_open(&self) -> bool {
        self.0.borrow().open
    }

    fn add_watch(&mut self, path: &Path, mask: WatchMask) -> io::Result<i32> {
        let mut s = self.0.borrow_mut();
        if s.fail_add || !path.exists() {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        let wd = s.next_wd;
        s.next_wd += 1;
        s.watches.insert(wd, (path.to_path_buf(), mask));
        Ok(wd)
    }

    fn rm_watch(&mut self, wd: i32) -> io::Result<()> {
        let mut s = self.0.borrow_mut();
        s.watches.remove(&wd);
        s.removed.push(wd);
        Ok(())
    }

    fn wait(&mut self, timeout_ms: i32) -> io::Result<Ready> {
        let mut s = self.0.borrow_mut();
        s.waits.push(timeout_ms);
        s.ready.pop_front().unwrap_or(Ok(Ready::default()))
    }

    fn read_records(&mut self) -> io::Result<Vec<ChangeRecord>> {
        Ok(std::mem::take(&mut self.0.borrow_mut().pending))
    }
}

/// Handles on the state behind an `Input` built by [`input_with`].
pub struct Fakes {
    pub keys: Rc<RefCell<KeysState>>,
    pub host: Rc<RefCell<HostState>>,
    pub screen: Rc<RefCell<ScreenState>>,
    pub notifier: Rc<RefCell<NotifierState>>,
}

/// An `Input` reading `steps` from a fake keyboard on a fake terminal, with
/// an inactive monitor over a fake channel.
pub fn input_with(steps: Vec<Step>) -> (Input, Fakes) {
    let keys = Rc::new(RefCell::new(KeysState {
        script: steps.into(),
        ..Default::default()
    }));
    let host = Rc::new(RefCell::new(HostState {
        interrupt: false,
        resized: false,
        tty: true,
        exits: Vec::new(),
    }));
    let screen = Rc::new(RefCell::new(ScreenState {
        ops: Vec::new(),
        written: Vec::new(),
        refreshes: 0,
        beeps: 0,
        cols: 80,
        fail_refresh: false,
    }));
    let (notifier, notifier_state) = FakeNotifier::new();

    let input = Input::new(
        Box::new(ScriptedKeys {
            state: Rc::clone(&keys),
            host: Rc::clone(&host),
        }),
        Box::new(FakeHost(Rc::clone(&host))),
        Box::new(RecordingScreen(Rc::clone(&screen))),
        Monitor::new(Box::new(notifier)),
    );
    (
        input,
        Fakes {
            keys,
            host,
            screen,
            notifier: notifier_state,
        },
    )
}
