use crossterm::event::{KeyCode, KeyEvent as TermKeyEvent, KeyModifiers};

/// `ch` of an event produced by an aborted read (error, user cancel, interrupt).
pub const KEY_ERROR: i32 = -1;
/// `ch` of an event produced when nothing arrived before the timeout.
pub const KEY_TIMEOUT: i32 = -2;

pub const KEY_ESCAPE: i32 = 0x1b;
pub const KEY_RETURN: i32 = b'\r' as i32;
pub const KEY_NEWLINE: i32 = b'\n' as i32;

/// High bit set by terminals that send ALT-x as a single byte.
pub const META_BIT: i32 = 0x80;

// Special keys, numbered the way curses numbers them.
pub const KEY_DOWN: i32 = 0o402;
pub const KEY_UP: i32 = 0o403;
pub const KEY_LEFT: i32 = 0o404;
pub const KEY_RIGHT: i32 = 0o405;
pub const KEY_HOME: i32 = 0o406;
pub const KEY_BACKSPACE: i32 = 0o407;
pub const KEY_F0: i32 = 0o410;
pub const KEY_DC: i32 = 0o512;
pub const KEY_IC: i32 = 0o513;
pub const KEY_NPAGE: i32 = 0o522;
pub const KEY_PPAGE: i32 = 0o523;
pub const KEY_ENTER: i32 = 0o527;
pub const KEY_BTAB: i32 = 0o541;
pub const KEY_END: i32 = 0o550;

// Operation ids carried alongside a key code.
pub const OP_NULL: i32 = 0;
/// Barrier closing a conditional section of a macro.
pub const OP_END_COND: i32 = 1;
pub const OP_QUIT: i32 = 2;
pub const OP_REDRAW: i32 = 3;
pub const OP_HELP: i32 = 4;

/// A keystroke, or a sentinel, with the operation it was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub ch: i32,
    pub op: i32,
}

impl KeyEvent {
    pub const ERROR: KeyEvent = KeyEvent::new(KEY_ERROR, OP_NULL);
    pub const TIMEOUT: KeyEvent = KeyEvent::new(KEY_TIMEOUT, OP_NULL);

    pub const fn new(ch: i32, op: i32) -> Self {
        Self { ch, op }
    }

    /// A raw keystroke with no operation attached.
    pub const fn key(ch: i32) -> Self {
        Self::new(ch, OP_NULL)
    }

    pub fn is_timeout(&self) -> bool {
        self.ch == KEY_TIMEOUT
    }

    pub fn is_error(&self) -> bool {
        self.ch == KEY_ERROR
    }

    /// Enter, in any of the forms a terminal delivers it.
    pub fn is_return(&self) -> bool {
        matches!(self.ch, KEY_RETURN | KEY_NEWLINE | KEY_ENTER)
    }
}

/// Control-key code for an ASCII letter, e.g. `ctrl(b'G') == 7`.
pub const fn ctrl(c: u8) -> i32 {
    (c & 0x1f) as i32
}

/// Translate a crossterm key event into the integer code the input buffer
/// works with.  Keys with no code (media keys, bare modifiers) yield `None`.
pub fn key_code(key: &TermKeyEvent) -> Option<i32> {
    let code = match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                if !(c.is_ascii_alphabetic() || matches!(c, '@' | '[' | '\\' | ']' | '^' | '_' | ' ')) {
                    return None;
                }
                ctrl(c.to_ascii_uppercase() as u8)
            } else if key.modifiers.contains(KeyModifiers::ALT) && c.is_ascii() {
                c as i32 | META_BIT
            } else {
                c as i32
            }
        }
        KeyCode::Enter => KEY_RETURN,
        KeyCode::Tab => b'\t' as i32,
        KeyCode::BackTab => KEY_BTAB,
        KeyCode::Esc => KEY_ESCAPE,
        KeyCode::Backspace => KEY_BACKSPACE,
        KeyCode::Delete => KEY_DC,
        KeyCode::Insert => KEY_IC,
        KeyCode::Up => KEY_UP,
        KeyCode::Down => KEY_DOWN,
        KeyCode::Left => KEY_LEFT,
        KeyCode::Right => KEY_RIGHT,
        KeyCode::Home => KEY_HOME,
        KeyCode::End => KEY_END,
        KeyCode::PageUp => KEY_PPAGE,
        KeyCode::PageDown => KEY_NPAGE,
        KeyCode::F(n) => KEY_F0 + i32::from(n),
        _ => return None,
    };
    Some(code)
}

/// Resolve a keystroke to the operation bound to it in the main loop.
pub fn resolve(ch: i32) -> i32 {
    match ch {
        c if c == b'q' as i32 => OP_QUIT,
        c if c == ctrl(b'L') => OP_REDRAW,
        c if c == b'?' as i32 => OP_HELP,
        _ => OP_NULL,
    }
}
