use std::io::{self, Stdout, Write};

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

/// Colour roles used when drawing prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRole {
    Normal,
    Prompt,
    /// Selectable letters inside a multiple-choice prompt.
    Options,
    Message,
    Error,
}

/// Where prompts and messages are drawn.  Rows and columns are relative to
/// the message line at the bottom of the screen.
pub trait Screen {
    fn set_color(&mut self, role: ColorRole);
    fn add_str(&mut self, s: &str);
    fn move_to(&mut self, row: u16, col: u16);
    fn clear_to_eol(&mut self);
    /// Re-read the terminal size and repaint everything on the next refresh.
    fn redraw_full(&mut self);
    /// Push everything drawn so far to the terminal.  Reports the first
    /// failure since the last refresh.
    fn refresh(&mut self) -> io::Result<()>;
    fn beep(&mut self);
    /// Width of the message line.
    fn cols(&self) -> u16;
}

/// Draws on the last row of the real terminal.
pub struct TerminalScreen<W: Write = Stdout> {
    out: W,
    cols: u16,
    rows: u16,
    /// First queueing error since the last refresh.
    error: Option<io::Error>,
}

impl TerminalScreen {
    pub fn new() -> io::Result<Self> {
        let (cols, rows) = terminal::size()?;
        Ok(Self::with_writer(io::stdout(), cols, rows))
    }
}

impl<W: Write> TerminalScreen<W> {
    pub fn with_writer(out: W, cols: u16, rows: u16) -> Self {
        Self {
            out,
            cols,
            rows,
            error: None,
        }
    }

    fn message_row(&self) -> u16 {
        self.rows.saturating_sub(1)
    }

    fn keep(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }
}

impl<W: Write> Screen for TerminalScreen<W> {
    fn set_color(&mut self, role: ColorRole) {
        let result = match role {
            ColorRole::Normal => queue!(self.out, ResetColor, SetAttribute(Attribute::Reset)),
            ColorRole::Prompt => queue!(self.out, SetForegroundColor(Color::Cyan)),
            ColorRole::Options => queue!(
                self.out,
                SetForegroundColor(Color::Yellow),
                SetAttribute(Attribute::Bold)
            ),
            ColorRole::Message => queue!(self.out, SetForegroundColor(Color::White)),
            ColorRole::Error => queue!(self.out, SetForegroundColor(Color::Red)),
        };
        self.keep(result);
    }

    fn add_str(&mut self, s: &str) {
        let result = queue!(self.out, Print(s));
        self.keep(result);
    }

    fn move_to(&mut self, row: u16, col: u16) {
        let row = self.message_row().saturating_add(row).min(self.message_row());
        let result = queue!(self.out, MoveTo(col, row));
        self.keep(result);
    }

    fn clear_to_eol(&mut self) {
        let result = queue!(self.out, Clear(ClearType::UntilNewLine));
        self.keep(result);
    }

    fn redraw_full(&mut self) {
        if let Ok((cols, rows)) = terminal::size() {
            self.cols = cols;
            self.rows = rows;
        }
        let result = queue!(self.out, Clear(ClearType::All));
        self.keep(result);
    }

    fn refresh(&mut self) -> io::Result<()> {
        let flushed = self.out.flush();
        match self.error.take() {
            Some(e) => Err(e),
            None => flushed,
        }
    }

    fn beep(&mut self) {
        let result = queue!(self.out, Print('\x07'));
        self.keep(result);
    }

    fn cols(&self) -> u16 {
        self.cols
    }
}
