//! Single-key questions asked on the message line.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::Input;
use crate::screen::ColorRole;

/// How long a prompt waits before checking for a resize again.
const PROMPT_TIMEOUT_MS: i32 = 30 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Abort,
}

impl Input {
    /// Ask a yes/no question.  Enter picks `default`; Ctrl-G or an
    /// interrupt aborts.
    pub fn yes_or_no(&mut self, msg: &str, default: Answer) -> Answer {
        let (yes, no) = ("yes", "no");
        let answer_string = if default == Answer::Yes {
            format!(" ([{}]/{}): ", yes, no)
        } else {
            format!(" ([{}]/{}): ", no, yes)
        };

        let mut redraw = true;
        let answer = loop {
            if redraw || self.host.take_resized() {
                redraw = false;
                let cols = usize::from(self.screen.cols());
                let room = cols.saturating_sub(answer_string.width());
                let msg = truncate_to_width(msg, room);
                self.screen.move_to(0, 0);
                self.screen.set_color(ColorRole::Prompt);
                self.screen.add_str(msg);
                self.screen.add_str(&answer_string);
                self.screen.set_color(ColorRole::Normal);
                self.screen.clear_to_eol();
            }

            self.refresh(false);
            let saved = self.set_timeout(PROMPT_TIMEOUT_MS);
            let ev = self.next_event();
            self.set_timeout(saved);

            if ev.is_timeout() {
                // Re-check for a resize
                continue;
            }
            if ev.is_return() {
                break default;
            }
            if ev.ch < 0 {
                break Answer::Abort;
            }
            match char::from_u32(ev.ch as u32).map(|c| c.to_ascii_lowercase()) {
                Some('y') => break Answer::Yes,
                Some('n') => break Answer::No,
                _ => self.screen.beep(),
            }
        };

        self.clear_message_line();
        match answer {
            Answer::Yes => self.screen.add_str(yes),
            Answer::No => self.screen.add_str(no),
            Answer::Abort => {}
        }
        self.refresh(false);
        answer
    }

    /// Offer a choice between `letters`.  Returns the 0-based index of the
    /// chosen letter, or `None` if the prompt was aborted.  A digit picks by
    /// 1-based position.  `(x)` in the prompt is drawn highlighted.
    pub fn multi_choice(&mut self, prompt: &str, letters: &str) -> Option<usize> {
        let mut redraw = true;
        let choice = loop {
            if redraw || self.host.take_resized() {
                redraw = false;
                self.screen.move_to(0, 0);
                self.draw_choices(prompt);
                self.screen.set_color(ColorRole::Normal);
                self.screen.add_str(" ");
                self.screen.clear_to_eol();
            }

            self.refresh(false);
            let saved = self.set_timeout(PROMPT_TIMEOUT_MS);
            let ev = self.next_event();
            self.set_timeout(saved);

            if ev.is_timeout() {
                continue;
            }
            if ev.ch < 0 || ev.is_return() {
                break None;
            }
            let Some(c) = char::from_u32(ev.ch as u32) else {
                self.screen.beep();
                continue;
            };
            if let Some(i) = letters.chars().position(|l| l == c) {
                break Some(i);
            }
            if let Some(d) = c.to_digit(10).filter(|&d| d > 0) {
                let d = d as usize;
                if d <= letters.chars().count() {
                    break Some(d - 1);
                }
            }
            self.screen.beep();
        };

        self.clear_message_line();
        self.refresh(false);
        choice
    }

    fn draw_choices(&mut self, prompt: &str) {
        let mut rest = prompt;
        while let Some(open) = rest.find('(') {
            self.screen.set_color(ColorRole::Prompt);
            self.screen.add_str(&rest[..open]);
            let after = &rest[open + 1..];
            let mut chars = after.chars();
            match (chars.next(), chars.next()) {
                (Some(letter), Some(')')) if letter.is_alphanumeric() => {
                    self.screen.add_str("(");
                    self.screen.set_color(ColorRole::Options);
                    self.screen.add_str(&after[..letter.len_utf8()]);
                    self.screen.set_color(ColorRole::Prompt);
                    self.screen.add_str(")");
                    rest = &after[letter.len_utf8() + 1..];
                }
                _ => {
                    self.screen.add_str("(");
                    rest = after;
                }
            }
        }
        self.screen.set_color(ColorRole::Prompt);
        self.screen.add_str(rest);
    }

    /// Show `msg` and wait for any key.  Returns the key code, or `None`
    /// on abort.
    pub fn any_key_to_continue(&mut self, msg: Option<&str>) -> Option<i32> {
        self.screen.move_to(0, 0);
        self.screen.set_color(ColorRole::Message);
        self.screen.add_str(msg.unwrap_or("Press any key to continue..."));
        self.screen.set_color(ColorRole::Normal);
        self.screen.clear_to_eol();
        self.refresh(true);

        let saved = self.set_timeout(-1);
        let ev = self.without_macros(Input::next_event);
        self.set_timeout(saved);

        self.clear_message_line();
        (ev.ch >= 0).then_some(ev.ch)
    }

    /// Ask whether to quit after an interrupt.  Typed-ahead and queued
    /// input is thrown away first.
    pub fn query_exit(&mut self) {
        self.flush_all();
        let saved = self.set_timeout(-1);
        if self.yes_or_no("Exit?", Answer::Yes) == Answer::Yes {
            self.host.exit(1);
        }
        self.set_timeout(saved);
        self.host.clear_interrupt();
    }

    /// Write a one-line message.
    pub fn message(&mut self, role: ColorRole, msg: &str) {
        let cols = usize::from(self.screen.cols());
        self.screen.move_to(0, 0);
        self.screen.set_color(role);
        self.screen.add_str(truncate_to_width(msg, cols));
        self.screen.set_color(ColorRole::Normal);
        self.screen.clear_to_eol();
        self.refresh(false);
    }

    fn clear_message_line(&mut self) {
        self.screen.move_to(0, 0);
        self.screen.clear_to_eol();
    }
}

/// Longest prefix of `s` that fits in `width` terminal columns.
fn truncate_to_width(s: &str, width: usize) -> &str {
    let mut used = 0;
    for (i, c) in s.char_indices() {
        used += c.width().unwrap_or(0);
        if used > width {
            return &s[..i];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::KEY_RETURN;
    use crate::testing::{input_with, Step};

    fn key(c: char) -> Step {
        Step::Key(c as i32)
    }

    #[test]
    fn truncation_counts_columns() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("hello", 10), "hello");
        assert_eq!(truncate_to_width("日本語", 4), "日本");
        assert_eq!(truncate_to_width("日本語", 5), "日本");
    }

    #[test]
    fn yes_or_no_answers() {
        let (mut input, _) = input_with(vec![key('Y')]);
        assert_eq!(input.yes_or_no("Delete?", Answer::No), Answer::Yes);

        let (mut input, _) = input_with(vec![key('n')]);
        assert_eq!(input.yes_or_no("Delete?", Answer::Yes), Answer::No);
    }

    #[test]
    fn yes_or_no_enter_takes_default() {
        let (mut input, fakes) = input_with(vec![Step::Key(KEY_RETURN)]);
        assert_eq!(input.yes_or_no("Delete?", Answer::No), Answer::No);
        let screen = fakes.screen.borrow();
        assert!(screen.text().contains("Delete? ([no]/yes): "));
    }

    #[test]
    fn yes_or_no_beeps_then_retries_after_timeout() {
        let (mut input, fakes) = input_with(vec![key('x'), Step::NoInput, key('y')]);
        input.set_timeout(-1);
        assert_eq!(input.yes_or_no("Go?", Answer::No), Answer::Yes);
        assert_eq!(fakes.screen.borrow().beeps, 1);
        // Bounded waits while asking, caller's timeout restored.
        assert_eq!(fakes.keys.borrow().timeouts, vec![PROMPT_TIMEOUT_MS; 3]);
        assert_eq!(input.timeout(), -1);
    }

    #[test]
    fn yes_or_no_ctrl_g_aborts() {
        let (mut input, _) = input_with(vec![Step::Key(7)]);
        assert_eq!(input.yes_or_no("Go?", Answer::Yes), Answer::Abort);
    }

    #[test]
    fn yes_or_no_redraws_after_resize() {
        let (mut input, fakes) = input_with(vec![Step::NoInput, key('y')]);
        fakes.host.borrow_mut().resized = true;
        input.yes_or_no("Go?", Answer::No);
        assert_eq!(fakes.screen.borrow().text().matches("Go?").count(), 2);
    }

    #[test]
    fn yes_or_no_truncates_long_question() {
        let (mut input, fakes) = input_with(vec![key('y')]);
        fakes.screen.borrow_mut().cols = 20;
        input.yes_or_no("A very long question indeed", Answer::Yes);
        assert!(fakes.screen.borrow().text().contains("A very "));
        assert!(!fakes.screen.borrow().text().contains("long"));
    }

    #[test]
    fn multi_choice_by_letter_and_digit() {
        let (mut input, _) = input_with(vec![key('b')]);
        assert_eq!(input.multi_choice("(a)pple, (b)anana?", "ab"), Some(1));

        let (mut input, _) = input_with(vec![key('1')]);
        assert_eq!(input.multi_choice("(a)pple, (b)anana?", "ab"), Some(0));

        let (mut input, fakes) = input_with(vec![key('9'), key('q'), Step::Key(KEY_RETURN)]);
        assert_eq!(input.multi_choice("(a)pple, (b)anana?", "ab"), None);
        assert_eq!(fakes.screen.borrow().beeps, 2);
    }

    #[test]
    fn multi_choice_nul_is_not_an_abort() {
        let (mut input, fakes) = input_with(vec![Step::Key(0), key('b')]);
        assert_eq!(input.multi_choice("(a)pple, (b)anana?", "ab"), Some(1));
        assert_eq!(fakes.screen.borrow().beeps, 1);
    }

    #[test]
    fn multi_choice_highlights_letters() {
        let (mut input, fakes) = input_with(vec![key('a')]);
        input.multi_choice("(a)pple (or) not", "a");
        let screen = fakes.screen.borrow();
        assert!(screen.ops.contains(&"color Options".to_string()));
        assert_eq!(screen.text(), "(a)pple (or) not ");
    }

    #[test]
    fn any_key_ignores_macros() {
        let (mut input, _) = input_with(vec![key('k')]);
        input.push_macro('m' as i32, 0);
        assert_eq!(input.any_key_to_continue(None), Some('k' as i32));
        assert_eq!(input.pending_macros(), 1);
    }

    #[test]
    fn any_key_abort() {
        let (mut input, _) = input_with(vec![Step::NoInput]);
        assert_eq!(input.any_key_to_continue(Some("Done.")), None);
    }
}
