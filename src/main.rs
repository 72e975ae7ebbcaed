use anyhow::{Context, Result};
use crossterm::terminal;

use mailwait::config::Config;
use mailwait::debug_log;
use mailwait::input::keyboard::Keyboard;
use mailwait::input::prompt::Answer;
use mailwait::input::Input;
use mailwait::keymap::{self, OP_HELP, OP_QUIT, OP_REDRAW};
use mailwait::mailbox::{Mailbox, Mailboxes};
use mailwait::monitor::notifier::Inotify;
use mailwait::monitor::Monitor;
use mailwait::screen::{ColorRole, TerminalScreen};
use mailwait::signals::{ProcessHost, Signals};

const HELP: &str = "q:quit  ^L:redraw  ?:help";

fn main() -> Result<()> {
    let config = Config::load()?;
    mailwait::log::init(config.log_file().as_deref());

    let mut mailboxes = config.mailbox_list();
    // A path on the command line becomes the open mailbox
    if let Some(path) = std::env::args().nth(1) {
        mailboxes.set_current(Some(Mailbox::open(path)));
    }

    let signals = Signals::install().context("failed to install signal handlers")?;
    let notifier = Inotify::new().context("failed to set up the poll set")?;
    terminal::enable_raw_mode().context("failed to enter raw mode")?;
    let screen = match TerminalScreen::new() {
        Ok(screen) => screen,
        Err(e) => {
            let _ = terminal::disable_raw_mode();
            return Err(e).context("failed to query terminal size");
        }
    };

    let mut input = Input::new(
        Box::new(Keyboard::new(signals.interrupt_flag())),
        Box::new(ProcessHost::new(signals)),
        Box::new(screen),
        Monitor::new(Box::new(notifier)),
    );
    input.set_meta_key(config.meta_key);
    input.set_timeout(config.timeout_ms());

    if config.monitor {
        watch_mailboxes(&mut input, &mailboxes);
    }
    input.screen_mut().redraw_full();
    input.message(ColorRole::Message, HELP);

    run(&mut input, &mailboxes);

    terminal::disable_raw_mode().context("failed to leave raw mode")?;
    Ok(())
}

fn watch_mailboxes(input: &mut Input, mailboxes: &dyn Mailboxes) {
    for mailbox in mailboxes.listed() {
        if let Err(e) = input.monitor_mut().add_watch(Some(mailbox), mailboxes) {
            debug_log!("main: not monitoring {}: {}", mailbox.realpath.display(), e);
        }
    }
    if let Some(current) = mailboxes.current() {
        if let Err(e) = input.monitor_mut().add_watch(None, mailboxes) {
            let msg = format!("Cannot monitor {}: {}", current.realpath.display(), e);
            input.message(ColorRole::Error, &msg);
        }
    }
}

fn run(input: &mut Input, mailboxes: &dyn Mailboxes) {
    loop {
        let ev = input.next_event();

        // A file change ends the wait as a timeout
        if input.monitor_mut().take_current_changed() {
            let name = mailboxes
                .current()
                .map(|m| m.realpath.display().to_string())
                .unwrap_or_default();
            input.message(ColorRole::Message, &format!("{} changed on disk", name));
        } else if ev.is_timeout() && input.monitor().files_changed() {
            input.message(ColorRole::Message, "New mail in a watched mailbox");
        }

        if ev.is_timeout() {
            continue;
        }
        if ev.is_error() {
            input.message(ColorRole::Error, "Aborted");
            continue;
        }

        match keymap::resolve(ev.ch) {
            OP_QUIT => {
                if input.yes_or_no("Quit?", Answer::Yes) == Answer::Yes {
                    return;
                }
            }
            OP_REDRAW => {
                input.screen_mut().redraw_full();
                input.message(ColorRole::Message, HELP);
            }
            OP_HELP => input.message(ColorRole::Message, HELP),
            _ => {
                let shown = match char::from_u32(ev.ch as u32) {
                    Some(c) if !c.is_control() => format!("key {:?} ({})", c, ev.ch),
                    _ => format!("key code {}", ev.ch),
                };
                input.message(ColorRole::Normal, &shown);
            }
        }
    }
}
