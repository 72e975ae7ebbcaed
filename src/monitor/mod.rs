//! Mailbox change monitoring.
//!
//! A [`Monitor`] keeps one kernel watch per physical mailbox store.  Watches
//! are identified by the device and inode of the watched target, not by
//! path, so symlinked or differently spelled mailboxes share a watch.  The
//! kernel channel is opened with the first watch and closed with the last.

pub mod notifier;

use std::collections::HashMap;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use inotify::WatchMask;
use thiserror::Error;

use crate::debug_log;
use crate::mailbox::{Mailbox, MailboxFormat, Mailboxes};

use self::notifier::{ChangeRecord, Notifier, MASK_DIR, MASK_FILE};

/// Kernel-stable identity of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

impl FileId {
    pub fn of(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        Ok(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchClass {
    Directory,
    File,
}

impl WatchClass {
    pub fn mask(self) -> WatchMask {
        match self {
            WatchClass::Directory => MASK_DIR,
            WatchClass::File => MASK_FILE,
        }
    }
}

/// What to watch for a mailbox of the given format, or `None` when the
/// format is unknown.
pub fn watch_target(format: MailboxFormat, realpath: &Path) -> Option<(PathBuf, WatchClass)> {
    match format {
        MailboxFormat::Unknown => None,
        MailboxFormat::Maildir => Some((realpath.join("new"), WatchClass::Directory)),
        MailboxFormat::Mh => Some((realpath.join(".mh_sequences"), WatchClass::File)),
        _ => Some((realpath.to_path_buf(), WatchClass::File)),
    }
}

/// A live kernel watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    pub id: FileId,
    pub format: MailboxFormat,
    /// Path to re-watch when the kernel drops the watch (MH only).
    pub backup_path: Option<PathBuf>,
    pub wd: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WatchKey(u64);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no mailbox to monitor")]
    NoMailbox,
    #[error("mailbox format is unknown")]
    UnknownFormat,
    #[error("cannot stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot open notification channel: {0}")]
    Channel(#[source] io::Error),
    #[error("cannot watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mailbox is not monitored")]
    NotWatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    AlreadyWatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Another open mailbox still needs the watch.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Keyboard input is waiting.
    InputReady,
    /// No watches, nothing was waited on.
    Inactive,
    /// Watched files changed; no keyboard input.
    FilesChanged,
    /// Timeout or a wakeup that concerned neither.
    NoEvent,
}

struct Resolved {
    format: MailboxFormat,
    path: PathBuf,
    class: WatchClass,
    id: FileId,
    existing: Option<WatchKey>,
}

pub struct Monitor {
    notifier: Box<dyn Notifier>,
    watches: HashMap<WatchKey, Watch>,
    by_file: HashMap<FileId, WatchKey>,
    by_wd: HashMap<i32, WatchKey>,
    next_key: u64,
    /// Watch belonging to the currently open mailbox.
    current: Option<WatchKey>,
    files_changed: bool,
    current_changed: bool,
}

impl Monitor {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self {
            notifier,
            watches: HashMap::new(),
            by_file: HashMap::new(),
            by_wd: HashMap::new(),
            next_key: 0,
            current: None,
            files_changed: false,
            current_changed: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.notifier.is_open()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn watches(&self) -> impl Iterator<Item = &Watch> {
        self.watches.values()
    }

    /// The watch of the currently open mailbox, if it has one.
    pub fn current_watch(&self) -> Option<&Watch> {
        self.current.and_then(|k| self.watches.get(&k))
    }

    /// Whether the last `poll` saw watched files change.
    pub fn files_changed(&self) -> bool {
        self.files_changed
    }

    /// Report and clear "the current mailbox changed on disk".
    pub fn take_current_changed(&mut self) -> bool {
        std::mem::take(&mut self.current_changed)
    }

    fn resolve(&self, mailbox: Option<&Mailbox>, mailboxes: &dyn Mailboxes) -> Result<Resolved, MonitorError> {
        let mailbox = mailbox.or_else(|| mailboxes.current()).ok_or(MonitorError::NoMailbox)?;
        let (path, class) =
            watch_target(mailbox.format, &mailbox.realpath).ok_or(MonitorError::UnknownFormat)?;
        let id = FileId::of(&path).map_err(|source| MonitorError::Stat {
            path: path.clone(),
            source,
        })?;
        Ok(Resolved {
            format: mailbox.format,
            existing: self.by_file.get(&id).copied(),
            path,
            class,
            id,
        })
    }

    /// Start watching `mailbox`, or the current mailbox when `None`.
    ///
    /// A mailbox whose store is already watched gets no second watch.
    pub fn add_watch(
        &mut self,
        mailbox: Option<&Mailbox>,
        mailboxes: &dyn Mailboxes,
    ) -> Result<AddOutcome, MonitorError> {
        let r = self.resolve(mailbox, mailboxes)?;
        if let Some(key) = r.existing {
            if mailbox.is_none() {
                self.current = Some(key);
            }
            return Ok(AddOutcome::AlreadyWatched);
        }

        if !self.notifier.is_open() {
            self.notifier.open().map_err(MonitorError::Channel)?;
        }
        let wd = match self.notifier.add_watch(&r.path, r.class.mask()) {
            Ok(wd) => wd,
            Err(source) => {
                debug_log!("monitor: inotify_add_watch failed for {}: {}", r.path.display(), source);
                self.close_if_idle();
                return Err(MonitorError::Watch { path: r.path, source });
            }
        };
        debug_log!("monitor: watching {} descriptor={}", r.path.display(), wd);

        let key = WatchKey(self.next_key);
        self.next_key += 1;
        let backup_path = (r.format == MailboxFormat::Mh).then(|| r.path.clone());
        self.watches.insert(
            key,
            Watch {
                id: r.id,
                format: r.format,
                backup_path,
                wd,
            },
        );
        self.by_file.insert(r.id, key);
        self.by_wd.insert(wd, key);
        if mailbox.is_none() {
            self.current = Some(key);
        }
        Ok(AddOutcome::Added)
    }

    /// Stop watching `mailbox`, or the current mailbox when `None`.
    ///
    /// The watch survives if another open mailbox resolves to the same store.
    pub fn remove_watch(
        &mut self,
        mailbox: Option<&Mailbox>,
        mailboxes: &dyn Mailboxes,
    ) -> Result<RemoveOutcome, MonitorError> {
        if mailbox.is_none() {
            self.current = None;
            self.current_changed = false;
        }

        let r = self.resolve(mailbox, mailboxes)?;
        let key = r.existing.ok_or(MonitorError::NotWatched)?;

        if let Some(current) = mailboxes.current() {
            let shared = match mailbox {
                Some(_) => self
                    .resolve(None, mailboxes)
                    .is_ok_and(|c| c.existing.is_some() && c.id == r.id),
                None => {
                    mailboxes.is_listed(&current.realpath)
                        || mailboxes.listed().iter().any(|m| {
                            self.resolve(Some(m), mailboxes).is_ok_and(|l| l.id == r.id)
                        })
                }
            };
            if shared {
                return Ok(RemoveOutcome::Shared);
            }
        }

        if let Some(watch) = self.watches.get(&key) {
            if let Err(e) = self.notifier.rm_watch(watch.wd) {
                debug_log!("monitor: inotify_rm_watch failed for descriptor={}: {}", watch.wd, e);
            }
            debug_log!("monitor: removed watch on {} descriptor={}", r.path.display(), watch.wd);
        }
        self.delete(key);
        Ok(RemoveOutcome::Removed)
    }

    /// Wait (up to `timeout_ms`) for keyboard input or file changes and
    /// process any change records that arrived.
    pub fn poll(&mut self, timeout_ms: i32) -> io::Result<PollOutcome> {
        self.files_changed = false;
        if !self.notifier.is_open() {
            return Ok(PollOutcome::Inactive);
        }

        let ready = match self.notifier.wait(timeout_ms) {
            Ok(ready) => ready,
            Err(e) => {
                if e.kind() != io::ErrorKind::Interrupted {
                    debug_log!("monitor: poll() failed: {}", e);
                }
                return Err(e);
            }
        };

        if ready.channel {
            self.files_changed = true;
            debug_log!("monitor: file change(s) detected");
            match self.notifier.read_records() {
                Ok(records) => {
                    for record in &records {
                        self.handle_record(record);
                    }
                }
                Err(e) => debug_log!("monitor: draining records failed: {}", e),
            }
        }

        Ok(if ready.stdin {
            PollOutcome::InputReady
        } else if self.files_changed {
            PollOutcome::FilesChanged
        } else {
            PollOutcome::NoEvent
        })
    }

    fn handle_record(&mut self, record: &ChangeRecord) {
        debug_log!("monitor: + detail: descriptor={} mask={:#x}", record.wd, record.mask);
        if record.invalidated() {
            self.handle_invalidated(record.wd);
        } else if self.current_watch().is_some_and(|w| w.wd == record.wd) {
            self.current_changed = true;
        }
    }

    /// The kernel dropped watch `wd`.  An MH sequences file is rewritten by
    /// renaming a new file over it, so its watch moves to the new inode;
    /// any other watch is forgotten.
    fn handle_invalidated(&mut self, wd: i32) {
        let Some(key) = self.by_wd.remove(&wd) else {
            return;
        };
        let Some(watch) = self.watches.get(&key) else {
            return;
        };
        let old_id = watch.id;
        let backup = match (watch.format, &watch.backup_path) {
            (MailboxFormat::Mh, Some(path)) => Some(path.clone()),
            _ => None,
        };
        let Some(path) = backup else {
            debug_log!("monitor: cleanup watch (implicitly removed) descriptor={}", wd);
            self.delete(key);
            return;
        };

        let id = match FileId::of(&path) {
            Ok(id) => id,
            Err(e) => {
                debug_log!("monitor: cannot stat {}: {}", path.display(), e);
                self.delete(key);
                return;
            }
        };
        let new_wd = match self.notifier.add_watch(&path, MASK_FILE) {
            Ok(new_wd) => new_wd,
            Err(e) => {
                debug_log!("monitor: inotify_add_watch failed for {}: {}", path.display(), e);
                self.delete(key);
                return;
            }
        };
        if self.by_wd.get(&new_wd).is_some_and(|&k| k != key) {
            // The new target is already watched through another mailbox.
            self.delete(key);
            return;
        }

        debug_log!("monitor: re-watching {} descriptor={}", path.display(), new_wd);
        if self.by_file.get(&old_id) == Some(&key) {
            self.by_file.remove(&old_id);
        }
        if let Some(watch) = self.watches.get_mut(&key) {
            watch.id = id;
            watch.wd = new_wd;
        }
        self.by_file.insert(id, key);
        self.by_wd.insert(new_wd, key);
    }

    /// Forget a watch record (the kernel side is already gone or removed).
    fn delete(&mut self, key: WatchKey) {
        if let Some(watch) = self.watches.remove(&key) {
            if self.by_file.get(&watch.id) == Some(&key) {
                self.by_file.remove(&watch.id);
            }
            if self.by_wd.get(&watch.wd) == Some(&key) {
                self.by_wd.remove(&watch.wd);
            }
        }
        if self.current == Some(key) {
            self.current = None;
        }
        self.close_if_idle();
    }

    /// `files_changed` is left alone: a poll that drained the last watch's
    /// records still reports them.
    fn close_if_idle(&mut self) {
        if self.watches.is_empty() && self.notifier.is_open() {
            self.notifier.close();
            debug_log!("monitor: no watches left, channel closed");
        }
    }
}
