//! The kernel file-notification channel (inotify) and the poll set it is
//! multiplexed with.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::path::Path;
use std::time::Duration;

use inotify::{EventMask, WatchDescriptor, WatchMask};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::debug_log;

/// Events watched on a directory (maildir `new/`).  The kernel flags events
/// on subdirectories with `IN_ISDIR` without it being asked for.
pub const MASK_DIR: WatchMask = WatchMask::MOVED_TO
    .union(WatchMask::ATTRIB)
    .union(WatchMask::CLOSE_WRITE);
/// Events watched on a single file.
pub const MASK_FILE: WatchMask = WatchMask::CLOSE_WRITE;

const EVENT_BUFLEN: usize = 4096;
const EVENTS_CAPACITY: usize = 8;

/// One change record read from the channel.
#[derive(Debug, Clone)]
pub struct ChangeRecord {
    pub wd: i32,
    pub mask: EventMask,
    pub name: Option<OsString>,
}

impl ChangeRecord {
    /// The kernel dropped this watch (target deleted, filesystem unmounted,
    /// or an explicit removal).
    pub fn invalidated(&self) -> bool {
        self.mask.contains(EventMask::IGNORED)
    }
}

/// Which members of the poll set woke up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ready {
    pub stdin: bool,
    pub channel: bool,
}

/// A kernel file-notification channel.
pub trait Notifier {
    fn open(&mut self) -> io::Result<()>;
    fn close(&mut self);
    fn is_open(&self) -> bool;
    /// Start watching `path`, returning the watch descriptor.  Watching a
    /// target that is already watched returns its existing descriptor.
    fn add_watch(&mut self, path: &Path, mask: WatchMask) -> io::Result<i32>;
    fn rm_watch(&mut self, wd: i32) -> io::Result<()>;
    /// Wait until stdin or the channel is readable.  `timeout_ms` follows
    /// poll(2): negative blocks, zero returns at once.
    fn wait(&mut self, timeout_ms: i32) -> io::Result<Ready>;
    /// Drain every record currently queued on the channel.
    fn read_records(&mut self) -> io::Result<Vec<ChangeRecord>>;
}

/// File descriptors waited on together.
pub struct PollSet {
    poll: Poll,
    events: Events,
    fds: Vec<RawFd>,
}

impl PollSet {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_CAPACITY),
            fds: Vec::new(),
        })
    }

    pub fn add(&mut self, fd: RawFd) -> io::Result<()> {
        if self.contains(fd) {
            return Ok(());
        }
        self.poll
            .registry()
            .register(&mut SourceFd(&fd), token(fd), Interest::READABLE)?;
        self.fds.push(fd);
        Ok(())
    }

    pub fn remove(&mut self, fd: RawFd) -> bool {
        if !self.contains(fd) {
            return false;
        }
        if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            debug_log!("monitor: deregistering fd {} failed: {}", fd, e);
        }
        self.fds.retain(|&f| f != fd);
        true
    }

    pub fn contains(&self, fd: RawFd) -> bool {
        self.fds.contains(&fd)
    }

    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Wait for readiness, returning the descriptors that woke up.
    pub fn poll(&mut self, timeout_ms: i32) -> io::Result<Vec<RawFd>> {
        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        self.poll.poll(&mut self.events, timeout)?;
        let fds = &self.fds;
        Ok(self
            .events
            .iter()
            .filter_map(|event| {
                let fd = RawFd::try_from(event.token().0).ok()?;
                fds.contains(&fd).then_some(fd)
            })
            .collect())
    }
}

fn token(fd: RawFd) -> Token {
    Token(usize::try_from(fd).unwrap_or(usize::MAX))
}

/// Linux inotify channel.  Opened lazily; while open, its descriptor sits
/// in the poll set next to stdin.
///
/// Kernel watch descriptors are handed out as plain integers so that the
/// monitor can index them.
pub struct Inotify {
    channel: Option<inotify::Inotify>,
    poll_set: PollSet,
    ids: HashMap<WatchDescriptor, i32>,
    descriptors: HashMap<i32, WatchDescriptor>,
    next_id: i32,
    buffer: Vec<u8>,
}

impl Inotify {
    pub fn new() -> io::Result<Self> {
        let mut poll_set = PollSet::new()?;
        let stdin = io::stdin().as_raw_fd();
        // epoll refuses regular files; reads then go straight to the keyboard
        if let Err(e) = poll_set.add(stdin) {
            debug_log!("monitor: cannot poll stdin: {}", e);
        }
        Ok(Self {
            channel: None,
            poll_set,
            ids: HashMap::new(),
            descriptors: HashMap::new(),
            next_id: 1,
            buffer: vec![0u8; EVENT_BUFLEN],
        })
    }

    fn channel(&mut self) -> io::Result<&mut inotify::Inotify> {
        self.channel.as_mut().ok_or_else(closed)
    }

    fn id_for(&mut self, wd: WatchDescriptor) -> i32 {
        if let Some(&id) = self.ids.get(&wd) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(wd.clone(), id);
        self.descriptors.insert(id, wd);
        id
    }

    fn forget(&mut self, id: i32) {
        if let Some(wd) = self.descriptors.remove(&id) {
            self.ids.remove(&wd);
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "inotify channel is closed")
}

impl Notifier for Inotify {
    fn open(&mut self) -> io::Result<()> {
        if self.channel.is_some() {
            return Ok(());
        }
        let channel = inotify::Inotify::init().map_err(|e| {
            debug_log!("monitor: inotify_init1 failed: {}", e);
            e
        })?;
        self.poll_set.add(channel.as_raw_fd())?;
        self.channel = Some(channel);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            self.poll_set.remove(channel.as_raw_fd());
        }
        self.ids.clear();
        self.descriptors.clear();
    }

    fn is_open(&self) -> bool {
        self.channel.is_some()
    }

    fn add_watch(&mut self, path: &Path, mask: WatchMask) -> io::Result<i32> {
        let wd = self.channel()?.watches().add(path, mask)?;
        Ok(self.id_for(wd))
    }

    fn rm_watch(&mut self, wd: i32) -> io::Result<()> {
        let descriptor = self
            .descriptors
            .get(&wd)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unknown watch descriptor"))?;
        self.channel()?.watches().remove(descriptor)
    }

    fn wait(&mut self, timeout_ms: i32) -> io::Result<Ready> {
        let fd = self.channel()?.as_raw_fd();
        let woke = self.poll_set.poll(timeout_ms)?;
        Ok(Ready {
            stdin: woke.contains(&io::stdin().as_raw_fd()),
            channel: woke.contains(&fd),
        })
    }

    fn read_records(&mut self) -> io::Result<Vec<ChangeRecord>> {
        let channel = self.channel.as_mut().ok_or_else(closed)?;
        let mut raw = Vec::new();
        loop {
            match channel.read_events(&mut self.buffer) {
                Ok(events) => {
                    let before = raw.len();
                    raw.extend(events.map(|e| (e.wd, e.mask, e.name.map(|n| n.to_os_string()))));
                    if raw.len() == before {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug_log!("monitor: reading inotify events failed: {}", e);
                    if raw.is_empty() {
                        return Err(e);
                    }
                    break;
                }
            }
        }

        let mut records = Vec::with_capacity(raw.len());
        for (wd, mask, name) in raw {
            let id = self.id_for(wd);
            if mask.contains(EventMask::IGNORED) {
                self.forget(id);
            }
            records.push(ChangeRecord { wd: id, mask, name });
        }
        Ok(records)
    }
}
