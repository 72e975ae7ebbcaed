use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Storage format of a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxFormat {
    Unknown,
    Mbox,
    Mmdf,
    Mh,
    Maildir,
    Imap,
    Pop,
    Nntp,
    Notmuch,
    Compressed,
}

const MMDF_SEP: &[u8] = b"\x01\x01\x01\x01\n";

/// Files whose presence marks a directory as an MH folder.
const MH_MARKERS: &[&str] = &[".mh_sequences", ".xmhcache", ".mew_cache", ".mew-cache", ".sylpheed_cache"];

impl MailboxFormat {
    /// Work out the format of the mailbox at `path`.
    ///
    /// URL-style paths are classified by scheme without touching the
    /// filesystem; anything else is inspected on disk.
    pub fn probe(path: &Path) -> Self {
        let s = path.to_string_lossy();
        let scheme = s.split_once("://").map(|(scheme, _)| scheme.to_ascii_lowercase());
        match scheme.as_deref() {
            Some("imap" | "imaps") => return Self::Imap,
            Some("pop" | "pops") => return Self::Pop,
            Some("nntp" | "nntps" | "news" | "snews") => return Self::Nntp,
            Some("notmuch") => return Self::Notmuch,
            _ => {}
        }

        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => return Self::Unknown,
        };

        if meta.is_dir() {
            if path.join("cur").is_dir() {
                return Self::Maildir;
            }
            if MH_MARKERS.iter().any(|m| path.join(m).exists()) {
                return Self::Mh;
            }
            return Self::Unknown;
        }

        if meta.len() == 0 {
            return Self::Mbox;
        }
        let mut head = [0u8; 5];
        let n = match File::open(path).and_then(|mut f| f.read(&mut head)) {
            Ok(n) => n,
            Err(_) => return Self::Unknown,
        };
        let head = &head[..n];
        if head == b"From " {
            Self::Mbox
        } else if head == MMDF_SEP {
            Self::Mmdf
        } else if path.extension().is_some_and(|e| e == "gz" || e == "bz2" || e == "xz") {
            Self::Compressed
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub format: MailboxFormat,
    /// Canonical path (or URL) of the mailbox.
    pub realpath: PathBuf,
}

impl Mailbox {
    pub fn new(format: MailboxFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            realpath: canonical_path(path.into()),
        }
    }

    /// Build a mailbox, probing its format from disk.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let realpath = canonical_path(path.into());
        let format = MailboxFormat::probe(&realpath);
        Self { format, realpath }
    }
}

/// `path` with symlinks and `..` resolved.  Paths that do not exist (and
/// URLs) are kept as given.
pub fn canonical_path(path: PathBuf) -> PathBuf {
    std::fs::canonicalize(&path).unwrap_or(path)
}

/// Read-only view of the mailboxes the application knows about.
pub trait Mailboxes {
    /// The currently open mailbox, if any.
    fn current(&self) -> Option<&Mailbox>;

    /// Mailboxes listed for new-mail checking.
    fn listed(&self) -> &[Mailbox];

    fn is_listed(&self, realpath: &Path) -> bool {
        self.listed().iter().any(|m| m.realpath == realpath)
    }
}

#[derive(Debug, Default)]
pub struct MailboxList {
    current: Option<Mailbox>,
    listed: Vec<Mailbox>,
}

impl MailboxList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mailbox: Mailbox) {
        if !self.is_listed(&mailbox.realpath) {
            self.listed.push(mailbox);
        }
    }

    pub fn set_current(&mut self, mailbox: Option<Mailbox>) {
        self.current = mailbox;
    }
}

impl Mailboxes for MailboxList {
    fn current(&self) -> Option<&Mailbox> {
        self.current.as_ref()
    }

    fn listed(&self) -> &[Mailbox] {
        &self.listed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_urls_without_disk() {
        assert_eq!(MailboxFormat::probe(Path::new("imaps://mail.example.com/INBOX")), MailboxFormat::Imap);
        assert_eq!(MailboxFormat::probe(Path::new("notmuch:///home/u/mail")), MailboxFormat::Notmuch);
        assert_eq!(MailboxFormat::probe(Path::new("news://news.example.com")), MailboxFormat::Nntp);
        assert_eq!(MailboxFormat::probe(Path::new("pop://host")), MailboxFormat::Pop);
    }

    #[test]
    fn probe_local_formats() {
        let dir = tempfile::tempdir().unwrap();

        let maildir = dir.path().join("md");
        std::fs::create_dir_all(maildir.join("cur")).unwrap();
        std::fs::create_dir_all(maildir.join("new")).unwrap();
        assert_eq!(MailboxFormat::probe(&maildir), MailboxFormat::Maildir);

        let mh = dir.path().join("mh");
        std::fs::create_dir_all(&mh).unwrap();
        std::fs::write(mh.join(".mh_sequences"), "").unwrap();
        assert_eq!(MailboxFormat::probe(&mh), MailboxFormat::Mh);

        let mbox = dir.path().join("mbox");
        std::fs::write(&mbox, "From a@b Mon Jan  1 00:00:00 2024\n").unwrap();
        assert_eq!(MailboxFormat::probe(&mbox), MailboxFormat::Mbox);

        let empty = dir.path().join("empty");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(MailboxFormat::probe(&empty), MailboxFormat::Mbox);

        let mmdf = dir.path().join("mmdf");
        std::fs::write(&mmdf, b"\x01\x01\x01\x01\nFrom: a\n").unwrap();
        assert_eq!(MailboxFormat::probe(&mmdf), MailboxFormat::Mmdf);

        let plain = dir.path().join("notes.txt");
        std::fs::write(&plain, "hello world").unwrap();
        assert_eq!(MailboxFormat::probe(&plain), MailboxFormat::Unknown);

        assert_eq!(MailboxFormat::probe(&dir.path().join("missing")), MailboxFormat::Unknown);
    }

    #[test]
    fn list_deduplicates_by_path() {
        let mut list = MailboxList::new();
        list.add(Mailbox::new(MailboxFormat::Mbox, "/var/mail/u"));
        list.add(Mailbox::new(MailboxFormat::Mbox, "/var/mail/u"));
        assert_eq!(list.listed().len(), 1);
        assert!(list.is_listed(Path::new("/var/mail/u")));
        assert!(list.current().is_none());
    }

    #[test]
    fn realpath_resolves_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(real.join("cur")).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let real = std::fs::canonicalize(&real).unwrap();

        let alias = Mailbox::open(&link);
        assert_eq!(alias.format, MailboxFormat::Maildir);
        assert_eq!(alias.realpath, real);

        let dotted = Mailbox::new(MailboxFormat::Maildir, link.join("cur").join(".."));
        assert_eq!(dotted.realpath, real);

        let mut list = MailboxList::new();
        list.add(Mailbox::new(MailboxFormat::Maildir, &real));
        list.add(alias.clone());
        assert_eq!(list.listed().len(), 1);
        assert!(list.is_listed(&alias.realpath));

        let url = Mailbox::open("imaps://mail.example.com/INBOX");
        assert_eq!(url.realpath, PathBuf::from("imaps://mail.example.com/INBOX"));
    }

    #[test]
    fn format_from_toml() {
        #[derive(Deserialize)]
        struct W {
            f: MailboxFormat,
        }
        let w: W = toml::from_str("f = \"maildir\"").unwrap();
        assert_eq!(w.f, MailboxFormat::Maildir);
    }
}
