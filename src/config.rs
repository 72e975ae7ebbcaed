use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::mailbox::{canonical_path, Mailbox, MailboxFormat, MailboxList};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Treat Alt-x (high-bit input) as ESC followed by x.
    pub meta_key: bool,
    /// Seconds a keyboard read waits before timing out.  0 blocks.
    pub timeout: u32,
    /// Watch mailboxes for changes while waiting for input.
    pub monitor: bool,
    /// Debug log file.  `$MAILWAIT_LOG` overrides it.
    pub log_file: Option<String>,
    pub mailboxes: Vec<MailboxConfig>,
    /// Mailbox opened at startup.
    pub current: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta_key: false,
            timeout: 0,
            monitor: true,
            log_file: None,
            mailboxes: Vec::new(),
            current: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Mailboxes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct MailboxConfig {
    pub path: String,
    /// Storage format.  Probed from disk when absent.
    pub format: Option<MailboxFormat>,
}

impl MailboxConfig {
    pub fn to_mailbox(&self) -> Mailbox {
        let path = expand_tilde(&self.path);
        match self.format {
            Some(format) => Mailbox::new(format, path),
            None => Mailbox::open(path),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Keyboard timeout in milliseconds, as poll(2) takes it.
    pub fn timeout_ms(&self) -> i32 {
        match self.timeout {
            0 => -1,
            secs => i32::try_from(u64::from(secs) * 1000).unwrap_or(i32::MAX),
        }
    }

    pub fn log_file(&self) -> Option<String> {
        self.log_file.as_deref().map(expand_tilde)
    }

    /// The configured mailboxes, with `current` (if any) as the open one.
    pub fn mailbox_list(&self) -> MailboxList {
        let mut list = MailboxList::new();
        for m in &self.mailboxes {
            list.add(m.to_mailbox());
        }
        let current = self.current.as_deref().map(|path| {
            let path = canonical_path(PathBuf::from(expand_tilde(path)));
            self.mailboxes
                .iter()
                .map(MailboxConfig::to_mailbox)
                .find(|m| m.realpath == path)
                .unwrap_or_else(|| Mailbox::open(path))
        });
        list.set_current(current);
        list
    }

    /// Try to load the configuration file from, in order:
    ///
    /// 1. `$MAILWAIT_CONFIG`
    /// 2. `$XDG_CONFIG_HOME/mailwait/config.toml`
    /// 3. `~/.config/mailwait/config.toml`
    ///
    /// If none of these paths exist, return a default `Config`.
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::locate() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Return the first config path that actually exists on disk, or `None`.
    fn locate() -> Option<PathBuf> {
        Self::candidate_paths().into_iter().find(|p| p.is_file())
    }

    /// Ordered list of paths we check for a config file.
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(p) = std::env::var("MAILWAIT_CONFIG") {
            paths.push(PathBuf::from(p));
        }

        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg).join("mailwait").join("config.toml"));
        }

        if let Ok(home) = std::env::var("HOME") {
            paths.push(
                PathBuf::from(home)
                    .join(".config")
                    .join("mailwait")
                    .join("config.toml"),
            );
        }

        paths
    }
}

/// Expand `~/` prefix in a path string.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        format!("{}/{}", home, rest)
    } else {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
