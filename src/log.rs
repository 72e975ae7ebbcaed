use std::sync::OnceLock;

static PATH: OnceLock<Option<String>> = OnceLock::new();

/// Pick the debug log file.  `$MAILWAIT_LOG` wins over `configured`.
/// Only the first call has any effect.
pub fn init(configured: Option<&str>) {
    let path = std::env::var("MAILWAIT_LOG")
        .ok()
        .or_else(|| configured.map(str::to_string));
    let _ = PATH.set(path);
}

pub fn debug_log_path() -> Option<&'static str> {
    PATH.get_or_init(|| std::env::var("MAILWAIT_LOG").ok())
        .as_deref()
}

/// Append a timestamped line to the debug log (if one is set).
pub fn write(args: std::fmt::Arguments<'_>) {
    if let Some(path) = debug_log_path() {
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            use std::io::Write;
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(f, "{} {}", now, args);
        }
    }
}

/// Write a debug line to the file at $MAILWAIT_LOG (if set).
/// Usage: `debug_log!("monitor: watching {}", path.display());`
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        $crate::log::write(format_args!($($arg)*))
    };
}
