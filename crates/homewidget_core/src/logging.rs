//! Process-wide log sink for the producer app and the widget extension.
//!
//! The first successful [`init_logging`] starts one rolling file logger for the
//! process. Later calls must repeat the same settings; anything else is a
//! [`LoggingError::Conflict`] and the running logger is kept. Events are
//! `key=value` lines carrying metadata only, never document bodies.

use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FILE_STEM: &str = "homewidget";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEPT_FILES: usize = 4;
const PANIC_EXCERPT_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// `Debug` for debug builds, `Info` otherwise.
    pub fn build_default() -> Self {
        if cfg!(debug_assertions) {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::UnknownLevel(raw.trim().to_string())),
        }
    }
}

/// Validated `(level, directory)` pair the logger runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub dir: PathBuf,
}

impl LogSettings {
    /// Parses caller input. `dir` must be a non-blank absolute path.
    pub fn parse(level: &str, dir: &str) -> Result<Self, LoggingError> {
        let level = level.parse::<LogLevel>()?;
        let dir = dir.trim();
        if dir.is_empty() || !Path::new(dir).is_absolute() {
            return Err(LoggingError::RelativeDirectory(dir.to_string()));
        }
        Ok(Self {
            level,
            dir: PathBuf::from(dir),
        })
    }
}

#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    /// Blank or relative log directory.
    RelativeDirectory(String),
    CreateDirectory {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    Conflict {
        active: LogSettings,
        requested: LogSettings,
    },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unknown log level `{level}` (trace|debug|info|warn|error)"
            ),
            Self::RelativeDirectory(dir) => {
                write!(f, "log directory must be an absolute path, got `{dir}`")
            }
            Self::CreateDirectory { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already runs as {}@{}; cannot switch to {}@{}",
                active.level.as_str(),
                active.dir.display(),
                requested.level.as_str(),
                requested.dir.display()
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FlexiLoggerError> for LoggingError {
    fn from(value: FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Starts the process logger, or confirms it already runs with these settings.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let requested = LogSettings::parse(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(&requested))?;
    if active.settings == requested {
        Ok(())
    } else {
        Err(LoggingError::Conflict {
            active: active.settings.clone(),
            requested,
        })
    }
}

/// Settings of the running logger, if one was started.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE.get().map(|active| active.settings.clone())
}

fn start(settings: &LogSettings) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDirectory {
        dir: settings.dir.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(settings.level.as_str())?
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.clone())
                .basename(FILE_STEM),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEPT_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook();
    info!(
        "event=logging_start module=logging status=ok process={} os={} profile={} version={} level={} dir={}",
        process_label(),
        std::env::consts::OS,
        if cfg!(debug_assertions) { "debug" } else { "release" },
        env!("CARGO_PKG_VERSION"),
        settings.level.as_str(),
        settings.dir.display()
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

/// Executable stem, so app and extension lines can be told apart.
fn process_label() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let chained = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info.location().map_or_else(
            || "unknown".to_string(),
            |loc| format!("{}:{}", loc.file(), loc.line()),
        );
        error!(
            "event=panic module=logging status=error location={} message={}",
            location,
            panic_excerpt(info.payload())
        );
        chained(info);
    }));
}

fn panic_excerpt(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string payload>");
    one_line_excerpt(text, PANIC_EXCERPT_CHARS)
}

fn one_line_excerpt(text: &str, max_chars: usize) -> String {
    let mut chars = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c });
    let mut excerpt: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        excerpt.push('…');
    }
    excerpt
}

#[cfg(test)]
mod tests {
    use super::{
        init_logging, logging_status, one_line_excerpt, panic_excerpt, LogLevel, LogSettings,
        LoggingError,
    };

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!(" WARNING ".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("Trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert!(matches!(
            "verbose".parse::<LogLevel>(),
            Err(LoggingError::UnknownLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn settings_require_absolute_directory() {
        assert!(matches!(
            LogSettings::parse("info", "logs/widget"),
            Err(LoggingError::RelativeDirectory(_))
        ));
        assert!(LogSettings::parse("info", "   ").is_err());
    }

    #[test]
    fn excerpt_is_single_line_and_bounded() {
        assert_eq!(one_line_excerpt("a\nb\rc", 10), "a b c");
        assert_eq!(one_line_excerpt("abcdef", 3), "abc…");
        assert_eq!(one_line_excerpt("abc", 3), "abc");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_excerpt(owned.as_ref()), "boom");
    }

    #[test]
    fn init_is_idempotent_and_rejects_other_settings() {
        let log_dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let dir = log_dir.path().to_str().unwrap();
        let other = other_dir.path().to_str().unwrap();

        init_logging("info", dir).unwrap();
        init_logging("INFO", dir).unwrap();

        assert!(matches!(
            init_logging("debug", dir),
            Err(LoggingError::Conflict { .. })
        ));
        assert!(matches!(
            init_logging("info", other),
            Err(LoggingError::Conflict { .. })
        ));

        let active = logging_status().unwrap();
        assert_eq!(active.level, LogLevel::Info);
        assert_eq!(active.dir, log_dir.path());
    }
}
