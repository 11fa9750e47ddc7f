use std::str::FromStr;
use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Discard, Level, Logger};

/// Creates the root logger, which writes JSON lines to standard error
/// from a background thread and drops records below `level`.
pub fn initialize_logger(level: Level) -> Logger {
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);
    let drain = drain.filter_level(level).ignore_res();
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// Parses a level name such as `info` or `debug`, defaulting to
/// `Info` for anything unrecognized.
///
/// ```
/// use log::{parse_level, Level};
/// assert_eq!(parse_level(Some("debug")), Level::Debug);
/// assert_eq!(parse_level(Some("nonsense")), Level::Info);
/// assert_eq!(parse_level(None), Level::Info);
/// ```
pub fn parse_level(name: Option<&str>) -> Level {
    name.and_then(|n| Level::from_str(n).ok())
        .unwrap_or(Level::Info)
}

/// Returns a logger that throws everything away.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}
