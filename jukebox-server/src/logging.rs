use std::fmt::Display;

use colored::Colorize;
use log::{Level, LevelFilter, SetLoggerError};

/// Crates logged at the configured level, everything else only logs warnings and errors
const LOCAL_TARGETS: [&str; 3] = ["jukebox_core", "jukebox_collab", "jukebox_server"];

pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                Target::from_str(record.target()),
                message
            ))
        })
        .level(LevelFilter::Warn);

    LOCAL_TARGETS
        .iter()
        .fold(dispatch, |dispatch, target| dispatch.level_for(*target, level))
        .chain(std::io::stdout())
        .apply()
}

enum Target {
    External(String),
    Server,
    Collab,
    Core,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let module = str.split("::").next().unwrap_or_default();

        match module {
            "jukebox_core" => Self::Core,
            "jukebox_server" => Self::Server,
            "jukebox_collab" => Self::Collab,
            other => Target::External(other.to_string()),
        }
    }

}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Server => "SERVER".bright_green(),
            Target::Collab => "COLLAB".bright_purple(),
            Target::Core => "CORE".blue(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}
