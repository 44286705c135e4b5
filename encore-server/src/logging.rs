use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter};

/// Sets up stdout logging. The encore crates log down to debug level,
/// dependencies only get through when something is wrong.
pub fn init_logger() {
    fern::Dispatch::new()
        .level(LevelFilter::Warn)
        .level_for("encore_core", LevelFilter::Debug)
        .level_for("encore_server", LevelFilter::Debug)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {:>5} {} {}",
                chrono::Local::now()
                    .format("%H:%M:%S")
                    .to_string()
                    .dimmed(),
                level_badge(record.level()),
                crate_tag(record.target()),
                message
            ))
        })
        .chain(std::io::stdout())
        .apply()
        .expect("logging is initialized")
}

fn level_badge(level: Level) -> ColoredString {
    match level {
        Level::Error => "error".red().bold(),
        Level::Warn => "warn".yellow().bold(),
        Level::Info => "info".green(),
        Level::Debug => "debug".cyan(),
        Level::Trace => "trace".normal(),
    }
}

/// Shortens a log target down to a recognizable crate tag
fn crate_tag(target: &str) -> ColoredString {
    let module = target.split("::").next().unwrap_or(target);

    match module {
        "encore_core" => "core".blue(),
        "encore_server" => "server".magenta(),
        other => other.dimmed(),
    }
}
