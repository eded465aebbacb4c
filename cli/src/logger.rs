use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;
use vaporwave_core::paths;

/// Colors that stay readable when dimmed
const TARGET_COLORS: &[fn(&str) -> ColoredString] = &[
    |s| s.green(),
    |s| s.yellow(),
    |s| s.blue(),
    |s| s.magenta(),
    |s| s.cyan(),
    |s| s.purple(),
];

pub struct VaporwaveLogger {
    max_level: LevelFilter,
    log_file: Mutex<Option<File>>,
    target_colors: Mutex<HashMap<String, usize>>,
}

impl VaporwaveLogger {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            max_level: level_filter(quiet, verbose),
            log_file: Mutex::new(open_log_file()),
            target_colors: Mutex::new(HashMap::new()),
        }
    }

    fn color_target(&self, target: &str) -> ColoredString {
        let index = match self.target_colors.lock() {
            Ok(mut colors) => {
                let next = colors.len() % TARGET_COLORS.len();
                *colors.entry(target.to_string()).or_insert(next)
            }
            Err(_) => 0,
        };
        TARGET_COLORS[index](target)
    }

    fn format_log(&self, record: &Record) -> String {
        let tag = level_tag(record.level());
        let target = short_target(record)
            .map(|t| format!("[{}] ", self.color_target(t).dimmed()))
            .unwrap_or_default();
        let message = format!("{} {}{}", tag, target, record.args());

        match record.level() {
            Level::Error => message.red().bold().to_string(),
            Level::Warn => message.yellow().bold().to_string(),
            level => {
                let colored_tag = match level {
                    Level::Info => tag.green().bold(),
                    Level::Debug => tag.blue().bold(),
                    _ => tag.white().bold(),
                };
                message.replacen(tag, &colored_tag.to_string(), 1)
            }
        }
    }

    fn format_log_plain(&self, record: &Record) -> String {
        let target = short_target(record)
            .map(|t| format!("[{}] ", t))
            .unwrap_or_default();
        format!("{} {}{}", level_tag(record.level()), target, record.args())
    }
}

impl Log for VaporwaveLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        println!("{}", self.format_log(record));

        if let Ok(mut file) = self.log_file.lock() {
            if let Some(file) = file.as_mut() {
                let _ = writeln!(file, "{}", self.format_log_plain(record));
                let _ = file.flush();
            }
        }
    }

    fn flush(&self) {}
}

pub fn init_logger(quiet: bool, verbose: bool) -> Result<(), log::SetLoggerError> {
    let logger = VaporwaveLogger::new(quiet, verbose);
    log::set_max_level(logger.max_level);
    log::set_boxed_logger(Box::new(logger))
}

fn level_filter(quiet: bool, verbose: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Info
    } else if verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[E]",
        Level::Warn => "[W]",
        Level::Info => "[I]",
        Level::Debug => "[D]",
        Level::Trace => "[T]",
    }
}

/// Last path segment of the record's module target, e.g. `reconcile` for `vaporwave_core::reconcile`.
fn short_target<'a>(record: &'a Record) -> Option<&'a str> {
    let target = record.target();
    if target.is_empty() {
        return None;
    }
    target.rsplit("::").next()
}

fn open_log_file() -> Option<File> {
    paths::ensure_data_dir()?;
    let path = paths::log_file_path()?;
    match OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
    {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file at {}: {}", path.display(), e);
            None
        }
    }
}
