use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::{Local, NaiveDate};
use clap::Parser;
use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use diary_sync::buffer::{LineBuffer, TextBuffer};
use diary_sync::config::{Config, default_cache_dir};
use diary_sync::parser::diary_date;
use diary_sync::timestamp::{DATE_FORMAT, parse_date};
use diary_sync::{Command, Diary};

#[derive(Parser)]
#[command(name = "diary-sync")]
#[command(about = "Sync a markdown diary with Google Calendar and GitHub issues")]
struct Cli {
    /// Command to run, e.g. make_diary, grab_calendar, upload_issues
    #[arg(value_parser = Command::from_str)]
    command: Command,

    /// Diary file; defaults to <notes_path>/<date>.md
    file: Option<PathBuf>,

    /// Config file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Editor cursor as ROW:COL, rows counted from 1
    #[arg(long, value_parser = parse_cursor)]
    cursor: Option<(usize, usize)>,

    /// Diary day (YYYY-MM-DD); read from the file when omitted
    #[arg(long)]
    date: Option<String>,

    /// Invoked by the editor on opening a file; make_diary stays quiet
    #[arg(long)]
    auto: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

fn parse_cursor(value: &str) -> Result<(usize, usize), String> {
    let (row, column) = value
        .split_once(':')
        .ok_or_else(|| format!("expected ROW:COL, got {value}"))?;
    let row = row.trim().parse().map_err(|_| format!("bad row in {value}"))?;
    let column = column.trim().parse().map_err(|_| format!("bad column in {value}"))?;
    Ok((row, column))
}

fn init_logging(verbose: bool) {
    let dir = default_cache_dir();
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = File::options().create(true).append(true).open(dir.join("diary-sync.log")) else {
        return;
    };
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let config = ConfigBuilder::new().set_target_level(LevelFilter::Off).build();
    let _ = WriteLogger::init(level, config, file);
}

/// `--date`, else the diary's own title or metadata, else the file name, else today.
fn resolve_date(flag: Option<&str>, buffer: &LineBuffer, path: Option<&Path>) -> Result<NaiveDate> {
    if let Some(value) = flag {
        return parse_date(value).ok_or_else(|| anyhow!("Invalid --date {value}, expected YYYY-MM-DD"));
    }
    let from_file = path
        .and_then(|path| path.file_stem())
        .and_then(|stem| stem.to_str())
        .and_then(parse_date);
    Ok(diary_date(buffer.lines())
        .or(from_file)
        .unwrap_or_else(|| Local::now().date_naive()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };

    let (path, mut buffer) = match &cli.file {
        Some(path) => {
            let buffer = LineBuffer::load(path).with_context(|| format!("Failed to read {}", path.display()))?;
            (path.clone(), buffer)
        }
        None => {
            let date = resolve_date(cli.date.as_deref(), &LineBuffer::default(), None)?;
            let path = config.notes_path.join(format!("{}.md", date.format(DATE_FORMAT)));
            let buffer = LineBuffer::load(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            (path, buffer)
        }
    };
    if let Some((row, column)) = cli.cursor {
        buffer = buffer.with_cursor(row, column);
    }
    let date = resolve_date(cli.date.as_deref(), &buffer, Some(&path))?;

    let command = match cli.command {
        Command::MakeDiary { .. } => Command::MakeDiary { auto: cli.auto },
        other => other,
    };

    let diary = Diary::connect(config)?;
    let before = buffer.clone();
    let report = diary.run(command, &mut buffer, date)?;

    if buffer.lines() != before.lines() {
        buffer
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote {}", path.display());
    }

    for message in &report.messages {
        println!("{message}");
    }
    if buffer.cursor() != before.cursor() {
        let (row, column) = buffer.cursor();
        println!("cursor {row}:{column}");
    }
    Ok(())
}
