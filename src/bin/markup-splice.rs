//! Post-process a generated site: size images and wrap post images in figures.
//!
//! Usage:
//!   markup-splice [OPTIONS] [PATHS...]
//!
//! With no paths, every `.html` file below `--root` is rewritten in place.

use std::path::PathBuf;
use std::process::ExitCode;

use log::{Level, LevelFilter, Log, Metadata, Record};
use markup_splice::{Mode, PassReport, Pipeline, Selector, SiteConfig, SiteError};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        eprintln!("[{}] {}: {}", tag, record.target(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn usage() {
    eprintln!("Usage: markup-splice [OPTIONS] [PATHS...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --root <DIR>          Generated site root (default: deploy)");
    eprintln!("  --media-url <URL>     URL prefix of media files (default: /media/)");
    eprintln!("  --media-root <DIR>    Directory the media URL maps to (default: <root>/media)");
    eprintln!("  --mode <MODE>         Site mode; modes starting with 'dev' skip sizing");
    eprintln!("  --selector <SEL>      Elements to wrap in figures (default: .post img)");
    eprintln!("  --no-sizer            Do not add width/height attributes");
    eprintln!("  --no-figure           Do not wrap images in figures");
    eprintln!("  --dry-run             Report pages that would change, write nothing");
    eprintln!("  -v, --verbose         Debug logging");
    eprintln!("  -q, --quiet           Errors only");
    eprintln!();
    eprintln!("PATHS may be files or directories; with none, the whole root is processed.");
}

fn value(args: &[String], i: usize, flag: &str) -> Result<String, ExitCode> {
    args.get(i).cloned().ok_or_else(|| {
        eprintln!("Missing value for {}", flag);
        usage();
        ExitCode::from(2)
    })
}

fn parse_args(args: &[String]) -> Result<(SiteConfig, Vec<PathBuf>, LevelFilter), ExitCode> {
    let mut config = SiteConfig::default();
    let mut media_root = None;
    let mut paths = Vec::new();
    let mut level = LevelFilter::Info;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--root" => {
                i += 1;
                config.root = PathBuf::from(value(args, i, "--root")?);
            }
            "--media-url" => {
                i += 1;
                config.media_url = value(args, i, "--media-url")?;
            }
            "--media-root" => {
                i += 1;
                media_root = Some(PathBuf::from(value(args, i, "--media-root")?));
            }
            "--mode" => {
                i += 1;
                config.mode = Mode::parse(&value(args, i, "--mode")?);
            }
            "--selector" => {
                i += 1;
                config.figure_selector = Selector::parse(&value(args, i, "--selector")?);
            }
            "--no-sizer" => config.sizer = false,
            "--no-figure" => config.figure = false,
            "--dry-run" => config.dry_run = true,
            "--verbose" | "-v" => level = LevelFilter::Debug,
            "--quiet" | "-q" => level = LevelFilter::Error,
            "--help" | "-h" => {
                usage();
                return Err(ExitCode::SUCCESS);
            }
            other if other.starts_with("--") => {
                eprintln!("Unknown option: {}", other);
                usage();
                return Err(ExitCode::from(2));
            }
            other => paths.push(PathBuf::from(other)),
        }
        i += 1;
    }

    config.media_root = media_root;
    Ok((config, paths, level))
}

fn run(config: &SiteConfig, paths: &[PathBuf]) -> Result<PassReport, SiteError> {
    let mut pipeline = Pipeline::from_config(config);
    if paths.is_empty() {
        return pipeline.rewrite_tree(&config.root);
    }
    let mut total = PassReport::default();
    pipeline.begin_pass();
    for path in paths {
        if path.is_dir() {
            let report = pipeline.rewrite_dir(path)?;
            total.pages += report.pages;
            total.changed += report.changed;
            total.skipped += report.skipped;
        } else {
            total.pages += 1;
            if pipeline.rewrite_file(path)? {
                total.changed += 1;
            }
        }
    }
    Ok(total)
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, paths, level) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(code) => return code,
    };

    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
    log::debug!("Mode {}, root {}", config.mode, config.root.display());

    match run(&config, &paths) {
        Ok(report) => {
            let verb = if config.dry_run { "would change" } else { "changed" };
            eprintln!(
                "{} page(s) processed, {} {}, {} skipped",
                report.pages, report.changed, verb, report.skipped
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
