//! Mounts a photo library as a read-only file system.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, LevelFilter};

use photofs::{
    config::{RootNames, DEFAULT_DATE_FORMAT, DEFAULT_NAME_FORMAT},
    fuse, source, Config, PhotoFs,
};

/// photofs
#[derive(Debug, Parser)]
#[clap(name = "photofs", version)]
pub struct App {
    /// Where to mount the file system
    mountpoint: PathBuf,

    /// The image source to load
    #[clap(long, default_value = "shotwell")]
    source: String,
    /// The database to load instead of the source's default
    #[clap(long)]
    database: Option<PathBuf>,

    /// Name of the directory holding the tags
    #[clap(
        long,
        value_name = "NAME",
        default_value = "Tags",
        conflicts_with = "no_tag"
    )]
    tag_path: String,
    /// Don't show tags
    #[clap(long)]
    no_tag: bool,
    /// Name of the directory holding the dates
    #[clap(
        long,
        value_name = "NAME",
        default_value = "Date",
        conflicts_with = "no_date"
    )]
    date_path: String,
    /// Don't show dates
    #[clap(long)]
    no_date: bool,
    /// Name of the directory holding the events
    #[clap(
        long,
        value_name = "NAME",
        default_value = "Event",
        conflicts_with = "no_event"
    )]
    event_path: String,
    /// Don't show events
    #[clap(long)]
    no_event: bool,

    /// strftime format of the date directories; '/' creates nested directories
    #[clap(long, value_name = "FMT", default_value = DEFAULT_DATE_FORMAT)]
    date_format: String,
    /// strftime format of the image file names
    #[clap(long, value_name = "FMT", default_value = DEFAULT_NAME_FORMAT)]
    name_format: String,

    /// Mount options, passed on to FUSE
    #[clap(short = 'o', value_name = "OPT[,OPT...]")]
    options: Vec<String>,
    /// Stay in the foreground
    #[clap(short, long)]
    foreground: bool,
    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

impl App {
    fn roots(&self) -> RootNames {
        let enabled = |disabled: bool, name: &str| (!disabled).then(|| name.to_string());
        RootNames {
            tags: enabled(self.no_tag, &self.tag_path),
            dates: enabled(self.no_date, &self.date_path),
            events: enabled(self.no_event, &self.event_path),
        }
    }
}

/// `--debug` raises the log level to debug unless `RUST_LOG` already asks for more.
fn debug_level(debug: bool, from_env: LevelFilter) -> Option<LevelFilter> {
    (debug && from_env < LevelFilter::Debug).then_some(LevelFilter::Debug)
}

fn main() -> Result<()> {
    let args = App::parse();

    let mut logger = env_logger::Builder::from_default_env();
    let from_env = env_logger::Builder::from_default_env().build().filter();
    if let Some(level) = debug_level(args.debug, from_env) {
        logger.filter_level(level);
    }
    logger.init();

    let config = Config::new(args.roots(), &args.date_format, &args.name_format)?;

    let source = source::get(&args.source).with_context(|| {
        format!(
            "Available sources: {}",
            source::names().collect::<Vec<_>>().join(", ")
        )
    })?;
    let database = match args.database {
        Some(database) => database,
        None => source
            .default_location()
            .ok_or(source::SourceError::NoDatabase(source.name()))?,
    };

    let fs = PhotoFs::load(&config, source, &database, &args.mountpoint)?;

    if !args.foreground {
        debug!(
            "No daemon mode; serving {:?} in the foreground",
            args.mountpoint
        );
    }
    fuse::mount(fs, &args.mountpoint, &fuse::mount_options(&args.options))
}
