//! Shotwell photo libraries.
//!
//! Shotwell keeps its catalogue in an SQLite database:
//!
//! - `EventTable(id, name)`: named events
//! - `PhotoTable` and `VideoTable(id, filename, exposure_time, title, event_id)`: the media, with
//!   the capture time in seconds since the epoch
//! - `TagTable(name, photo_id_list)`: tags; hierarchical tag names start with `/`, and the id
//!   list is a comma separated (and comma terminated) list of references to media rows
//!
//! Media references in the tag table come in two flavours: a plain decimal number is a legacy
//! reference to a photo, anything else is a table prefix (`thumb` or `video-`) followed by the
//! row id in hexadecimal.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::{DateTime, Local, TimeZone};
use log::{debug, trace};
use rusqlite::{Connection, OpenFlags, Row};

use super::{find_data_file, ImageSource, IngestReport, SourceError};
use crate::{builder::NamespaceBuilder, image::Image, tree::TagId};

/// Relative to the XDG data directories.
const DATABASE: &str = "shotwell/data/photo.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    const ALL: [MediaKind; 2] = [MediaKind::Photo, MediaKind::Video];

    fn table(self) -> &'static str {
        match self {
            MediaKind::Photo => "PhotoTable",
            MediaKind::Video => "VideoTable",
        }
    }

    /// How references to this table are spelled in `TagTable.photo_id_list`.
    fn prefix(self) -> &'static str {
        match self {
            MediaKind::Photo => "thumb",
            MediaKind::Video => "video-",
        }
    }

    fn is_video(self) -> bool {
        self == MediaKind::Video
    }
}

/// Parses one entry of `TagTable.photo_id_list`.
fn parse_reference(reference: &str) -> Option<(MediaKind, i64)> {
    if reference.starts_with(|c: char| c.is_ascii_digit()) {
        return reference.parse().ok().map(|id| (MediaKind::Photo, id));
    }

    MediaKind::ALL.into_iter().find_map(|kind| {
        let id = reference.strip_prefix(kind.prefix())?;
        i64::from_str_radix(id, 16).ok().map(|id| (kind, id))
    })
}

fn timestamp(exposure_time: Option<i64>) -> Result<DateTime<Local>, &'static str> {
    let seconds = exposure_time.ok_or("no exposure time")?;
    Local
        .timestamp_opt(seconds, 0)
        .single()
        .ok_or("exposure time out of range")
}

/// One row of `PhotoTable` or `VideoTable`.
struct MediaRow {
    filename: PathBuf,
    exposure_time: Option<i64>,
    title: Option<String>,
    event_id: Option<i64>,
}

impl MediaRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            filename: PathBuf::from(row.get::<_, String>(1)?),
            exposure_time: row.get(2)?,
            title: row.get(3)?,
            event_id: row.get(4)?,
        })
    }
}

/// Everything loaded so far, by table and row id.
type Media = HashMap<(MediaKind, i64), Arc<Image>>;

#[derive(Debug)]
pub struct Shotwell;

impl Shotwell {
    fn open(database: &Path) -> Result<Connection, SourceError> {
        Connection::open_with_flags(
            database,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| SourceError::Open {
            path: database.to_path_buf(),
            source,
        })
    }

    /// Creates a tag for every named event.  Returns the tags by event id.
    fn load_events(
        db: &Connection,
        builder: &mut NamespaceBuilder,
        report: &mut IngestReport,
    ) -> Result<HashMap<i64, TagId>, SourceError> {
        let mut events = HashMap::new();
        let mut stmt =
            db.prepare("SELECT id, name FROM EventTable WHERE name != '' AND name IS NOT NULL")?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let name: String = match row.get(1) {
                Ok(name) => name,
                Err(err) => {
                    report.skip(format!("EventTable:{id}"), err);
                    continue;
                }
            };
            let Some(path) = builder.event_path(&name) else {
                break;
            };
            match builder.make_tag(&path) {
                Ok(tag) => {
                    trace!("Event {name:?} (id={id})");
                    events.insert(id, tag);
                }
                Err(err) => report.skip(format!("EventTable:{id}"), err),
            }
        }

        debug!("Loaded {} events", events.len());
        Ok(events)
    }

    /// Creates an image for every row of `kind`'s table and files it under its event and its
    /// date.
    fn load_media(
        db: &Connection,
        kind: MediaKind,
        events: &HashMap<i64, TagId>,
        builder: &mut NamespaceBuilder,
        media: &mut Media,
        report: &mut IngestReport,
    ) -> Result<(), SourceError> {
        let table = kind.table();
        let mut stmt = db.prepare(&format!(
            "SELECT id, filename, exposure_time, title, event_id FROM {table}"
        ))?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let record = format!("{table}:{id}");

            let row = match MediaRow::from_row(row) {
                Ok(row) => row,
                Err(err) => {
                    report.skip(record, err);
                    continue;
                }
            };
            let timestamp = match timestamp(row.exposure_time) {
                Ok(timestamp) => timestamp,
                Err(reason) => {
                    report.skip(record, reason);
                    continue;
                }
            };

            let image = builder.image(row.title, row.filename, timestamp, kind.is_video());

            if let Some(tag) = row.event_id.and_then(|event| events.get(&event)) {
                if let Err(err) = builder.add_image(*tag, Arc::clone(&image)) {
                    report.skip(record.clone(), err);
                }
            }
            if let Some(path) = builder.date_path(&timestamp) {
                if let Err(err) = builder.add_image_at(&path, Arc::clone(&image)) {
                    report.skip(record.clone(), err);
                }
            }

            media.insert((kind, id), image);
            report.images += 1;
        }

        Ok(())
    }

    /// Files the tagged media under their tags, in ascending tag name order.
    fn load_tag_members(
        db: &Connection,
        builder: &mut NamespaceBuilder,
        media: &Media,
        report: &mut IngestReport,
    ) -> Result<(), SourceError> {
        let mut stmt = db.prepare("SELECT id, name, photo_id_list FROM TagTable ORDER BY name")?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let record = format!("TagTable:{id}");

            let (name, members): (String, Option<String>) = match (row.get(1), row.get(2)) {
                (Ok(name), Ok(members)) => (name, members),
                (Err(err), _) | (_, Err(err)) => {
                    report.skip(record, err);
                    continue;
                }
            };
            let Some(members) = members.filter(|m| !m.is_empty()) else {
                debug!("Ignoring unused tag {name:?}");
                continue;
            };

            let path = match builder.tag_path(&name) {
                Ok(Some(path)) => path,
                Ok(None) => break,
                Err(err) => {
                    report.skip(record, err);
                    continue;
                }
            };
            let tag = match builder.make_tag(&path) {
                Ok(tag) => tag,
                Err(err) => {
                    report.skip(record, err);
                    continue;
                }
            };

            for reference in members.split(',').filter(|r| !r.is_empty()) {
                let image = parse_reference(reference).and_then(|key| media.get(&key));
                let Some(image) = image else {
                    debug!("Tag {name:?} references unknown media {reference:?}");
                    continue;
                };
                if let Err(err) = builder.add_image(tag, Arc::clone(image)) {
                    report.skip(format!("{record}:{reference}"), err);
                }
            }
        }

        Ok(())
    }
}

impl ImageSource for Shotwell {
    fn name(&self) -> &'static str {
        "shotwell"
    }

    fn default_location(&self) -> Option<PathBuf> {
        find_data_file(DATABASE)
    }

    fn load_tags(
        &self,
        database: &Path,
        builder: &mut NamespaceBuilder,
    ) -> Result<IngestReport, SourceError> {
        debug!("Loading Shotwell database {database:?}");
        let db = Self::open(database)?;
        let mut report = IngestReport::default();

        let events = if builder.config().roots().events.is_some() {
            Self::load_events(&db, builder, &mut report)?
        } else {
            HashMap::new()
        };

        let mut media = Media::new();
        for kind in MediaKind::ALL {
            Self::load_media(&db, kind, &events, builder, &mut media, &mut report)?;
        }

        if builder.config().roots().tags.is_some() {
            Self::load_tag_members(&db, builder, &media, &mut report)?;
        }

        Ok(report)
    }
}
