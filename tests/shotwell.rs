//! Mounting a Shotwell library, minus the kernel.

use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use rusqlite::{params, Connection};

use photofs::{
    config::{RootNames, DEFAULT_DATE_FORMAT, DEFAULT_NAME_FORMAT},
    source::{self, SourceError},
    Config, FsError, PhotoFs,
};

struct Library {
    dir: tempfile::TempDir,
    db: PathBuf,
}

impl Library {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("photo.db");
        Connection::open(&db)
            .unwrap()
            .execute_batch(
                "CREATE TABLE EventTable (id INTEGER PRIMARY KEY, name TEXT);
                 CREATE TABLE PhotoTable (id INTEGER PRIMARY KEY, filename TEXT NOT NULL,
                                          exposure_time INTEGER, title TEXT, event_id INTEGER);
                 CREATE TABLE VideoTable (id INTEGER PRIMARY KEY, filename TEXT NOT NULL,
                                          exposure_time INTEGER, title TEXT, event_id INTEGER);
                 CREATE TABLE TagTable (id INTEGER PRIMARY KEY, name TEXT NOT NULL,
                                        photo_id_list TEXT);",
            )
            .unwrap();
        Self { dir, db }
    }

    fn connection(&self) -> Connection {
        Connection::open(&self.db).unwrap()
    }

    fn event(&self, id: i64, name: Option<&str>) -> &Self {
        self.connection()
            .execute("INSERT INTO EventTable VALUES (?1, ?2)", params![id, name])
            .unwrap();
        self
    }

    /// Creates `file` next to the database and records it in `table`.
    fn media(&self, table: &str, id: i64, file: &str, taken: Option<i64>, event: Option<i64>) {
        let path = self.dir.path().join(file);
        std::fs::write(&path, format!("contents of {file}")).unwrap();
        let sql = format!(
            "INSERT INTO {table} (id, filename, exposure_time, event_id) VALUES (?1, ?2, ?3, ?4)"
        );
        self.connection()
            .execute(&sql, params![id, path.to_str().unwrap(), taken, event])
            .unwrap();
    }

    fn photo(&self, id: i64, file: &str, taken: Option<i64>, event: Option<i64>) -> &Self {
        self.media("PhotoTable", id, file, taken, event);
        self
    }

    fn video(&self, id: i64, file: &str, taken: Option<i64>, event: Option<i64>) -> &Self {
        self.media("VideoTable", id, file, taken, event);
        self
    }

    fn title(&self, photo: i64, title: &str) -> &Self {
        self.connection()
            .execute(
                "UPDATE PhotoTable SET title = ?2 WHERE id = ?1",
                params![photo, title],
            )
            .unwrap();
        self
    }

    fn tag(&self, name: &str, members: &str) -> &Self {
        self.insert_tag(name, Some(members))
    }

    fn tag_without_list(&self, name: &str) -> &Self {
        self.insert_tag(name, None)
    }

    fn insert_tag(&self, name: &str, members: Option<&str>) -> &Self {
        self.connection()
            .execute(
                "INSERT INTO TagTable (name, photo_id_list) VALUES (?1, ?2)",
                params![name, members],
            )
            .unwrap();
        self
    }

    fn mount(&self, config: &Config) -> PhotoFs {
        let source = source::get("shotwell").unwrap();
        PhotoFs::load(config, source, &self.db, self.dir.path()).unwrap()
    }
}

/// Seconds since the epoch of a local time.
fn taken(y: i32, m: u32, d: u32, h: u32) -> Option<i64> {
    let time = Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap();
    Some(time.timestamp())
}

fn library() -> Library {
    let library = Library::new();
    library
        .event(1, Some("Wedding"))
        .event(2, Some(""))
        .event(3, None)
        .event(4, Some("Trip/Alps"))
        .photo(1, "IMG_0001.JPG", taken(2013, 6, 1, 14), Some(1))
        .photo(2, "IMG_0002.JPG", taken(2013, 6, 1, 15), Some(1))
        .title(2, "Cake")
        .photo(3, "IMG_0003.JPG", taken(2014, 2, 9, 9), Some(4))
        .photo(4, "IMG_0004.JPG", None, None)
        .photo(5, "IMG_0005.JPG", taken(2014, 2, 10, 9), Some(2))
        .video(1, "MOV_0001.MP4", taken(2013, 6, 1, 16), Some(1))
        .tag("Family", "1,thumb0000000000000002,")
        .tag("/People", "thumb0000000000000001,video-0000000000000001,")
        .tag("/People/Alice", "1,thumb0000000000000063,")
        .tag("/Places", "thumb0000000000000003,")
        .tag("Unused", "")
        .tag_without_list("Null")
        .tag("Ghosts", "42,video-00000000000000ff,sound-01,");
    library
}

#[test]
fn test_roots() {
    let library = library();
    let fs = library.mount(&Config::default());
    assert_eq!(fs.readdir("/").unwrap(), vec!["Tags", "Date", "Event"]);
}

#[test]
fn test_events() {
    let library = library();
    let fs = library.mount(&Config::default());

    // unnamed events don't get a directory; slashes in names don't make one more level
    assert_eq!(fs.readdir("/Event").unwrap(), vec!["Trip_Alps", "Wedding"]);
    assert_eq!(
        fs.readdir("/Event/Wedding").unwrap(),
        vec![
            "20130601-140000.JPG",
            "20130601-150000 (Cake).JPG",
            "20130601-160000.MP4",
        ]
    );
    assert_eq!(
        fs.readdir("/Event/Trip_Alps").unwrap(),
        vec!["20140209-090000.JPG"]
    );
}

#[test]
fn test_dates() {
    let library = library();
    let fs = library.mount(&Config::default());

    assert_eq!(fs.readdir("/Date").unwrap(), vec!["2013", "2014"]);
    assert_eq!(fs.readdir("/Date/2014/02").unwrap(), vec!["09", "10"]);
    assert_eq!(
        fs.readdir("/Date/2013/06/01").unwrap(),
        vec![
            "20130601-140000.JPG",
            "20130601-150000 (Cake).JPG",
            "20130601-160000.MP4",
        ]
    );
}

#[test]
fn test_date_format() {
    let library = library();
    let config = Config::new(RootNames::default(), "%Y-%m", "%d_%H").unwrap();
    let fs = library.mount(&config);

    assert_eq!(fs.readdir("/Date").unwrap(), vec!["2013-06", "2014-02"]);
    assert_eq!(
        fs.readdir("/Date/2013-06").unwrap(),
        vec!["01_14.JPG", "01_15 (Cake).JPG", "01_16.MP4"]
    );
}

#[test]
fn test_tags() {
    let library = library();
    let fs = library.mount(&Config::default());

    // unused tags and tags referring only to unknown media still leave the others intact
    assert_eq!(
        fs.readdir("/Tags").unwrap(),
        vec!["Family", "Ghosts", "People", "Places"]
    );
    assert_eq!(fs.readdir("/Tags/Ghosts").unwrap(), Vec::<String>::new());

    // legacy and current references
    assert_eq!(
        fs.readdir("/Tags/Family").unwrap(),
        vec!["20130601-140000.JPG", "20130601-150000 (Cake).JPG"]
    );

    // photo 1 moved down to Alice, the video stays with People
    assert_eq!(
        fs.readdir("/Tags/People").unwrap(),
        vec!["20130601-160000.MP4", "Alice"]
    );
    assert_eq!(
        fs.readdir("/Tags/People/Alice").unwrap(),
        vec!["20130601-140000.JPG"]
    );
    assert_eq!(
        fs.readdir("/Tags/Places").unwrap(),
        vec!["20140209-090000.JPG"]
    );
}

#[test]
fn test_disabled_roots() {
    let library = library();
    let roots = RootNames {
        tags: None,
        dates: None,
        events: Some("Occasions".into()),
    };
    let config = Config::new(roots, DEFAULT_DATE_FORMAT, DEFAULT_NAME_FORMAT).unwrap();
    let fs = library.mount(&config);

    assert_eq!(fs.readdir("/").unwrap(), vec!["Occasions"]);
    assert!(matches!(fs.readdir("/Tags"), Err(FsError::NotFound(..))));
    assert_eq!(
        fs.readdir("/Occasions").unwrap(),
        vec!["Trip_Alps", "Wedding"]
    );
}

#[test]
fn test_read_through_tags() {
    let library = library();
    let fs = library.mount(&Config::default());

    let fh = fs
        .open("/Tags/Family/20130601-150000 (Cake).JPG", read_only())
        .unwrap();
    assert_eq!(
        fs.read(fh, 1024, 0).unwrap(),
        b"contents of IMG_0002.JPG".to_vec()
    );
    assert_eq!(fs.read(fh, 4, 12).unwrap(), b"IMG_".to_vec());
    fs.release(fh).unwrap();

    let stat = fs.getattr("/Event/Wedding/20130601-160000.MP4").unwrap();
    assert_eq!(stat.st_size, "contents of MOV_0001.MP4".len() as u64);
}

fn read_only() -> i32 {
    rustix::fs::OFlags::RDONLY.bits() as i32
}

#[test]
fn test_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let source = source::get("shotwell").unwrap();
    let err = PhotoFs::load(
        &Config::default(),
        source,
        Path::new("/nonexistent/photo.db"),
        dir.path(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("shotwell"));
    assert!(matches!(
        err.downcast_ref::<SourceError>(),
        Some(SourceError::Open { .. })
    ));
}
