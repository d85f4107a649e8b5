//! Populating the tag tree from ingested records.
//!
//! Image sources don't build paths themselves: they ask the builder where a date, an event or a
//! tag lives, which keeps the root names and timestamp formats in one place.

use std::{path::PathBuf, sync::Arc};

use chrono::{DateTime, Local};

use crate::{
    config::Config,
    image::Image,
    tree::{sanitize_segment, segments, TagId, TagTree, TreeError},
};

#[derive(Debug)]
pub struct NamespaceBuilder<'c> {
    config: &'c Config,
    tree: TagTree,
}

impl<'c> NamespaceBuilder<'c> {
    /// Starts a new tree with an empty directory for every enabled root.
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            tree: TagTree::new(config.roots().enabled()),
        }
    }

    pub fn config(&self) -> &'c Config {
        self.config
    }

    pub fn tree(&self) -> &TagTree {
        &self.tree
    }

    /// Creates an image named according to the configured name format.
    pub fn image(
        &self,
        title: Option<String>,
        location: impl Into<PathBuf>,
        timestamp: DateTime<Local>,
        is_video: bool,
    ) -> Arc<Image> {
        Arc::new(Image::new(
            title,
            location,
            timestamp,
            is_video,
            self.config.name_format(),
        ))
    }

    /// The date bucket for `timestamp`, or `None` if dates are disabled.
    pub fn date_path(&self, timestamp: &DateTime<Local>) -> Option<String> {
        let root = self.config.roots().dates.as_deref()?;
        Some(format!(
            "/{root}/{}",
            self.config.date_format().format(timestamp)
        ))
    }

    /// The directory of the named event, or `None` if events are disabled.
    pub fn event_path(&self, name: &str) -> Option<String> {
        let root = self.config.roots().events.as_deref()?;
        Some(format!("/{root}/{}", sanitize_segment(name)))
    }

    /// The directory of a tag, or `None` if tags are disabled.
    ///
    /// Hierarchical tag names are already rooted (`"/Places/Home"`); their leading separator is
    /// dropped so that they nest directly below the tag root.  A name without any segments would
    /// be the tag root itself and is rejected.
    pub fn tag_path(&self, name: &str) -> Result<Option<String>, TreeError> {
        let Some(root) = self.config.roots().tags.as_deref() else {
            return Ok(None);
        };
        if segments(name).next().is_none() {
            return Err(TreeError::InvalidPath(name.to_string()));
        }
        let name = name.strip_prefix('/').unwrap_or(name);
        Ok(Some(format!("/{root}/{name}")))
    }

    /// See [`TagTree::make_tag()`].
    pub fn make_tag(&mut self, path: &str) -> Result<TagId, TreeError> {
        self.tree.make_tag(path)
    }

    /// See [`TagTree::add_image()`].
    pub fn add_image(&mut self, tag: TagId, image: Arc<Image>) -> Result<(), TreeError> {
        self.tree.add_image(tag, image)
    }

    /// Adds `image` to the tag at `path`, creating the tag if needed.
    pub fn add_image_at(&mut self, path: &str, image: Arc<Image>) -> Result<TagId, TreeError> {
        let tag = self.make_tag(path)?;
        self.add_image(tag, image)?;
        Ok(tag)
    }

    pub fn finish(self) -> TagTree {
        self.tree
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        config::{RootNames, DEFAULT_DATE_FORMAT, DEFAULT_NAME_FORMAT},
        tree::Entry,
    };

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2013, 7, 21, 18, 0, 1).unwrap()
    }

    #[test]
    fn test_paths() {
        let config = Config::default();
        let builder = NamespaceBuilder::new(&config);
        assert_eq!(
            builder.date_path(&timestamp()),
            Some("/Date/2013/07/21".into())
        );
        assert_eq!(builder.event_path("Trip").unwrap(), "/Event/Trip");
        assert_eq!(builder.event_path("A/B").unwrap(), "/Event/A_B");
        assert_eq!(
            builder.tag_path("/Places/Home").unwrap().unwrap(),
            "/Tags/Places/Home"
        );
        assert_eq!(builder.tag_path("Flat").unwrap().unwrap(), "/Tags/Flat");
    }

    #[test]
    fn test_empty_tag_name() {
        let config = Config::default();
        let builder = NamespaceBuilder::new(&config);
        for name in ["", "/", "//"] {
            assert_eq!(
                builder.tag_path(name).unwrap_err(),
                TreeError::InvalidPath(name.into())
            );
        }
        assert_eq!(builder.tag_path("/a//b").unwrap().unwrap(), "/Tags/a//b");
    }

    #[test]
    fn test_disabled_roots() {
        let roots = RootNames {
            tags: Some("Keywords".into()),
            dates: None,
            events: None,
        };
        let config = Config::new(roots, "%Y", DEFAULT_NAME_FORMAT).unwrap();
        let mut builder = NamespaceBuilder::new(&config);
        assert_eq!(builder.date_path(&timestamp()), None);
        assert_eq!(builder.event_path("Trip"), None);
        assert_eq!(builder.tag_path("x").unwrap().unwrap(), "/Keywords/x");
        assert_eq!(
            builder.make_tag("/Date/2013").unwrap_err(),
            TreeError::UnknownRoot("Date".into())
        );
    }

    #[test]
    fn test_add_image_at() {
        let config = Config::new(RootNames::default(), DEFAULT_DATE_FORMAT, "%H%M%S").unwrap();
        let mut builder = NamespaceBuilder::new(&config);
        let image = builder.image(None, "/p/a.jpg", timestamp(), false);
        assert_eq!(image.name(), "180001.jpg");

        let path = builder.date_path(image.timestamp()).unwrap();
        let tag = builder.add_image_at(&path, Arc::clone(&image)).unwrap();

        let tree = builder.finish();
        assert!(matches!(
            tree.tag(tag).get("180001.jpg"),
            Some(Entry::Image(i)) if Arc::ptr_eq(i, &image)
        ));
    }
}
