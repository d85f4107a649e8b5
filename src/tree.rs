//! The tag tree.
//!
//! Tags (directories) live in an arena owned by [`TagTree`] and refer to each other by
//! [`TagId`].  Ownership is strictly top-down: a tag's entries map names to sub-tags or images,
//! and the link back to the parent is only an index, so the whole tree is torn down by dropping
//! the arena.
//!
//! The top level of the arena is a fixed set of named roots (tags, dates, events).  Every tag
//! path starts with one of those names.

use std::{collections::BTreeMap, sync::Arc};

use log::trace;
use thiserror::Error;

use crate::image::Image;

/// Index of a tag in its [`TagTree`].  Only meaningful for the tree that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(usize);

/// A named child of a tag.
#[derive(Debug, Clone)]
pub enum Entry {
    Tag(TagId),
    Image(Arc<Image>),
}

/// A directory in the namespace.
#[derive(Debug, Default)]
pub struct Tag {
    parent: Option<TagId>,
    entries: BTreeMap<String, Entry>,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TreeError {
    #[error("Invalid tag path {0:?}")]
    InvalidPath(String),
    #[error("Root directory {0:?} does not exist")]
    UnknownRoot(String),
    #[error("Directory entry {0:?} is not a tag")]
    NotADirectory(String),
    #[error("Directory entry {0:?} is a tag")]
    IsADirectory(String),
}

/// Splits an absolute path into its non-empty segments.
pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Makes `name` usable as a single path segment by replacing separators.
pub fn sanitize_segment(name: &str) -> String {
    name.replace('/', "_")
}

impl Tag {
    pub fn parent(&self) -> Option<TagId> {
        self.parent
    }

    /// Looks up a direct child by name.
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Iterates over all entries in ascending order of name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over the images directly contained in this tag.
    pub fn images(&self) -> impl Iterator<Item = &Arc<Image>> {
        self.entries.values().filter_map(|entry| match entry {
            Entry::Image(image) => Some(image),
            Entry::Tag(..) => None,
        })
    }

    /// Checks whether `image` (by identity) is a direct child of this tag.
    pub fn contains(&self, image: &Image) -> bool {
        self.images().any(|other| **other == *image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct TagTree {
    tags: Vec<Tag>,
    roots: Vec<(String, TagId)>,
}

impl TagTree {
    /// Creates a tree with one empty root tag for each of the given names.
    pub fn new<'a>(roots: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tree = Self {
            tags: vec![],
            roots: vec![],
        };
        for name in roots {
            let id = tree.push(None);
            tree.roots.push((name.to_string(), id));
        }
        tree
    }

    fn push(&mut self, parent: Option<TagId>) -> TagId {
        let id = TagId(self.tags.len());
        self.tags.push(Tag {
            parent,
            entries: BTreeMap::new(),
        });
        id
    }

    /// Iterates over the roots, in the order they were configured.
    pub fn roots(&self) -> impl Iterator<Item = (&str, TagId)> {
        self.roots.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Finds the root with the given name.
    pub fn root(&self, name: &str) -> Option<TagId> {
        self.roots()
            .find_map(|(root, id)| (root == name).then_some(id))
    }

    /// Gets the tag with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` was produced by a different tree.
    pub fn tag(&self, id: TagId) -> &Tag {
        &self.tags[id.0]
    }

    /// Iterates over the strict ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: TagId) -> impl Iterator<Item = TagId> + '_ {
        std::iter::successors(self.tag(id).parent, |id| self.tag(*id).parent)
    }

    /// Resolves an absolute tag path, creating every missing tag along the way.
    ///
    /// The first segment names the root; `"/Tags/People/Alice"` descends from the `Tags` root.
    /// Calling this twice with the same path returns the same tag.
    ///
    /// # Errors
    ///
    /// Fails if the path is empty or contains `.` or `..`, if the root does not exist, or if an
    /// intermediate segment names an image.
    pub fn make_tag(&mut self, path: &str) -> Result<TagId, TreeError> {
        let mut parts = segments(path);
        let Some(root) = parts.next() else {
            return Err(TreeError::InvalidPath(path.to_string()));
        };
        let mut current = self
            .root(root)
            .ok_or_else(|| TreeError::UnknownRoot(root.to_string()))?;

        for segment in parts {
            if segment == "." || segment == ".." {
                return Err(TreeError::InvalidPath(path.to_string()));
            }

            current = match self.tags[current.0].entries.get(segment) {
                Some(Entry::Tag(id)) => *id,
                Some(Entry::Image(..)) => return Err(TreeError::NotADirectory(segment.into())),
                None => {
                    let id = self.push(Some(current));
                    self.tags[current.0]
                        .entries
                        .insert(segment.to_string(), Entry::Tag(id));
                    trace!("created tag {segment:?} in {current:?}");
                    id
                }
            };
        }

        Ok(current)
    }

    /// Adds `image` to `tag` under the image's name.
    ///
    /// The image is first removed from every strict ancestor of `tag`: a deeper tag supersedes
    /// its parents, so an image is only listed at the most specific level of a lineage.  Other
    /// lineages (sibling tags, other roots) are not touched.
    ///
    /// An existing image of the same name is replaced.
    ///
    /// # Errors
    ///
    /// Fails without modifying anything if `tag` already has a sub-tag of that name.
    pub fn add_image(&mut self, tag: TagId, image: Arc<Image>) -> Result<(), TreeError> {
        let name = image.name().to_string();
        if let Some(Entry::Tag(..)) = self.tag(tag).get(&name) {
            return Err(TreeError::IsADirectory(name));
        }

        let mut ancestor = self.tag(tag).parent;
        while let Some(id) = ancestor {
            let parent = &mut self.tags[id.0];
            parent
                .entries
                .retain(|_, entry| !matches!(entry, Entry::Image(other) if **other == *image));
            ancestor = parent.parent;
        }

        trace!("adding {name:?} to {tag:?}");
        self.tags[tag.0].entries.insert(name, Entry::Image(image));
        Ok(())
    }
}
