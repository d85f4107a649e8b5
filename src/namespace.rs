//! Path resolution, attributes and directory listings over a finished tag tree.

use std::sync::Arc;

use crate::{
    error::FsError,
    image::{Image, Stat},
    tree::{segments, Entry, TagId, TagTree},
};

/// What an absolute path resolves to.
#[derive(Debug, Clone)]
pub enum Node<'a> {
    /// The mount point itself, listing the enabled roots.
    Root,
    Tag(TagId),
    Image(&'a Arc<Image>),
}

impl Node<'_> {
    pub fn is_dir(&self) -> bool {
        !matches!(self, Node::Image(..))
    }
}

/// The read-only namespace served by the filesystem.
///
/// Once built, nothing in here changes, so it can be shared freely between threads.
#[derive(Debug)]
pub struct Namespace {
    tree: TagTree,
    dirstat: Stat,
}

impl Namespace {
    /// Wraps a finished tree.
    ///
    /// `dirstat` is reported for the mount root and for every tag, minus its write bits.  It is
    /// normally the stat of the mount point at mount time, so every directory shows the same
    /// timestamps.
    pub fn new(tree: TagTree, dirstat: &Stat) -> Self {
        Self {
            tree,
            dirstat: dirstat.read_only(),
        }
    }

    pub fn tree(&self) -> &TagTree {
        &self.tree
    }

    /// Resolves an absolute path.
    ///
    /// # Errors
    ///
    /// [`FsError::NotFound`] if the first segment is not an enabled root, if any later segment
    /// does not exist, or if the path descends into an image.
    pub fn locate(&self, path: &str) -> Result<Node<'_>, FsError> {
        let not_found = || FsError::NotFound(path.to_string());

        let mut parts = segments(path);
        let Some(root) = parts.next() else {
            return Ok(Node::Root);
        };

        let mut node = Node::Tag(self.tree.root(root).ok_or_else(not_found)?);
        for segment in parts {
            let Node::Tag(id) = node else {
                return Err(not_found());
            };
            node = match self.tree.tag(id).get(segment).ok_or_else(not_found)? {
                Entry::Tag(child) => Node::Tag(*child),
                Entry::Image(image) => Node::Image(image),
            };
        }

        Ok(node)
    }

    /// Returns the metadata presented for `node`.
    ///
    /// Images report the metadata of their file without write bits; directories report the
    /// shared directory stat.
    pub fn attributes(&self, node: &Node) -> Result<Stat, FsError> {
        match node {
            Node::Root | Node::Tag(..) => Ok(self.dirstat.clone()),
            Node::Image(image) => Ok(image.stat()?.read_only()),
        }
    }

    /// Lists the names in a directory: the enabled roots for the mount root, or the entries of a
    /// tag in ascending order.
    pub fn list_children(&self, node: &Node) -> Result<Vec<String>, FsError> {
        match node {
            Node::Root => Ok(self.tree.roots().map(|(name, _)| name.into()).collect()),
            Node::Tag(id) => Ok(self
                .tree
                .tag(*id)
                .entries()
                .map(|(name, _)| name.to_string())
                .collect()),
            Node::Image(image) => Err(FsError::NotFound(image.name().to_string())),
        }
    }
}
