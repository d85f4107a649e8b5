//! The file system operations, independent of the FUSE transport.
//!
//! Every operation takes an absolute path (or a handle id) and returns either a value or an
//! [`FsError`] that maps onto an errno.  The namespace is immutable, and the handle registry does
//! its own locking, so all operations take `&self` and may be called from any thread.

use std::path::Path;

use anyhow::Context;
use log::{debug, info, trace, warn};

use crate::{
    builder::NamespaceBuilder,
    config::Config,
    error::FsError,
    handles::{HandleId, HandleRegistry},
    image::Stat,
    namespace::{Namespace, Node},
    source::ImageSource,
};

#[derive(Debug)]
pub struct PhotoFs {
    namespace: Namespace,
    handles: HandleRegistry,
}

impl PhotoFs {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            handles: HandleRegistry::new(),
        }
    }

    /// Builds the namespace from `database` using `source`.
    ///
    /// Directories report the metadata of `mountpoint` as it is right now, minus write
    /// permissions.
    pub fn load(
        config: &Config,
        source: &dyn ImageSource,
        database: &Path,
        mountpoint: &Path,
    ) -> anyhow::Result<Self> {
        let dirstat = rustix::fs::lstat(mountpoint)
            .with_context(|| format!("Failed to initialise file system at {mountpoint:?}"))?;

        let mut builder = NamespaceBuilder::new(config);
        let report = source
            .load_tags(database, &mut builder)
            .with_context(|| format!("Failed to load {} database {database:?}", source.name()))?;

        for anomaly in &report.anomalies {
            warn!("Skipped {anomaly}");
        }
        info!(
            "Loaded {} images from {database:?} ({} records skipped)",
            report.images,
            report.anomalies.len()
        );

        let namespace = Namespace::new(builder.finish(), &Stat::from_raw(&dirstat));
        Ok(Self::new(namespace))
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn getattr(&self, path: &str) -> Result<Stat, FsError> {
        trace!("getattr({path:?})");
        let node = self.namespace.locate(path)?;
        self.namespace.attributes(&node)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        trace!("readdir({path:?})");
        let node = self.namespace.locate(path)?;
        self.namespace.list_children(&node)
    }

    /// Opens the image at `path`.  The file is always opened read-only, whatever `flags` say.
    pub fn open(&self, path: &str, flags: i32) -> Result<HandleId, FsError> {
        trace!("open({path:?}, {flags:#o})");
        let Node::Image(image) = self.namespace.locate(path)? else {
            return Err(FsError::InvalidArgument(format!("{path:?} is a directory")));
        };

        let file = image.open()?;
        let id = self.handles.insert(file);
        debug!("Opened {:?} as handle {id}", image.location());
        Ok(id)
    }

    pub fn read(&self, id: HandleId, size: usize, offset: u64) -> Result<Vec<u8>, FsError> {
        trace!("read({id}, {size}, {offset})");
        self.handles.read(id, size, offset)
    }

    pub fn release(&self, id: HandleId) -> Result<(), FsError> {
        self.handles.release(id)
    }

    /// Called when the file system is unmounted.  Nothing needs cleaning up.
    pub fn destroy(&self) {
        debug!("destroy(): {} handles still open", self.handles.len());
    }
}
