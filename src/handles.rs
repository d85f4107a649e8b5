//! The table of open files.
//!
//! Every `open()` of an image puts the open file into the registry and hands out a handle id;
//! `read()` and `release()` look it up again.  Callbacks can arrive from several threads at
//! once, so there are two levels of locking:
//!
//! - the table lock covers id allocation, insertion and removal, and is only held for as long as
//!   it takes to find an entry;
//! - each handle has its own lock covering the file offset and the I/O on it, so concurrent
//!   reads of the same handle are serialized while reads of different handles are not.

use std::{
    collections::HashMap,
    fs::File,
    io::{Seek, SeekFrom},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::trace;

use crate::{error::FsError, util::read_upto};

pub type HandleId = u64;

#[derive(Debug)]
struct OpenFile {
    /// `None` once the handle has been released.
    file: Option<File>,
    /// Where the next read would start, or `None` if unknown (after an error).
    position: Option<u64>,
}

#[derive(Debug)]
struct Handle {
    state: Mutex<OpenFile>,
}

impl Handle {
    fn lock(&self) -> MutexGuard<'_, OpenFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct Table {
    next_id: HandleId,
    handles: HashMap<HandleId, Arc<Handle>>,
}

impl Table {
    /// Picks an id that is not currently in use.  Zero is never handed out.
    fn allocate(&mut self) -> HandleId {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if id != 0 && !self.handles.contains_key(&id) {
                return id;
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct HandleRegistry {
    table: Mutex<Table>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, id: HandleId) -> Result<Arc<Handle>, FsError> {
        self.table()
            .handles
            .get(&id)
            .cloned()
            .ok_or_else(|| FsError::InvalidArgument(format!("unknown file handle {id}")))
    }

    /// Takes ownership of an open file and returns its new handle id.
    pub fn insert(&self, file: File) -> HandleId {
        let handle = Arc::new(Handle {
            state: Mutex::new(OpenFile {
                file: Some(file),
                position: Some(0),
            }),
        });

        let mut table = self.table();
        let id = table.allocate();
        table.handles.insert(id, handle);
        trace!("insert({id})");
        id
    }

    /// Reads up to `size` bytes starting at `offset`.
    ///
    /// Fewer bytes than requested are only returned at the end of the file.
    pub fn read(&self, id: HandleId, size: usize, offset: u64) -> Result<Vec<u8>, FsError> {
        let handle = self.get(id)?;
        let mut state = handle.lock();
        let OpenFile { file, position } = &mut *state;
        let Some(file) = file else {
            return Err(FsError::InvalidArgument(format!("file handle {id} is closed")));
        };

        if *position != Some(offset) {
            *position = None;
            file.seek(SeekFrom::Start(offset))?;
        }

        // Until the read succeeds we don't know where the file offset ends up.
        *position = None;
        let mut data = vec![0; size];
        let n = read_upto(file, &mut data)?;
        data.truncate(n);
        *position = Some(offset + n as u64);

        Ok(data)
    }

    /// Closes the file and forgets the handle.
    pub fn release(&self, id: HandleId) -> Result<(), FsError> {
        let handle = self.get(id)?;

        // Close under the handle lock so that a concurrent read either completes first or sees
        // the handle as closed.
        if handle.lock().file.take().is_none() {
            return Err(FsError::InvalidArgument(format!("file handle {id} is already closed")));
        }

        self.table().handles.remove(&id);
        trace!("release({id})");
        Ok(())
    }

    /// The number of open handles.
    pub fn len(&self) -> usize {
        self.table().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
