//! Serving a [`PhotoFs`] over FUSE.
//!
//! The kernel talks in inode numbers, the file system in paths.  Inode numbers are handed out
//! the first time the kernel sees a path and stay valid until unmount; the mount root is always
//! inode 1.

use std::{collections::HashMap, ffi::OsStr, path::Path, time::Duration};

use anyhow::Context;
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, Request, FUSE_ROOT_ID,
};
use log::{debug, trace, warn};
use rustix::{fs::FileType as RawFileType, io::Errno};

use crate::{filesystem::PhotoFs, image::Stat};

const TTL: Duration = Duration::from_secs(1);

/// The name the mount shows up as in the mount table.
const FSNAME: &str = "photofs";

fn kind(stat: &Stat) -> FileType {
    match stat.file_type() {
        RawFileType::Directory => FileType::Directory,
        RawFileType::Symlink => FileType::Symlink,
        RawFileType::Fifo => FileType::NamedPipe,
        RawFileType::Socket => FileType::Socket,
        RawFileType::CharacterDevice => FileType::CharDevice,
        RawFileType::BlockDevice => FileType::BlockDevice,
        _ => FileType::RegularFile,
    }
}

fn fileattr(ino: u64, stat: &Stat) -> FileAttr {
    FileAttr {
        ino,
        size: stat.st_size,
        blocks: stat.st_size.div_ceil(512),
        atime: stat.st_atime,
        mtime: stat.st_mtime,
        ctime: stat.st_ctime,
        crtime: stat.st_ctime,
        kind: kind(stat),
        perm: (stat.st_mode & 0o7777) as u16,
        nlink: stat.st_nlink,
        uid: stat.st_uid,
        gid: stat.st_gid,
        rdev: 0,
        blksize: 4096,
        flags: 0,
    }
}

/// `name` inside the directory `parent`.
fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// The directory containing `path`.
fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

#[derive(Debug)]
struct PhotoFuse {
    fs: PhotoFs,
    paths: HashMap<u64, String>,
    inodes: HashMap<String, u64>,
    next_ino: u64,
}

impl PhotoFuse {
    fn new(fs: PhotoFs) -> Self {
        Self {
            fs,
            paths: HashMap::from([(FUSE_ROOT_ID, "/".to_string())]),
            inodes: HashMap::from([("/".to_string(), FUSE_ROOT_ID)]),
            next_ino: FUSE_ROOT_ID + 1,
        }
    }

    fn path(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    /// The inode number of `path`, allocating one if the path is new.
    fn ino(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inodes.get(path) {
            return *ino;
        }

        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }
}

impl Filesystem for PhotoFuse {
    fn destroy(&mut self) {
        self.fs.destroy();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        reply.statfs(0, 0, 0, 0, 0, 4096, 255, 4096);
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!("lookup({parent}, {name:?})");
        let Some(dir) = self.path(parent) else {
            log::error!("lookup({parent}, {name:?}) parent does not exist");
            return reply.error(Errno::BADF.raw_os_error());
        };
        let Some(name) = name.to_str() else {
            return reply.error(Errno::NOENT.raw_os_error());
        };

        let path = child_path(dir, name);
        match self.fs.getattr(&path) {
            Ok(stat) => {
                let ino = self.ino(&path);
                reply.entry(&TTL, &fileattr(ino, &stat), 0)
            }
            Err(err) => reply.error(err.raw_os_error()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let Some(path) = self.path(ino) else {
            log::error!("getattr({ino}) inode does not exist");
            return reply.error(Errno::BADF.raw_os_error());
        };

        match self.fs.getattr(path) {
            Ok(stat) => reply.attr(&TTL, &fileattr(ino, &stat)),
            Err(err) => {
                debug!("getattr({ino}) {path:?}: {err}");
                reply.error(err.raw_os_error())
            }
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path(ino) else {
            log::error!("opendir({ino}) inode does not exist");
            return reply.error(Errno::BADF.raw_os_error());
        };

        match self.fs.namespace().locate(path) {
            Ok(node) if node.is_dir() => reply.opened(0, 0),
            Ok(..) => reply.error(Errno::NOTDIR.raw_os_error()),
            Err(err) => reply.error(err.raw_os_error()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        mut offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path(ino).map(str::to_string) else {
            log::error!("readdir({ino}) inode does not exist");
            return reply.error(Errno::BADF.raw_os_error());
        };

        let names = match self.fs.readdir(&path) {
            Ok(names) => names,
            Err(err) => {
                log::error!("readdir({ino}) {path:?}: {err}");
                return reply.error(err.raw_os_error());
            }
        };

        if offset == 0 {
            offset += 1;
            if reply.add(ino, offset, FileType::Directory, ".") {
                return reply.ok();
            }
        }

        if offset == 1 {
            offset += 1;
            let parent = self.ino(parent_path(&path));
            if reply.add(parent, offset, FileType::Directory, "..") {
                return reply.ok();
            }
        }

        for name in names.iter().skip(offset as usize - 2) {
            let child = child_path(&path, name);
            let kind = match self.fs.namespace().locate(&child) {
                Ok(node) if node.is_dir() => FileType::Directory,
                _ => FileType::RegularFile,
            };

            offset += 1;
            if reply.add(self.ino(&child), offset, kind, name) {
                break;
            }
        }

        reply.ok();
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path(ino) else {
            log::error!("open({ino}) inode does not exist");
            return reply.error(Errno::BADF.raw_os_error());
        };

        match self.fs.open(path, flags) {
            Ok(fh) => reply.opened(fh, 0),
            Err(err) => {
                log::error!("open({ino}) {path:?}: {err}");
                reply.error(err.raw_os_error())
            }
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(Errno::INVAL.raw_os_error());
        };

        match self.fs.read(fh, size as usize, offset) {
            Ok(data) => reply.data(&data),
            Err(err) => {
                log::error!("read({fh}, {size}, {offset}): {err}");
                reply.error(err.raw_os_error())
            }
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        match self.fs.release(fh) {
            Ok(()) => reply.ok(),
            Err(err) => {
                log::error!("release({fh}): {err}");
                reply.error(err.raw_os_error())
            }
        }
    }
}

fn parse_option(option: &str) -> MountOption {
    match option {
        "allow_other" => MountOption::AllowOther,
        "allow_root" => MountOption::AllowRoot,
        "auto_unmount" => MountOption::AutoUnmount,
        "default_permissions" => MountOption::DefaultPermissions,
        "dev" => MountOption::Dev,
        "nodev" => MountOption::NoDev,
        "suid" => MountOption::Suid,
        "nosuid" => MountOption::NoSuid,
        "ro" => MountOption::RO,
        "exec" => MountOption::Exec,
        "noexec" => MountOption::NoExec,
        "atime" => MountOption::Atime,
        "noatime" => MountOption::NoAtime,
        "dirsync" => MountOption::DirSync,
        "sync" => MountOption::Sync,
        "async" => MountOption::Async,
        _ => {
            if let Some(name) = option.strip_prefix("fsname=") {
                MountOption::FSName(name.to_string())
            } else if let Some(name) = option.strip_prefix("subtype=") {
                MountOption::Subtype(name.to_string())
            } else {
                MountOption::CUSTOM(option.to_string())
            }
        }
    }
}

/// The mount options: always read-only, named `photofs` and checked by the kernel, plus
/// whatever was passed with `-o`.
///
/// Each element of `extra` may hold several comma separated options.  `rw` is dropped, the file
/// system cannot be written to.
pub fn mount_options<S: AsRef<str>>(extra: &[S]) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName(FSNAME.to_string()),
        MountOption::DefaultPermissions,
    ];

    for option in extra
        .iter()
        .flat_map(|o| o.as_ref().split(','))
        .filter(|o| !o.is_empty())
    {
        if option == "rw" {
            warn!("Ignoring mount option {option:?}: the file system is read-only");
            continue;
        }

        let option = parse_option(option);
        if let MountOption::FSName(..) = option {
            options.retain(|o| !matches!(o, MountOption::FSName(..)));
        }
        if !options.contains(&option) {
            options.push(option);
        }
    }

    options
}

/// Mounts `fs` on `mountpoint` and serves requests until it is unmounted.
pub fn mount(fs: PhotoFs, mountpoint: &Path, options: &[MountOption]) -> anyhow::Result<()> {
    debug!("Mounting on {mountpoint:?} with {options:?}");
    fuser::mount2(PhotoFuse::new(fs), mountpoint, options)
        .with_context(|| format!("Failed to mount file system on {mountpoint:?}"))
}
