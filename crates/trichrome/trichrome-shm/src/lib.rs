use memmap2::MmapMut;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;
use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;

/// A named POSIX shared-memory region mapped read-write.
///
/// The creator owns the name: it creates the object with `O_CREAT | O_EXCL`
/// and unlinks it on drop. Openers only attach to an existing object and
/// detach on drop, leaving the name in place.
pub struct SharedRegion {
    name: String,
    mmap: MmapMut,
    _file: File,
    owner: bool,
}

impl SharedRegion {
    /// Create a new shared-memory object of `size_bytes` and map it read-write.
    ///
    /// Fails if an object with this name already exists.
    pub fn create(name: &str, size_bytes: usize) -> io::Result<Self> {
        let fd = shm_open(
            name,
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )?;
        ftruncate(&fd, size_bytes as i64)?;
        Self::map(name, fd, true)
    }

    /// Open an existing shared-memory object and map it read-write.
    pub fn open(name: &str) -> io::Result<Self> {
        let fd = shm_open(name, OFlag::O_RDWR, Mode::empty())?;
        Self::map(name, fd, false)
    }

    fn map(name: &str, fd: OwnedFd, owner: bool) -> io::Result<Self> {
        let file = File::from(fd);
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            name: name.to_string(),
            mmap,
            _file: file,
            owner,
        })
    }

    /// Raw pointer to the start of the mapped region.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        // The mapping itself is released by MmapMut. Only the creator removes
        // the name; openers detach without touching it.
        if self.owner {
            let _ = shm_unlink(self.name.as_str());
        }
    }
}
