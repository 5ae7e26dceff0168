use crate::error::Result;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Byte-level snapshot storage.
///
/// The engine serializes its whole registry into one document and hands
/// the bytes over after every mutating statement; storage only has to keep
/// the latest snapshot.
pub trait Storage {
    /// Reads the last saved snapshot, None if nothing was saved yet
    fn load(&mut self) -> Result<Option<Vec<u8>>>;

    /// Replaces the saved snapshot
    fn save(&mut self, data: &[u8]) -> Result<()>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).load()
    }

    fn save(&mut self, data: &[u8]) -> Result<()> {
        (**self).save(data)
    }
}
