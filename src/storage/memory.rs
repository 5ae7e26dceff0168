use crate::{error::Result, storage::Storage};

/// In-memory storage, lost when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Option<Vec<u8>>,
    saves: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing snapshot
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Some(data),
            saves: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Number of snapshots written so far
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl Storage for MemoryStorage {
    fn load(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.data.clone())
    }

    fn save(&mut self, data: &[u8]) -> Result<()> {
        self.data = Some(data.to_vec());
        self.saves += 1;
        Ok(())
    }
}
