//! Segment destinations.
//!
//! The writer only needs open / write / close. [`LocalFileSystem`] writes
//! to disk; [`MemoryFileSystem`] keeps finished segments in memory, which is
//! what tests and in-process consumers use.

use crate::error::{Result, TsError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// An open segment file, exclusively owned by the writer.
///
/// Dropping a file without calling [`close`](Self::close) releases it but
/// may lose buffered bytes.
pub trait SegmentFile: Send {
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flushes and releases the file.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Opens segment destinations by name.
pub trait FileSystem: Send {
    fn open(&self, name: &str) -> Result<Box<dyn SegmentFile>>;
}

/// Segment files on the local disk, created or truncated on open.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    root: Option<PathBuf>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative segment names against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl FileSystem for LocalFileSystem {
    fn open(&self, name: &str) -> Result<Box<dyn SegmentFile>> {
        let path = match &self.root {
            Some(root) => root.join(name),
            None => PathBuf::from(name),
        };
        let file = File::create(&path)?;
        Ok(Box::new(LocalFile {
            writer: BufWriter::new(file),
        }))
    }
}

struct LocalFile {
    writer: BufWriter<File>,
}

impl SegmentFile for LocalFile {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| TsError::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}

/// In-memory destinations. Clones share the same storage.
///
/// A file's content becomes visible under its name once it is closed.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of a closed file.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, name: &str) -> Result<Box<dyn SegmentFile>> {
        if name.is_empty() {
            return Err(TsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty file name",
            )));
        }
        Ok(Box::new(MemoryFile {
            name: name.to_string(),
            data: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }
}

struct MemoryFile {
    name: String,
    data: Vec<u8>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl SegmentFile for MemoryFile {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.data.extend_from_slice(data);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let MemoryFile { name, data, files } = *self;
        files.lock().insert(name, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_file_visible_after_close() {
        let fs = MemoryFileSystem::new();
        let mut file = fs.open("seg0.ts").unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        assert!(!fs.contains("seg0.ts"));

        file.close().unwrap();
        assert_eq!(fs.get("seg0.ts"), Some(vec![1, 2, 3]));
        assert_eq!(fs.names(), vec!["seg0.ts".to_string()]);
        assert!(fs.open("").is_err());
    }

    #[test]
    fn test_local_file_roundtrip() {
        let dir = std::env::temp_dir();
        let name = format!("tspackager_file_{}.ts", std::process::id());
        let fs = LocalFileSystem::with_root(&dir);

        let mut file = fs.open(&name).unwrap();
        file.write_all(&[0x47; 188]).unwrap();
        file.close().unwrap();

        let path = dir.join(&name);
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x47; 188]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_local_open_failure() {
        let fs = LocalFileSystem::with_root("/nonexistent/tspackager");
        assert!(matches!(fs.open("seg0.ts"), Err(TsError::Io(_))));
    }
}
