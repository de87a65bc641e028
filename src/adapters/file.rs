//! File-backed block device
//!
//! Reads blocks from an image file or block device node with positioned
//! reads, so one handle serves every repair thread.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::domain::BlockDevice;
use crate::error::Result;

/// Read-only block device over a file.
#[derive(Debug)]
pub struct FileDevice {
    name: String,
    path: PathBuf,
    file: File,
    block_size: usize,
    block_count: u64,
}

impl FileDevice {
    /// Open `path` with the given block size. A trailing partial block is
    /// not addressable.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let block_count = len / block_size as u64;

        debug!(path = %path.display(), block_size, block_count, "opened block device");

        Ok(Self {
            name: path.display().to_string(),
            path,
            file,
            block_size,
            block_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_count(&self) -> u64 {
        self.block_count
    }

    fn read_block(&self, index: u64) -> io::Result<Bytes> {
        if index >= self.block_count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block {} beyond end of {}", index, self.name),
            ));
        }
        let mut buf = BytesMut::zeroed(self.block_size);
        self.file
            .read_exact_at(&mut buf, index * self.block_size as u64)?;
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reads_whole_blocks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 512]).unwrap();
        file.write_all(&[2u8; 512]).unwrap();
        file.write_all(&[3u8; 100]).unwrap();
        file.flush().unwrap();

        let dev = FileDevice::open(file.path(), 512).unwrap();
        assert_eq!(dev.block_count(), 2);
        assert_eq!(dev.read_block(1).unwrap()[..], [2u8; 512]);
        assert!(dev.read_block(2).is_err());
    }

    #[test]
    fn test_missing_file() {
        assert!(FileDevice::open("/nonexistent/verity.img", 4096).is_err());
    }
}
