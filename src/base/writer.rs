//! Base file writer.
//!
//! A base file is a raw DEFLATE stream (best-speed level) of
//! concatenated fixed-size records. There is no header and no record
//! delimiter; the schema fixes the record size.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::record::{WritableRecord, COMPANY_RECORD_SIZE};
use crate::error::{Error, Result};

/// Streaming writer for binary base files.
pub struct BaseWriter {
    encoder: DeflateEncoder<File>,
    frame: Vec<u8>,
    path: PathBuf,
    writes: u64,
}

impl BaseWriter {
    /// Create (truncate) the base file and wrap it with DEFLATE.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| Error::file(&path, e))?;

        Ok(Self {
            encoder: DeflateEncoder::new(file, Compression::fast()),
            frame: Vec::with_capacity(COMPANY_RECORD_SIZE),
            path,
            writes: 0,
        })
    }

    /// Serialise one record and write it as a whole frame.
    ///
    /// Returns the uncompressed frame length.
    pub fn add<R: WritableRecord>(&mut self, rec: &R) -> Result<usize> {
        self.frame.clear();
        self.frame.extend_from_slice(rec.prefix_vector().as_bytes());
        rec.write_fields(&mut self.frame)?;

        self.encoder
            .write_all(&self.frame)
            .map_err(|e| Error::file(&self.path, e))?;

        self.writes += 1;
        Ok(self.frame.len())
    }

    /// Number of records written so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Compressed bytes on disk so far.
    pub fn size(&self) -> u64 {
        self.encoder
            .get_ref()
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Flush the final DEFLATE block and close the file.
    ///
    /// Must be called; dropping the writer loses the stream tail.
    pub fn finish(self) -> Result<()> {
        let path = self.path;
        self.encoder.finish().map_err(|e| Error::file(&path, e))?;
        Ok(())
    }
}
