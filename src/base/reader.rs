//! Base file reader.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use flate2::read::DeflateDecoder;

use super::record::ReadableRecord;
use super::vector::{PrefixVector, PREFIX_VECTOR_SIZE};
use crate::error::{Error, Result};

/// Streaming reader over a binary base file.
///
/// The record schema is fixed by the type parameter; the scratch
/// buffer is sized to exactly one record.
pub struct BaseReader<R> {
    decoder: Option<DeflateDecoder<File>>,
    buf: Vec<u8>,
    path: PathBuf,
    reads: u64,
    _record: PhantomData<R>,
}

impl<R: ReadableRecord> BaseReader<R> {
    /// Open a base file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::file(&path, e))?;

        Ok(Self {
            decoder: Some(DeflateDecoder::new(file)),
            buf: vec![0u8; R::SIZE],
            path,
            reads: 0,
            _record: PhantomData,
        })
    }

    /// Read the next record into `rec`.
    ///
    /// Returns `Ok(false)` on a clean end of stream, `TruncatedRecord`
    /// when the stream ends inside a record. A record whose prefix
    /// vector fails to decode halts iteration with that error.
    pub fn next(&mut self, rec: &mut R) -> Result<bool> {
        let decoder = self.decoder.as_mut().ok_or(Error::ReaderClosed)?;

        let mut filled = 0;
        while filled < self.buf.len() {
            let n = decoder
                .read(&mut self.buf[filled..])
                .map_err(|e| Error::file(&self.path, e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(false);
                }
                return Err(Error::TruncatedRecord {
                    want: self.buf.len(),
                    got: filled,
                });
            }
            filled += n;
        }

        let mut vec = [0u8; PREFIX_VECTOR_SIZE];
        vec.copy_from_slice(&self.buf[..PREFIX_VECTOR_SIZE]);
        rec.set_prefix(PrefixVector::from_bytes(vec).to_prefix()?);
        rec.read_fields(&self.buf[PREFIX_VECTOR_SIZE..])?;

        self.reads += 1;
        Ok(true)
    }

    /// Rewind to the first record: seek the file to the start and
    /// re-initialise decompression.
    pub fn reset(&mut self) -> Result<()> {
        let decoder = self.decoder.take().ok_or(Error::ReaderClosed)?;
        let mut file = decoder.into_inner();
        file.seek(SeekFrom::Start(0))
            .map_err(|e| Error::file(&self.path, e))?;

        self.decoder = Some(DeflateDecoder::new(file));
        self.reads = 0;
        Ok(())
    }

    /// Number of records read since open or the last reset.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Release the decompressor and the file.
    pub fn close(&mut self) {
        self.decoder = None;
    }
}
