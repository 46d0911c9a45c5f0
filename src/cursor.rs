//! Bounds-checked random access over the bytes of an image.

use std::{
    fs::File,
    io::{BufReader, Cursor, Error as IOError, ErrorKind, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use debug_ignore::DebugIgnore;
use log::trace;

use crate::errors::*;

/// Source of image bytes that can be read at arbitrary positions and released afterwards.
pub trait ByteSource: Read + Seek {
    /// Release the underlying resource.
    ///
    /// Sources that close on drop don't need to override this.
    fn release(self) -> Result<(), IOError>
    where
        Self: Sized,
    {
        Ok(())
    }
}

impl ByteSource for File {}
impl<T: AsRef<[u8]>> ByteSource for Cursor<T> {}
impl<R: Read + Seek> ByteSource for BufReader<R> {}

/// Random access reader over a [`ByteSource`], owned by a single decode.
///
/// Every read seeks to an absolute position and reads exactly the requested number of bytes.
/// Failures carry the position, the length and the path of the source.
/// The source is released by [`FileCursor::close`] or, failing that, when the cursor is dropped.
#[derive(Debug)]
pub struct FileCursor<S: ByteSource> {
    source: Option<DebugIgnore<S>>,
    path:   Option<PathBuf>,
    length: u64,
}

impl FileCursor<File> {
    /// Open a file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let file = File::open(&path).map_err(|source| DecodeError::Io {
            offset: 0,
            length: 0,
            path: Some(path.clone()),
            source,
        })?;
        FileCursor::new(file, Some(path))
    }
}

impl<S: ByteSource> FileCursor<S> {
    pub fn new(mut source: S, path: Option<PathBuf>) -> Result<Self, DecodeError> {
        let length = source.seek(SeekFrom::End(0)).map_err(|source| DecodeError::Io {
            offset: 0,
            length: 0,
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            source: Some(DebugIgnore(source)),
            path,
            length,
        })
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Returns the total length of the source in bytes.
    pub fn len(&self) -> u64 { self.length }

    pub fn is_empty(&self) -> bool { self.length == 0 }

    /// Read exactly `length` bytes at `offset`.
    pub fn seek_and_read(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, DecodeError> {
        trace!("reading {} bytes at {:#x?} (source size {:#x?})", length, offset, self.length);
        if offset.checked_add(length as u64).map_or(true, |end| end > self.length) {
            return Err(self.out_of_bounds(offset, length));
        }
        let mut buffer = vec![0; length];
        let path = self.path.clone();
        let source = self.source()?;
        source
            .seek(SeekFrom::Start(offset))
            .and_then(|_| source.read_exact(&mut buffer))
            .map_err(|error| match error.kind() {
                ErrorKind::UnexpectedEof => DecodeError::OutOfBounds {
                    offset,
                    length,
                    path,
                },
                _ => DecodeError::Io {
                    offset,
                    length,
                    path,
                    source: error,
                },
            })?;
        Ok(buffer)
    }

    /// Read a single unsigned byte at `offset`.
    pub fn read_byte_at(&mut self, offset: u64) -> Result<u8, DecodeError> {
        Ok(self.seek_and_read(offset, 1)?[0])
    }

    /// Read bytes starting at `offset` up to, not including, the first zero byte.
    ///
    /// There is no length limit other than the end of the source. A string that isn't
    /// terminated before the end fails with a bounds error on the byte past the end.
    pub fn read_null_terminated(&mut self, offset: u64) -> Result<Vec<u8>, DecodeError> {
        let mut buffer = Vec::new();
        let mut position = offset;
        loop {
            let byte = self.read_byte_at(position)?;
            if byte == 0 {
                break;
            }
            buffer.push(byte);
            position += 1;
        }
        Ok(buffer)
    }

    /// Read a null-terminated string at `offset`, replacing invalid UTF-8.
    pub fn read_string(&mut self, offset: u64) -> Result<String, DecodeError> {
        let bytes = self.read_null_terminated(offset)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Release the source. Closing an already closed cursor does nothing.
    pub fn close(&mut self) -> Result<(), DecodeError> {
        match self.source.take() {
            Some(DebugIgnore(source)) => {
                trace!("releasing source {:?}", self.path);
                source.release().map_err(|source| DecodeError::ResourceRelease {
                    path: self.path.clone(),
                    source,
                })
            }
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool { self.source.is_none() }

    fn source(&mut self) -> Result<&mut S, DecodeError> {
        match self.source.as_mut() {
            Some(source) => Ok(&mut source.0),
            None => Err(DecodeError::Io {
                offset: 0,
                length: 0,
                path:   self.path.clone(),
                source: IOError::new(ErrorKind::NotConnected, "source already closed"),
            }),
        }
    }

    fn out_of_bounds(&self, offset: u64, length: usize) -> DecodeError {
        DecodeError::OutOfBounds {
            offset,
            length,
            path: self.path.clone(),
        }
    }
}
