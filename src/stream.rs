// Copyright 2023 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Caller supplied byte streams.
//!
//! Hosts that cannot hand the engine a Rust `Read + Seek` value implement
//! [`Stream`] instead, or pass three closures to [`CallbackStream`].
//! [`StreamAdapter`] turns either into something the engine can consume.
//!
//! Callbacks may return short reads and short writes. The engine loops
//! until it has all the bytes it asked for, and treats a zero-length read
//! as end of stream.

use std::io::{Read, Seek, SeekFrom, Write};

use thiserror::Error;

pub type StreamResult<T> = std::result::Result<T, StreamError>;

/// Origin for [`Stream::seek_stream`].
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekMode {
    Start = 0,
    Current = 1,
    End = 2,
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Io: {reason}")]
    Io { reason: String },
    #[error("Other: {reason}")]
    Other { reason: String },
    #[error("InternalStreamError")]
    InternalStreamError,
}

impl From<crate::Error> for StreamError {
    fn from(e: crate::Error) -> Self {
        Self::Other {
            reason: e.to_string(),
        }
    }
}

impl From<StreamError> for std::io::Error {
    fn from(e: StreamError) -> Self {
        std::io::Error::new(std::io::ErrorKind::Other, e)
    }
}

/// A seekable byte stream implemented outside the engine.
pub trait Stream: Send {
    /// Read up to `buf.len()` bytes. Returns the number read; `0` means
    /// end of stream.
    fn read_stream(&mut self, buf: &mut [u8]) -> StreamResult<usize>;

    /// Move to `offset` relative to `mode`. Returns the new absolute
    /// position.
    fn seek_stream(&mut self, offset: i64, mode: SeekMode) -> StreamResult<u64>;

    /// Write up to `buf.len()` bytes. Returns the number written.
    fn write_stream(&mut self, buf: &[u8]) -> StreamResult<usize>;
}

/// A [`Stream`] built from three callbacks following the C convention:
/// each returns a non-negative count or position on success and a
/// negative value on failure.
pub struct CallbackStream<R, S, W> {
    read: R,
    seek: S,
    write: W,
}

impl<R, S, W> CallbackStream<R, S, W>
where
    R: FnMut(&mut [u8]) -> isize + Send,
    S: FnMut(i64, SeekMode) -> i64 + Send,
    W: FnMut(&[u8]) -> isize + Send,
{
    pub fn new(read: R, seek: S, write: W) -> Self {
        Self { read, seek, write }
    }
}

impl<R, S, W> Stream for CallbackStream<R, S, W>
where
    R: FnMut(&mut [u8]) -> isize + Send,
    S: FnMut(i64, SeekMode) -> i64 + Send,
    W: FnMut(&[u8]) -> isize + Send,
{
    fn read_stream(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
        let rc = (self.read)(buf);
        if rc < 0 || rc as usize > buf.len() {
            return Err(StreamError::Io {
                reason: format!("read callback returned {rc}"),
            });
        }
        Ok(rc as usize)
    }

    fn seek_stream(&mut self, offset: i64, mode: SeekMode) -> StreamResult<u64> {
        let rc = (self.seek)(offset, mode);
        if rc < 0 {
            return Err(StreamError::Io {
                reason: format!("seek callback returned {rc}"),
            });
        }
        Ok(rc as u64)
    }

    fn write_stream(&mut self, buf: &[u8]) -> StreamResult<usize> {
        let rc = (self.write)(buf);
        if rc < 0 || rc as usize > buf.len() {
            return Err(StreamError::Io {
                reason: format!("write callback returned {rc}"),
            });
        }
        Ok(rc as usize)
    }
}

/// Presents a [`Stream`] as `Read + Seek + Write`.
pub struct StreamAdapter<'a> {
    stream: &'a mut dyn Stream,
}

impl<'a> StreamAdapter<'a> {
    pub fn from_stream(stream: &'a mut dyn Stream) -> Self {
        Self { stream }
    }
}

impl Read for StreamAdapter<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.stream.read_stream(buf)?)
    }
}

impl Seek for StreamAdapter<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let (offset, mode) = match pos {
            SeekFrom::Start(pos) => (
                i64::try_from(pos).map_err(|_| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek out of range")
                })?,
                SeekMode::Start,
            ),
            SeekFrom::Current(pos) => (pos, SeekMode::Current),
            SeekFrom::End(pos) => (pos, SeekMode::End),
        };
        Ok(self.stream.seek_stream(offset, mode)?)
    }
}

impl Write for StreamAdapter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(self.stream.write_stream(buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used)]

    use std::{
        io::Cursor,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// Memory backed [`Stream`] that returns at most `chunk` bytes per call.
    pub(crate) struct ChunkedStream {
        data: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl ChunkedStream {
        pub(crate) fn new(data: Vec<u8>, chunk: usize) -> Self {
            Self {
                data: Cursor::new(data),
                chunk,
            }
        }

        pub(crate) fn into_inner(self) -> Vec<u8> {
            self.data.into_inner()
        }
    }

    impl Stream for ChunkedStream {
        fn read_stream(&mut self, buf: &mut [u8]) -> StreamResult<usize> {
            let len = buf.len().min(self.chunk);
            self.data.read(&mut buf[..len]).map_err(|e| StreamError::Io {
                reason: e.to_string(),
            })
        }

        fn seek_stream(&mut self, offset: i64, mode: SeekMode) -> StreamResult<u64> {
            let pos = match mode {
                SeekMode::Start => SeekFrom::Start(offset as u64),
                SeekMode::Current => SeekFrom::Current(offset),
                SeekMode::End => SeekFrom::End(offset),
            };
            self.data.seek(pos).map_err(|e| StreamError::Io {
                reason: e.to_string(),
            })
        }

        fn write_stream(&mut self, buf: &[u8]) -> StreamResult<usize> {
            let len = buf.len().min(self.chunk);
            self.data
                .write(&buf[..len])
                .map_err(|_| StreamError::InternalStreamError)
        }
    }

    #[test]
    fn test_stream_read() {
        let mut test = ChunkedStream::new(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9], 64);
        let mut stream = StreamAdapter::from_stream(&mut test);
        let mut buf = [0u8; 5];
        let len = stream.read(&mut buf).unwrap();
        assert_eq!(len, 5);
        assert_eq!(buf, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_stream_seek() {
        let mut test = ChunkedStream::new(vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9], 64);
        let mut stream = StreamAdapter::from_stream(&mut test);
        let pos = stream.seek(SeekFrom::Start(5)).unwrap();
        assert_eq!(pos, 5);
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [5, 6, 7, 8, 9]);

        assert_eq!(stream.seek(SeekFrom::End(-2)).unwrap(), 8);
        assert_eq!(stream.seek(SeekFrom::Current(-8)).unwrap(), 0);
    }

    #[test]
    fn test_short_reads_and_writes() {
        let mut test = ChunkedStream::new(Vec::new(), 3);
        let mut stream = StreamAdapter::from_stream(&mut test);

        stream.write_all(&[0, 1, 2, 3, 4, 5, 6, 7]).unwrap();
        stream.rewind().unwrap();

        let mut all = Vec::new();
        stream.read_to_end(&mut all).unwrap();
        assert_eq!(all, [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(test.into_inner(), [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_callback_stream() {
        let data = Arc::new(Mutex::new(Cursor::new(b"callback bytes".to_vec())));

        let (r, s) = (data.clone(), data.clone());
        let mut cb = CallbackStream::new(
            move |buf: &mut [u8]| r.lock().unwrap().read(buf).map_or(-1, |n| n as isize),
            move |offset: i64, mode: SeekMode| {
                let pos = match mode {
                    SeekMode::Start => SeekFrom::Start(offset as u64),
                    SeekMode::Current => SeekFrom::Current(offset),
                    SeekMode::End => SeekFrom::End(offset),
                };
                s.lock().unwrap().seek(pos).map_or(-1, |p| p as i64)
            },
            |_: &[u8]| -1,
        );

        let mut stream = StreamAdapter::from_stream(&mut cb);
        stream.seek(SeekFrom::Start(9)).unwrap();
        let mut tail = String::new();
        stream.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "bytes");

        // a negative write result surfaces as an io error
        assert!(stream.write_all(b"x").is_err());
    }
}
