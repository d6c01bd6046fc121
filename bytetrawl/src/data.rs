//! Models how the searched content is accessed.

use std::{io, path::PathBuf, sync::Arc};

use bytetrawl_common::{AbsoluteOffset, Len};
use positioned_io::{RandomAccessFile, ReadAt as _, Size as _};

/// Read-only random access over content of known total length.
pub trait ByteSource {
    /// The length of the content.
    fn len(&self) -> Len;

    /// Determines if the content is empty.
    fn is_empty(&self) -> bool {
        self.len().is_zero()
    }

    /// Fills the buffer with the content at the given offset, returning the filled slice.
    ///
    /// The returned slice is shorter than the buffer when the content ends before it
    /// is filled. An offset beyond the content is an error.
    fn window_at<'buf>(
        &self,
        offset: AbsoluteOffset,
        buf: &'buf mut [u8],
    ) -> io::Result<&'buf [u8]>;
}

/// Content that supports replacing a span of bytes with new bytes.
///
/// The replacement may have a different length than the replaced span; all content
/// after the span moves accordingly.
pub trait ByteSplice: ByteSource {
    /// Replaces `len` bytes at `offset` with the replacement bytes.
    fn splice(&mut self, offset: AbsoluteOffset, len: Len, replacement: &[u8]) -> io::Result<()>;
}

/// The input content to search.
#[derive(Debug, Clone)]
pub struct Input(Arc<InputType>);

/// The backing storage of an input.
#[derive(Debug)]
enum InputType {
    /// The input is the given file.
    File {
        /// The open file handle.
        file: RandomAccessFile,
        /// The length of the file in bytes.
        len: u64,
    },
    /// The input is held in memory.
    Memory(Box<[u8]>),
}

impl Input {
    /// Creates an input from the given path.
    pub fn from_path(path: impl Into<PathBuf>) -> io::Result<Input> {
        let path = path.into();

        let file = RandomAccessFile::open(&path)?;
        let len = file
            .size()?
            .ok_or_else(|| io::Error::other("cannot get file size"))?;

        Ok(Input(Arc::new(InputType::File { file, len })))
    }

    /// Creates an input from in-memory bytes.
    pub fn from_bytes(bytes: impl Into<Box<[u8]>>) -> Input {
        Input(Arc::new(InputType::Memory(bytes.into())))
    }
}

impl ByteSource for Input {
    fn len(&self) -> Len {
        match &*self.0 {
            InputType::File { len, .. } => Len::from(*len),
            InputType::Memory(bytes) => Len::from(
                u64::try_from(bytes.len())
                    .expect("non `u64`-fitting length would not fit into memory"),
            ),
        }
    }

    fn window_at<'buf>(
        &self,
        offset: AbsoluteOffset,
        buf: &'buf mut [u8],
    ) -> io::Result<&'buf [u8]> {
        match &*self.0 {
            InputType::File { file, len } => {
                if offset.as_u64() > *len {
                    return Err(io::Error::other("offset is beyond input"));
                }

                let len_left = *len - offset.as_u64();
                let output_size = std::cmp::min(len_left, buf.len().try_into().unwrap_or(u64::MAX));
                let truncated_buf = &mut buf[..output_size
                    .try_into()
                    .expect("we used min above, so this must fit into `buf`")];

                file.read_exact_at(offset.as_u64(), truncated_buf)?;

                Ok(truncated_buf)
            }
            InputType::Memory(bytes) => window_of_slice(bytes, offset, buf),
        }
    }
}

/// A growable in-memory document used as a replace target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer(Vec<u8>);

impl EditBuffer {
    /// Creates an edit buffer over the given bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> EditBuffer {
        EditBuffer(bytes.into())
    }

    /// The current content of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the buffer, returning its content.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl ByteSource for EditBuffer {
    fn len(&self) -> Len {
        Len::from(
            u64::try_from(self.0.len()).expect("non `u64`-fitting length would not fit into memory"),
        )
    }

    fn window_at<'buf>(
        &self,
        offset: AbsoluteOffset,
        buf: &'buf mut [u8],
    ) -> io::Result<&'buf [u8]> {
        window_of_slice(&self.0, offset, buf)
    }
}

impl ByteSplice for EditBuffer {
    fn splice(&mut self, offset: AbsoluteOffset, len: Len, replacement: &[u8]) -> io::Result<()> {
        let start: usize = offset
            .as_u64()
            .try_into()
            .map_err(|_| io::Error::other("offset does not fit into `usize`"))?;
        let end = start
            .checked_add(
                len.as_u64()
                    .try_into()
                    .map_err(|_| io::Error::other("length does not fit into `usize`"))?,
            )
            .ok_or_else(|| io::Error::other("span end overflows `usize`"))?;

        if end > self.0.len() {
            return Err(io::Error::other("span is beyond content"));
        }

        self.0.splice(start..end, replacement.iter().copied());

        Ok(())
    }
}

/// Fills the buffer from an in-memory slice, returning the filled prefix.
fn window_of_slice<'buf>(
    bytes: &[u8],
    offset: AbsoluteOffset,
    buf: &'buf mut [u8],
) -> io::Result<&'buf [u8]> {
    let offset_usize: usize = offset
        .as_u64()
        .try_into()
        .map_err(|_| io::Error::other("offset does not fit into `usize`"))?;

    if offset_usize > bytes.len() {
        return Err(io::Error::other("offset is beyond input"));
    }

    let len_left = bytes.len() - offset_usize;
    let output_size = std::cmp::min(len_left, buf.len());

    buf[..output_size].copy_from_slice(&bytes[offset_usize..offset_usize + output_size]);

    Ok(&buf[..output_size])
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn memory_input_windows() {
        let input = Input::from_bytes(*b"hello world");
        assert_eq!(input.len(), Len::from(11));

        let mut buf = [0; 5];
        let window = input.window_at(AbsoluteOffset::from(6), &mut buf).unwrap();
        assert_eq!(window, b"world");

        // a short read at the end of the content
        let window = input.window_at(AbsoluteOffset::from(9), &mut buf).unwrap();
        assert_eq!(window, b"ld");

        assert!(input.window_at(AbsoluteOffset::from(12), &mut buf).is_err());
    }

    #[test]
    fn file_input_windows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let input = Input::from_path(file.path()).unwrap();
        assert_eq!(input.len(), Len::from(10));

        let mut buf = [0; 4];
        let window = input.window_at(AbsoluteOffset::from(3), &mut buf).unwrap();
        assert_eq!(window, b"3456");

        let window = input.window_at(AbsoluteOffset::from(8), &mut buf).unwrap();
        assert_eq!(window, b"89");
    }

    #[test]
    fn edit_buffer_splice() {
        let mut buffer = EditBuffer::new(*b"aXbXcX");
        buffer
            .splice(AbsoluteOffset::from(1), Len::from(1), b"YY")
            .unwrap();
        assert_eq!(buffer.as_bytes(), b"aYYbXcX");

        buffer
            .splice(AbsoluteOffset::from(4), Len::from(1), b"")
            .unwrap();
        assert_eq!(buffer.as_bytes(), b"aYYbcX");

        assert!(
            buffer
                .splice(AbsoluteOffset::from(6), Len::from(1), b"z")
                .is_err()
        );
    }
}
