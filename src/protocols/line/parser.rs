//! Newline framing over an accumulating read buffer.

use bytes::{Bytes, BytesMut};
use std::borrow::Cow;

/// Line terminator.
pub const DELIMITER: u8 = b'\n';

/// Spare capacity reserved before each socket read.
const READ_RESERVE: usize = 4096;

/// Read buffer that yields complete lines.
///
/// Remembers how far it has already scanned so a long line arriving in many
/// small reads is not searched from the start each time.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: BytesMut,
    scanned: usize,
}

impl LineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            scanned: 0,
        }
    }

    /// Split the next complete line, terminator included, off the front.
    ///
    /// Returns `None` until a terminator has arrived.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let offset = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER);

        match offset {
            Some(offset) => {
                let end = self.scanned + offset + 1;
                self.scanned = 0;
                Some(self.buffer.split_to(end).freeze())
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Buffer to read into, with room reserved for one more read.
    pub fn read_buf(&mut self) -> &mut BytesMut {
        if self.buffer.capacity() - self.buffer.len() < READ_RESERVE {
            self.buffer.reserve(READ_RESERVE);
        }
        &mut self.buffer
    }

    /// Bytes received that do not yet form a complete line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Human-readable form of a message for logs.
///
/// Surrounding whitespace is trimmed and invalid UTF-8 is replaced; the bytes
/// on the wire are never altered.
pub fn display(line: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(line) {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
        Cow::Owned(s) => Cow::Owned(s.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(lines: &mut LineBuffer, data: &[u8]) {
        lines.read_buf().extend_from_slice(data);
    }

    #[test]
    fn test_single_line() {
        let mut lines = LineBuffer::with_capacity(64);
        fill(&mut lines, b"hello\n");

        assert_eq!(lines.next_line().unwrap(), &b"hello\n"[..]);
        assert!(lines.next_line().is_none());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_incomplete_line() {
        let mut lines = LineBuffer::default();
        fill(&mut lines, b"hel");

        assert!(lines.next_line().is_none());
        assert_eq!(lines.pending(), 3);

        fill(&mut lines, b"lo\n");
        assert_eq!(lines.next_line().unwrap(), &b"hello\n"[..]);
        assert_eq!(lines.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_order() {
        let mut lines = LineBuffer::default();
        fill(&mut lines, b"hello\nworld\npar");

        assert_eq!(lines.next_line().unwrap(), &b"hello\n"[..]);
        assert_eq!(lines.next_line().unwrap(), &b"world\n"[..]);
        assert!(lines.next_line().is_none());
        assert_eq!(lines.pending(), 3);
    }

    #[test]
    fn test_scan_resumes_after_partial() {
        let mut lines = LineBuffer::default();
        fill(&mut lines, b"abc");
        assert!(lines.next_line().is_none());
        fill(&mut lines, b"def");
        assert!(lines.next_line().is_none());
        fill(&mut lines, b"\nxyz\n");

        assert_eq!(lines.next_line().unwrap(), &b"abcdef\n"[..]);
        assert_eq!(lines.next_line().unwrap(), &b"xyz\n"[..]);
    }

    #[test]
    fn test_bytes_kept_verbatim() {
        let mut lines = LineBuffer::default();
        fill(&mut lines, b"  spaced\r\n\n\xff\xfe\n");

        assert_eq!(lines.next_line().unwrap(), &b"  spaced\r\n"[..]);
        assert_eq!(lines.next_line().unwrap(), &b"\n"[..]);
        assert_eq!(lines.next_line().unwrap(), &b"\xff\xfe\n"[..]);
    }

    #[test]
    fn test_read_buf_reserves_space() {
        let mut lines = LineBuffer::with_capacity(0);
        let buf = lines.read_buf();
        assert!(buf.capacity() - buf.len() >= READ_RESERVE);
    }

    #[test]
    fn test_display_trims() {
        assert_eq!(display(b"  hello world \r\n"), "hello world");
        assert_eq!(display(b"\n"), "");
        assert_eq!(display(b"\xffok\n"), "\u{fffd}ok");
    }
}
