use std::fmt;
use std::io::{self, BufRead};

/// Newline style emitted for every line a fix session inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineTerminator {
    CrLf,
    #[default]
    Lf,
    Cr,
}

impl LineTerminator {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineTerminator::CrLf => b"\r\n",
            LineTerminator::Lf => b"\n",
            LineTerminator::Cr => b"\r",
        }
    }

    /// Classify raw terminator bytes as produced by [`split_lines`].
    pub fn from_bytes(bytes: &[u8]) -> Option<LineTerminator> {
        match bytes {
            b"\r\n" => Some(LineTerminator::CrLf),
            b"\n" => Some(LineTerminator::Lf),
            b"\r" => Some(LineTerminator::Cr),
            _ => None,
        }
    }

    /// Terminator of the first line of `content`; LF when the first line has none.
    pub fn detect(content: &[u8]) -> LineTerminator {
        split_lines(content)
            .first()
            .and_then(|line| LineTerminator::from_bytes(line.terminator))
            .unwrap_or_default()
    }
}

impl fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LineTerminator::CrLf => "CRLF",
            LineTerminator::Lf => "LF",
            LineTerminator::Cr => "CR",
        };
        f.write_str(name)
    }
}

/// A line borrowed from a file buffer, split from its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub content: &'a [u8],
    /// `\r\n`, `\n`, `\r`, or empty for an unterminated last line.
    pub terminator: &'a [u8],
}

impl RawLine<'_> {
    pub fn is_blank(&self) -> bool {
        self.content.iter().all(|b| b.is_ascii_whitespace())
    }

    /// Content plus terminator, exactly as stored on disk.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.content.len() + self.terminator.len());
        out.extend_from_slice(self.content);
        out.extend_from_slice(self.terminator);
        out
    }
}

/// Split `content` into lines, keeping each line's terminator bytes intact.
/// Concatenating every `content` + `terminator` yields the input unchanged.
pub fn split_lines(content: &[u8]) -> Vec<RawLine<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < content.len() {
        match content[i] {
            b'\n' => {
                lines.push(RawLine {
                    content: &content[start..i],
                    terminator: &content[i..i + 1],
                });
                i += 1;
                start = i;
            }
            b'\r' => {
                let end = if content.get(i + 1) == Some(&b'\n') { i + 2 } else { i + 1 };
                lines.push(RawLine {
                    content: &content[start..i],
                    terminator: &content[i..end],
                });
                i = end;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < content.len() {
        lines.push(RawLine {
            content: &content[start..],
            terminator: &[],
        });
    }
    lines
}

/// Streaming counterpart of [`split_lines`]: append one line (terminator
/// included) to `buf`. Returns the number of bytes read; 0 means EOF.
pub fn read_raw_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut read = 0;
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(read);
        }

        // A `\r` at the end of the buffer may be the first half of `\r\n`.
        if buf.last() == Some(&b'\r') && read > 0 {
            if available[0] == b'\n' {
                buf.push(b'\n');
                reader.consume(1);
                read += 1;
            }
            return Ok(read);
        }

        match available.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(pos) if available[pos] == b'\n' => {
                buf.extend_from_slice(&available[..=pos]);
                reader.consume(pos + 1);
                return Ok(read + pos + 1);
            }
            Some(pos) => {
                let crlf = available.get(pos + 1) == Some(&b'\n');
                let take = if crlf { pos + 2 } else { pos + 1 };
                let more_buffered = take < available.len();
                buf.extend_from_slice(&available[..take]);
                reader.consume(take);
                read += take;
                if crlf || more_buffered {
                    return Ok(read);
                }
                // `\r` was the last buffered byte: peek at the next fill.
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
                read += len;
            }
        }
    }
}
