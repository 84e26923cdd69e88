//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Crymap.
//
// Crymap is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Crymap is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Crymap. If not, see <http://www.gnu.org/licenses/>.

use std::borrow::Cow;
use std::io::{BufRead, Read};
use std::mem;
use std::str;

use super::header;
use super::model::*;
use crate::support::error::Error;

/// A visitor which receives events from the tokenizer.
///
/// The visitor is permitted to emit an output at any step, at which point
/// tokenizing is considered complete. Once a visitor returns `Err`, no more
/// methods will be called on it. Methods return `Result<(), Output>` instead
/// of `Option<Output>` to enable use of the `?` operator and to get warnings
/// if results are ignored.
///
/// Methods are declared in the order they are usually called.
#[allow(unused_variables)]
pub trait Visitor {
    type Output;

    /// Called for each header field of a part.
    ///
    /// `depth` is 0 for the header block of the message itself. `value` is
    /// raw, still folded, and has its final line ending removed.
    fn header(
        &mut self,
        depth: u32,
        name: &str,
        value: &[u8],
    ) -> Result<(), Self::Output> {
        Ok(())
    }

    /// Indicates that the headers of a part have ended.
    ///
    /// If `part.has_children` is set, the following events describe the
    /// nested parts. Otherwise, `content` will be called with the body of
    /// this part.
    fn start_content(&mut self, part: &PartInfo) -> Result<(), Self::Output> {
        Ok(())
    }

    /// Called with the raw (still transfer-encoded) body of a leaf part.
    ///
    /// Line endings are passed through, except for the one before a
    /// multipart boundary, which belongs to the boundary.
    fn content(&mut self, data: &[u8]) -> Result<(), Self::Output> {
        Ok(())
    }

    /// Called with the preamble and epilogue of multipart bodies.
    fn filler(&mut self, data: &[u8]) -> Result<(), Self::Output> {
        Ok(())
    }

    /// Indicates that the part most recently started has ended.
    fn end_part(&mut self) -> Result<(), Self::Output> {
        Ok(())
    }

    /// Indicates that the end of the message has been reached.
    ///
    /// This is always the last method to be called. It takes `&mut self` so
    /// that the tokenizer can work with borrowed visitors.
    fn end(&mut self) -> Self::Output;
}

/// What the tokenizer learned about a part from its headers.
#[derive(Clone, Debug)]
pub struct PartInfo {
    pub content_type: ContentType<'static>,
    pub transfer_encoding: ContentTransferEncoding,
    pub disposition: Option<ContentDisposition<'static>>,
    pub depth: u32,
    /// Whether this part is a multipart or message/rfc822 container whose
    /// body is itself tokenized.
    pub has_children: bool,
}

impl PartInfo {
    /// Returns the decoded file name of this part, if it has one.
    pub fn filename(&self) -> Option<String> {
        if let Some(ref cd) = self.disposition {
            if let Some(name) = cd.parm("filename") {
                return Some(header::decode_parameter(name, false));
            }
            if let Some(name) = cd.parm("filename*") {
                return Some(header::decode_parameter(name, true));
            }
        }

        if let Some(name) = self.content_type.parm("name") {
            return Some(header::decode_parameter(name, false));
        }
        self.content_type
            .parm("name*")
            .map(|name| header::decode_parameter(name, true))
    }

    /// Whether this part is an attachment.
    ///
    /// A leaf part is an attachment if its disposition says so or if it
    /// carries a file name.
    pub fn is_attachment(&self) -> bool {
        !self.has_children
            && (self
                .disposition
                .as_ref()
                .map_or(false, ContentDisposition::is_attachment)
                || self.filename().is_some())
    }
}

const CT_TEXT_PLAIN: ContentType<'static> = ContentType {
    typ: Cow::Borrowed(b"text"),
    subtype: Cow::Borrowed(b"plain"),
    parms: vec![],
};

const CT_MESSAGE_RFC822: ContentType<'static> = ContentType {
    typ: Cow::Borrowed(b"message"),
    subtype: Cow::Borrowed(b"rfc822"),
    parms: vec![],
};

#[cfg(not(test))]
const MAX_LINE: usize = 65536;
// Substantially reduce the maximum line length in testing to make it easier to
// find problems with overflow handling.
#[cfg(test)]
const MAX_LINE: usize = 256;

const MAX_RECURSION: u32 = 20;
const MAX_PARTS: u32 = 1000;

/// Tokenize the message read from `r`, feeding events to `visitor`.
///
/// This is designed to be robust moreso than strictly correct. It will accept
/// wildly malformed data and still do its best to carry on. Only I/O errors
/// are reported as errors.
pub fn tokenize<V: Visitor>(
    mut r: impl BufRead,
    visitor: &mut V,
) -> Result<V::Output, Error> {
    let mut tokenizer = Tokenizer {
        visitor,
        stack: vec![Frame::new(0, CT_TEXT_PLAIN)],
        pending_ending: b"",
        part_count: 1,
    };

    let mut buf = Vec::new();
    let mut line_start = true;
    let mut wrapped_cr = false;

    loop {
        buf.clear();
        if wrapped_cr {
            buf.push(b'\r');
            wrapped_cr = false;
        }

        let nread = r
            .by_ref()
            .take(MAX_LINE as u64)
            .read_until(b'\n', &mut buf)?;
        if buf.is_empty() {
            break;
        }

        // If a full buffer ends with CR, hold the CR back since the next
        // input could be the LF of a line ending before a boundary.
        if MAX_LINE == nread && Some(&b'\r') == buf.last() {
            wrapped_cr = true;
            buf.pop();
        }

        let is_line_start = line_start;
        line_start = buf.ends_with(b"\n");
        if let Err(output) = tokenizer.push(&buf, is_line_start) {
            return Ok(output);
        }
    }

    Ok(tokenizer.finish())
}

#[derive(Debug)]
enum State {
    Headers,
    Leaf,
    Multipart { ended: bool },
    /// message/rfc822, whose content lives in a child frame
    Encapsulated,
}

#[derive(Debug)]
struct Frame {
    state: State,
    depth: u32,
    buffered_header: Vec<u8>,

    default_content_type: ContentType<'static>,
    content_type: Option<ContentType<'static>>,
    transfer_encoding: ContentTransferEncoding,
    disposition: Option<ContentDisposition<'static>>,

    /// The multipart delimiter, including the leading `--`.
    boundary: Option<Vec<u8>>,
    child_default_content_type: ContentType<'static>,
}

impl Frame {
    fn new(depth: u32, default_content_type: ContentType<'static>) -> Self {
        Frame {
            state: State::Headers,
            depth,
            buffered_header: vec![],
            default_content_type,
            content_type: None,
            transfer_encoding: ContentTransferEncoding::default(),
            disposition: None,
            boundary: None,
            child_default_content_type: CT_TEXT_PLAIN,
        }
    }
}

struct Tokenizer<'v, V> {
    visitor: &'v mut V,
    stack: Vec<Frame>,
    /// The line ending of the last content line.
    ///
    /// It is withheld until the next line arrives, since the line ending
    /// before a multipart boundary is not part of the content it follows.
    pending_ending: &'static [u8],
    part_count: u32,
}

fn split_ending(line: &[u8]) -> (&[u8], &'static [u8]) {
    if line.ends_with(b"\r\n") {
        (&line[..line.len() - 2], b"\r\n")
    } else if line.ends_with(b"\n") {
        (&line[..line.len() - 1], b"\n")
    } else {
        (line, b"")
    }
}

impl<V: Visitor> Tokenizer<'_, V> {
    fn push(&mut self, line: &[u8], line_start: bool) -> Result<(), V::Output> {
        if line_start && self.check_boundary(line)? {
            return Ok(());
        }

        if let Some(Frame {
            state: State::Headers,
            ..
        }) = self.stack.last()
        {
            return self.push_header_line(line, line_start);
        }

        let (content, ending) = split_ending(line);
        let pending = mem::replace(&mut self.pending_ending, ending);
        self.emit(pending)?;
        self.emit(content)
    }

    fn emit(&mut self, data: &[u8]) -> Result<(), V::Output> {
        if data.is_empty() {
            return Ok(());
        }

        match self.stack.last().map(|f| &f.state) {
            Some(&State::Leaf) => self.visitor.content(data),
            Some(&State::Multipart { .. }) => self.visitor.filler(data),
            _ => Ok(()),
        }
    }

    fn push_header_line(
        &mut self,
        line: &[u8],
        line_start: bool,
    ) -> Result<(), V::Output> {
        let is_continuation =
            !line_start || line.starts_with(b" ") || line.starts_with(b"\t");

        if is_continuation {
            if let Some(frame) = self.stack.last_mut() {
                if !frame.buffered_header.is_empty() {
                    frame.buffered_header.extend_from_slice(line);
                }
            }
            return Ok(());
        }

        self.flush_header()?;
        if b"\n" == line || b"\r\n" == line {
            self.end_headers()
        } else {
            if let Some(frame) = self.stack.last_mut() {
                frame.buffered_header.extend_from_slice(line);
            }
            Ok(())
        }
    }

    fn flush_header(&mut self) -> Result<(), V::Output> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Ok(()),
        };

        let raw = mem::take(&mut frame.buffered_header);
        let colon = match memchr::memchr(b':', &raw) {
            Some(colon) => colon,
            None => return Ok(()),
        };

        let name = match str::from_utf8(&raw[..colon]) {
            // Obsolete syntax allows white space before the colon
            Ok(name) => name.trim_end(),
            Err(_) => return Ok(()),
        };
        if name.is_empty() || name.contains(|c: char| c.is_whitespace()) {
            return Ok(());
        }

        let (value, _) = split_ending(&raw[colon + 1..]);

        if name.eq_ignore_ascii_case("Content-Type") {
            if frame.content_type.is_none() {
                frame.content_type = header::parse_content_type(value)
                    .map(ContentType::into_owned);
            }
        } else if name.eq_ignore_ascii_case("Content-Transfer-Encoding") {
            if let Some(cte) = header::parse_content_transfer_encoding(value) {
                frame.transfer_encoding = cte;
            }
        } else if name.eq_ignore_ascii_case("Content-Disposition") {
            if frame.disposition.is_none() {
                frame.disposition = header::parse_content_disposition(value)
                    .map(ContentDisposition::into_owned);
            }
        }

        self.visitor.header(frame.depth, name, value)
    }

    fn end_headers(&mut self) -> Result<(), V::Output> {
        let frame = match self.stack.last_mut() {
            Some(frame) => frame,
            None => return Ok(()),
        };

        let content_type = frame
            .content_type
            .clone()
            .unwrap_or_else(|| frame.default_content_type.clone());
        let can_nest = frame.depth < MAX_RECURSION;

        let boundary = if can_nest && content_type.is_type("multipart") {
            content_type.parm("boundary").map(|b| {
                let mut delim = b"--".to_vec();
                delim.extend_from_slice(b);
                delim
            })
        } else {
            None
        };
        let is_rfc822 = can_nest
            && self.part_count < MAX_PARTS
            && content_type.is_type("message")
            && content_type.is_subtype("rfc822");

        frame.state = if boundary.is_some() {
            State::Multipart { ended: false }
        } else if is_rfc822 {
            State::Encapsulated
        } else {
            State::Leaf
        };
        if content_type.is_subtype("digest") {
            frame.child_default_content_type = CT_MESSAGE_RFC822;
        }

        let info = PartInfo {
            transfer_encoding: frame.transfer_encoding,
            disposition: frame.disposition.clone(),
            depth: frame.depth,
            has_children: boundary.is_some() || is_rfc822,
            content_type,
        };
        frame.boundary = boundary;
        let depth = frame.depth;

        self.visitor.start_content(&info)?;

        if is_rfc822 {
            self.part_count += 1;
            self.stack.push(Frame::new(depth + 1, CT_TEXT_PLAIN));
        }

        Ok(())
    }

    /// Checks whether `line` is a boundary of any enclosing multipart.
    ///
    /// If it is, all parts inside that multipart are closed out, and a new
    /// part is started if the boundary is not the final one.
    fn check_boundary(&mut self, line: &[u8]) -> Result<bool, V::Output> {
        let found =
            self.stack.iter().enumerate().rev().find_map(|(ix, frame)| {
                if let State::Multipart { ended: false } = frame.state {
                    let boundary = frame.boundary.as_ref()?;
                    if line.starts_with(boundary) {
                        return Some((
                            ix,
                            line[boundary.len()..].starts_with(b"--"),
                        ));
                    }
                }
                None
            });

        let (ix, is_final) = match found {
            Some(found) => found,
            None => return Ok(false),
        };

        self.pending_ending = b"";
        while self.stack.len() > ix + 1 {
            self.pop_frame()?;
        }

        if let Some(frame) = self.stack.last_mut() {
            frame.state = State::Multipart { ended: is_final };
            if !is_final && self.part_count < MAX_PARTS {
                let child = Frame::new(
                    frame.depth + 1,
                    frame.child_default_content_type.clone(),
                );
                self.part_count += 1;
                self.stack.push(child);
            }
        }

        Ok(true)
    }

    fn pop_frame(&mut self) -> Result<(), V::Output> {
        if let Some(Frame {
            state: State::Headers,
            ..
        }) = self.stack.last()
        {
            self.flush_header()?;
            let len = self.stack.len();
            self.end_headers()?;
            // An encapsulated message pushed its child, which must be closed
            // first
            if self.stack.len() != len {
                return Ok(());
            }
        }

        if self.stack.pop().is_some() {
            self.visitor.end_part()?;
        }
        Ok(())
    }

    fn finish(mut self) -> V::Output {
        let pending = mem::replace(&mut self.pending_ending, b"");
        if let Err(output) = self.emit(pending) {
            return output;
        }

        while !self.stack.is_empty() {
            if let Err(output) = self.pop_frame() {
                return output;
            }
        }

        self.visitor.end()
    }
}
