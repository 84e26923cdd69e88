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

//! Lazily gathered facts about one message.
//!
//! Criteria that only need metadata never cause the content to be read. The
//! header block and the part structure are each read at most once per view,
//! and reading the header block stops at the end of the top-level headers.

use std::mem;

use crate::mailbox::model::MailboxMessage;
use crate::mime::tokenizer::{self, PartInfo, Visitor};
use crate::support::error::Error;

/// A raw header field of the message itself. The value is still folded and
/// encoded.
pub type HeaderField = (String, Vec<u8>);

/// What the part structure of a message says about attachments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartSummary {
    pub has_attachment: bool,
    /// The decoded file names of all parts that have one, in message order.
    pub filenames: Vec<String>,
}

#[derive(Debug)]
pub struct MessageView<'a> {
    pub message: &'a MailboxMessage,
    headers: Option<Vec<HeaderField>>,
    parts: Option<PartSummary>,
}

impl<'a> MessageView<'a> {
    pub fn new(message: &'a MailboxMessage) -> Self {
        MessageView {
            message,
            headers: None,
            parts: None,
        }
    }

    /// All top-level header fields, in message order.
    pub fn headers(&mut self) -> Result<&[HeaderField], Error> {
        if self.headers.is_none() {
            let r = self.message.open()?;
            self.headers =
                Some(tokenizer::tokenize(r, &mut HeaderCollector::default())?);
        }

        Ok(self.headers.as_deref().unwrap_or(&[]))
    }

    /// The raw values of every top-level header called `name`, compared
    /// case-insensitively.
    pub fn header_values(&mut self, name: &str) -> Result<Vec<&[u8]>, Error> {
        Ok(self
            .headers()?
            .iter()
            .filter(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..])
            .collect())
    }

    /// The raw value of the first top-level header called `name`.
    pub fn first_header(&mut self, name: &str) -> Result<Option<&[u8]>, Error> {
        Ok(self
            .headers()?
            .iter()
            .find(|&&(ref n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, ref v)| &v[..]))
    }

    pub fn parts(&mut self) -> Result<&PartSummary, Error> {
        if self.parts.is_none() {
            let r = self.message.open()?;
            self.parts =
                Some(tokenizer::tokenize(r, &mut PartScanner::default())?);
        }

        Ok(&*self.parts.get_or_insert_with(PartSummary::default))
    }
}

#[derive(Default)]
struct HeaderCollector {
    headers: Vec<HeaderField>,
}

impl Visitor for HeaderCollector {
    type Output = Vec<HeaderField>;

    fn header(
        &mut self,
        depth: u32,
        name: &str,
        value: &[u8],
    ) -> Result<(), Self::Output> {
        if 0 == depth {
            self.headers.push((name.to_owned(), value.to_owned()));
        }
        Ok(())
    }

    fn start_content(&mut self, _: &PartInfo) -> Result<(), Self::Output> {
        // The first part to start is the message itself, so the top-level
        // headers are complete
        Err(self.end())
    }

    fn end(&mut self) -> Self::Output {
        mem::take(&mut self.headers)
    }
}

#[derive(Default)]
struct PartScanner {
    summary: PartSummary,
}

impl Visitor for PartScanner {
    type Output = PartSummary;

    fn start_content(&mut self, part: &PartInfo) -> Result<(), PartSummary> {
        self.summary.has_attachment |= part.is_attachment();
        if let Some(filename) = part.filename() {
            self.summary.filenames.push(filename);
        }
        Ok(())
    }

    fn end(&mut self) -> PartSummary {
        mem::take(&mut self.summary)
    }
}
