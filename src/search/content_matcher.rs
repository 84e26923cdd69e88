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

use std::io::BufRead;

use log::warn;

use crate::mime::body_decoder::BodyDecoder;
use crate::mime::encoded_word::decode_unstructured;
use crate::mime::tokenizer::{self, PartInfo, Visitor};
use crate::support::error::Error;

/// Which header fields a `ContentMatcher` looks at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderScope {
    /// Body content only.
    Exclude,
    /// Every header field of every part.
    All,
    /// Only the named header fields of the message itself.
    Named(Vec<String>),
}

/// Streaming substring search over the text of a message.
///
/// The target is prepared once; the matcher itself is immutable and can be
/// shared between threads. Each call to `matches` reads its input at most
/// once.
///
/// The partial-match cursor starts over at the start of every header field,
/// part body, preamble and epilogue, so a match never spans two of them.
///
/// On a mismatch, the cursor rewinds to the start of the target and the
/// current character is tried once more. This is not a full substring search
/// (a target like "aab" is not found in "aaab"); the behaviour is relied on
/// for compatibility and must not be "fixed".
#[derive(Clone, Debug)]
pub struct ContentMatcher {
    target: Vec<char>,
    case_insensitive: bool,
    headers: HeaderScope,
    attachments_only: bool,
}

/// Fold `c` for case-insensitive comparison.
///
/// Characters whose upper case form is more than one character are left
/// alone.
pub fn fold_char(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// `fold_char` applied to every character of `s`.
pub fn fold_str(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

impl ContentMatcher {
    pub fn new(
        target: &str,
        case_insensitive: bool,
        include_headers: bool,
    ) -> Self {
        let target = if case_insensitive {
            target.chars().map(fold_char).collect()
        } else {
            target.chars().collect()
        };

        ContentMatcher {
            target,
            case_insensitive,
            headers: if include_headers {
                HeaderScope::All
            } else {
                HeaderScope::Exclude
            },
            attachments_only: false,
        }
    }

    pub fn with_header_scope(mut self, headers: HeaderScope) -> Self {
        self.headers = headers;
        self
    }

    /// Restrict body scanning to attachment parts.
    ///
    /// Preamble and epilogue text is not scanned either.
    pub fn attachments_only(mut self) -> Self {
        self.attachments_only = true;
        self
    }

    /// Scan the message read from `r` for the target.
    ///
    /// An empty target never matches, and in that case nothing is read.
    pub fn matches(&self, r: impl BufRead) -> Result<bool, Error> {
        if self.target.is_empty() {
            return Ok(false);
        }

        tokenizer::tokenize(
            r,
            &mut Scan {
                matcher: self,
                cursor: 0,
                decoder: None,
            },
        )
    }

    fn wants_header(&self, depth: u32, name: &str) -> bool {
        match self.headers {
            HeaderScope::Exclude => false,
            HeaderScope::All => true,
            HeaderScope::Named(ref names) => {
                0 == depth && names.iter().any(|n| n.eq_ignore_ascii_case(name))
            }
        }
    }

    /// Feed `text` through the cursor, returning whether the target was
    /// completed.
    fn advance(&self, cursor: &mut usize, text: &str) -> bool {
        for c in text.chars() {
            let c = if self.case_insensitive { fold_char(c) } else { c };

            if self.target[*cursor] != c {
                if 0 == *cursor {
                    continue;
                }
                *cursor = 0;
                if self.target[0] != c {
                    continue;
                }
            }

            *cursor += 1;
            if self.target.len() == *cursor {
                return true;
            }
        }

        false
    }
}

struct Scan<'a> {
    matcher: &'a ContentMatcher,
    cursor: usize,
    decoder: Option<BodyDecoder>,
}

impl Scan<'_> {
    fn scan(&mut self, text: &str) -> Result<(), bool> {
        if self.matcher.advance(&mut self.cursor, text) {
            Err(true)
        } else {
            Ok(())
        }
    }
}

impl Visitor for Scan<'_> {
    type Output = bool;

    fn header(
        &mut self,
        depth: u32,
        name: &str,
        value: &[u8],
    ) -> Result<(), bool> {
        if !self.matcher.wants_header(depth, name) {
            return Ok(());
        }

        self.cursor = 0;
        let result = self.scan(&decode_unstructured(value));
        self.cursor = 0;
        result
    }

    fn start_content(&mut self, part: &PartInfo) -> Result<(), bool> {
        self.cursor = 0;
        self.decoder = None;

        if part.has_children
            || (self.matcher.attachments_only && !part.is_attachment())
        {
            return Ok(());
        }

        match BodyDecoder::new(part) {
            Ok(decoder) => self.decoder = Some(decoder),
            Err(e) => warn!("Not searching body part: {}", e),
        }
        Ok(())
    }

    fn content(&mut self, data: &[u8]) -> Result<(), bool> {
        if let Some(ref mut decoder) = self.decoder {
            if self.matcher.advance(&mut self.cursor, decoder.push(data)) {
                return Err(true);
            }
        }
        Ok(())
    }

    fn filler(&mut self, data: &[u8]) -> Result<(), bool> {
        if self.matcher.attachments_only {
            return Ok(());
        }

        self.scan(&String::from_utf8_lossy(data))
    }

    fn end_part(&mut self) -> Result<(), bool> {
        if let Some(mut decoder) = self.decoder.take() {
            if self.matcher.advance(&mut self.cursor, decoder.finish()) {
                return Err(true);
            }
        }

        self.cursor = 0;
        Ok(())
    }

    fn end(&mut self) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::test_data::*;

    fn body(target: &str, message: &[u8]) -> bool {
        ContentMatcher::new(target, true, false)
            .matches(message)
            .unwrap()
    }

    fn full(target: &str, message: &[u8]) -> bool {
        ContentMatcher::new(target, true, true)
            .matches(message)
            .unwrap()
    }

    #[test]
    fn empty_target_never_matches() {
        assert!(!body("", SIMPLE));
        assert!(!full("", SIMPLE));
    }

    #[test]
    fn headers_only_match_when_included() {
        assert!(!body("Lunch plans", SIMPLE));
        assert!(full("Lunch plans", SIMPLE));
        assert!(full("ALICE@EXAMPLE", SIMPLE));
    }

    #[test]
    fn text_past_the_end_of_a_long_header_is_found() {
        let message = format!(
            "Subject: {} needle\r\n\r\nbody\r\n",
            "a".repeat(100_000)
        );
        assert!(full("needle", message.as_bytes()));
        assert!(!body("needle", message.as_bytes()));
    }

    #[test]
    fn body_matches_are_case_insensitive() {
        assert!(body("noon at the", SIMPLE));
        assert!(body("NOON AT THE", SIMPLE));
        assert!(!ContentMatcher::new("NOON AT THE", false, false)
            .matches(SIMPLE)
            .unwrap());
    }

    #[test]
    fn encoded_headers_are_decoded() {
        assert!(full("grüße aus köln", ENCODED_SUBJECT));
        assert!(!full("=?utf-8?", ENCODED_SUBJECT));
    }

    #[test]
    fn transfer_encodings_are_decoded() {
        // Quoted-printable with a soft line break in the middle
        assert!(body("quarterly numbers are in", MULTIPART));
        // Base64 attachment content
        assert!(body("attached report text", MULTIPART));
        assert!(!body("UmVwb3J0", MULTIPART));
        // Latin-1 body
        assert!(body("déjà vu", LATIN1_QP));
    }

    #[test]
    fn matches_never_span_parts_or_fields() {
        // End of the text part followed by the start of the attachment
        assert!(!body("regardsattached", MULTIPART));
        assert!(!body("regards attached", MULTIPART));
        // Two adjacent header fields
        assert!(!full("plansfrom", SIMPLE));
    }

    #[test]
    fn rewind_is_naive() {
        let message = b"Subject: x\r\n\r\nxaaab\r\n";
        assert!(!body("aab", message));
        assert!(body("aaab", message));
        assert!(body("ab", message));
    }

    #[test]
    fn unknown_charset_skips_part() {
        assert!(!body("mystery", UNKNOWN_CHARSET));
        assert!(body("readable", UNKNOWN_CHARSET));
    }

    #[test]
    fn nested_messages_are_searched() {
        assert!(body("inner message body", NESTED_RFC822));
        assert!(full("Forwarded inner subject", NESTED_RFC822));
    }

    #[test]
    fn header_scope_named_only_looks_at_top_level() {
        let text = |target: &str, message: &[u8]| {
            ContentMatcher::new(target, true, false)
                .with_header_scope(HeaderScope::Named(vec![
                    "Subject".to_owned(),
                    "From".to_owned(),
                ]))
                .matches(message)
                .unwrap()
        };

        assert!(text("lunch plans", SIMPLE));
        assert!(text("alice", SIMPLE));
        assert!(!text("<simple@example.com>", SIMPLE));
        assert!(!text("Forwarded inner subject", NESTED_RFC822));
    }

    #[test]
    fn attachments_only() {
        let attachment = |target: &str, message: &[u8]| {
            ContentMatcher::new(target, true, false)
                .attachments_only()
                .matches(message)
                .unwrap()
        };

        assert!(attachment("attached report text", MULTIPART));
        assert!(!attachment("quarterly numbers", MULTIPART));
        assert!(!attachment("noon", SIMPLE));
    }

    #[test]
    fn matcher_is_reusable_across_threads() {
        use rayon::prelude::*;

        let matcher = ContentMatcher::new("quarterly", true, false);
        let results: Vec<bool> = (0..16)
            .into_par_iter()
            .map(|_| matcher.matches(MULTIPART).unwrap())
            .collect();
        assert!(results.into_iter().all(|r| r));
    }

    proptest! {
        #[test]
        fn matches_are_never_invented(
            target in "[abAB]{1,4}",
            text in "[abAB \r\n]{0,64}",
        ) {
            let mut message = b"Subject: x\r\n\r\n".to_vec();
            message.extend_from_slice(text.as_bytes());

            if body(&target, &message) {
                prop_assert!(fold_str(&text).contains(&fold_str(&target)));
            }
        }
    }
}
