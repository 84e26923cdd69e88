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

//! The "base subject" algorithm of RFC 5256 section 2.1.

use crate::mime::encoded_word::decode_unstructured;

/// Reduce `subject` to its RFC 5256 base subject.
///
/// `subject` is the raw header value; encoded words are decoded and folding
/// is removed before `normalise_subject` runs. Case is preserved.
pub fn base_subject(subject: &str) -> String {
    normalise_subject(&decode_unstructured(subject.as_bytes()))
}

/// The base subject of already decoded subject text.
///
/// The result is a fixed point: running it through again changes nothing.
/// This does not hold for `base_subject`, since decoding can itself produce
/// something that looks like an encoded word.
pub fn normalise_subject(subject: &str) -> String {
    let mut subject = collapse_whitespace(subject);

    loop {
        let mut s = strip_trailers(&subject);

        loop {
            let before = s.len();

            while let Some(rest) = strip_leader(s) {
                s = rest;
            }

            if let Some(rest) = strip_blob(s) {
                if !rest.is_empty() {
                    s = rest;
                }
            }

            if before == s.len() {
                break;
            }
        }

        match unwrap_fwd(s) {
            Some(inner) => subject = inner.to_owned(),
            None => return s.to_owned(),
        }
    }
}

/// Convert tabs to spaces and collapse runs of spaces.
fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        let c = if '\t' == c { ' ' } else { c };
        if ' ' == c && out.ends_with(' ') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Remove trailing white space and `(fwd)` trailers.
///
/// A subject which is nothing but `(fwd)` is left alone.
fn strip_trailers(mut s: &str) -> &str {
    loop {
        if s.ends_with(' ') {
            s = &s[..s.len() - 1];
        } else if s.len() > 5
            && s.get(s.len() - 5..)
                .map_or(false, |t| t.eq_ignore_ascii_case("(fwd)"))
        {
            s = &s[..s.len() - 5];
        } else {
            return s;
        }
    }
}

/// Strip one `subj-blob`, i.e., a bracketed group without nested brackets,
/// and the white space after it.
///
/// An unterminated group is not a blob.
fn strip_blob(s: &str) -> Option<&str> {
    if !s.starts_with('[') {
        return None;
    }

    let close = s[1..].find(|c| '[' == c || ']' == c)? + 1;
    if !s[close..].starts_with(']') {
        return None;
    }

    Some(s[close + 1..].trim_start_matches(' '))
}

/// Strip one `subj-leader`: a white space character, or any blobs followed
/// by "re", "fw" or "fwd", optional white space, an optional blob and a
/// colon.
fn strip_leader(s: &str) -> Option<&str> {
    if s.starts_with(' ') {
        return Some(&s[1..]);
    }

    let mut rest = s;
    while let Some(r) = strip_blob(rest) {
        rest = r;
    }

    let prefixed = |p: &str| {
        rest.get(..p.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(p))
    };
    let skip = if prefixed("re") {
        2
    } else if prefixed("fwd") {
        3
    } else if prefixed("fw") {
        2
    } else {
        return None;
    };

    rest = rest[skip..].trim_start_matches(' ');
    if let Some(r) = strip_blob(rest) {
        rest = r;
    }

    if rest.starts_with(':') {
        Some(&rest[1..])
    } else {
        None
    }
}

/// If `s` is of the form `[fwd: ...]`, return what is inside.
fn unwrap_fwd(s: &str) -> Option<&str> {
    let head = s.get(..5)?;
    if head.eq_ignore_ascii_case("[fwd:") && s.ends_with(']') {
        Some(&s[5..s.len() - 1])
    } else {
        None
    }
}
