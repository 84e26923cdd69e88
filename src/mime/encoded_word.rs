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

//! RFC 2047 encoded words.

use std::borrow::Cow;

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

use super::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
    static ref WORD_OR_SPACE: Regex = Regex::new(r"[^ \t]+|[ \t]+").unwrap();
}

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word".
///
/// If it is, decode it and return its decoded value. Returns `None` if it is
/// not an encoded word or if it could not be decoded.
///
/// The `Option` matters to callers since whitespace between two adjacent
/// encoded words is deleted, but must be left alone in all other cases.
///
/// The RFC 2047 length limit of 75 characters is not enforced, since real
/// agents produce longer words and other readers accept them.
pub fn ew_decode(word: &str) -> Option<Cow<str>> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    let transfer_encoding = captures.get(2)?.as_str();
    let content = captures.get(3)?.as_str().as_bytes();

    let bytes: Vec<u8> = match transfer_encoding {
        "q" | "Q" => {
            // _ stands for ASCII space regardless of charset, but only in the
            // encoded form
            let spaced: Vec<u8> = content
                .iter()
                .map(|&b| if b'_' == b { b' ' } else { b })
                .collect();
            let mut decoded = Vec::with_capacity(spaced.len());
            qp_decode(&spaced, &mut decoded);
            decoded
        }
        "b" | "B" => base64::decode(content).ok()?,
        _ => return None,
    };

    // RFC 2231 allows a language suffix on the charset
    let charset = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label_no_replacement(charset.as_bytes())?;
    Some(Cow::Owned(
        encoding.decode_with_bom_removal(&bytes).0.into_owned(),
    ))
}

/// Decode an unstructured header value for display or matching.
///
/// Line folding is removed, every encoded word is decoded, and whitespace
/// between adjacent encoded words is dropped. Bytes which are not valid UTF-8
/// are replaced.
pub fn decode_unstructured(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let unfolded: String =
        text.chars().filter(|&c| '\r' != c && '\n' != c).collect();

    let mut out = String::with_capacity(unfolded.len());
    let mut pending_space = "";
    let mut last_was_encoded = false;

    for token in WORD_OR_SPACE.find_iter(&unfolded) {
        let token = token.as_str();
        if token.starts_with(' ') || token.starts_with('\t') {
            pending_space = token;
            continue;
        }

        match ew_decode(token) {
            Some(decoded) => {
                if !last_was_encoded {
                    out.push_str(pending_space);
                }
                out.push_str(&decoded);
                last_was_encoded = true;
            }
            None => {
                out.push_str(pending_space);
                out.push_str(token);
                last_was_encoded = false;
            }
        }
        pending_space = "";
    }

    out.push_str(pending_space);
    out
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_ew_decode() {
        assert_eq!(None, ew_decode("hello world"));
        assert_eq!(None, ew_decode("=?utf-8?x?abc?="));
        assert_eq!(None, ew_decode("=?no-such-charset?q?abc?="));

        // Examples from RFC 2047
        assert_eq!(
            "Keith Moore",
            ew_decode("=?US-ASCII?Q?Keith_Moore?=").unwrap()
        );
        assert_eq!(
            "Keld Jørn Simonsen",
            ew_decode("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=").unwrap()
        );
        assert_eq!(
            "If you can read this yo",
            ew_decode("=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?=")
                .unwrap()
        );
        assert_eq!(
            "םולש ןב ילטפנ",
            ew_decode("=?iso-8859-8?b?7eXs+SDv4SDp7Oj08A==?=").unwrap()
        );
        assert_eq!("a", ew_decode("=?US-ASCII*EN?Q?a?=").unwrap());
    }

    #[test]
    fn test_decode_unstructured() {
        assert_eq!("plain text", decode_unstructured(b"plain text"));
        assert_eq!(
            " folded value",
            decode_unstructured(b" folded\r\n value")
        );
        // Examples from RFC 2047 section 8
        assert_eq!(
            "(=?ISO-8859-1?Q?a?=)",
            decode_unstructured(b"(=?ISO-8859-1?Q?a?=)")
        );
        assert_eq!("a b", decode_unstructured(b"=?ISO-8859-1?Q?a?= b"));
        assert_eq!(
            "ab",
            decode_unstructured(b"=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=")
        );
        assert_eq!(
            "ab",
            decode_unstructured(
                b"=?ISO-8859-1?Q?a?=\r\n    =?ISO-8859-1?Q?b?="
            )
        );
        assert_eq!(
            "a b",
            decode_unstructured(b"=?ISO-8859-1?Q?a_b?=")
        );
        assert_eq!(
            "Re: Grüße ",
            decode_unstructured(b"Re: =?utf-8?q?Gr=C3=BC=C3=9Fe?= ")
        );
    }

    proptest! {
        #[test]
        fn ew_decode_never_panics(s in r"=\?.*\?.*\?.*\?=") {
            ew_decode(&s);
        }

        #[test]
        fn decode_unstructured_is_identity_on_plain_text(
            s in "[a-zA-Z0-9 .,:()]{0,40}"
        ) {
            prop_assert_eq!(s.clone(), decode_unstructured(s.as_bytes()));
        }
    }
}
