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

use std::fmt;

use encoding_rs::{CoderResult, Encoding};

use super::model::ContentTransferEncoding;
use super::quoted_printable::qp_decode;
use super::tokenizer::PartInfo;
use crate::support::error::Error;

/// Streaming decoder which turns the raw body of a leaf part into text.
///
/// The transfer encoding is always decoded. The result is then decoded from
/// the charset of the part into UTF-8. Text parts without a charset are
/// US-ASCII; non-text parts are read as UTF-8, which makes any text embedded
/// in them visible to searches. Invalid sequences are replaced.
pub struct BodyDecoder {
    transfer_encoding: ContentTransferEncoding,
    charset_decoder: encoding_rs::Decoder,
    input_buffer: Vec<u8>,
    cte_buffer: Vec<u8>,
    text: String,
}

impl fmt::Debug for BodyDecoder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("BodyDecoder")
            .field("transfer_encoding", &self.transfer_encoding)
            .field("charset", &self.charset_decoder.encoding().name())
            .field("input_buffer", &self.input_buffer)
            .finish()
    }
}

impl BodyDecoder {
    /// Create a decoder for the body of `part`.
    ///
    /// Fails with `UnknownCharset` if the part declares a charset that is
    /// not recognised.
    pub fn new(part: &PartInfo) -> Result<Self, Error> {
        let is_text = part.content_type.is_type("text");
        let charset: &[u8] = match part.content_type.parm("charset") {
            Some(charset) if is_text => charset,
            _ if is_text => b"us-ascii",
            _ => b"utf-8",
        };

        let encoding = Encoding::for_label_no_replacement(charset)
            .ok_or_else(|| {
                Error::UnknownCharset(
                    String::from_utf8_lossy(charset).into_owned(),
                )
            })?;

        Ok(BodyDecoder {
            transfer_encoding: part.transfer_encoding,
            charset_decoder: encoding.new_decoder_with_bom_removal(),
            input_buffer: Vec::new(),
            cte_buffer: Vec::new(),
            text: String::new(),
        })
    }

    /// Decode the next chunk of raw content.
    ///
    /// The returned text may be empty if the chunk ended in the middle of an
    /// encoded unit; the remainder is carried into the next call.
    pub fn push(&mut self, data: &[u8]) -> &str {
        use super::model::ContentTransferEncoding as CTE;

        self.cte_buffer.clear();
        match self.transfer_encoding {
            CTE::SevenBit | CTE::EightBit | CTE::Binary => (),
            CTE::Base64 => self.decode_base64(data),
            CTE::QuotedPrintable => self.decode_qp(data),
        }

        let bytes = match self.transfer_encoding {
            CTE::Base64 | CTE::QuotedPrintable => &self.cte_buffer[..],
            _ => data,
        };

        self.text.clear();
        decode_into(&mut self.charset_decoder, bytes, &mut self.text, false);
        &self.text
    }

    /// Flush whatever the charset decoder is still holding.
    ///
    /// Incomplete transfer-encoded units at the end of the content are
    /// discarded.
    pub fn finish(&mut self) -> &str {
        self.input_buffer.clear();
        self.text.clear();
        decode_into(&mut self.charset_decoder, &[], &mut self.text, true);
        &self.text
    }

    fn decode_base64(&mut self, data: &[u8]) {
        self.input_buffer.extend(data.iter().copied().filter(|&b| {
            b.is_ascii_alphanumeric() || b'+' == b || b'/' == b || b'=' == b
        }));

        let usable_length = self.input_buffer.len() / 4 * 4;
        if 0 == usable_length {
            return;
        }

        // Garbage is dropped rather than reported; there is nothing useful
        // to do with it for searching.
        let _ = base64::decode_config_buf(
            &self.input_buffer[..usable_length],
            base64::STANDARD,
            &mut self.cte_buffer,
        );
        self.input_buffer.drain(..usable_length);
    }

    fn decode_qp(&mut self, data: &[u8]) {
        if self.input_buffer.is_empty() {
            let consumed = qp_decode(data, &mut self.cte_buffer);
            self.input_buffer.extend_from_slice(&data[consumed..]);
        } else {
            self.input_buffer.extend_from_slice(data);
            let consumed = qp_decode(&self.input_buffer, &mut self.cte_buffer);
            self.input_buffer.drain(..consumed);
        }
    }
}

fn decode_into(
    decoder: &mut encoding_rs::Decoder,
    mut src: &[u8],
    dst: &mut String,
    last: bool,
) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or_else(|| src.len().saturating_mul(3));
        dst.reserve(needed);

        let (result, nread, _) = decoder.decode_to_string(src, dst, last);
        src = &src[nread..];
        if let CoderResult::InputEmpty = result {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::header;
    use crate::mime::model::ContentType;

    fn part(ct: &str, cte: ContentTransferEncoding) -> PartInfo {
        PartInfo {
            content_type: header::parse_content_type(ct.as_bytes())
                .map(ContentType::into_owned)
                .unwrap(),
            transfer_encoding: cte,
            disposition: None,
            depth: 0,
            has_children: false,
        }
    }

    fn decode_all(part: &PartInfo, chunks: &[&[u8]]) -> String {
        let mut decoder = BodyDecoder::new(part).unwrap();
        let mut out = String::new();
        for chunk in chunks {
            out.push_str(decoder.push(chunk));
        }
        out.push_str(decoder.finish());
        out
    }

    #[test]
    fn identity_encoding() {
        let part = part(
            "text/plain; charset=utf-8",
            ContentTransferEncoding::EightBit,
        );
        assert_eq!(
            "grüße\r\nzwei",
            decode_all(
                &part,
                &["grü".as_bytes(), "ße".as_bytes(), b"\r\n", b"zwei"]
            )
        );
    }

    #[test]
    fn base64_split_across_lines() {
        let part =
            part("text/plain; charset=utf-8", ContentTransferEncoding::Base64);
        assert_eq!(
            "hello wörld",
            decode_all(
                &part,
                &[b"aGVsbG8g", b"\r\n", b"d8O2c", b"\r\n", b"mxk"]
            )
        );
    }

    #[test]
    fn quoted_printable_latin1() {
        let part = part(
            "text/plain; charset=iso-8859-1",
            ContentTransferEncoding::QuotedPrintable,
        );
        assert_eq!(
            "café au lait",
            decode_all(&part, &[b"caf=", b"E9 au =", b"\r\n", b"lait"])
        );
    }

    #[test]
    fn split_multibyte_character() {
        let part =
            part("text/plain; charset=utf-8", ContentTransferEncoding::Binary);
        let euro = "€".as_bytes();
        assert_eq!("€", decode_all(&part, &[&euro[..1], &euro[1..]]));
    }

    #[test]
    fn defaults_and_unknown_charsets() {
        let binary =
            part("application/octet-stream", ContentTransferEncoding::Binary);
        assert_eq!("ünïcode", decode_all(&binary, &["ünïcode".as_bytes()]));

        let unknown = part(
            "text/plain; charset=x-no-such-thing",
            ContentTransferEncoding::SevenBit,
        );
        match BodyDecoder::new(&unknown) {
            Err(Error::UnknownCharset(cs)) => {
                assert_eq!("x-no-such-thing", cs)
            }
            r => panic!("Unexpected result: {:?}", r),
        }
    }
}
