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

/// Decodes quoted-printable encoding, as described by RFC 2045, appending
/// the result to `out`.
///
/// Encoded bytes and soft line endings are both handled, the latter by
/// discarding. UNIX line endings are handled as well as DOS line endings.
///
/// This never fails. Invalid sequences are passed through untransformed.
/// 8-bit characters are passed through, including invalid UTF-8.
///
/// Returns the number of bytes of `input` consumed. Anything after that is
/// an escape sequence which is not yet complete; a streaming caller should
/// prepend it to the next chunk.
pub fn qp_decode(input: &[u8], out: &mut Vec<u8>) -> usize {
    let mut ix = 0;
    while ix < input.len() {
        let rest = &input[ix..];
        let eq = match memchr::memchr(b'=', rest) {
            Some(eq) => eq,
            None => {
                out.extend_from_slice(rest);
                return input.len();
            }
        };

        out.extend_from_slice(&rest[..eq]);
        ix += eq;

        match (input.get(ix + 1), input.get(ix + 2)) {
            // Soft line break with UNIX ending
            (Some(b'\n'), _) => ix += 2,
            // Soft line break with DOS ending
            (Some(b'\r'), Some(b'\n')) => ix += 3,
            (Some(&hi), Some(&lo)) => match (hex(hi), hex(lo)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    ix += 3;
                }
                _ => {
                    out.push(b'=');
                    ix += 1;
                }
            },
            // Fewer than two bytes follow; can't tell what this is yet
            _ => return ix,
        }
    }

    input.len()
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn assert_qp(expected: &[u8], expected_dangling: &[u8], input: &[u8]) {
        let mut actual = Vec::new();
        let consumed = qp_decode(input, &mut actual);
        assert_eq!(expected, &actual[..]);
        assert_eq!(expected_dangling, &input[consumed..]);
    }

    #[test]
    fn test_qp_decode() {
        assert_qp(b"hello world", b"", b"hello world");
        assert_qp(b"\xabfoo", b"", b"=ABfoo");
        assert_qp(b"fo\xabo", b"", b"fo=abo");
        assert_qp(b"foo\xab\xcd", b"", b"foo=AB=CD");

        assert_qp(b"foo", b"", b"foo=\n");
        assert_qp(b"foobar", b"", b"foo=\nbar");
        assert_qp(b"foobar", b"", b"foo=\r\nbar");

        assert_qp(b"foo=()bar", b"", b"foo=()bar");
        assert_qp(b"foo=\xabbar", b"", b"foo==ABbar");
        assert_qp(b"foo=A\xabbar", b"", b"foo=A=ABbar");
        assert_qp("foo=ゑbar".as_bytes(), b"", "foo=ゑbar".as_bytes());

        assert_qp(b"foo", b"=", b"foo=");
        assert_qp(b"foo", b"=A", b"foo=A");
        assert_qp(b"foo", b"=\r", b"foo=\r");
    }

    #[test]
    fn dangling_escape_completes_in_next_chunk() {
        let mut out = Vec::new();
        let first = b"caf=C";
        let consumed = qp_decode(first, &mut out);
        let mut second = first[consumed..].to_vec();
        second.extend_from_slice(b"3=A9!");
        qp_decode(&second, &mut out);
        assert_eq!("café!".as_bytes(), &out[..]);
    }

    proptest! {
        #[test]
        fn qp_decode_never_fails_for_bytes(
            s in prop::collection::vec(prop::num::u8::ANY, 0..20)
        ) {
            let mut out = Vec::new();
            let consumed = qp_decode(&s, &mut out);
            prop_assert!(consumed <= s.len());
            prop_assert!(s.len() - consumed <= 2);
        }
    }
}
