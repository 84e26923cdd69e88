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

//! Parsers for the structured RFC 5322 and MIME header fields the search
//! core needs to understand.
//!
//! All parsers are lenient about the obsolete syntax of RFC 5322 section 4,
//! since real mail is full of it.

use std::borrow::Cow;

use chrono::prelude::*;
use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, take, take_while1, take_while_m_n},
    character::complete::char,
    combinator::{map, opt},
    error::ErrorKind,
    multi::{
        fold_many0, many0, many0_count, many1_count, separated_nonempty_list,
    },
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::encoded_word::ew_decode;
use super::model::*;

type PResult<'a, T> = IResult<&'a [u8], T>;

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn digits_value(s: &[u8]) -> u32 {
    s.iter()
        .fold(0u32, |acc, &d| acc * 10 + u32::from(d - b'0'))
}

// RFC 5322 3.2.1 "quoted-pair", including the 8-bit clean obsolete syntax
fn quoted_pair(i: &[u8]) -> PResult<&[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 5322 3.2.2 folding white space. Unfolding has not happened yet, so the
// line ending characters are simply more white space.
fn fws(i: &[u8]) -> PResult<&[u8]> {
    map(is_a(" \t\r\n"), |_| &b" "[..])(i)
}

fn ctext(i: &[u8]) -> PResult<&[u8]> {
    is_not("()\\ \t\r\n")(i)
}

fn ccontent(i: &[u8]) -> PResult<()> {
    alt((
        map(ctext, |_| ()),
        map(quoted_pair, |_| ()),
        map(fws, |_| ()),
        comment,
    ))(i)
}

// Comments nest, hence the recursion through `ccontent`
fn comment(i: &[u8]) -> PResult<()> {
    map(delimited(char('('), many0_count(ccontent), char(')')), |_| ())(i)
}

// Unlike the RFC, this never matches the empty string; use `opt(cfws)`.
fn cfws(i: &[u8]) -> PResult<()> {
    map(many1_count(alt((map(fws, |_| ()), comment))), |_| ())(i)
}

fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        // RFC 6532 allows all non-ASCII
        || ch >= 0x80
}

fn atext(i: &[u8]) -> PResult<&[u8]> {
    take_while1(is_atext)(i)
}

fn atom(i: &[u8]) -> PResult<&[u8]> {
    delimited(opt(cfws), atext, opt(cfws))(i)
}

fn qtext(i: &[u8]) -> PResult<&[u8]> {
    is_not(" \t\r\n\\\"")(i)
}

// FWS is treated as part of the content rather than the quoted-string
// production itself, which is equivalent and much simpler.
fn qcontent(i: &[u8]) -> PResult<&[u8]> {
    alt((qtext, quoted_pair, fws))(i)
}

fn quoted_string(i: &[u8]) -> PResult<Vec<u8>> {
    delimited(
        pair(opt(cfws), char('"')),
        fold_many0(qcontent, Vec::new(), |mut acc: Vec<u8>, item| {
            acc.extend_from_slice(item);
            acc
        }),
        pair(char('"'), opt(cfws)),
    )(i)
}

fn word(i: &[u8]) -> PResult<Cow<[u8]>> {
    alt((map(atom, Cow::Borrowed), map(quoted_string, Cow::Owned)))(i)
}

fn obs_dot(i: &[u8]) -> PResult<()> {
    map(terminated(char('.'), opt(cfws)), |_| ())(i)
}

// The obsolete phrase syntax allows bare periods, which many agents put
// unquoted into display names ("J. R. Smith"). A period is glued onto the
// word before it.
fn phrase(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    let (mut i, head) = word(i)?;
    let mut words = vec![head];

    loop {
        if let Ok((rest, w)) = word(i) {
            words.push(w);
            i = rest;
        } else if let Ok((rest, ())) = obs_dot(i) {
            if let Some(last) = words.last_mut() {
                last.to_mut().push(b'.');
            }
            i = rest;
        } else {
            break;
        }
    }

    Ok((i, words))
}

// RFC 5322 3.3 date and time, including the obsolete forms, which amount to
// allowing CFWS between every token.
fn year(i: &[u8]) -> PResult<u32> {
    map(take_while_m_n(2, 4, is_digit), |s: &[u8]| {
        let y = digits_value(s);
        // RFC 5322 4.3
        if 2 == s.len() && y < 50 {
            y + 2000
        } else if s.len() < 4 {
            y + 1900
        } else {
            y
        }
    })(i)
}

fn month(i: &[u8]) -> PResult<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct",
        "nov", "dec",
    ];

    let (rest, name) = take(3usize)(i)?;
    MONTHS
        .iter()
        .position(|m| m.as_bytes().eq_ignore_ascii_case(name))
        .map(|ix| (rest, ix as u32 + 1))
        .ok_or_else(|| nom::Err::Error((i, ErrorKind::Tag)))
}

fn day(i: &[u8]) -> PResult<u32> {
    map(take_while_m_n(1, 2, is_digit), digits_value)(i)
}

fn two_digit(i: &[u8]) -> PResult<u32> {
    map(take_while_m_n(2, 2, is_digit), digits_value)(i)
}

fn colon(i: &[u8]) -> PResult<()> {
    map(tuple((opt(cfws), char(':'), opt(cfws))), |_| ())(i)
}

fn time_of_day(i: &[u8]) -> PResult<(u32, u32, u32)> {
    map(
        tuple((
            two_digit,
            preceded(colon, two_digit),
            opt(preceded(colon, two_digit)),
        )),
        |(h, m, s)| (h, m, s.unwrap_or(0)),
    )(i)
}

/// Returns the zone offset in seconds east of UTC.
fn zone(i: &[u8]) -> PResult<i32> {
    let numeric = map(
        pair(alt((char('+'), char('-'))), take_while_m_n(4, 4, is_digit)),
        |(sign, hhmm): (char, &[u8])| {
            let hhmm = digits_value(hhmm) as i32;
            let secs = hhmm / 100 * 3600 + hhmm % 100 * 60;
            if '-' == sign {
                -secs
            } else {
                secs
            }
        },
    );

    let named = map(take_while1(|b: u8| b.is_ascii_alphabetic()), |z: &[u8]| {
        let hours = match z.to_ascii_lowercase().as_slice() {
            b"edt" => -4,
            b"est" | b"cdt" => -5,
            b"cst" | b"mdt" => -6,
            b"mst" | b"pdt" => -7,
            b"pst" => -8,
            // UT, GMT, the military zones and anything unknown are all
            // treated as UTC, as RFC 5322 4.3 requires.
            _ => 0,
        };
        hours * 3600
    });

    alt((numeric, named))(i)
}

fn date_time(i: &[u8]) -> PResult<Option<DateTime<FixedOffset>>> {
    let (i, _) = opt(cfws)(i)?;
    // Day of week; its value is irrelevant
    let (i, _) = opt(tuple((atext, opt(cfws), char(','), opt(cfws))))(i)?;
    let (i, day) = terminated(day, opt(cfws))(i)?;
    let (i, month) = terminated(month, opt(cfws))(i)?;
    let (i, year) = terminated(year, opt(cfws))(i)?;
    let (i, (hour, minute, second)) = terminated(time_of_day, opt(cfws))(i)?;
    let (i, zone) = terminated(opt(zone), opt(cfws))(i)?;

    let date = FixedOffset::east_opt(zone.unwrap_or(0)).and_then(|off| {
        off.with_ymd_and_hms(year as i32, month, day, hour, minute, second)
            .single()
    });
    Ok((i, date))
}

fn local_part(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    separated_nonempty_list(char('.'), word)(i)
}

fn dtext(i: &[u8]) -> PResult<&[u8]> {
    is_not("[]\\ \t\r\n")(i)
}

fn domain_literal(i: &[u8]) -> PResult<Vec<u8>> {
    map(
        delimited(
            pair(opt(cfws), char('[')),
            fold_many0(
                alt((dtext, quoted_pair, fws)),
                vec![b'['],
                |mut acc: Vec<u8>, item| {
                    acc.extend_from_slice(item);
                    acc
                },
            ),
            pair(char(']'), opt(cfws)),
        ),
        |mut literal| {
            literal.push(b']');
            literal
        },
    )(i)
}

// Dot-atoms are a subset of the obsolete domain syntax, so only that form is
// parsed.
fn domain(i: &[u8]) -> PResult<Vec<Cow<[u8]>>> {
    alt((
        separated_nonempty_list(char('.'), map(atom, Cow::Borrowed)),
        map(domain_literal, |v| vec![Cow::Owned(v)]),
    ))(i)
}

fn addr_spec(i: &[u8]) -> PResult<AddrSpec> {
    map(
        pair(local_part, preceded(char('@'), domain)),
        |(local, domain)| AddrSpec { local, domain },
    )(i)
}

// RFC 5322 4.4 obsolete source routes, which are discarded
fn obs_route(i: &[u8]) -> PResult<()> {
    map(
        tuple((
            opt(cfws),
            char('@'),
            domain,
            many0_count(tuple((
                many1_count(alt((cfws, map(char(','), |_| ())))),
                char('@'),
                domain,
            ))),
            char(':'),
        )),
        |_| (),
    )(i)
}

fn angle_addr(i: &[u8]) -> PResult<AddrSpec> {
    delimited(
        tuple((opt(cfws), char('<'), opt(obs_route))),
        addr_spec,
        pair(char('>'), opt(cfws)),
    )(i)
}

fn mailbox(i: &[u8]) -> PResult<MailboxSpec> {
    alt((
        map(pair(opt(phrase), angle_addr), |(name, addr)| MailboxSpec {
            addr,
            name: name.unwrap_or_default(),
        }),
        map(addr_spec, |addr| MailboxSpec { addr, name: vec![] }),
    ))(i)
}

// One or more commas; the obsolete syntax allows empty list elements
fn list_delim(i: &[u8]) -> PResult<()> {
    map(many1_count(tuple((opt(cfws), char(','), opt(cfws)))), |_| ())(i)
}

fn mailbox_list(i: &[u8]) -> PResult<Vec<MailboxSpec>> {
    separated_nonempty_list(list_delim, mailbox)(i)
}

fn group(i: &[u8]) -> PResult<GroupSpec> {
    map(
        pair(
            terminated(phrase, char(':')),
            terminated(
                opt(mailbox_list),
                tuple((opt(cfws), opt(char(';')), opt(cfws))),
            ),
        ),
        |(name, boxes)| GroupSpec {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

fn address(i: &[u8]) -> PResult<Address> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

fn address_list(i: &[u8]) -> PResult<Vec<Address>> {
    delimited(
        opt(list_delim),
        separated_nonempty_list(list_delim, address),
        opt(list_delim),
    )(i)
}

fn is_token_char(ch: u8) -> bool {
    ch > b' ' && ch < 127 && !b"()<>@,;:\\\"/[]?=".contains(&ch)
}

fn token(i: &[u8]) -> PResult<&[u8]> {
    take_while1(is_token_char)(i)
}

fn parameter(i: &[u8]) -> PResult<(Cow<[u8]>, Cow<[u8]>)> {
    preceded(
        pair(char(';'), opt(cfws)),
        pair(
            map(terminated(token, equals), Cow::Borrowed),
            terminated(
                alt((
                    map(token, Cow::Borrowed),
                    map(quoted_string, Cow::Owned),
                )),
                opt(cfws),
            ),
        ),
    )(i)
}

fn equals(i: &[u8]) -> PResult<()> {
    map(tuple((opt(cfws), char('='), opt(cfws))), |_| ())(i)
}

fn parameters(i: &[u8]) -> PResult<Vec<(Cow<[u8]>, Cow<[u8]>)>> {
    terminated(many0(parameter), opt(pair(char(';'), opt(cfws))))(i)
}

fn content_type(i: &[u8]) -> PResult<ContentType> {
    map(
        tuple((
            delimited(opt(cfws), token, opt(cfws)),
            preceded(char('/'), delimited(opt(cfws), token, opt(cfws))),
            parameters,
        )),
        |(typ, subtype, parms)| ContentType {
            typ: Cow::Borrowed(typ),
            subtype: Cow::Borrowed(subtype),
            parms,
        },
    )(i)
}

fn content_disposition(i: &[u8]) -> PResult<ContentDisposition> {
    map(
        pair(delimited(opt(cfws), token, opt(cfws)), parameters),
        |(disposition, parms)| ContentDisposition {
            disposition: Cow::Borrowed(disposition),
            parms,
        },
    )(i)
}

/// Parse an address-list header value (`From`, `To`, etc).
///
/// Returns `None` if the value is not a syntactically valid address list.
pub fn parse_address_list(value: &[u8]) -> Option<Vec<Address<'_>>> {
    match address_list(value) {
        Ok((rest, list)) if rest.is_empty() => Some(list),
        _ => None,
    }
}

/// Parse an RFC 5322 date-time header value.
///
/// Returns `None` if the value is unparsable or describes an impossible
/// date.
pub fn parse_datetime(value: &[u8]) -> Option<DateTime<FixedOffset>> {
    date_time(value).ok().and_then(|(_, date)| date)
}

pub fn parse_content_type(value: &[u8]) -> Option<ContentType<'_>> {
    content_type(value).ok().map(|(_, ct)| ct)
}

pub fn parse_content_disposition(
    value: &[u8],
) -> Option<ContentDisposition<'_>> {
    content_disposition(value).ok().map(|(_, cd)| cd)
}

pub fn parse_content_transfer_encoding(
    value: &[u8],
) -> Option<ContentTransferEncoding> {
    let (_, cte) =
        delimited(opt(cfws), token, opt(cfws))(value).ok()?;

    let cte = if cte.eq_ignore_ascii_case(b"7bit") {
        ContentTransferEncoding::SevenBit
    } else if cte.eq_ignore_ascii_case(b"8bit") {
        ContentTransferEncoding::EightBit
    } else if cte.eq_ignore_ascii_case(b"binary") {
        ContentTransferEncoding::Binary
    } else if cte.eq_ignore_ascii_case(b"quoted-printable") {
        ContentTransferEncoding::QuotedPrintable
    } else if cte.eq_ignore_ascii_case(b"base64") {
        ContentTransferEncoding::Base64
    } else {
        return None;
    };
    Some(cte)
}

/// Decode a MIME parameter value for display or matching.
///
/// Handles the RFC 2231 extended form (`name*=charset'lang'pct-encoded`) when
/// `extended` is true, and RFC 2047 encoded words, which some agents put in
/// parameter values despite that being forbidden.
pub fn decode_parameter(value: &[u8], extended: bool) -> String {
    if extended {
        let mut parts = value.splitn(3, |&b| b'\'' == b);
        if let (Some(charset), Some(_), Some(encoded)) =
            (parts.next(), parts.next(), parts.next())
        {
            let raw = percent_decode(encoded);
            let encoding = if charset.is_empty() {
                Some(encoding_rs::UTF_8)
            } else {
                encoding_rs::Encoding::for_label_no_replacement(charset)
            };
            if let Some(encoding) = encoding {
                return encoding.decode_with_bom_removal(&raw).0.into_owned();
            }
        }
    }

    let text = String::from_utf8_lossy(value);
    match ew_decode(text.trim()) {
        Some(decoded) => decoded.into_owned(),
        None => text.into_owned(),
    }
}

fn percent_decode(s: &[u8]) -> Vec<u8> {
    fn hex(b: u8) -> Option<u8> {
        (b as char).to_digit(16).map(|d| d as u8)
    }

    let mut out = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        if b'%' == s[ix] {
            if let (Some(&hi), Some(&lo)) = (s.get(ix + 1), s.get(ix + 2)) {
                if let (Some(hi), Some(lo)) = (hex(hi), hex(lo)) {
                    out.push(hi << 4 | lo);
                    ix += 3;
                    continue;
                }
            }
        }

        out.push(s[ix]);
        ix += 1;
    }
    out
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn s(v: &[Cow<[u8]>]) -> Vec<String> {
        v.iter()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    fn mailbox_strings(value: &str) -> Vec<(Vec<String>, String)> {
        parse_address_list(value.as_bytes())
            .unwrap()
            .iter()
            .flat_map(|a| a.mailboxes().cloned().collect::<Vec<_>>())
            .map(|m| (s(&m.name), m.addr.to_address()))
            .collect()
    }

    #[test]
    fn parse_simple_addresses() {
        assert_eq!(
            vec![(vec![], "jane@example.com".to_owned())],
            mailbox_strings(" jane@example.com")
        );
        assert_eq!(
            vec![(
                vec!["Jane".to_owned(), "Doe".to_owned()],
                "jane.doe@example.com".to_owned()
            )],
            mailbox_strings("Jane Doe <jane.doe@example.com>")
        );
        assert_eq!(
            vec![(
                vec!["Doe, Jane".to_owned()],
                "jane@example.com".to_owned()
            )],
            mailbox_strings("\"Doe, Jane\" <jane@example.com> (work)")
        );
    }

    #[test]
    fn parse_address_lists_and_groups() {
        assert_eq!(
            vec![
                (vec![], "a@example.com".to_owned()),
                (vec![], "b@example.com".to_owned()),
                (vec!["C".to_owned()], "c@example.com".to_owned()),
            ],
            mailbox_strings(
                "a@example.com,,\r\n b@example.com, C <c@example.com>,"
            )
        );

        let list = parse_address_list(
            b"Team: x@example.org, y@example.org;, z@example.org",
        )
        .unwrap();
        assert_eq!(2, list.len());
        match list[0] {
            Address::Group(ref g) => {
                assert_eq!(vec!["Team"], s(&g.name));
                assert_eq!(2, g.boxes.len());
            }
            ref a => panic!("Unexpected address: {:?}", a),
        }

        let empty_group =
            parse_address_list(b"undisclosed-recipients:;").unwrap();
        assert_eq!(1, empty_group.len());
        match empty_group[0] {
            Address::Group(ref g) => assert!(g.boxes.is_empty()),
            ref a => panic!("Unexpected address: {:?}", a),
        }
    }

    #[test]
    fn parse_obsolete_syntax() {
        assert_eq!(
            vec![(
                vec!["Mr.".to_owned(), "J.".to_owned(), "Smith".to_owned()],
                "smith@example.com".to_owned()
            )],
            mailbox_strings(
                "Mr. J. Smith <@relay.example,@other.example:smith@example.com>"
            )
        );
        assert_eq!(
            vec![(vec![], "x@[127.0.0.1]".to_owned())],
            mailbox_strings("x@[127.0.0.1]")
        );
    }

    #[test]
    fn reject_garbage_addresses() {
        assert!(parse_address_list(b"").is_none());
        assert!(parse_address_list(b"not an address").is_none());
        assert!(parse_address_list(b"<unterminated@example.com").is_none());
    }

    fn dt(value: &str) -> Option<String> {
        parse_datetime(value.as_bytes()).map(|d| d.to_rfc3339())
    }

    #[test]
    fn parse_dates() {
        assert_eq!(
            Some("2020-06-15T13:04:05+02:00".to_owned()),
            dt("Mon, 15 Jun 2020 13:04:05 +0200")
        );
        assert_eq!(
            Some("2020-06-15T13:04:00-05:00".to_owned()),
            dt(" 15 jun 2020 13:04 EST")
        );
        assert_eq!(
            Some("1999-12-31T23:59:59+00:00".to_owned()),
            dt("Fri, 31 Dec 99 23:59:59 GMT (comment)")
        );
        assert_eq!(
            Some("2020-01-02T03:04:05-09:30".to_owned()),
            dt("Thu , 2 Jan 2020 03 : 04 : 05 -0930")
        );
        assert_eq!(
            Some("2020-01-02T03:04:05+00:00".to_owned()),
            dt("2 Jan 2020 03:04:05")
        );

        assert_eq!(None, dt("yesterday"));
        assert_eq!(None, dt("31 Feb 2020 00:00:00 +0000"));
        assert_eq!(None, dt(""));
    }

    #[test]
    fn parse_content_headers() {
        let ct = parse_content_type(
            b" multipart/mixed;\r\n boundary=\"=-=-=\"; charset=utf-8;",
        )
        .unwrap();
        assert!(ct.is_type("multipart"));
        assert!(ct.is_subtype("mixed"));
        assert_eq!(Some(&b"=-=-="[..]), ct.parm("boundary"));
        assert_eq!(Some(&b"utf-8"[..]), ct.parm("CHARSET"));

        assert!(parse_content_type(b"text").is_none());

        let cd = parse_content_disposition(
            b"attachment; filename=\"report.pdf\"",
        )
        .unwrap();
        assert!(cd.is_attachment());
        assert_eq!(Some(&b"report.pdf"[..]), cd.parm("filename"));

        assert_eq!(
            Some(ContentTransferEncoding::Base64),
            parse_content_transfer_encoding(b" BASE64\r\n")
        );
        assert_eq!(
            Some(ContentTransferEncoding::QuotedPrintable),
            parse_content_transfer_encoding(b"quoted-printable")
        );
        assert_eq!(None, parse_content_transfer_encoding(b"x-uuencode"));
    }

    #[test]
    fn decode_parameters() {
        assert_eq!("plain.txt", decode_parameter(b"plain.txt", false));
        assert_eq!(
            "café.txt",
            decode_parameter(b"utf-8''caf%C3%A9.txt", true)
        );
        assert_eq!(
            "résumé.doc",
            decode_parameter(b"=?ISO-8859-1?Q?r=E9sum=E9.doc?=", false)
        );
    }

    proptest! {
        #[test]
        fn parsers_never_panic(s in ".*") {
            parse_address_list(s.as_bytes());
            parse_datetime(s.as_bytes());
            parse_content_type(s.as_bytes());
            parse_content_disposition(s.as_bytes());
            parse_content_transfer_encoding(s.as_bytes());
        }
    }
}
