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

//! Recursive evaluation of a criterion tree against one message.

use chrono::prelude::*;

use super::content_matcher::{fold_str, ContentMatcher, HeaderScope};
use super::message_view::MessageView;
use crate::mailbox::model::*;
use crate::mailbox::query::*;
use crate::mime::encoded_word::decode_unstructured;
use crate::mime::header;
use crate::support::error::Error;

/// The header fields the `TEXT` scope looks at in addition to the body.
const TEXT_HEADERS: &[&str] = &["From", "To", "Cc", "Bcc", "Subject"];

/// Whether `message` satisfies every top-level criterion of `query`.
///
/// Fails with `UnsupportedSearchOperation` if the query contains a criterion
/// that cannot be evaluated, regardless of whether evaluation would have
/// reached it. Any other error concerns only this message.
pub fn is_match(
    query: &SearchQuery,
    message: &MailboxMessage,
) -> Result<bool, Error> {
    check_supported(&query.criteria)?;
    evaluate_all(
        &query.criteria,
        &mut MessageView::new(message),
        &query.recent_uids,
    )
}

/// Evaluate a single criterion against `message`.
///
/// `recent_uids` answers `\Recent`, which is not stored with the message.
pub fn matches(
    criterion: &Criterion,
    message: &MailboxMessage,
    recent_uids: &UidSet,
) -> Result<bool, Error> {
    check_supported(std::slice::from_ref(criterion))?;
    evaluate(criterion, &mut MessageView::new(message), recent_uids)
}

/// Fail if any criterion in the tree cannot be evaluated.
pub fn check_supported(criteria: &[Criterion]) -> Result<(), Error> {
    for criterion in criteria {
        match *criterion {
            Criterion::SaveDate(..) => {
                return Err(Error::UnsupportedSearchOperation(
                    "SAVEDATE".to_owned(),
                ))
            }
            Criterion::And(ref children)
            | Criterion::Or(ref children)
            | Criterion::Nor(ref children) => check_supported(children)?,
            _ => (),
        }
    }

    Ok(())
}

/// AND of `criteria`, short-circuiting on the first false one.
pub(crate) fn evaluate_all(
    criteria: &[Criterion],
    view: &mut MessageView<'_>,
    recent_uids: &UidSet,
) -> Result<bool, Error> {
    for criterion in criteria {
        if !evaluate(criterion, view, recent_uids)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn evaluate(
    criterion: &Criterion,
    view: &mut MessageView<'_>,
    recent_uids: &UidSet,
) -> Result<bool, Error> {
    let message = view.message;

    match *criterion {
        Criterion::All => Ok(true),
        Criterion::Uid(ref uids) => Ok(uids.contains(message.uid)),
        Criterion::Flag { flag, set } => {
            let present = match flag.stored() {
                Some(stored) => message.has_flag(&stored),
                None => recent_uids.contains(message.uid),
            };
            Ok(set == present)
        }
        Criterion::Keyword { ref keyword, set } => Ok(set
            == message.has_flag(&Flag::Keyword(keyword.clone()))),
        Criterion::Header { ref name, ref op } => {
            evaluate_header(name, op, view)
        }
        Criterion::Size(op) => Ok(op.matches(message.size)),
        Criterion::ModSeq(op) => Ok(op.matches(message.modseq.0)),
        Criterion::InternalDate(ref op) => {
            Ok(op.matches(message.internal_date))
        }
        Criterion::SaveDate(..) => Err(Error::UnsupportedSearchOperation(
            "SAVEDATE".to_owned(),
        )),
        Criterion::Text { scope, ref value } => {
            let matcher = match scope {
                TextScope::Body => ContentMatcher::new(value, true, false),
                TextScope::Full => ContentMatcher::new(value, true, true),
                TextScope::Text => ContentMatcher::new(value, true, false)
                    .with_header_scope(HeaderScope::Named(
                        TEXT_HEADERS.iter().map(|&h| h.to_owned()).collect(),
                    )),
                TextScope::Attachments => {
                    ContentMatcher::new(value, true, false).attachments_only()
                }
            };
            matcher.matches(message.open()?)
        }
        Criterion::AttachmentFileName(ref value) => {
            let value = fold_str(value);
            Ok(view
                .parts()?
                .filenames
                .iter()
                .any(|filename| fold_str(filename).contains(&value)))
        }
        Criterion::HasAttachment(has) => {
            Ok(has == view.parts()?.has_attachment)
        }
        Criterion::MessageId(ref id) => Ok(*id == message.message_id),
        Criterion::ThreadId(ref id) => Ok(*id == message.thread_id),
        Criterion::And(ref children) => {
            evaluate_all(children, view, recent_uids)
        }
        Criterion::Or(ref children) => {
            for child in children {
                if evaluate(child, view, recent_uids)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Criterion::Nor(ref children) => {
            for child in children {
                if evaluate(child, view, recent_uids)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn evaluate_header(
    name: &str,
    op: &HeaderOperator,
    view: &mut MessageView<'_>,
) -> Result<bool, Error> {
    match *op {
        HeaderOperator::Exists => Ok(view.first_header(name)?.is_some()),

        HeaderOperator::Contains(ref value) => {
            let value = fold_str(value);
            Ok(view.header_values(name)?.into_iter().any(|raw| {
                fold_str(&decode_unstructured(raw)).contains(&value)
            }))
        }

        // The zone offset is ignored: the wall-clock fields of the header
        // are compared as if they were UTC
        HeaderOperator::Date(ref op) => Ok(view
            .first_header(name)?
            .and_then(header::parse_datetime)
            .map_or(false, |date| {
                op.matches(Utc.from_utc_datetime(&date.naive_local()))
            })),

        HeaderOperator::Address(ref value) => {
            let raw = match view.first_header(name)? {
                Some(raw) => raw,
                None => return Ok(false),
            };
            let value = fold_str(value);

            // Decoded display forms are tried first; the raw text carries
            // the encoded form as transmitted
            let in_mailbox = header::parse_address_list(raw)
                .unwrap_or_default()
                .iter()
                .flat_map(|address| address.mailboxes())
                .any(|mailbox| {
                    fold_str(&mailbox.display_form()).contains(&value)
                });

            Ok(in_mailbox
                || fold_str(&String::from_utf8_lossy(raw)).contains(&value))
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::test_data::*;

    fn at(
        y: i32,
        mo: u32,
        d: u32,
        h: u32,
        mi: u32,
        s: u32,
    ) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
    }

    fn is(criterion: Criterion, message: &MailboxMessage) -> bool {
        matches(&criterion, message, &UidSet::new()).unwrap()
    }

    #[test]
    fn metadata_criteria() {
        let mut message = test_message(SIMPLE);
        message.flags = vec![Flag::Seen, Flag::Keyword("$Work".to_owned())];
        message.size = 100;
        message.modseq = Modseq(42);

        assert!(is(Criterion::All, &message));
        assert!(is(
            Criterion::uid(UidSet::range(Uid::u(1), Uid::u(3))),
            &message
        ));
        assert!(!is(Criterion::uid(UidSet::just(Uid::u(2))), &message));

        assert!(is(Criterion::flag_is_set(SystemFlag::Seen), &message));
        assert!(!is(Criterion::flag_is_set(SystemFlag::Flagged), &message));
        assert!(is(Criterion::flag_is_unset(SystemFlag::Deleted), &message));
        assert!(is(Criterion::keyword_is_set("$work"), &message));
        assert!(is(Criterion::keyword_is_unset("$Junk"), &message));

        assert!(is(Criterion::size_equals(100), &message));
        assert!(!is(Criterion::size_less_than(100), &message));
        assert!(is(Criterion::size_less_than(101), &message));
        assert!(!is(Criterion::size_greater_than(100), &message));

        assert!(is(Criterion::modseq_equals(42), &message));
        assert!(is(Criterion::modseq_greater_than(41), &message));
        assert!(!is(Criterion::modseq_less_than(42), &message));

        assert!(is(
            Criterion::MessageId(message.message_id.clone()),
            &message
        ));
        assert!(!is(Criterion::MessageId(MessageId::from("other")), &message));
        assert!(is(Criterion::ThreadId(message.thread_id.clone()), &message));
    }

    #[test]
    fn recent_comes_from_the_query() {
        let message = test_message(SIMPLE);
        let recent = Criterion::flag_is_set(SystemFlag::Recent);

        assert!(!matches(&recent, &message, &UidSet::new()).unwrap());
        assert!(
            matches(&recent, &message, &UidSet::just(message.uid)).unwrap()
        );
        assert!(is_match(
            &SearchQuery::of(recent).with_recent(UidSet::just(message.uid)),
            &message
        )
        .unwrap());
    }

    #[test]
    fn internal_date_resolution() {
        let mut message = test_message(SIMPLE);
        message.internal_date = at(2020, 6, 15, 10, 0, 30);
        let wanted = at(2020, 6, 15, 10, 0, 0);

        assert!(is(
            Criterion::internal_date_on(wanted, DateResolution::Day),
            &message
        ));
        assert!(!is(
            Criterion::internal_date_on(wanted, DateResolution::Second),
            &message
        ));
        assert!(is(
            Criterion::internal_date_after(wanted, DateResolution::Second),
            &message
        ));
        assert!(!is(
            Criterion::internal_date_after(wanted, DateResolution::Minute),
            &message
        ));
    }

    #[test]
    fn header_criteria() {
        let message = test_message(SIMPLE);

        assert!(is(Criterion::header_exists("message-id"), &message));
        assert!(!is(Criterion::header_exists("X-Mailer"), &message));
        assert!(is(Criterion::header_contains("SUBJECT", "LUNCH"), &message));
        assert!(!is(Criterion::header_contains("Subject", "dinner"), &message));
        assert!(is(Criterion::header_contains("Subject", ""), &message));
        assert!(!is(Criterion::header_contains("X-Mailer", ""), &message));

        let encoded = test_message(ENCODED_SUBJECT);
        assert!(is(
            Criterion::header_contains("Subject", "grüße aus"),
            &encoded
        ));
        assert!(!is(
            Criterion::header_contains("Subject", "=?utf-8"),
            &encoded
        ));
    }

    #[test]
    fn header_dates_use_wall_clock_time() {
        let message = test_message(SIMPLE);
        // Mon, 15 Jun 2020 13:04:05 +0200 compares as 13:04:05
        assert!(is(
            Criterion::sent_date_on(
                at(2020, 6, 15, 13, 0, 0),
                DateResolution::Hour
            ),
            &message
        ));
        assert!(!is(
            Criterion::sent_date_on(
                at(2020, 6, 15, 11, 0, 0),
                DateResolution::Hour
            ),
            &message
        ));

        // Early morning east of UTC is still the same day
        let early = test_message(
            b"Date: Mon, 15 Jun 2020 01:00:00 +0200\r\n\
              Subject: early\r\n\
              \r\n\
              body\r\n",
        );
        assert!(is(
            Criterion::sent_date_on(
                at(2020, 6, 15, 0, 0, 0),
                DateResolution::Day
            ),
            &early
        ));
        assert!(!is(
            Criterion::sent_date_on(
                at(2020, 6, 14, 0, 0, 0),
                DateResolution::Day
            ),
            &early
        ));
        assert!(is(
            Criterion::sent_date_before(
                at(2020, 6, 16, 0, 0, 0),
                DateResolution::Day
            ),
            &message
        ));

        // No Date header at all
        let undated = test_message(ENCODED_SUBJECT);
        assert!(!is(
            Criterion::sent_date_before(
                at(2100, 1, 1, 0, 0, 0),
                DateResolution::Day
            ),
            &undated
        ));
        assert!(!is(
            Criterion::sent_date_after(
                at(1900, 1, 1, 0, 0, 0),
                DateResolution::Day
            ),
            &undated
        ));
    }

    #[test]
    fn address_criteria() {
        let message = test_message(SIMPLE);
        assert!(is(Criterion::address(AddressType::From, "alice"), &message));
        assert!(is(
            Criterion::address(AddressType::From, "ALICE <alice@"),
            &message
        ));
        assert!(is(
            Criterion::address(AddressType::To, "bob@example.org"),
            &message
        ));
        assert!(!is(Criterion::address(AddressType::Cc, "bob"), &message));

        let encoded = test_message(ENCODED_SUBJECT);
        assert!(is(
            Criterion::address(AddressType::From, "jörg <joerg"),
            &encoded
        ));
        // The encoded form as transmitted matches too
        assert!(is(
            Criterion::address(
                AddressType::From,
                "=?utf-8?q?J=C3=B6rg?= <joerg@"
            ),
            &encoded
        ));
        assert!(!is(
            Criterion::address(AddressType::From, "jörg <someone"),
            &encoded
        ));

        let group = test_message(GROUP_ADDRESS);
        assert!(is(
            Criterion::address(AddressType::To, "heidi@example.net"),
            &group
        ));
        // Raw text fallback
        assert!(is(Criterion::address(AddressType::To, "team:"), &group));
    }

    #[test]
    fn text_scopes() {
        let message = test_message(MULTIPART);

        assert!(is(Criterion::body_contains("quarterly numbers"), &message));
        assert!(!is(Criterion::body_contains("carol@"), &message));
        assert!(is(Criterion::text_contains("carol@"), &message));
        assert!(!is(Criterion::text_contains("=-boundary-="), &message));
        assert!(is(Criterion::mail_contains("=-boundary-="), &message));
        assert!(is(Criterion::mail_contains("carol@"), &message));
        assert!(is(
            Criterion::attachment_contains("attached report"),
            &message
        ));
        assert!(!is(Criterion::attachment_contains("regards"), &message));
    }

    #[test]
    fn attachment_criteria() {
        let message = test_message(MULTIPART);
        assert!(is(Criterion::has_attachment(true), &message));
        assert!(is(Criterion::attachment_file_name("REPORT"), &message));
        assert!(!is(Criterion::attachment_file_name("invoice"), &message));

        let simple = test_message(SIMPLE);
        assert!(is(Criterion::has_attachment(false), &simple));
        assert!(!is(Criterion::attachment_file_name(""), &simple));
    }

    #[test]
    fn composites() {
        let message = test_message(SIMPLE);
        let yes = || Criterion::header_exists("Subject");
        let no = || Criterion::header_exists("X-Nope");

        assert!(is(Criterion::And(vec![]), &message));
        assert!(!is(Criterion::Or(vec![]), &message));
        assert!(is(Criterion::Nor(vec![]), &message));
        assert!(is(Criterion::And(vec![yes(), yes()]), &message));
        assert!(!is(Criterion::And(vec![yes(), no()]), &message));
        assert!(is(Criterion::Or(vec![no(), yes()]), &message));
        assert!(!is(Criterion::Nor(vec![no(), yes()]), &message));
        assert!(is(Criterion::not(no()), &message));

        assert!(is_match(&SearchQuery::new(), &message).unwrap());
        assert!(
            !is_match(&SearchQuery::of(yes()).and(no()), &message).unwrap()
        );
    }

    #[test]
    fn save_date_is_unsupported_anywhere_in_the_tree() {
        let message = test_message(SIMPLE);
        let save_date = Criterion::save_date_before(
            at(2020, 1, 1, 0, 0, 0),
            DateResolution::Day,
        );

        assert_matches!(
            Err(Error::UnsupportedSearchOperation(..)),
            is_match(&SearchQuery::of(save_date.clone()), &message)
        );
        // Not hidden by short-circuiting
        assert_matches!(
            Err(Error::UnsupportedSearchOperation(..)),
            is_match(
                &SearchQuery::of(Criterion::Or(vec![
                    Criterion::All,
                    Criterion::not(save_date),
                ])),
                &message
            )
        );
    }

    #[test]
    fn content_is_only_read_when_needed() {
        #[derive(Debug)]
        struct Unreadable;
        impl MessageContent for Unreadable {
            fn open(&self) -> std::io::Result<Box<dyn std::io::BufRead + '_>> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "content gone",
                ))
            }
        }

        let mut message = test_message(SIMPLE);
        message.content = Arc::new(Unreadable);

        assert!(is(Criterion::size_greater_than(0), &message));
        assert_matches!(
            Err(Error::Io(..)),
            matches(
                &Criterion::body_contains("noon"),
                &message,
                &UidSet::new()
            )
        );
        // The metadata criterion decides before content is needed
        assert!(!is(
            Criterion::And(vec![
                Criterion::size_less_than(0),
                Criterion::body_contains("noon"),
            ]),
            &message
        ));
    }

    fn leaf() -> impl Strategy<Value = Criterion> {
        prop_oneof![
            Just(Criterion::All),
            Just(Criterion::flag_is_set(SystemFlag::Seen)),
            Just(Criterion::flag_is_set(SystemFlag::Flagged)),
            Just(Criterion::keyword_is_set("$work")),
            (0u64..400).prop_map(Criterion::size_less_than),
            Just(Criterion::header_contains("Subject", "lunch")),
            Just(Criterion::header_exists("Cc")),
            Just(Criterion::body_contains("noon")),
        ]
    }

    fn criterion() -> impl Strategy<Value = Criterion> {
        leaf().prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..3)
                    .prop_map(Criterion::And),
                prop::collection::vec(inner.clone(), 0..3)
                    .prop_map(Criterion::Or),
                prop::collection::vec(inner, 0..3).prop_map(Criterion::Nor),
            ]
        })
    }

    proptest! {
        #[test]
        fn boolean_algebra(
            a in criterion(),
            b in criterion(),
            seen in any::<bool>(),
            work in any::<bool>(),
        ) {
            let mut message = test_message(SIMPLE);
            if seen {
                message.flags.push(Flag::Seen);
            }
            if work {
                message.flags.push(Flag::Keyword("$Work".to_owned()));
            }

            let ma = is(a.clone(), &message);
            let mb = is(b.clone(), &message);

            prop_assert_eq!(
                ma && mb,
                is(Criterion::And(vec![a.clone(), b.clone()]), &message)
            );
            prop_assert_eq!(
                ma || mb,
                is(Criterion::Or(vec![a.clone(), b.clone()]), &message)
            );
            prop_assert_eq!(
                !(ma || mb),
                is(Criterion::Nor(vec![a.clone(), b.clone()]), &message)
            );
            // Deterministic
            prop_assert_eq!(ma, is(a, &message));
        }
    }
}
