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

//! Sort keys for search results.
//!
//! The comparator for a query is the lexicographic combination of its sort
//! clauses, followed by the UID and then the mailbox, which makes it a total
//! order over the messages of any set of mailboxes.

use std::cmp::Ordering;

use chrono::prelude::*;

use super::base_subject::base_subject;
use super::content_matcher::fold_str;
use super::message_view::MessageView;
use crate::mailbox::model::*;
use crate::mailbox::query::{Sort, SortClause};
use crate::mime::header;
use crate::mime::model::MailboxSpec;
use crate::support::error::Error;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(u64),
    Date(DateTime<Utc>),
    Text(String),
}

/// The precomputed position of one message under a particular comparator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    values: Vec<(SortValue, bool)>,
    uid: Uid,
    mailbox: MailboxId,
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (&(ref a, reverse), &(ref b, _)) in
            self.values.iter().zip(&other.values)
        {
            let ordering = a.cmp(b);
            let ordering = if reverse {
                ordering.reverse()
            } else {
                ordering
            };

            if Ordering::Equal != ordering {
                return ordering;
            }
        }

        self.values
            .len()
            .cmp(&other.values.len())
            .then_with(|| self.uid.cmp(&other.uid))
            .then_with(|| self.mailbox.cmp(&other.mailbox))
    }
}

/// Compute the sort key of the message in `view` under `sorts`.
///
/// Reads the header block of the message only if some clause needs it.
pub fn sort_key(
    sorts: &[Sort],
    view: &mut MessageView<'_>,
) -> Result<SortKey, Error> {
    let message = view.message;
    let mut values = Vec::with_capacity(sorts.len());

    for sort in sorts {
        let value = match sort.clause {
            SortClause::Arrival => SortValue::Date(message.internal_date),
            SortClause::Size => SortValue::Number(message.size),
            SortClause::Uid => SortValue::Number(u32::from(message.uid).into()),
            SortClause::Id => SortValue::Text(message.message_id.0.clone()),
            SortClause::SentDate => SortValue::Date(
                view.first_header("Date")?
                    .and_then(header::parse_datetime)
                    .map_or(message.internal_date, |d| d.with_timezone(&Utc)),
            ),
            SortClause::BaseSubject => {
                let subject = view
                    .first_header("Subject")?
                    .map(String::from_utf8_lossy)
                    .unwrap_or_default();
                SortValue::Text(fold_str(&base_subject(&subject)))
            }
            SortClause::MailboxFrom => {
                SortValue::Text(first_mailbox(view, "From", mailbox_key)?)
            }
            SortClause::MailboxTo => {
                SortValue::Text(first_mailbox(view, "To", mailbox_key)?)
            }
            SortClause::MailboxCc => {
                SortValue::Text(first_mailbox(view, "Cc", mailbox_key)?)
            }
            SortClause::DisplayFrom => {
                SortValue::Text(first_mailbox(view, "From", display_key)?)
            }
            SortClause::DisplayTo => {
                SortValue::Text(first_mailbox(view, "To", display_key)?)
            }
        };

        values.push((value, sort.reverse));
    }

    Ok(SortKey {
        values,
        uid: message.uid,
        mailbox: message.mailbox.clone(),
    })
}

/// Apply `key` to the first mailbox of the address list in the first header
/// called `name`. A missing or unparsable header sorts as the empty string.
fn first_mailbox(
    view: &mut MessageView<'_>,
    name: &str,
    key: fn(&MailboxSpec<'_>) -> String,
) -> Result<String, Error> {
    Ok(view
        .first_header(name)?
        .and_then(header::parse_address_list)
        .and_then(|addresses| {
            addresses
                .iter()
                .flat_map(|a| a.mailboxes())
                .next()
                .map(key)
        })
        .unwrap_or_default())
}

/// RFC 5256: the local part of the address.
fn mailbox_key(mailbox: &MailboxSpec<'_>) -> String {
    fold_str(&mailbox.addr.local_part())
}

/// RFC 5957: the display name, or the address itself if there is none.
fn display_key(mailbox: &MailboxSpec<'_>) -> String {
    fold_str(
        &mailbox
            .display_name()
            .unwrap_or_else(|| mailbox.addr.to_address()),
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mailbox::query::SearchQuery;
    use crate::test_data::*;

    fn message(uid: u32, headers: &str) -> MailboxMessage {
        test_message_with_uid(
            Uid::u(uid),
            format!("{}\r\n\r\nBody\r\n", headers).as_bytes(),
        )
    }

    fn sorted(query: &SearchQuery, messages: &[MailboxMessage]) -> Vec<u32> {
        let mut keyed = messages
            .iter()
            .map(|m| {
                (
                    sort_key(&query.sorts, &mut MessageView::new(m)).unwrap(),
                    u32::from(m.uid),
                )
            })
            .collect::<Vec<_>>();
        keyed.sort();
        keyed.into_iter().map(|(_, uid)| uid).collect()
    }

    #[test]
    fn uid_is_the_final_tie_break() {
        let messages = vec![
            message(3, "Subject: b"),
            message(1, "Subject: b"),
            message(2, "Subject: a"),
        ];

        assert_eq!(vec![1, 2, 3], sorted(&SearchQuery::new(), &messages));
        assert_eq!(
            vec![2, 1, 3],
            sorted(
                &SearchQuery::new().sorted_by(SortClause::BaseSubject),
                &messages
            )
        );
        // Reversing a clause does not reverse the tie-break
        assert_eq!(
            vec![1, 3, 2],
            sorted(
                &SearchQuery::new().reverse_sorted_by(SortClause::BaseSubject),
                &messages
            )
        );
        assert_eq!(
            vec![3, 2, 1],
            sorted(
                &SearchQuery::new().reverse_sorted_by(SortClause::Uid),
                &messages
            )
        );
    }

    #[test]
    fn subjects_sort_by_base_subject_case_insensitively() {
        let messages = vec![
            message(1, "Subject: Re: zebra"),
            message(2, "Subject: [list] Apple"),
            message(3, "Subject: mango (fwd)"),
            message(4, "X-No-Subject: yes"),
        ];

        assert_eq!(
            vec![4, 2, 3, 1],
            sorted(
                &SearchQuery::new().sorted_by(SortClause::BaseSubject),
                &messages
            )
        );
    }

    #[test]
    fn sent_date_falls_back_to_internal_date() {
        let mut undated = message(1, "Subject: undated");
        undated.internal_date =
            Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).single().unwrap();
        let messages = vec![
            undated,
            message(2, "Date: Fri, 5 Jun 2020 10:00:00 +0000"),
            // 23:00 on the 2nd in UTC
            message(3, "Date: Wed, 3 Jun 2020 01:00:00 +0200"),
            message(4, "Date: not a date"),
        ];

        assert_eq!(
            vec![1, 3, 2, 4],
            sorted(
                &SearchQuery::new().sorted_by(SortClause::SentDate),
                &messages
            )
        );
    }

    #[test]
    fn address_keys() {
        let messages = vec![
            message(1, "From: Zed <alpha@example.com>"),
            message(2, "From: beta@example.com"),
            message(3, "From: =?utf-8?q?Andr=C3=A9?= <gamma@example.com>"),
            message(4, "To: nobody@example.com"),
        ];

        assert_eq!(
            vec![4, 1, 2, 3],
            sorted(
                &SearchQuery::new().sorted_by(SortClause::MailboxFrom),
                &messages
            )
        );
        assert_eq!(
            vec![4, 3, 2, 1],
            sorted(
                &SearchQuery::new().sorted_by(SortClause::DisplayFrom),
                &messages
            )
        );
    }

    #[test]
    fn combined_clauses() {
        let mut messages = vec![
            message(1, "Subject: same"),
            message(2, "Subject: same"),
            message(3, "Subject: other"),
        ];
        messages[0].size = 10;
        messages[1].size = 20;
        messages[2].size = 30;

        assert_eq!(
            vec![3, 2, 1],
            sorted(
                &SearchQuery::new()
                    .sorted_by(SortClause::BaseSubject)
                    .reverse_sorted_by(SortClause::Size),
                &messages
            )
        );
    }

    #[test]
    fn mailbox_breaks_ties_between_equal_uids() {
        let a = test_message(SIMPLE);
        let mut b = test_message(SIMPLE);
        b.mailbox = MailboxId::from("Archive");

        let ka = sort_key(&[], &mut MessageView::new(&a)).unwrap();
        let kb = sort_key(&[], &mut MessageView::new(&b)).unwrap();
        assert_eq!(Ordering::Greater, ka.cmp(&kb));
        assert_eq!(Ordering::Equal, ka.cmp(&ka.clone()));
    }
}
