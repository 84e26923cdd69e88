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
use std::sync::Arc;

use log::debug;

use super::*;
use crate::mailbox::query::Criterion;
use crate::mailbox::storage::{FetchDepth, MessageRange, MessageStorage};
use crate::search::search_messages;

/// An index which keeps no state and scans storage on every search.
///
/// If the query restricts UIDs, only those ranges are fetched, and only at
/// metadata depth; content is still read lazily if other criteria need it.
/// Otherwise the whole mailbox is fetched at full depth.
pub struct LinearScanIndex {
    storage: Arc<dyn MessageStorage>,
}

impl fmt::Debug for LinearScanIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LinearScanIndex")
    }
}

impl LinearScanIndex {
    pub fn new(storage: Arc<dyn MessageStorage>) -> Self {
        LinearScanIndex { storage }
    }

    fn search_one(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        query: &SearchQuery,
    ) -> Result<Vec<MailboxMessage>, Error> {
        let messages = match first_uid_criterion(&query.criteria) {
            Some(uids) => {
                let mut messages = Vec::new();
                for (start, end) in uids.ranges() {
                    let range = if start == end {
                        MessageRange::One(start)
                    } else {
                        MessageRange::Range(start, end)
                    };
                    messages.extend(self.storage.scan(
                        mailbox,
                        range,
                        FetchDepth::Metadata,
                    )?);
                }
                messages
            }
            None => {
                self.storage
                    .scan(mailbox, MessageRange::All, FetchDepth::Full)?
            }
        };

        debug!(
            "{} Scanning {} messages of {}",
            session.log_prefix,
            messages.len(),
            mailbox
        );
        search_messages(&session.log_prefix, query, messages)
    }
}

/// Find the first UID criterion in pre-order, descending only into `And`
/// and `Or` nodes.
///
/// Using the UIDs of a criterion under `Or` as a fetch restriction can drop
/// messages the query would have matched through another branch. This is
/// how the search has always behaved, so it is kept.
fn first_uid_criterion(criteria: &[Criterion]) -> Option<&UidSet> {
    for criterion in criteria {
        match *criterion {
            Criterion::Uid(ref uids) => return Some(uids),
            Criterion::And(ref children) | Criterion::Or(ref children) => {
                if let Some(uids) = first_uid_criterion(children) {
                    return Some(uids);
                }
            }
            _ => (),
        }
    }

    None
}

impl MessageSearchIndex for LinearScanIndex {
    fn search(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        query: &SearchQuery,
    ) -> Result<Vec<Uid>, Error> {
        Ok(self
            .search_one(session, mailbox, query)?
            .into_iter()
            .map(|m| m.uid)
            .collect())
    }

    fn search_mailboxes(
        &self,
        session: &Session,
        mailboxes: &[MailboxId],
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<MessageId>, Error> {
        let mut per_mailbox = Vec::with_capacity(mailboxes.len());
        for mailbox in mailboxes {
            per_mailbox.push(self.search_one(session, mailbox, query)?);
        }

        Ok(merge_message_ids(per_mailbox, limit))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::MULTI_MAILBOX_SEARCH
            | Capabilities::TEXT
            | Capabilities::FULL_TEXT
            | Capabilities::ATTACHMENT
            | Capabilities::PARTIAL_MATCH
            | Capabilities::ATTACHMENT_FILE_NAME
    }
}

impl IndexWriter for LinearScanIndex {
    fn add(&self, _: &Session, _: &MailboxMessage) -> Result<(), Error> {
        Ok(())
    }

    fn delete(
        &self,
        _: &Session,
        _: &MailboxId,
        _: &UidSet,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn delete_all(&self, _: &Session, _: &MailboxId) -> Result<(), Error> {
        Ok(())
    }

    fn update(
        &self,
        _: &Session,
        _: &MailboxId,
        _: &FlagUpdate,
    ) -> Result<(), Error> {
        Ok(())
    }
}
