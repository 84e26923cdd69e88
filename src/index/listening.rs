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

use log::warn;

use super::*;
use crate::mailbox::events::*;
use crate::mailbox::storage::MessageStorage;

/// Keeps an index current by applying mailbox events to it.
///
/// Nothing here ever fails an event: every problem is logged, recorded in
/// the returned report, and skipped.
pub struct ListeningIndex {
    index: Arc<dyn IndexWriter>,
    storage: Arc<dyn MessageStorage>,
    session: Session,
}

impl fmt::Debug for ListeningIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ListeningIndex({:?})", self.session)
    }
}

impl ListeningIndex {
    /// Create a listener which writes to `index` on behalf of `session`,
    /// fetching messages from `storage` when an event does not carry them.
    pub fn new(
        index: Arc<dyn IndexWriter>,
        storage: Arc<dyn MessageStorage>,
        session: Session,
    ) -> Self {
        ListeningIndex {
            index,
            storage,
            session,
        }
    }

    fn record(
        &self,
        report: &mut IndexingReport,
        mailbox: &MailboxId,
        uid: Option<Uid>,
        result: Result<(), Error>,
    ) {
        match result {
            Ok(()) => report.applied += 1,
            Err(e) => {
                match uid {
                    Some(uid) => warn!(
                        "{} Failed to index {}/{}: {}",
                        self.session.log_prefix, mailbox, uid, e
                    ),
                    None => warn!(
                        "{} Failed to update index of {}: {}",
                        self.session.log_prefix, mailbox, e
                    ),
                }

                report.failures.push(IndexingFailure {
                    mailbox: mailbox.clone(),
                    uid,
                    error: e.to_string(),
                });
            }
        }
    }

    fn added(
        &self,
        report: &mut IndexingReport,
        mailbox: &MailboxId,
        uids: &UidSet,
        snapshot: &std::collections::BTreeMap<Uid, MailboxMessage>,
    ) {
        for uid in uids.items() {
            let result = match snapshot.get(&uid) {
                Some(message) => self.index.add(&self.session, message),
                None => self
                    .storage
                    .fetch(mailbox, uid)
                    .map_err(|e| Error::MessageUnavailable(e.to_string()))
                    .and_then(|message| {
                        self.index.add(&self.session, &message)
                    }),
            };

            self.record(report, mailbox, Some(uid), result);
        }
    }
}

impl MailboxListener for ListeningIndex {
    fn event(&self, event: &MailboxEvent) -> IndexingReport {
        let mut report = IndexingReport::default();

        match *event {
            MailboxEvent::MessageAdded {
                ref mailbox,
                ref uids,
                ref snapshot,
            } => self.added(&mut report, mailbox, uids, snapshot),

            MailboxEvent::MessageExpunged {
                ref mailbox,
                ref uids,
            } => {
                let result = self.index.delete(&self.session, mailbox, uids);
                self.record(&mut report, mailbox, None, result);
            }

            MailboxEvent::FlagsUpdated {
                ref mailbox,
                ref updates,
            } => {
                for update in updates {
                    let result =
                        self.index.update(&self.session, mailbox, update);
                    self.record(&mut report, mailbox, Some(update.uid), result);
                }
            }

            MailboxEvent::MailboxDeleted { ref mailbox } => {
                let result = self.index.delete_all(&self.session, mailbox);
                self.record(&mut report, mailbox, None, result);
            }
        }

        report
    }
}
