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

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use log::debug;

use super::*;
use crate::search::search_messages;

/// An index holding its own copy of every message it has been given.
///
/// Searches see exactly what has been written through `IndexWriter`; the
/// index never consults storage. A mailbox that was never written to is
/// simply empty.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    mailboxes: RwLock<HashMap<MailboxId, BTreeMap<Uid, MailboxMessage>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of messages currently indexed for `mailbox`.
    pub fn len(&self, mailbox: &MailboxId) -> usize {
        self.mailboxes
            .read()
            .unwrap()
            .get(mailbox)
            .map_or(0, BTreeMap::len)
    }

    fn snapshot(&self, mailbox: &MailboxId) -> Vec<MailboxMessage> {
        self.mailboxes
            .read()
            .unwrap()
            .get(mailbox)
            .map(|messages| messages.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl MessageSearchIndex for InMemoryIndex {
    fn search(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        query: &SearchQuery,
    ) -> Result<Vec<Uid>, Error> {
        // Evaluation runs on a copy so that the lock is not held while
        // message content is being read
        let messages = self.snapshot(mailbox);
        Ok(search_messages(&session.log_prefix, query, messages)?
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
            per_mailbox.push(search_messages(
                &session.log_prefix,
                query,
                self.snapshot(mailbox),
            )?);
        }

        Ok(merge_message_ids(per_mailbox, limit))
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }
}

impl IndexWriter for InMemoryIndex {
    fn add(
        &self,
        session: &Session,
        message: &MailboxMessage,
    ) -> Result<(), Error> {
        debug!(
            "{} Indexing {}/{}",
            session.log_prefix, message.mailbox, message.uid
        );
        self.mailboxes
            .write()
            .unwrap()
            .entry(message.mailbox.clone())
            .or_default()
            .insert(message.uid, message.clone());
        Ok(())
    }

    fn delete(
        &self,
        _: &Session,
        mailbox: &MailboxId,
        uids: &UidSet,
    ) -> Result<(), Error> {
        if let Some(messages) = self.mailboxes.write().unwrap().get_mut(mailbox)
        {
            for (start, end) in uids.ranges() {
                let doomed: Vec<Uid> =
                    messages.range(start..=end).map(|(&uid, _)| uid).collect();
                for uid in doomed {
                    messages.remove(&uid);
                }
            }
        }
        Ok(())
    }

    fn delete_all(
        &self,
        session: &Session,
        mailbox: &MailboxId,
    ) -> Result<(), Error> {
        debug!("{} Dropping index of {}", session.log_prefix, mailbox);
        self.mailboxes.write().unwrap().remove(mailbox);
        Ok(())
    }

    fn update(
        &self,
        _: &Session,
        mailbox: &MailboxId,
        update: &FlagUpdate,
    ) -> Result<(), Error> {
        let mut mailboxes = self.mailboxes.write().unwrap();
        let message = mailboxes
            .get_mut(mailbox)
            .and_then(|messages| messages.get_mut(&update.uid))
            .ok_or(Error::NxMessage)?;

        // Updates may be delivered out of order; never go backwards
        if update.modseq >= message.modseq {
            message.flags = update.flags.clone();
            message.modseq = update.modseq;
        }
        Ok(())
    }
}
