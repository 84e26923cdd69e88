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
use std::sync::{Arc, Mutex, RwLock};

use chrono::prelude::*;
use log::debug;

use super::events::{EventBus, MailboxEvent};
use super::model::*;
use crate::support::error::Error;

/// Which messages of a mailbox a scan returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageRange {
    All,
    One(Uid),
    /// Inclusive range.
    Range(Uid, Uid),
}

impl MessageRange {
    fn bounds(self) -> (Uid, Uid) {
        match self {
            MessageRange::All => (Uid::MIN, Uid::MAX),
            MessageRange::One(uid) => (uid, uid),
            MessageRange::Range(a, b) => (a.min(b), a.max(b)),
        }
    }
}

/// How much of each message a scan should make ready.
///
/// Content is always reachable through `MailboxMessage::content`; `Full`
/// tells storage the caller will read it, so a backend that loads content
/// separately from metadata should load it eagerly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchDepth {
    Metadata,
    Full,
}

/// The durable message store, as seen by the search core.
pub trait MessageStorage: Send + Sync {
    /// Return the messages of `mailbox` within `range`, ordered by UID.
    ///
    /// UIDs in the range which do not exist are silently skipped. Fails with
    /// `NxMailbox` if the mailbox does not exist.
    fn scan(
        &self,
        mailbox: &MailboxId,
        range: MessageRange,
        depth: FetchDepth,
    ) -> Result<Vec<MailboxMessage>, Error>;

    fn fetch(
        &self,
        mailbox: &MailboxId,
        uid: Uid,
    ) -> Result<MailboxMessage, Error> {
        self.scan(mailbox, MessageRange::One(uid), FetchDepth::Full)?
            .into_iter()
            .next()
            .ok_or(Error::NxMessage)
    }
}

/// A record of one call to `InMemoryStorage::scan`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRecord {
    pub mailbox: MailboxId,
    pub range: MessageRange,
    pub depth: FetchDepth,
}

#[derive(Default)]
struct State {
    mailboxes: HashMap<MailboxId, MailboxData>,
    next_message_id: u64,
}

struct MailboxData {
    messages: BTreeMap<Uid, MailboxMessage>,
    next_uid: Option<Uid>,
    next_modseq: u64,
}

impl Default for MailboxData {
    fn default() -> Self {
        MailboxData {
            messages: BTreeMap::new(),
            next_uid: Some(Uid::MIN),
            next_modseq: 1,
        }
    }
}

/// A `MessageStorage` holding everything in memory.
///
/// If constructed with an `EventBus`, every mutation is published on it
/// after the mutation is visible to readers.
#[derive(Default)]
pub struct InMemoryStorage {
    state: RwLock<State>,
    scans: Mutex<Vec<ScanRecord>>,
    events: Option<Arc<EventBus>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Arc<EventBus>) -> Self {
        InMemoryStorage {
            events: Some(events),
            ..Self::default()
        }
    }

    /// Create `mailbox` if it does not already exist.
    pub fn create_mailbox(&self, mailbox: &MailboxId) {
        self.state
            .write()
            .unwrap()
            .mailboxes
            .entry(mailbox.clone())
            .or_default();
    }

    /// Add a message to the end of `mailbox`.
    pub fn append(
        &self,
        mailbox: &MailboxId,
        data: impl Into<Vec<u8>>,
        flags: Vec<Flag>,
        internal_date: DateTime<Utc>,
    ) -> Result<MailboxMessage, Error> {
        let data: Vec<u8> = data.into();

        let message = {
            let mut state = self.state.write().unwrap();
            state.next_message_id += 1;
            let id = state.next_message_id;

            let mbox =
                state.mailboxes.get_mut(mailbox).ok_or(Error::NxMailbox)?;
            let uid = mbox.next_uid.ok_or(Error::MessageUnavailable(
                "mailbox UID space exhausted".to_owned(),
            ))?;
            mbox.next_uid = uid.next();
            let modseq = Modseq(mbox.next_modseq);
            mbox.next_modseq += 1;

            let message = MailboxMessage {
                mailbox: mailbox.clone(),
                uid,
                modseq,
                message_id: MessageId(format!("M{:08}", id)),
                thread_id: ThreadId(format!("T{:08}", id)),
                flags,
                internal_date,
                size: data.len() as u64,
                content: Arc::new(BufferedContent::new(data)),
            };
            mbox.messages.insert(uid, message.clone());
            message
        };

        debug!(
            "Appended {} to {} as UID {}",
            message.message_id, mailbox, message.uid
        );

        let mut snapshot = BTreeMap::new();
        snapshot.insert(message.uid, message.clone());
        self.publish(MailboxEvent::MessageAdded {
            mailbox: mailbox.clone(),
            uids: UidSet::just(message.uid),
            snapshot,
        });

        Ok(message)
    }

    /// Replace the flags of one message.
    pub fn set_flags(
        &self,
        mailbox: &MailboxId,
        uid: Uid,
        flags: Vec<Flag>,
    ) -> Result<(), Error> {
        let update = {
            let mut state = self.state.write().unwrap();
            let mbox =
                state.mailboxes.get_mut(mailbox).ok_or(Error::NxMailbox)?;
            let modseq = Modseq(mbox.next_modseq);
            let message =
                mbox.messages.get_mut(&uid).ok_or(Error::NxMessage)?;
            message.flags = flags.clone();
            message.modseq = modseq;
            mbox.next_modseq += 1;

            FlagUpdate { uid, modseq, flags }
        };

        self.publish(MailboxEvent::FlagsUpdated {
            mailbox: mailbox.clone(),
            updates: vec![update],
        });
        Ok(())
    }

    /// Remove the given messages. UIDs that do not exist are ignored.
    pub fn expunge(
        &self,
        mailbox: &MailboxId,
        uids: &UidSet,
    ) -> Result<(), Error> {
        let removed = {
            let mut state = self.state.write().unwrap();
            let mbox =
                state.mailboxes.get_mut(mailbox).ok_or(Error::NxMailbox)?;
            let mut removed = UidSet::new();
            for uid in uids.items() {
                if mbox.messages.remove(&uid).is_some() {
                    removed.insert(uid, uid);
                }
            }
            removed
        };

        if !removed.is_empty() {
            self.publish(MailboxEvent::MessageExpunged {
                mailbox: mailbox.clone(),
                uids: removed,
            });
        }
        Ok(())
    }

    pub fn delete_mailbox(&self, mailbox: &MailboxId) -> Result<(), Error> {
        self.state
            .write()
            .unwrap()
            .mailboxes
            .remove(mailbox)
            .ok_or(Error::NxMailbox)?;

        self.publish(MailboxEvent::MailboxDeleted {
            mailbox: mailbox.clone(),
        });
        Ok(())
    }

    /// Return every scan performed so far, oldest first.
    pub fn scans(&self) -> Vec<ScanRecord> {
        self.scans.lock().unwrap().clone()
    }

    pub fn clear_scans(&self) {
        self.scans.lock().unwrap().clear();
    }

    fn publish(&self, event: MailboxEvent) {
        if let Some(ref events) = self.events {
            events.publish(&event);
        }
    }
}

impl MessageStorage for InMemoryStorage {
    fn scan(
        &self,
        mailbox: &MailboxId,
        range: MessageRange,
        depth: FetchDepth,
    ) -> Result<Vec<MailboxMessage>, Error> {
        self.scans.lock().unwrap().push(ScanRecord {
            mailbox: mailbox.clone(),
            range,
            depth,
        });

        let state = self.state.read().unwrap();
        let mbox = state.mailboxes.get(mailbox).ok_or(Error::NxMailbox)?;
        let (start, end) = range.bounds();
        Ok(mbox
            .messages
            .range(start..=end)
            .map(|(_, message)| message.clone())
            .collect())
    }
}
