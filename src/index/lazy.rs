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

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use log::{info, warn};

use super::*;
use crate::mailbox::storage::{FetchDepth, MessageRange, MessageStorage};

/// Populates a wrapped index from storage the first time each mailbox is
/// searched.
///
/// Each mailbox has a marker recording whether it has been built. The first
/// search of a mailbox builds it while holding the marker's lock; concurrent
/// searches of the same mailbox wait on that lock and then find it built.
/// Once built, searches only read the marker's flag and take no lock beyond
/// a shared read of the marker map. Searches of other mailboxes are never
/// held up. Markers are never removed, so a mailbox is built at most once per
/// `LazyIndex` unless the build fails.
pub struct LazyIndex<I> {
    inner: I,
    storage: Arc<dyn MessageStorage>,
    markers: RwLock<HashMap<MailboxId, Arc<Marker>>>,
}

#[derive(Debug, Default)]
struct Marker {
    built: AtomicBool,
    building: Mutex<()>,
}

impl<I> fmt::Debug for LazyIndex<I> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "LazyIndex({} mailboxes)",
            self.markers.read().unwrap().len()
        )
    }
}

impl<I: MessageSearchIndex + IndexWriter> LazyIndex<I> {
    pub fn new(inner: I, storage: Arc<dyn MessageStorage>) -> Self {
        LazyIndex {
            inner,
            storage,
            markers: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Make sure `mailbox` has been built, building it if not.
    ///
    /// If the storage scan fails, the mailbox is left unbuilt and the error
    /// is returned; a later call tries again. Failures to index individual
    /// messages are logged and do not prevent the mailbox being marked
    /// built.
    pub fn ensure_built(
        &self,
        session: &Session,
        mailbox: &MailboxId,
    ) -> Result<(), Error> {
        let existing = self.markers.read().unwrap().get(mailbox).cloned();
        let marker = match existing {
            Some(marker) => {
                if marker.built.load(Ordering::Acquire) {
                    return Ok(());
                }
                marker
            }
            None => Arc::clone(
                self.markers
                    .write()
                    .unwrap()
                    .entry(mailbox.clone())
                    .or_default(),
            ),
        };

        let _building = marker.building.lock().unwrap();
        if marker.built.load(Ordering::Acquire) {
            return Ok(());
        }

        let messages =
            self.storage
                .scan(mailbox, MessageRange::All, FetchDepth::Full)?;
        info!(
            "{} Building index of {} from {} messages",
            session.log_prefix,
            mailbox,
            messages.len()
        );

        for message in &messages {
            if let Err(e) = self.inner.add(session, message) {
                warn!(
                    "{} Failed to index {}/{}: {}",
                    session.log_prefix, mailbox, message.uid, e
                );
            }
        }

        marker.built.store(true, Ordering::Release);
        Ok(())
    }
}

impl<I: MessageSearchIndex + IndexWriter> MessageSearchIndex for LazyIndex<I> {
    fn search(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        query: &SearchQuery,
    ) -> Result<Vec<Uid>, Error> {
        self.ensure_built(session, mailbox)?;
        self.inner.search(session, mailbox, query)
    }

    fn search_mailboxes(
        &self,
        session: &Session,
        mailboxes: &[MailboxId],
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<MessageId>, Error> {
        for mailbox in mailboxes {
            self.ensure_built(session, mailbox)?;
        }
        self.inner.search_mailboxes(session, mailboxes, query, limit)
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities()
    }
}

impl<I: MessageSearchIndex + IndexWriter> IndexWriter for LazyIndex<I> {
    fn add(
        &self,
        session: &Session,
        message: &MailboxMessage,
    ) -> Result<(), Error> {
        self.inner.add(session, message)
    }

    fn delete(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        uids: &UidSet,
    ) -> Result<(), Error> {
        self.inner.delete(session, mailbox, uids)
    }

    fn delete_all(
        &self,
        session: &Session,
        mailbox: &MailboxId,
    ) -> Result<(), Error> {
        self.inner.delete_all(session, mailbox)
    }

    fn update(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        update: &FlagUpdate,
    ) -> Result<(), Error> {
        self.inner.update(session, mailbox, update)
    }
}
