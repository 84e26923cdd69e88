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

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::model::*;

/// A change to a mailbox that secondary indices need to follow.
#[derive(Clone, Debug)]
pub enum MailboxEvent {
    /// Messages were added to the mailbox.
    ///
    /// `snapshot` carries the messages the publisher already had at hand.
    /// UIDs not present there must be fetched from storage by listeners that
    /// need them.
    MessageAdded {
        mailbox: MailboxId,
        uids: UidSet,
        snapshot: BTreeMap<Uid, MailboxMessage>,
    },
    MessageExpunged {
        mailbox: MailboxId,
        uids: UidSet,
    },
    FlagsUpdated {
        mailbox: MailboxId,
        updates: Vec<FlagUpdate>,
    },
    MailboxDeleted {
        mailbox: MailboxId,
    },
}

impl MailboxEvent {
    pub fn mailbox(&self) -> &MailboxId {
        match *self {
            MailboxEvent::MessageAdded { ref mailbox, .. }
            | MailboxEvent::MessageExpunged { ref mailbox, .. }
            | MailboxEvent::FlagsUpdated { ref mailbox, .. }
            | MailboxEvent::MailboxDeleted { ref mailbox } => mailbox,
        }
    }
}

/// One thing a listener could not apply while handling an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexingFailure {
    pub mailbox: MailboxId,
    /// The message concerned, if the failure was specific to one.
    pub uid: Option<Uid>,
    pub error: String,
}

impl fmt::Display for IndexingFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.uid {
            Some(uid) => write!(f, "{}/{}: {}", self.mailbox, uid, self.error),
            None => write!(f, "{}: {}", self.mailbox, self.error),
        }
    }
}

/// The outcome of delivering one event to a listener.
///
/// Failures are already logged by the time the report is returned; the
/// report exists so that callers can observe them without scraping logs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexingReport {
    /// The number of messages or operations successfully applied.
    pub applied: usize,
    pub failures: Vec<IndexingFailure>,
}

impl IndexingReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: IndexingReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }
}

/// Receives mailbox events.
pub trait MailboxListener: Send + Sync {
    fn event(&self, event: &MailboxEvent) -> IndexingReport;
}

/// Synchronous in-process event delivery.
///
/// Listeners are invoked in registration order on the publishing thread.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn MailboxListener>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "EventBus({} listeners)",
            self.listeners.read().unwrap().len()
        )
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn MailboxListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    /// Deliver `event` to every listener, returning the combined report.
    pub fn publish(&self, event: &MailboxEvent) -> IndexingReport {
        // Clone the list so listeners may register further listeners
        let listeners = self.listeners.read().unwrap().clone();
        let mut report = IndexingReport::default();
        for listener in listeners {
            report.merge(listener.event(event));
        }
        report
    }
}
