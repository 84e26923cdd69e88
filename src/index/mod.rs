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

//! Search indices and the machinery that keeps them current.
//!
//! An index answers searches through `MessageSearchIndex` and is maintained
//! through `IndexWriter`. `LinearScanIndex` keeps nothing and goes to storage
//! every time; `InMemoryIndex` keeps its own copy. `ListeningIndex` feeds
//! mailbox events into any writer, and `LazyIndex` populates a wrapped index
//! from storage the first time each mailbox is searched.

use bitflags::bitflags;

use crate::mailbox::model::*;
use crate::mailbox::query::SearchQuery;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

pub mod lazy;
pub mod linear_scan;
pub mod listening;
pub mod memory;

pub use self::lazy::LazyIndex;
pub use self::linear_scan::LinearScanIndex;
pub use self::listening::ListeningIndex;
pub use self::memory::InMemoryIndex;

bitflags! {
    /// What an index backend can do, for choosing between backends.
    pub struct Capabilities: u32 {
        /// `search_mailboxes` over more than one mailbox.
        const MULTI_MAILBOX_SEARCH = 1 << 0;
        /// The `BODY` and `TEXT` scopes.
        const TEXT = 1 << 1;
        /// The `FULL` scope, including all header fields.
        const FULL_TEXT = 1 << 2;
        /// The `ATTACHMENTS` scope and `HasAttachment`.
        const ATTACHMENT = 1 << 3;
        /// Text criteria match substrings rather than whole words.
        const PARTIAL_MATCH = 1 << 4;
        const ATTACHMENT_FILE_NAME = 1 << 5;
    }
}

/// The identity a search is run on behalf of.
#[derive(Clone, Debug)]
pub struct Session {
    pub user: String,
    pub log_prefix: LogPrefix,
}

impl Session {
    pub fn new(user: impl Into<String>, log_prefix: LogPrefix) -> Self {
        let user = user.into();
        log_prefix.set_user(user.clone());
        Session { user, log_prefix }
    }
}

/// The read side of a search index.
pub trait MessageSearchIndex: Send + Sync {
    /// Return the UIDs of the messages in `mailbox` matching `query`, in the
    /// order defined by the query's sort clauses.
    fn search(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        query: &SearchQuery,
    ) -> Result<Vec<Uid>, Error>;

    /// Return the message ids of the messages in any of `mailboxes` matching
    /// `query`.
    ///
    /// Each mailbox contributes its results in query order, mailboxes in the
    /// order given. A message id found in more than one mailbox is reported
    /// once, at its first position. At most `limit` ids are returned.
    fn search_mailboxes(
        &self,
        session: &Session,
        mailboxes: &[MailboxId],
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<MessageId>, Error>;

    fn capabilities(&self) -> Capabilities;
}

/// The write side of a search index.
pub trait IndexWriter: Send + Sync {
    fn add(&self, session: &Session, message: &MailboxMessage)
        -> Result<(), Error>;

    fn delete(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        uids: &UidSet,
    ) -> Result<(), Error>;

    fn delete_all(
        &self,
        session: &Session,
        mailbox: &MailboxId,
    ) -> Result<(), Error>;

    fn update(
        &self,
        session: &Session,
        mailbox: &MailboxId,
        update: &FlagUpdate,
    ) -> Result<(), Error>;
}

/// Merge per-mailbox results into one id list.
///
/// Duplicates keep their first position; the result is cut at `limit`.
pub(crate) fn merge_message_ids(
    per_mailbox: impl IntoIterator<Item = Vec<MailboxMessage>>,
    limit: usize,
) -> Vec<MessageId> {
    let mut seen = std::collections::HashSet::new();
    let mut ids = Vec::new();

    for messages in per_mailbox {
        for message in messages {
            if ids.len() >= limit {
                return ids;
            }

            if seen.insert(message.message_id.clone()) {
                ids.push(message.message_id);
            }
        }
    }

    ids
}
