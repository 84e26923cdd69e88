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

//! Evaluation of search queries against messages.

use std::collections::BTreeMap;

use log::warn;

use crate::mailbox::model::MailboxMessage;
use crate::mailbox::query::SearchQuery;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;

pub mod base_subject;
pub mod content_matcher;
pub mod evaluator;
pub mod message_view;
pub mod sort;

use self::message_view::MessageView;
use self::sort::SortKey;

/// Filter `messages` by `query` and order the survivors by its comparator.
///
/// A message whose evaluation fails is logged and left out. The whole call
/// fails only if the query cannot be interpreted.
pub fn search_messages(
    log_prefix: &LogPrefix,
    query: &SearchQuery,
    messages: impl IntoIterator<Item = MailboxMessage>,
) -> Result<Vec<MailboxMessage>, Error> {
    evaluator::check_supported(&query.criteria)?;

    let mut hits = BTreeMap::<SortKey, MailboxMessage>::new();
    for message in messages {
        match evaluate_one(query, &message) {
            Ok(Some(key)) => {
                hits.insert(key, message);
            }
            Ok(None) => (),
            // The message is gone, nothing to report
            Err(Error::NxMessage) => (),
            Err(e) if e.is_fatal_to_search() => return Err(e),
            Err(e) => warn!(
                "{} Error evaluating UID {} for search: {}",
                log_prefix, message.uid, e
            ),
        }
    }

    Ok(hits.into_iter().map(|(_, message)| message).collect())
}

fn evaluate_one(
    query: &SearchQuery,
    message: &MailboxMessage,
) -> Result<Option<SortKey>, Error> {
    let mut view = MessageView::new(message);
    if evaluator::evaluate_all(&query.criteria, &mut view, &query.recent_uids)?
    {
        sort::sort_key(&query.sorts, &mut view).map(Some)
    } else {
        Ok(None)
    }
}
