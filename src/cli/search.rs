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

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use super::load::load_mailbox;
use super::main::SearchSubcommand;
use crate::index::*;
use crate::mailbox::events::EventBus;
use crate::mailbox::model::*;
use crate::mailbox::query::{AddressType, Criterion, SearchQuery};
use crate::mailbox::storage::{InMemoryStorage, MessageStorage};
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::search_config::*;
use crate::support::sysexits::*;

const DEFAULT_CONFIG_FILE: &str = "crymap-search.toml";

pub(super) fn main(cmd: SearchSubcommand) {
    let config_path = cmd
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = if cmd.config.is_none() && !config_path.is_file() {
        SearchConfig::default()
    } else {
        match SearchConfig::load(&config_path) {
            Ok(config) => config,
            Err(e) => die!(
                EX_CONFIG,
                "Error in config file at '{}': {}",
                config_path.display(),
                e
            ),
        }
    };

    init_logging(&config.logging);

    let query = match build_query(&cmd) {
        Ok(query) => query,
        Err(e) => die!(EX_USAGE, "{}", e),
    };

    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_owned());
    let session = Session::new(user, LogPrefix::new("cli"));

    let bus = Arc::new(EventBus::new());
    let storage = Arc::new(InMemoryStorage::with_events(Arc::clone(&bus)));
    let index = open_index(&config.index, &storage, &bus, &session);

    let mut mailboxes: Vec<MailboxId> = Vec::new();
    for dir in &cmd.mailbox_dir {
        match load_mailbox(&storage, dir) {
            Ok(mailbox) => {
                if !mailboxes.contains(&mailbox) {
                    mailboxes.push(mailbox);
                }
            }
            Err(e) => die!(
                Sysexit::for_error(&e),
                "Error loading '{}': {}",
                dir.display(),
                e
            ),
        }
    }

    let limit = cmd.limit.unwrap_or(config.index.default_limit);
    match run(&*index, &session, &mailboxes, &query, limit) {
        Ok(results) => {
            for result in results {
                println!("{}", result);
            }
        }
        Err(e) => die!(Sysexit::for_error(&e), "Search failed: {}", e),
    }
}

fn init_logging(config: &LoggingConfig) {
    match config.config_file {
        Some(ref path) => {
            if let Err(e) = log4rs::init_file(path, Default::default()) {
                die!(
                    EX_CONFIG,
                    "Error initialising logging from '{}': {}",
                    path.display(),
                    e
                );
            }
        }
        None => crate::init_simple_log(),
    }
}

/// Create the index described by `config`.
///
/// An eagerly maintained memory index is registered with `bus` here, so it
/// sees every message loaded into `storage` afterwards.
fn open_index(
    config: &IndexConfig,
    storage: &Arc<InMemoryStorage>,
    bus: &EventBus,
    session: &Session,
) -> Arc<dyn MessageSearchIndex> {
    let storage = Arc::clone(storage) as Arc<dyn MessageStorage>;

    match (config.backend, config.lazy_rebuild) {
        (IndexBackend::Linear, _) => {
            info!("{} Using linear scan index", session.log_prefix);
            Arc::new(LinearScanIndex::new(storage))
        }

        (IndexBackend::Memory, true) => {
            info!("{} Using lazily built memory index", session.log_prefix);
            Arc::new(LazyIndex::new(InMemoryIndex::new(), storage))
        }

        (IndexBackend::Memory, false) => {
            info!("{} Using event-driven memory index", session.log_prefix);
            let index = Arc::new(InMemoryIndex::new());
            bus.register(Arc::new(ListeningIndex::new(
                Arc::clone(&index) as Arc<dyn IndexWriter>,
                storage,
                session.clone(),
            )));
            index
        }
    }
}

fn build_query(cmd: &SearchSubcommand) -> Result<SearchQuery, String> {
    let mut query = SearchQuery::new();

    if let Some(ref raw) = cmd.uid {
        let uids = UidSet::parse(raw, Uid::MAX)
            .ok_or_else(|| format!("Invalid UID set: {}", raw))?;
        query = query.and(Criterion::uid(uids));
    }
    if let Some(ref body) = cmd.body {
        query = query.and(Criterion::body_contains(body));
    }
    if let Some(ref text) = cmd.text {
        query = query.and(Criterion::text_contains(text));
    }
    if let Some(ref subject) = cmd.subject {
        query = query.and(Criterion::header_contains("Subject", subject));
    }
    if let Some(ref from) = cmd.from {
        query = query.and(Criterion::address(AddressType::From, from));
    }
    if let Some(ref to) = cmd.to {
        query = query.and(Criterion::address(AddressType::To, to));
    }
    if let Some(ref attachment) = cmd.attachment {
        query = query.and(Criterion::attachment_contains(attachment));
    }
    if let Some(larger) = cmd.larger {
        query = query.and(Criterion::size_greater_than(larger));
    }
    if let Some(smaller) = cmd.smaller {
        query = query.and(Criterion::size_less_than(smaller));
    }
    for keyword in &cmd.keyword {
        query = query.and(Criterion::keyword_is_set(keyword));
    }

    query.sorts = cmd.sort.clone();
    Ok(query)
}

/// Run `query` and format the results for output.
///
/// A single mailbox yields UIDs; several yield deduplicated message ids.
fn run(
    index: &dyn MessageSearchIndex,
    session: &Session,
    mailboxes: &[MailboxId],
    query: &SearchQuery,
    limit: usize,
) -> Result<Vec<String>, Error> {
    if let [ref mailbox] = *mailboxes {
        Ok(index
            .search(session, mailbox, query)?
            .into_iter()
            .take(limit)
            .map(|uid| uid.to_string())
            .collect())
    } else {
        if !index
            .capabilities()
            .contains(Capabilities::MULTI_MAILBOX_SEARCH)
        {
            return Err(Error::UnsupportedSearchOperation(
                "multi-mailbox search".to_owned(),
            ));
        }

        Ok(index
            .search_mailboxes(session, mailboxes, query, limit)?
            .into_iter()
            .map(|id| id.to_string())
            .collect())
    }
}
