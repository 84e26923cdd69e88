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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The query contains a criterion the evaluating index cannot interpret.
    ///
    /// This is the only evaluation error which fails a whole search instead
    /// of just excluding the message being evaluated.
    #[error("Unsupported search operation: {0}")]
    UnsupportedSearchOperation(String),
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),
    #[error("No such mailbox")]
    NxMailbox,
    #[error("No such message")]
    NxMessage,
    #[error("Message unavailable: {0}")]
    MessageUnavailable(String),
    #[error("Non-existent flag")]
    NxFlag,
    #[error("Unsafe flag name")]
    UnsafeName,
    #[error("Unknown sort criterion: {0}")]
    BadSortClause(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error must abort the whole search call rather than just
    /// excluding one message from the results.
    pub fn is_fatal_to_search(&self) -> bool {
        matches!(*self, Error::UnsupportedSearchOperation(..))
    }
}
