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

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Configuration for the search front end.
///
/// This is stored in a file named `crymap-search.toml`. Every section is
/// optional.
#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct SearchConfig {
    /// Which index backs searches and how it is maintained.
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Scan the mailbox on every search. Nothing is kept in memory.
    Linear,
    /// Keep a copy of every indexed message in memory, populated through
    /// mailbox events and/or a lazy rebuild on first search.
    Memory,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,

    /// If true, the first search of each mailbox populates the index from
    /// storage before being answered.
    ///
    /// Only meaningful for the `memory` backend; the linear backend has
    /// nothing to populate.
    pub lazy_rebuild: bool,

    /// The maximum number of message ids returned by a multi-mailbox search
    /// when the caller does not specify a limit.
    pub default_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            backend: IndexBackend::Linear,
            lazy_rebuild: true,
            default_limit: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to a log4rs configuration file.
    ///
    /// If unset, log records at `INFO` and above go to standard error.
    pub config_file: Option<PathBuf>,
}

impl SearchConfig {
    pub fn parse(toml: &str) -> Result<Self, Error> {
        Ok(toml::from_str(toml)?)
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = SearchConfig::parse("").unwrap();
        assert_eq!(SearchConfig::default(), config);
        assert_eq!(IndexBackend::Linear, config.index.backend);
        assert!(config.index.lazy_rebuild);
        assert_eq!(1000, config.index.default_limit);
        assert_eq!(None, config.logging.config_file);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SearchConfig::parse(
            "[index]\n\
             backend = \"memory\"\n\
             \n\
             [logging]\n\
             config_file = \"/etc/crymap/logging.toml\"\n",
        )
        .unwrap();

        assert_eq!(IndexBackend::Memory, config.index.backend);
        assert!(config.index.lazy_rebuild);
        assert_eq!(1000, config.index.default_limit);
        assert_eq!(
            Some(PathBuf::from("/etc/crymap/logging.toml")),
            config.logging.config_file
        );
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert_matches!(
            Err(Error::Config(..)),
            SearchConfig::parse("[index]\nbackend = \"lucene\"\n")
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[index]\ndefault_limit = 5").unwrap();

        let config = SearchConfig::load(file.path()).unwrap();
        assert_eq!(5, config.index.default_limit);
        assert_eq!(IndexBackend::Linear, config.index.backend);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_matches!(
            Err(Error::Io(..)),
            SearchConfig::load(&dir.path().join("nx.toml"))
        );
    }
}
