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

//! Loading directories of message files into storage.

use std::fs;
use std::path::Path;

use chrono::prelude::*;
use log::{info, warn};

use crate::mailbox::model::*;
use crate::mailbox::storage::InMemoryStorage;
use crate::support::error::Error;

/// Load every regular file in `dir` into a new mailbox of `storage`.
///
/// The mailbox is named after the directory. Files whose names start with
/// `.` are skipped, and the rest are appended in name order, so UIDs follow
/// file names.
pub(super) fn load_mailbox(
    storage: &InMemoryStorage,
    dir: &Path,
) -> Result<MailboxId, Error> {
    let mailbox = MailboxId(
        dir.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "INBOX".to_owned()),
    );
    storage.create_mailbox(&mailbox);

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file()
            || entry.file_name().to_string_lossy().starts_with('.')
        {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();

    for path in &paths {
        let data = fs::read(path)?;
        let internal_date = match fs::metadata(path)?.modified() {
            Ok(mtime) => DateTime::<Utc>::from(mtime),
            Err(e) => {
                warn!("No modification time for {}: {}", path.display(), e);
                Utc::now()
            }
        };

        storage.append(
            &mailbox,
            normalise_line_endings(data),
            extract_maildir_flags(path).collect(),
            internal_date,
        )?;
    }

    info!(
        "Loaded {} messages from {} into {}",
        paths.len(),
        dir.display(),
        mailbox
    );
    Ok(mailbox)
}

/// Flags from the `:2,` info suffix of a maildir file name.
fn extract_maildir_flags(path: &Path) -> impl Iterator<Item = Flag> + '_ {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let info = name.rfind(":2,").map_or("", |ix| &name[ix + 3..]);

    info.chars().filter_map(|ch| match ch {
        'D' => Some(Flag::Draft),
        'F' => Some(Flag::Flagged),
        'R' => Some(Flag::Answered),
        'S' => Some(Flag::Seen),
        'T' => Some(Flag::Deleted),
        _ => None,
    })
}

/// Convert UNIX line endings to DOS line endings.
///
/// The first line decides: if it ends with CRLF, the data is returned
/// untouched, binary content included. Otherwise every LF not already
/// preceded by CR gains one.
fn normalise_line_endings(data: Vec<u8>) -> Vec<u8> {
    match memchr::memchr(b'\n', &data) {
        None => return data,
        Some(ix) if ix > 0 && b'\r' == data[ix - 1] => return data,
        Some(_) => (),
    }

    let mut converted = Vec::with_capacity(data.len() + data.len() / 32);
    let mut start = 0;
    for ix in memchr::memchr_iter(b'\n', &data) {
        converted.extend_from_slice(&data[start..ix]);
        if ix == 0 || b'\r' != data[ix - 1] {
            converted.push(b'\r');
        }
        converted.push(b'\n');
        start = ix + 1;
    }
    converted.extend_from_slice(&data[start..]);
    converted
}
