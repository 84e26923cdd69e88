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

use structopt::StructOpt;

use crate::mailbox::query::Sort;
use crate::search::base_subject::base_subject;
use crate::support::sysexits::*;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    Search(SearchSubcommand),
    /// Print the RFC 5256 base subject of the given subject line.
    BaseSubject {
        /// The subject, without the `Subject:` field name.
        subject: String,
    },
}

/// Search directories of message files.
///
/// Each directory given with `--mailbox-dir` is loaded as one mailbox named
/// after the directory. Every regular file in it not starting with `.` is a
/// message, and files are assigned UIDs in file name order. The internal date
/// of each message is the modification time of its file.
///
/// Maildir-style flags (e.g. `1234.host:2,FS`) in file names are applied to
/// the loaded messages. Inputs whose first line ends with a UNIX line ending
/// have all bare line feeds converted into DOS line endings.
///
/// With a single mailbox, the matching UIDs are printed one per line. With
/// several, the message ids of matching messages are printed instead, with
/// duplicates removed.
///
/// All criteria given must match.
#[derive(StructOpt, Default)]
pub(super) struct SearchSubcommand {
    /// Path to the configuration file
    /// [default: crymap-search.toml in the current directory if it exists]
    #[structopt(long, parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// A directory of message files to load as a mailbox. Can be passed
    /// multiple times.
    #[structopt(
        long,
        short = "d",
        parse(from_os_str),
        number_of_values(1),
        required = true
    )]
    pub(super) mailbox_dir: Vec<PathBuf>,

    /// Only match these UIDs, e.g. `1:5,9,12:*`.
    #[structopt(long)]
    pub(super) uid: Option<String>,

    /// Match messages whose body contains this text.
    #[structopt(long)]
    pub(super) body: Option<String>,

    /// Match messages whose body or address and subject headers contain this
    /// text.
    #[structopt(long)]
    pub(super) text: Option<String>,

    /// Match messages whose subject contains this text.
    #[structopt(long)]
    pub(super) subject: Option<String>,

    /// Match messages with a sender address containing this text.
    #[structopt(long)]
    pub(super) from: Option<String>,

    /// Match messages with a recipient address containing this text.
    #[structopt(long)]
    pub(super) to: Option<String>,

    /// Match messages with an attachment whose content contains this text.
    #[structopt(long)]
    pub(super) attachment: Option<String>,

    /// Match messages larger than this many bytes.
    #[structopt(long)]
    pub(super) larger: Option<u64>,

    /// Match messages smaller than this many bytes.
    #[structopt(long)]
    pub(super) smaller: Option<u64>,

    /// Match messages with this keyword set. Can be passed multiple times.
    #[structopt(long, short = "k", number_of_values(1))]
    pub(super) keyword: Vec<String>,

    /// Sort results by this key, e.g. `date` or `reverse-size`. Can be
    /// passed multiple times; earlier keys are more significant.
    #[structopt(long, parse(try_from_str), number_of_values(1))]
    pub(super) sort: Vec<Sort>,

    /// Print at most this many results
    /// [default: index.default_limit from the configuration]
    #[structopt(long)]
    pub(super) limit: Option<usize>,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    match cmd {
        Command::Search(cmd) => super::search::main(cmd),
        Command::BaseSubject { subject } => {
            println!("{}", base_subject(&subject))
        }
    }
}
