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

//! The subset of `sysexits.h` used by the command-line front end.

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }

    /// Pick the exit code that best describes a failed operation.
    pub fn for_error(error: &Error) -> Self {
        match *error {
            Error::Io(..) => EX_IOERR,
            Error::Config(..) => EX_CONFIG,
            Error::NxMailbox | Error::NxMessage => EX_NOINPUT,
            Error::UnsupportedSearchOperation(..)
            | Error::BadSortClause(..)
            | Error::NxFlag
            | Error::UnsafeName => EX_USAGE,
            Error::UnknownCharset(..) | Error::MessageUnavailable(..) => {
                EX_DATAERR
            }
        }
    }
}
