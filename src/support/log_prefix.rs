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

use std::fmt;
use std::sync::{Arc, Mutex};

/// Tracks text that should be included at the start of every log statement
/// made on behalf of a search session.
///
/// Clones of a `LogPrefix` share the same underlying data, so a user name set
/// after the session is created shows up in every component holding a clone.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    context: String,
    user: Option<String>,
}

impl LogPrefix {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                context: sanitise(context.into()),
                user: None,
            })),
        }
    }

    pub fn set_user(&self, user: String) {
        self.inner.lock().unwrap().user = Some(sanitise(user));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.context)?;
        if let Some(ref user) = inner.user {
            write!(f, "[{}]", user)?;
        }

        Ok(())
    }
}

impl fmt::Debug for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LogPrefix({})", self)
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn user_shows_up_in_all_clones() {
        let prefix = LogPrefix::new("search");
        let clone = prefix.clone();
        assert_eq!("search", clone.to_string());

        prefix.set_user("azure\x07".to_owned());
        assert_eq!("search[azure]", clone.to_string());
    }

    #[test]
    fn long_names_are_truncated() {
        let prefix = LogPrefix::new("x".repeat(100));
        assert_eq!(64, prefix.to_string().len());
    }
}
