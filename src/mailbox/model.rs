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
use std::convert::TryFrom;
use std::fmt;
use std::io::{self, BufRead};
use std::marker::PhantomData;
use std::num::NonZeroU32;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::str::FromStr;
use std::sync::Arc;

use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use crate::support::error::Error;

/// Uniquely identifies a message within a single mailbox.
///
/// UIDs start at 1 and increase monotonically as messages are added to the
/// mailbox. UIDs are never reused.
#[derive(
    Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct Uid(pub NonZeroU32);

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Uid({})", self.0.get())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

impl Uid {
    pub const MIN: Self = Uid(unsafe { NonZeroU32::new_unchecked(1) });
    pub const MAX: Self = Uid(unsafe { NonZeroU32::new_unchecked(u32::MAX) });

    pub fn of(uid: u32) -> Option<Self> {
        NonZeroU32::new(uid).map(Uid)
    }

    pub fn next(self) -> Option<Self> {
        self.0.get().checked_add(1).and_then(Uid::of)
    }

    #[cfg(test)]
    pub fn u(uid: u32) -> Self {
        Uid::of(uid).unwrap()
    }
}

impl TryFrom<u32> for Uid {
    type Error = ();

    fn try_from(v: u32) -> Result<Self, ()> {
        Self::of(v).ok_or(())
    }
}

impl From<Uid> for u32 {
    fn from(uid: Uid) -> u32 {
        uid.0.get()
    }
}

/// The modification sequence number of a message, as per RFC 7162.
#[derive(
    Deserialize,
    Serialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
)]
#[serde(transparent)]
pub struct Modseq(pub u64);

/// Identifies a mailbox across the whole store.
#[derive(
    Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct MailboxId(pub String);

/// Identifies a message across the whole store, independent of which mailbox
/// (or how many mailboxes) it is in.
#[derive(
    Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct MessageId(pub String);

/// Identifies the conversation a message belongs to.
#[derive(
    Deserialize, Serialize, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct ThreadId(pub String);

macro_rules! string_id {
    ($t:ident) => {
        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $t {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($t), self.0)
            }
        }

        impl From<&str> for $t {
            fn from(s: &str) -> Self {
                $t(s.to_owned())
            }
        }
    };
}

string_id!(MailboxId);
string_id!(MessageId);
string_id!(ThreadId);

/// A "sequence set range" of UIDs.
///
/// Internally, this is maintained as a minimal sorted set of inclusive ranges.
/// It does not maintain information on the original fragmentation, ordering,
/// or duplication.
///
/// The `Display` format puts this into minimal IMAP wire format.
#[derive(Clone, PartialEq, Eq)]
pub struct SeqRange<T> {
    parts: BTreeMap<u32, u32>,
    _t: PhantomData<T>,
}

pub type UidSet = SeqRange<Uid>;

impl<T> SeqRange<T> {
    /// Create a new, empty range.
    pub fn new() -> Self {
        SeqRange {
            parts: BTreeMap::new(),
            _t: PhantomData,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl<T: TryFrom<u32> + Into<u32> + PartialOrd + Copy> SeqRange<T> {
    /// Create a range containing just the given item.
    pub fn just(item: T) -> Self {
        Self::range(item, item)
    }

    /// Create a range containing just a single, simple range.
    pub fn range(start: T, end: T) -> Self {
        let mut this = SeqRange::new();
        this.insert(start, end);
        this
    }

    /// Insert the given inclusive range into this set.
    ///
    /// The endpoints may be given in either order.
    pub fn insert(&mut self, a: T, b: T) {
        let (a, b): (u32, u32) = (a.into(), b.into());
        self.insert_raw(a.min(b), a.max(b));
    }

    fn insert_raw(&mut self, start_incl: u32, mut end_incl: u32) {
        // Swallow any later ranges that overlap or abut the new one
        while let Some((following_start, following_end)) = self
            .parts
            .range((Excluded(start_incl), Unbounded))
            .next()
            .map(|(&start, &end)| (start, end))
        {
            if following_start - 1 > end_incl {
                break;
            }

            end_incl = end_incl.max(following_end);
            self.parts.remove(&following_start);
        }

        let preceding = self
            .parts
            .range((Unbounded, Included(start_incl)))
            .next_back()
            .map(|(&start, &end)| (start, end));
        if let Some((preceding_start, preceding_end)) = preceding {
            if preceding_end.saturating_add(1) >= start_incl {
                self.parts
                    .insert(preceding_start, end_incl.max(preceding_end));
                return;
            }
        }

        self.parts.insert(start_incl, end_incl);
    }

    /// Return whether the given item is present in this set.
    pub fn contains(&self, v: T) -> bool {
        let v: u32 = v.into();
        self.parts
            .range(..=v)
            .next_back()
            .filter(|&(_, &end)| end >= v)
            .is_some()
    }

    /// Return an iterator over the inclusive ranges in this set, in
    /// ascending order.
    pub fn ranges<'a>(&'a self) -> impl Iterator<Item = (T, T)> + 'a {
        self.parts.iter().filter_map(|(&start, &end)| {
            Some((T::try_from(start).ok()?, T::try_from(end).ok()?))
        })
    }

    /// Return an iterator to the items in this set, in strictly ascending
    /// order.
    pub fn items<'a>(&'a self) -> impl Iterator<Item = T> + 'a {
        self.parts
            .iter()
            .flat_map(|(&start, &end)| start..=end)
            .filter_map(|v| T::try_from(v).ok())
    }

    /// Parse the IMAP format of the sequence set.
    ///
    /// `splat` is used as the value of elements which specify `*`.
    pub fn parse(raw: &str, splat: T) -> Option<Self> {
        fn do_parse(r: &str, splat: u32) -> Option<u32> {
            if "*" == r {
                Some(splat)
            } else {
                r.parse().ok().filter(|&v| 0 != v)
            }
        }

        let splat = splat.into();

        let mut this = Self::new();
        for part in raw.split(',') {
            let mut subs = part.split(':');
            match (subs.next(), subs.next(), subs.next()) {
                (Some(only), None, None) => {
                    let only = do_parse(only, splat)?;
                    this.insert_raw(only, only);
                }
                (Some(start), Some(end), None) => {
                    let start = do_parse(start, splat)?;
                    let end = do_parse(end, splat)?;
                    this.insert_raw(start.min(end), end.max(start));
                }
                _ => return None,
            }
        }

        Some(this)
    }

    /// Return the total number of items in the set.
    pub fn len(&self) -> usize {
        self.parts
            .iter()
            .map(|(&start, &end)| (end - start) as usize + 1)
            .sum()
    }
}

impl<T> fmt::Display for SeqRange<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (ix, (&start, &end)) in self.parts.iter().enumerate() {
            let delim = if 0 == ix { "" } else { "," };

            if start == end {
                write!(f, "{}{}", delim, start)?;
            } else {
                write!(f, "{}{}:{}", delim, start, end)?;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for SeqRange<Uid> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[Uid {}]", self)
    }
}

impl<T> Default for SeqRange<T> {
    fn default() -> Self {
        SeqRange::new()
    }
}

/// A message flag as stored on a message.
///
/// System flags are represented as top-level enum values. Keywords are in the
/// `Keyword` case.
///
/// `\Recent` is not represented by this enum since it is not stored state; it
/// is a property of the session looking at the mailbox. See `SystemFlag`.
#[derive(Clone, Serialize, Deserialize)]
pub enum Flag {
    Answered,
    Deleted,
    Draft,
    Flagged,
    Seen,
    Keyword(String),
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Flag::Answered => write!(f, "\\Answered"),
            Flag::Deleted => write!(f, "\\Deleted"),
            Flag::Draft => write!(f, "\\Draft"),
            Flag::Flagged => write!(f, "\\Flagged"),
            Flag::Seen => write!(f, "\\Seen"),
            Flag::Keyword(ref kw) => write!(f, "{}", kw),
        }
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        <Flag as fmt::Display>::fmt(self, f)
    }
}

impl FromStr for Flag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        if s.eq_ignore_ascii_case("\\answered") {
            Ok(Flag::Answered)
        } else if s.eq_ignore_ascii_case("\\deleted") {
            Ok(Flag::Deleted)
        } else if s.eq_ignore_ascii_case("\\draft") {
            Ok(Flag::Draft)
        } else if s.eq_ignore_ascii_case("\\flagged") {
            Ok(Flag::Flagged)
        } else if s.eq_ignore_ascii_case("\\seen") {
            Ok(Flag::Seen)
        } else if s.starts_with('\\') {
            Err(Error::NxFlag)
        } else if !s.is_empty() && s.bytes().all(is_atom_char) {
            Ok(Flag::Keyword(s.to_owned()))
        } else {
            Err(Error::UnsafeName)
        }
    }
}

fn is_atom_char(ch: u8) -> bool {
    match ch {
        0..=b' ' => false,
        127..=255 => false,
        b'(' | b')' | b'{' | b'*' | b'%' | b'\\' | b'"' | b']' => false,
        _ => true,
    }
}

impl PartialEq for Flag {
    fn eq(&self, other: &Flag) -> bool {
        match (self, other) {
            (&Flag::Answered, &Flag::Answered) => true,
            (&Flag::Deleted, &Flag::Deleted) => true,
            (&Flag::Draft, &Flag::Draft) => true,
            (&Flag::Flagged, &Flag::Flagged) => true,
            (&Flag::Seen, &Flag::Seen) => true,
            // Keywords are matched ASCII case-insensitively
            (&Flag::Keyword(ref a), &Flag::Keyword(ref b)) => {
                a.eq_ignore_ascii_case(b)
            }
            _ => false,
        }
    }
}

impl Eq for Flag {}

/// The system flags a search can test, including the session-scoped
/// `\Recent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemFlag {
    Answered,
    Deleted,
    Draft,
    Flagged,
    Seen,
    Recent,
}

impl SystemFlag {
    /// Return the stored flag this corresponds to, or `None` for `\Recent`.
    pub fn stored(self) -> Option<Flag> {
        match self {
            SystemFlag::Answered => Some(Flag::Answered),
            SystemFlag::Deleted => Some(Flag::Deleted),
            SystemFlag::Draft => Some(Flag::Draft),
            SystemFlag::Flagged => Some(Flag::Flagged),
            SystemFlag::Seen => Some(Flag::Seen),
            SystemFlag::Recent => None,
        }
    }
}

/// Read access to the raw RFC 5322 form of a message.
///
/// Storage may hand out messages before loading their content; the content
/// is only read when a criterion actually needs it.
pub trait MessageContent: fmt::Debug + Send + Sync {
    fn open(&self) -> io::Result<Box<dyn BufRead + '_>>;
}

/// Message content already held in memory.
#[derive(Clone)]
pub struct BufferedContent(pub Arc<[u8]>);

impl BufferedContent {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        BufferedContent(data.into())
    }
}

impl fmt::Debug for BufferedContent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BufferedContent({} bytes)", self.0.len())
    }
}

impl MessageContent for BufferedContent {
    fn open(&self) -> io::Result<Box<dyn BufRead + '_>> {
        Ok(Box::new(io::Cursor::new(&self.0[..])))
    }
}

/// A message as seen by a mailbox.
///
/// Owned by storage; the search core only ever reads it.
#[derive(Clone, Debug)]
pub struct MailboxMessage {
    pub mailbox: MailboxId,
    pub uid: Uid,
    pub modseq: Modseq,
    pub message_id: MessageId,
    pub thread_id: ThreadId,
    pub flags: Vec<Flag>,
    pub internal_date: DateTime<Utc>,
    /// Size of the full content, in octets.
    pub size: u64,
    pub content: Arc<dyn MessageContent>,
}

impl MailboxMessage {
    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags.contains(flag)
    }

    pub fn open(&self) -> io::Result<Box<dyn BufRead + '_>> {
        self.content.open()
    }
}

/// A change to the flags of one message.
#[derive(Clone, Debug, PartialEq)]
pub struct FlagUpdate {
    pub uid: Uid,
    pub modseq: Modseq,
    pub flags: Vec<Flag>,
}
