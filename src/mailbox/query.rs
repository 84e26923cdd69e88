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

//! The structured form of a search request.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::prelude::*;

use super::model::*;
use crate::support::error::Error;

/// A complete search request.
///
/// The top-level criteria are implicitly ANDed together; an empty list
/// matches every message.
#[derive(Clone, Debug, Default)]
pub struct SearchQuery {
    pub criteria: Vec<Criterion>,
    /// Sort keys, most significant first. The UID is always the final
    /// tie-break.
    pub sorts: Vec<Sort>,
    /// The UIDs which are `\Recent` from the point of view of the session
    /// making the request.
    pub recent_uids: UidSet,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(criterion: Criterion) -> Self {
        Self::new().and(criterion)
    }

    pub fn and(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn sorted_by(mut self, clause: SortClause) -> Self {
        self.sorts.push(Sort {
            clause,
            reverse: false,
        });
        self
    }

    pub fn reverse_sorted_by(mut self, clause: SortClause) -> Self {
        self.sorts.push(Sort {
            clause,
            reverse: true,
        });
        self
    }

    pub fn with_recent(mut self, recent_uids: UidSet) -> Self {
        self.recent_uids = recent_uids;
        self
    }
}

/// One node of the criterion tree.
#[derive(Clone, Debug)]
pub enum Criterion {
    /// Matches every message.
    All,
    /// The UID is in the given set.
    Uid(UidSet),
    /// A system flag (including `\Recent`) is or is not set.
    Flag { flag: SystemFlag, set: bool },
    /// A keyword is or is not set.
    Keyword { keyword: String, set: bool },
    /// A test on the top-level header fields with the given name.
    Header { name: String, op: HeaderOperator },
    Size(NumericOperator),
    ModSeq(NumericOperator),
    InternalDate(DateOperator),
    /// RFC 8514 SAVEDATE. Messages carry no save date, so no index in this
    /// crate can evaluate it.
    SaveDate(DateOperator),
    /// Substring search over message content.
    Text { scope: TextScope, value: String },
    /// Substring search over the file names of attachments.
    AttachmentFileName(String),
    HasAttachment(bool),
    MessageId(MessageId),
    ThreadId(ThreadId),
    And(Vec<Criterion>),
    Or(Vec<Criterion>),
    /// True only if none of the children match.
    Nor(Vec<Criterion>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum HeaderOperator {
    /// Case-insensitive substring of the (decoded) value of any field with
    /// the name.
    Contains(String),
    Exists,
    /// Compare the date in the first field with the name.
    Date(DateOperator),
    /// Case-insensitive substring of any address in the first field with the
    /// name, or of its raw value.
    Address(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericOperator {
    LessThan(u64),
    GreaterThan(u64),
    Equals(u64),
}

impl NumericOperator {
    pub fn matches(self, value: u64) -> bool {
        match self {
            NumericOperator::LessThan(v) => value < v,
            NumericOperator::GreaterThan(v) => value > v,
            NumericOperator::Equals(v) => value == v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateComparator {
    Before,
    On,
    After,
}

/// The granularity at which two dates are compared.
///
/// Both sides are rendered in UTC as a fixed-width string truncated to the
/// resolution, and those strings are compared. Dates outside the years 0
/// to 9999 are clamped to the nearest end of that range first, since `%Y`
/// is only four digits wide within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateResolution {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
}

impl DateResolution {
    pub fn truncate(self, date: DateTime<Utc>) -> String {
        let date = clamp_to_four_digit_years(date);
        let format = match self {
            DateResolution::Year => "%Y",
            DateResolution::Month => "%Y%m",
            DateResolution::Day => "%Y%m%d",
            DateResolution::Hour => "%Y%m%d%H",
            DateResolution::Minute => "%Y%m%d%H%M",
            DateResolution::Second => "%Y%m%d%H%M%S",
            DateResolution::Millisecond => "%Y%m%d%H%M%S%3f",
        };

        date.format(format).to_string()
    }
}

fn clamp_to_four_digit_years(date: DateTime<Utc>) -> DateTime<Utc> {
    let (limit, h, m, s, ms) = if date.year() > 9999 {
        (NaiveDate::from_ymd_opt(9999, 12, 31), 23, 59, 59, 999)
    } else if date.year() < 0 {
        (NaiveDate::from_ymd_opt(0, 1, 1), 0, 0, 0, 0)
    } else {
        return date;
    };

    limit
        .and_then(|d| d.and_hms_milli_opt(h, m, s, ms))
        .map_or(date, |dt| Utc.from_utc_datetime(&dt))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateOperator {
    pub comparator: DateComparator,
    pub date: DateTime<Utc>,
    pub resolution: DateResolution,
}

impl DateOperator {
    pub fn matches(&self, date: DateTime<Utc>) -> bool {
        let actual = self.resolution.truncate(date);
        let wanted = self.resolution.truncate(self.date);
        let ordering = actual.cmp(&wanted);

        match self.comparator {
            DateComparator::Before => Ordering::Less == ordering,
            DateComparator::On => Ordering::Equal == ordering,
            DateComparator::After => Ordering::Greater == ordering,
        }
    }
}

/// Which parts of a message a text criterion looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextScope {
    /// Body content only.
    Body,
    /// The address and subject headers of the message, plus body content.
    Text,
    /// All header fields and body content.
    Full,
    /// Only the content of attachment parts.
    Attachments,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressType {
    From,
    To,
    Cc,
    Bcc,
}

impl AddressType {
    pub fn header_name(self) -> &'static str {
        match self {
            AddressType::From => "From",
            AddressType::To => "To",
            AddressType::Cc => "Cc",
            AddressType::Bcc => "Bcc",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sort {
    pub clause: SortClause,
    pub reverse: bool,
}

/// RFC 5256 and RFC 5957 sort keys, plus UID and message id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortClause {
    Arrival,
    MailboxCc,
    MailboxFrom,
    MailboxTo,
    BaseSubject,
    Size,
    SentDate,
    DisplayFrom,
    DisplayTo,
    Uid,
    Id,
}

impl FromStr for SortClause {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let clause = match s.to_ascii_lowercase().as_str() {
            "arrival" => SortClause::Arrival,
            "cc" => SortClause::MailboxCc,
            "from" => SortClause::MailboxFrom,
            "to" => SortClause::MailboxTo,
            "subject" => SortClause::BaseSubject,
            "size" => SortClause::Size,
            "date" => SortClause::SentDate,
            "displayfrom" => SortClause::DisplayFrom,
            "displayto" => SortClause::DisplayTo,
            "uid" => SortClause::Uid,
            "id" => SortClause::Id,
            _ => return Err(Error::BadSortClause(s.to_owned())),
        };
        Ok(clause)
    }
}

impl FromStr for Sort {
    type Err = Error;

    /// Parse a sort key, optionally prefixed with `reverse-`.
    fn from_str(s: &str) -> Result<Self, Error> {
        let lower = s.to_ascii_lowercase();
        match lower.strip_prefix("reverse-") {
            Some(clause) => Ok(Sort {
                clause: clause.parse()?,
                reverse: true,
            }),
            None => Ok(Sort {
                clause: lower.parse()?,
                reverse: false,
            }),
        }
    }
}

fn date_op(
    comparator: DateComparator,
    date: DateTime<Utc>,
    resolution: DateResolution,
) -> DateOperator {
    DateOperator {
        comparator,
        date,
        resolution,
    }
}

impl Criterion {
    pub fn uid(uids: UidSet) -> Self {
        Criterion::Uid(uids)
    }

    pub fn flag_is_set(flag: SystemFlag) -> Self {
        Criterion::Flag { flag, set: true }
    }

    pub fn flag_is_unset(flag: SystemFlag) -> Self {
        Criterion::Flag { flag, set: false }
    }

    pub fn keyword_is_set(keyword: &str) -> Self {
        Criterion::Keyword {
            keyword: keyword.to_owned(),
            set: true,
        }
    }

    pub fn keyword_is_unset(keyword: &str) -> Self {
        Criterion::Keyword {
            keyword: keyword.to_owned(),
            set: false,
        }
    }

    pub fn header_contains(name: &str, value: &str) -> Self {
        Criterion::Header {
            name: name.to_owned(),
            op: HeaderOperator::Contains(value.to_owned()),
        }
    }

    pub fn header_exists(name: &str) -> Self {
        Criterion::Header {
            name: name.to_owned(),
            op: HeaderOperator::Exists,
        }
    }

    pub fn header_date(
        name: &str,
        comparator: DateComparator,
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Criterion::Header {
            name: name.to_owned(),
            op: HeaderOperator::Date(date_op(comparator, date, resolution)),
        }
    }

    pub fn sent_date_before(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Self::header_date("Date", DateComparator::Before, date, resolution)
    }

    pub fn sent_date_on(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Self::header_date("Date", DateComparator::On, date, resolution)
    }

    pub fn sent_date_after(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Self::header_date("Date", DateComparator::After, date, resolution)
    }

    pub fn address(address_type: AddressType, value: &str) -> Self {
        Criterion::Header {
            name: address_type.header_name().to_owned(),
            op: HeaderOperator::Address(value.to_owned()),
        }
    }

    pub fn size_less_than(size: u64) -> Self {
        Criterion::Size(NumericOperator::LessThan(size))
    }

    pub fn size_greater_than(size: u64) -> Self {
        Criterion::Size(NumericOperator::GreaterThan(size))
    }

    pub fn size_equals(size: u64) -> Self {
        Criterion::Size(NumericOperator::Equals(size))
    }

    pub fn modseq_less_than(modseq: u64) -> Self {
        Criterion::ModSeq(NumericOperator::LessThan(modseq))
    }

    pub fn modseq_greater_than(modseq: u64) -> Self {
        Criterion::ModSeq(NumericOperator::GreaterThan(modseq))
    }

    pub fn modseq_equals(modseq: u64) -> Self {
        Criterion::ModSeq(NumericOperator::Equals(modseq))
    }

    pub fn internal_date_before(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Criterion::InternalDate(date_op(
            DateComparator::Before,
            date,
            resolution,
        ))
    }

    pub fn internal_date_on(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Criterion::InternalDate(date_op(DateComparator::On, date, resolution))
    }

    pub fn internal_date_after(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Criterion::InternalDate(date_op(
            DateComparator::After,
            date,
            resolution,
        ))
    }

    pub fn save_date_before(
        date: DateTime<Utc>,
        resolution: DateResolution,
    ) -> Self {
        Criterion::SaveDate(date_op(DateComparator::Before, date, resolution))
    }

    pub fn body_contains(value: &str) -> Self {
        Self::text(TextScope::Body, value)
    }

    pub fn text_contains(value: &str) -> Self {
        Self::text(TextScope::Text, value)
    }

    pub fn mail_contains(value: &str) -> Self {
        Self::text(TextScope::Full, value)
    }

    pub fn attachment_contains(value: &str) -> Self {
        Self::text(TextScope::Attachments, value)
    }

    fn text(scope: TextScope, value: &str) -> Self {
        Criterion::Text {
            scope,
            value: value.to_owned(),
        }
    }

    pub fn attachment_file_name(value: &str) -> Self {
        Criterion::AttachmentFileName(value.to_owned())
    }

    pub fn has_attachment(has: bool) -> Self {
        Criterion::HasAttachment(has)
    }

    pub fn not(criterion: Criterion) -> Self {
        Criterion::Nor(vec![criterion])
    }
}
