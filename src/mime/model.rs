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

use std::borrow::Cow;

use super::encoded_word::decode_unstructured;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    pub domain: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxSpec<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<MailboxSpec<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(GroupSpec<'a>),
}

impl<'a> Address<'a> {
    /// Iterate over the mailboxes of this address, descending into groups.
    pub fn mailboxes(&self) -> impl Iterator<Item = &MailboxSpec<'a>> {
        let slice = match *self {
            Address::Mailbox(ref m) => std::slice::from_ref(m),
            Address::Group(ref g) => &g.boxes[..],
        };
        slice.iter()
    }
}

fn join(parts: &[Cow<'_, [u8]>], delim: &str) -> String {
    let mut ret = String::new();
    for (ix, part) in parts.iter().enumerate() {
        if 0 != ix {
            ret.push_str(delim);
        }
        ret.push_str(&String::from_utf8_lossy(part));
    }
    ret
}

impl AddrSpec<'_> {
    pub fn local_part(&self) -> String {
        join(&self.local, ".")
    }

    pub fn domain(&self) -> String {
        join(&self.domain, ".")
    }

    /// `local@domain`, or just the local part if there is no domain.
    pub fn to_address(&self) -> String {
        if self.domain.is_empty() {
            self.local_part()
        } else {
            format!("{}@{}", self.local_part(), self.domain())
        }
    }
}

impl MailboxSpec<'_> {
    /// The display name with encoded words decoded, or `None` if the mailbox
    /// has no name.
    pub fn display_name(&self) -> Option<String> {
        if self.name.is_empty() {
            return None;
        }

        let raw = join(&self.name, " ");
        let decoded = decode_unstructured(raw.as_bytes());
        if decoded.trim().is_empty() {
            None
        } else {
            Some(decoded)
        }
    }

    /// The form used when matching address criteria: `Name <local@domain>`
    /// if there is a display name, otherwise just the address.
    pub fn display_form(&self) -> String {
        match self.display_name() {
            Some(name) => format!("{} <{}>", name, self.addr.to_address()),
            None => self.addr.to_address(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType<'a> {
    pub typ: Cow<'a, [u8]>,
    pub subtype: Cow<'a, [u8]>,
    pub parms: Vec<(Cow<'a, [u8]>, Cow<'a, [u8]>)>,
}

impl<'a> ContentType<'a> {
    pub fn is_type(&self, typ: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ.as_bytes())
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype.eq_ignore_ascii_case(subtype.as_bytes())
    }

    pub fn parm(&self, name: &str) -> Option<&[u8]> {
        find_parm(&self.parms, name)
    }

    pub fn into_owned(self) -> ContentType<'static> {
        ContentType {
            typ: Cow::Owned(self.typ.into_owned()),
            subtype: Cow::Owned(self.subtype.into_owned()),
            parms: own_parms(self.parms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDisposition<'a> {
    pub disposition: Cow<'a, [u8]>,
    pub parms: Vec<(Cow<'a, [u8]>, Cow<'a, [u8]>)>,
}

impl<'a> ContentDisposition<'a> {
    pub fn is_attachment(&self) -> bool {
        self.disposition.eq_ignore_ascii_case(b"attachment")
    }

    pub fn parm(&self, name: &str) -> Option<&[u8]> {
        find_parm(&self.parms, name)
    }

    pub fn into_owned(self) -> ContentDisposition<'static> {
        ContentDisposition {
            disposition: Cow::Owned(self.disposition.into_owned()),
            parms: own_parms(self.parms),
        }
    }
}

fn find_parm<'a>(
    parms: &'a [(Cow<'_, [u8]>, Cow<'_, [u8]>)],
    name: &str,
) -> Option<&'a [u8]> {
    parms
        .iter()
        .find(|&&(ref k, _)| k.eq_ignore_ascii_case(name.as_bytes()))
        .map(|&(_, ref v)| &v[..])
}

fn own_parms(
    parms: Vec<(Cow<'_, [u8]>, Cow<'_, [u8]>)>,
) -> Vec<(Cow<'static, [u8]>, Cow<'static, [u8]>)> {
    parms
        .into_iter()
        .map(|(k, v)| (Cow::Owned(k.into_owned()), Cow::Owned(v.into_owned())))
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentTransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
}

impl Default for ContentTransferEncoding {
    fn default() -> Self {
        ContentTransferEncoding::SevenBit
    }
}
