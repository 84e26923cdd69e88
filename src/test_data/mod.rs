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

use std::sync::Arc;

use chrono::prelude::*;

use crate::mailbox::model::*;

/// A plain single-part message.
pub static SIMPLE: &[u8] = b"\
From: Alice <alice@example.com>\r
To: Bob <bob@example.org>\r
Subject: Lunch plans\r
Date: Mon, 15 Jun 2020 13:04:05 +0200\r
Message-ID: <simple@example.com>\r
\r
Shall we meet at noon at the usual place?\r
";

/// Encoded words in both an address and the subject, and no `Date`.
pub static ENCODED_SUBJECT: &[u8] = b"\
From: =?utf-8?q?J=C3=B6rg?= <joerg@example.de>\r
Subject: =?utf-8?q?Gr=C3=BC=C3=9Fe?= =?utf-8?q?_aus_K=C3=B6ln?=\r
MIME-Version: 1.0\r
Content-Type: text/plain; charset=utf-8\r
\r
Hallo!\r
";

/// A quoted-printable text part and a base64 attachment.
pub static MULTIPART: &[u8] = b"\
From: Carol <carol@example.com>\r
To: Dave <dave@example.org>, Erin <erin@example.org>\r
Cc: Frank <frank@example.net>\r
Subject: [Reports] Re: Quarterly numbers\r
Date: Tue, 16 Jun 2020 09:30:00 +0000\r
MIME-Version: 1.0\r
Content-Type: multipart/mixed; boundary=\"=-boundary-=\"\r
\r
This is a multi-part message in MIME format.\r
--=-boundary-=\r
Content-Type: text/plain; charset=us-ascii\r
Content-Transfer-Encoding: quoted-printable\r
\r
The quarterly numbers are=\r
 in. See the attachment.\r
\r
Regards\r
--=-boundary-=\r
Content-Type: text/plain; name=\"report.txt\"\r
Content-Disposition: attachment; filename=\"report.txt\"\r
Content-Transfer-Encoding: base64\r
\r
VGhlIGF0dGFjaGVkIHJl\r
cG9ydCB0ZXh0IGxpdmVzIGhlcmUu\r
--=-boundary-=--\r
";

/// An ISO-8859-1 body in quoted-printable.
pub static LATIN1_QP: &[u8] = b"\
From: Gaston <gaston@example.fr>\r
Subject: Encore\r
MIME-Version: 1.0\r
Content-Type: text/plain; charset=iso-8859-1\r
Content-Transfer-Encoding: quoted-printable\r
\r
C'est un d=E9j=E0 vu.\r
";

/// One alternative in a charset nobody knows, one in UTF-8.
pub static UNKNOWN_CHARSET: &[u8] = b"\
From: Mallory <mallory@example.com>\r
Subject: Alternatives\r
MIME-Version: 1.0\r
Content-Type: multipart/alternative; boundary=alt\r
\r
--alt\r
Content-Type: text/plain; charset=x-unknown-charset\r
\r
mystery words\r
--alt\r
Content-Type: text/plain; charset=utf-8\r
\r
readable words\r
--alt--\r
";

/// A forwarded message carried as a message/rfc822 part.
pub static NESTED_RFC822: &[u8] = b"\
From: Grace <grace@example.com>\r
To: Judy <judy@example.com>\r
Subject: Fwd: see below\r
Date: Wed, 17 Jun 2020 18:00:00 -0400\r
MIME-Version: 1.0\r
Content-Type: multipart/mixed; boundary=outer\r
\r
--outer\r
Content-Type: text/plain\r
\r
See the message below.\r
--outer\r
Content-Type: message/rfc822\r
\r
From: Ivan <ivan@example.org>\r
Subject: Forwarded inner subject\r
\r
This is the inner message body.\r
--outer--\r
";

/// A `To` header made of a group.
pub static GROUP_ADDRESS: &[u8] = b"\
From: Ken <ken@example.net>\r
To: team: Heidi <heidi@example.net>, ivan@example.net;\r
Subject: Team meeting\r
\r
Agenda to follow.\r
";

/// Wrap `data` as UID 1 of `INBOX`.
pub fn test_message(data: &[u8]) -> MailboxMessage {
    test_message_with_uid(Uid::u(1), data)
}

pub fn test_message_with_uid(uid: Uid, data: &[u8]) -> MailboxMessage {
    MailboxMessage {
        mailbox: MailboxId::from("INBOX"),
        uid,
        modseq: Modseq(1),
        message_id: MessageId(format!("M{}", uid)),
        thread_id: ThreadId(format!("T{}", uid)),
        flags: vec![],
        internal_date: Utc
            .with_ymd_and_hms(2020, 6, 20, 12, 0, 0)
            .single()
            .unwrap(),
        size: data.len() as u64,
        content: Arc::new(BufferedContent::new(data)),
    }
}
