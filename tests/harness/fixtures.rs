// tests/harness/fixtures.rs
//
// Message fixtures shared by the integration tests, plus helpers that fill
// a mailbox with a known set of messages.

use chrono::{DateTime, Duration, TimeZone, Utc};

use imap_mailstore::{MailboxHandle, User};

/// Plain single-part message with a custom header and a two-entry Cc.
pub const TEST_MSG: &str = "To: test@test\r\n\
From: test <test@test>\r\n\
Subject: test\r\n\
Date: Tue, 8 May 2018 20:48:21 +0000\r\n\
Cc: foo <foo@foo>, bar <bar@bar>\r\n\
X-CustomHeader: foo\r\n\
\r\n\
Test! Test! Test! Test!\r\n";

/// multipart/mixed holding a multipart/alternative (text + html) and an
/// attachment.
pub const TEST_MAIL: &str = "Content-Type: multipart/mixed; boundary=message-boundary\r\n\
Date: Sat, 18 Jun 2016 12:00:00 +0900\r\n\
From: Mitsuha Miyamizu <mitsuha.miyamizu@example.org>\r\n\
Reply-To: Mitsuha Miyamizu <mitsuha.miyamizu+replyto@example.org>\r\n\
Message-Id: 42@example.org\r\n\
Subject: Your Name.\r\n\
To: Taki Tachibana <taki.tachibana@example.org>\r\n\
\r\n\
--message-boundary\r\n\
Content-Type: multipart/alternative; boundary=b2\r\n\
\r\n\
--b2\r\n\
Content-Disposition: inline\r\n\
Content-Type: text/plain\r\n\
\r\n\
What's your name?\r\n\
--b2\r\n\
Content-Disposition: inline\r\n\
Content-Type: text/html\r\n\
\r\n\
<div>What's <i>your</i> name?</div>\r\n\
--b2--\r\n\
\r\n\
--message-boundary\r\n\
Content-Disposition: attachment; filename=note.txt\r\n\
Content-Type: text/plain\r\n\
\r\n\
My name is Mitsuha.\r\n\
--message-boundary--\r\n";

/// Encoded-word subject and a quoted-printable UTF-8 body.
pub const ENCODED_TEST_MSG: &str = "From: \"fox.cpp\" <foxcpp@foxcpp.dev>\r\n\
To: \"fox.cpp\" <foxcpp@foxcpp.dev>\r\n\
Subject: =?utf-8?B?0J/RgNC+0LLQtdGA0LrQsCE=?=\r\n\
Date: Sun, 09 Jun 2019 00:06:43 +0300\r\n\
MIME-Version: 1.0\r\n\
Message-ID: <a2aeb99e-52dd-40d3-b99f-1fdaad77ed98@foxcpp.dev>\r\n\
Content-Type: text/plain; charset=utf-8; format=flowed\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
=D0=AD=D1=82=D0=BE=D1=82 =D1=82=D0=B5=D0=BA=D1=81=D1=82 =D0=B4=D0=BE=D0=BB=\r\n\
=D0=B6=D0=B5=D0=BD =D0=B1=D1=8B=D1=82=D1=8C =D0=B7=D0=B0=D0=BA=D0=BE=D0=B4=\r\n\
=D0=B8=D1=80=D0=BE=D0=B2=D0=B0=D0=BD =D0=B2 base64 =D0=B8=D0=BB=D0=B8 quote=\r\n\
d-encoding.";

/// Internal date of the first message created by `create_msgs`.
pub fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 6, 1, 12, 0, 0).unwrap()
}

/// Appends `count` copies of TEST_MSG to the handle's mailbox. Message N
/// carries flags `$TestN-1` and `$TestN-2` and is dated N-1 days after
/// `base_date()`. The handle then polls, so the messages are recent for it.
pub fn create_msgs(user: &User, handle: &MailboxHandle, count: u32) {
    let name = handle.name().unwrap();
    for i in 1..=count {
        let flags = [format!("$Test{}-1", i), format!("$Test{}-2", i)];
        let date = base_date() + Duration::days(i as i64 - 1);
        user.create_message(&name, flags, date, TEST_MSG.as_bytes(), None)
            .unwrap();
    }
    handle.poll().unwrap();
}
