// src/message.rs
//
// Stored message metadata, plus the decoded view of message content that
// search criteria are evaluated against.

use chrono::{DateTime, TimeZone, Utc};
use mailparse::{addrparse, MailAddr, MailHeaderMap, ParsedMail};

use crate::flag::FlagSet;
use crate::store::BlobId;

/// A message as the mailbox tracks it. Content lives in the MessageStore;
/// the sequence number is never stored, it is the position in the list.
#[derive(Debug, Clone)]
pub struct Message {
    pub uid: u32,
    pub internal_date: DateTime<Utc>,
    pub flags: FlagSet,
    pub size: u32,
    pub blob: BlobId,
}

impl Message {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    pub name: String,
    pub email: String,
}

impl EmailAddress {
    /// Local part and domain, split at the last `@`.
    pub fn split(&self) -> (String, String) {
        match self.email.rsplit_once('@') {
            Some((local, host)) => (local.to_string(), host.to_string()),
            None => (self.email.clone(), String::new()),
        }
    }
}

/// Decoded, search-oriented view of message content.
///
/// Header values have RFC 2047 encoded-words decoded; the body text is the
/// concatenation of every textual part after transfer and charset decoding.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub sent_date: Option<DateTime<Utc>>,
}

impl MessageContent {
    pub fn parse(raw: &[u8]) -> crate::Result<Self> {
        let mail = mailparse::parse_mail(raw)?;

        let headers = mail
            .headers
            .iter()
            .map(|h| (h.get_key(), h.get_value()))
            .collect();

        let sent_date = mail
            .headers
            .get_first_value("Date")
            .and_then(|d| mailparse::dateparse(&d).ok())
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());

        let mut body = String::new();
        collect_text(&mail, &mut body);

        Ok(Self { headers, body, sent_date })
    }

    /// All decoded values of a header, matched case-insensitively by name.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header_values(name).next().is_some()
    }
}

fn collect_text(part: &ParsedMail, out: &mut String) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_text(sub, out);
        }
        return;
    }
    let mimetype = part.ctype.mimetype.as_str();
    if !(mimetype.starts_with("text/") || mimetype.starts_with("message/")) {
        return;
    }
    if let Ok(text) = part.get_body() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&text);
    }
}

/// Owned parsing of an address header into `EmailAddress`.
pub fn parse_addrs(field: Option<&str>) -> Vec<EmailAddress> {
    let mut result = Vec::new();
    let Some(s) = field else {
        return result;
    };
    if let Ok(addrs) = addrparse(s) {
        for addr in addrs.iter() {
            match addr {
                MailAddr::Single(info) => result.push(EmailAddress {
                    name: info.display_name.clone().unwrap_or_default(),
                    email: info.addr.clone(),
                }),
                MailAddr::Group(group) => {
                    for info in &group.addrs {
                        result.push(EmailAddress {
                            name: info.display_name.clone().unwrap_or_default(),
                            email: info.addr.clone(),
                        });
                    }
                }
            }
        }
    }
    result
}
