// src/fetch.rs
//
// Fetch items requested by listMessages, and the structural accessors
// (envelope, body structure, body sections) answered from raw content.

use chrono::{DateTime, TimeZone, Utc};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::flag;
use crate::message::{parse_addrs, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    Uid,
    Flags,
    InternalDate,
    Rfc822Size,
    Envelope,
    BodyStructure,
    Body(BodySectionName),
}

impl FetchItem {
    pub fn needs_content(&self) -> bool {
        matches!(
            self,
            FetchItem::Envelope | FetchItem::BodyStructure | FetchItem::Body(_)
        )
    }

    /// True for body fetches that implicitly set `\Seen`.
    pub fn sets_seen(&self) -> bool {
        matches!(self, FetchItem::Body(section) if !section.peek)
    }
}

impl FromStr for FetchItem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        let item = match upper.as_str() {
            "UID" => FetchItem::Uid,
            "FLAGS" => FetchItem::Flags,
            "INTERNALDATE" => FetchItem::InternalDate,
            "RFC822.SIZE" => FetchItem::Rfc822Size,
            "ENVELOPE" => FetchItem::Envelope,
            "BODYSTRUCTURE" | "BODY" => FetchItem::BodyStructure,
            "RFC822" => FetchItem::Body(BodySectionName::entire(false)),
            "RFC822.HEADER" => FetchItem::Body(BodySectionName {
                specifier: PartSpecifier::Header,
                ..BodySectionName::entire(true)
            }),
            "RFC822.TEXT" => FetchItem::Body(BodySectionName {
                specifier: PartSpecifier::Text,
                ..BodySectionName::entire(false)
            }),
            _ => FetchItem::Body(s.trim().parse()?),
        };
        Ok(item)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSpecifier {
    /// `BODY[]` or `BODY[1.2]`
    Entire,
    Header,
    HeaderFields,
    HeaderFieldsNot,
    Text,
    Mime,
}

/// A `BODY[...]` / `BODY.PEEK[...]` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySectionName {
    pub peek: bool,
    /// MIME part path, 1-based; empty for the whole message.
    pub path: Vec<u32>,
    pub specifier: PartSpecifier,
    pub fields: Vec<String>,
    /// `<start.len>`
    pub partial: Option<(u32, u32)>,
}

impl BodySectionName {
    pub fn entire(peek: bool) -> Self {
        Self {
            peek,
            path: Vec::new(),
            specifier: PartSpecifier::Entire,
            fields: Vec::new(),
            partial: None,
        }
    }
}

impl fmt::Display for BodySectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.peek { "BODY.PEEK[" } else { "BODY[" })?;
        let path: Vec<String> = self.path.iter().map(|p| p.to_string()).collect();
        f.write_str(&path.join("."))?;
        let spec = match self.specifier {
            PartSpecifier::Entire => "",
            PartSpecifier::Header => "HEADER",
            PartSpecifier::HeaderFields => "HEADER.FIELDS",
            PartSpecifier::HeaderFieldsNot => "HEADER.FIELDS.NOT",
            PartSpecifier::Text => "TEXT",
            PartSpecifier::Mime => "MIME",
        };
        if !spec.is_empty() {
            if !self.path.is_empty() {
                f.write_str(".")?;
            }
            f.write_str(spec)?;
        }
        if !self.fields.is_empty() {
            write!(f, " ({})", self.fields.join(" "))?;
        }
        f.write_str("]")?;
        if let Some((start, len)) = self.partial {
            write!(f, "<{}.{}>", start, len)?;
        }
        Ok(())
    }
}

impl FromStr for BodySectionName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidArgument(format!("unsupported fetch item '{}'", s));

        let upper = s.to_ascii_uppercase();
        let (peek, rest) = if upper.starts_with("BODY.PEEK[") {
            (true, &s["BODY.PEEK[".len()..])
        } else if upper.starts_with("BODY[") {
            (false, &s["BODY[".len()..])
        } else {
            return Err(bad());
        };
        let close = rest.find(']').ok_or_else(bad)?;
        let (inner, tail) = (&rest[..close], &rest[close + 1..]);

        let mut path = Vec::new();
        let mut spec = inner;
        while let Some(first) = spec.chars().next() {
            if !first.is_ascii_digit() {
                break;
            }
            let end = spec.find('.').unwrap_or(spec.len());
            let num: u32 = spec[..end].parse().map_err(|_| bad())?;
            if num == 0 {
                return Err(bad());
            }
            path.push(num);
            spec = spec.get(end + 1..).unwrap_or("");
        }

        let (spec_name, fields) = match spec.find('(') {
            Some(open) => {
                let close = spec.rfind(')').ok_or_else(bad)?;
                let fields = spec[open + 1..close]
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                (spec[..open].trim().to_ascii_uppercase(), fields)
            }
            None => (spec.trim().to_ascii_uppercase(), Vec::new()),
        };

        let specifier = match spec_name.as_str() {
            "" => PartSpecifier::Entire,
            "HEADER" => PartSpecifier::Header,
            "HEADER.FIELDS" => PartSpecifier::HeaderFields,
            "HEADER.FIELDS.NOT" => PartSpecifier::HeaderFieldsNot,
            "TEXT" => PartSpecifier::Text,
            "MIME" if !path.is_empty() => PartSpecifier::Mime,
            _ => return Err(bad()),
        };
        let wants_fields = matches!(
            specifier,
            PartSpecifier::HeaderFields | PartSpecifier::HeaderFieldsNot
        );
        if wants_fields == fields.is_empty() {
            return Err(bad());
        }

        let partial = if tail.is_empty() {
            None
        } else {
            let range = tail
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .ok_or_else(bad)?;
            let (start, len) = range.split_once('.').ok_or_else(bad)?;
            Some((
                start.parse().map_err(|_| bad())?,
                len.parse().map_err(|_| bad())?,
            ))
        };

        Ok(Self {
            peek,
            path,
            specifier,
            fields,
            partial,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub personal_name: String,
    pub mailbox_name: String,
    pub host_name: String,
}

/// Parsed RFC 5322 header summary. Values are NOT encoded-word decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub date: Option<DateTime<Utc>>,
    pub subject: String,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyStructure {
    pub mime_type: String,
    pub mime_subtype: String,
    pub params: BTreeMap<String, String>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub encoding: Option<String>,
    pub size: u32,
    pub disposition: Option<String>,
    pub disposition_params: BTreeMap<String, String>,
    pub parts: Vec<BodyStructure>,
}

/// One message as returned by listMessages. Only requested items are set.
#[derive(Debug, Clone, Default)]
pub struct FetchedMessage {
    pub seq_num: u32,
    pub uid: Option<u32>,
    pub flags: Option<Vec<String>>,
    pub internal_date: Option<DateTime<Utc>>,
    pub size: Option<u32>,
    pub envelope: Option<Envelope>,
    pub body_structure: Option<BodyStructure>,
    pub body: Vec<(BodySectionName, Vec<u8>)>,
}

/// Builds the fetch result for one message.
///
/// `raw` must be provided when any item needs content; `recent` says whether
/// the requesting session sees the message as `\Recent`.
pub fn fetch_message(
    msg: &Message,
    seq_num: u32,
    recent: bool,
    raw: Option<&[u8]>,
    items: &[FetchItem],
) -> Result<FetchedMessage> {
    let mut out = FetchedMessage {
        seq_num,
        ..FetchedMessage::default()
    };
    let content = || raw.ok_or_else(|| Error::Store("message content not loaded".to_string()));

    for item in items {
        match item {
            FetchItem::Uid => out.uid = Some(msg.uid),
            FetchItem::Flags => out.flags = Some(flag::with_recent(&msg.flags, recent)),
            FetchItem::InternalDate => out.internal_date = Some(msg.internal_date),
            FetchItem::Rfc822Size => out.size = Some(msg.size),
            FetchItem::Envelope => out.envelope = Some(envelope(content()?)?),
            FetchItem::BodyStructure => out.body_structure = Some(body_structure(content()?)?),
            FetchItem::Body(section) => {
                let bytes = extract_section(content()?, section)?;
                out.body.push((section.clone(), bytes));
            }
        }
    }
    Ok(out)
}

fn raw_value(mail: &ParsedMail, name: &str) -> String {
    mail.headers
        .iter()
        .find(|h| h.get_key().eq_ignore_ascii_case(name))
        .map(|h| {
            String::from_utf8_lossy(&h.get_value_raw()[..])
                .replace("\r\n", "")
                .replace('\n', "")
                .trim()
                .to_string()
        })
        .unwrap_or_default()
}

fn addresses(mail: &ParsedMail, name: &str) -> Vec<Address> {
    let value = mail.headers.get_first_value(name);
    parse_addrs(value.as_deref())
        .into_iter()
        .map(|a| {
            let (mailbox_name, host_name) = a.split();
            Address {
                personal_name: a.name,
                mailbox_name,
                host_name,
            }
        })
        .collect()
}

pub fn envelope(raw: &[u8]) -> Result<Envelope> {
    let mail = mailparse::parse_mail(raw)?;
    let date = mail
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
    let message_id = raw_value(&mail, "Message-Id");

    Ok(Envelope {
        date,
        subject: raw_value(&mail, "Subject"),
        from: addresses(&mail, "From"),
        sender: addresses(&mail, "Sender"),
        reply_to: addresses(&mail, "Reply-To"),
        to: addresses(&mail, "To"),
        cc: addresses(&mail, "Cc"),
        bcc: addresses(&mail, "Bcc"),
        in_reply_to: raw_value(&mail, "In-Reply-To"),
        message_id: message_id
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_string(),
    })
}

pub fn body_structure(raw: &[u8]) -> Result<BodyStructure> {
    let mail = mailparse::parse_mail(raw)?;
    structure_of(&mail)
}

fn structure_of(part: &ParsedMail) -> Result<BodyStructure> {
    let (mime_type, mime_subtype) = match part.ctype.mimetype.split_once('/') {
        Some((t, s)) => (t.to_string(), s.to_string()),
        None => (part.ctype.mimetype.clone(), String::new()),
    };

    let (disposition, disposition_params) = if part.headers.get_first_value("Content-Disposition").is_some() {
        let cd = part.get_content_disposition();
        let kind = match cd.disposition {
            DispositionType::Inline => "inline".to_string(),
            DispositionType::Attachment => "attachment".to_string(),
            DispositionType::FormData => "form-data".to_string(),
            DispositionType::Extension(ext) => ext.to_ascii_lowercase(),
        };
        (Some(kind), cd.params)
    } else {
        (None, BTreeMap::new())
    };

    let parts = part
        .subparts
        .iter()
        .map(structure_of)
        .collect::<Result<Vec<_>>>()?;

    Ok(BodyStructure {
        mime_type,
        mime_subtype,
        params: part.ctype.params.clone(),
        id: part.headers.get_first_value("Content-Id"),
        description: part.headers.get_first_value("Content-Description"),
        encoding: part.headers.get_first_value("Content-Transfer-Encoding"),
        size: body_block(part.raw_bytes)?.len() as u32,
        disposition,
        disposition_params,
        parts,
    })
}

fn header_block(bytes: &[u8]) -> Result<&[u8]> {
    let (_, offset) = mailparse::parse_headers(bytes)?;
    Ok(&bytes[..offset.min(bytes.len())])
}

fn body_block(bytes: &[u8]) -> Result<&[u8]> {
    let (_, offset) = mailparse::parse_headers(bytes)?;
    Ok(&bytes[offset.min(bytes.len())..])
}

/// Splits a header block into (name, raw field bytes incl. continuations).
fn header_fields(block: &[u8]) -> Vec<(String, &[u8])> {
    let mut fields: Vec<(String, &[u8])> = Vec::new();
    let mut start = 0;
    let mut field_start: Option<usize> = None;

    while start < block.len() {
        let end = block[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| start + p + 1)
            .unwrap_or(block.len());
        let line = &block[start..end];
        let is_blank = line.iter().all(|b| *b == b'\r' || *b == b'\n');
        let is_continuation = matches!(line.first(), Some(b' ') | Some(b'\t'));

        if !is_continuation {
            if let Some(fs) = field_start.take() {
                push_field(&mut fields, &block[fs..start]);
            }
            if !is_blank {
                field_start = Some(start);
            }
        }
        start = end;
    }
    if let Some(fs) = field_start {
        push_field(&mut fields, &block[fs..]);
    }
    fields
}

fn push_field<'a>(fields: &mut Vec<(String, &'a [u8])>, raw: &'a [u8]) {
    let name_end = raw.iter().position(|&b| b == b':').unwrap_or(raw.len());
    let name = String::from_utf8_lossy(&raw[..name_end]).trim().to_string();
    fields.push((name, raw));
}

fn find_part<'a>(mail: &'a ParsedMail<'a>, path: &[u32]) -> Result<&'a ParsedMail<'a>> {
    let mut current = mail;
    for &n in path {
        if current.subparts.is_empty() {
            // A single-part entity is its own part 1.
            if n == 1 {
                continue;
            }
            return Err(Error::InvalidArgument(format!("no body part {}", n)));
        }
        current = n
            .checked_sub(1)
            .and_then(|ix| current.subparts.get(ix as usize))
            .ok_or_else(|| Error::InvalidArgument(format!("no body part {}", n)))?;
    }
    Ok(current)
}

pub fn extract_section(raw: &[u8], section: &BodySectionName) -> Result<Vec<u8>> {
    let mail = mailparse::parse_mail(raw)?;
    let part = find_part(&mail, &section.path)?;
    let entity = if section.path.is_empty() { raw } else { part.raw_bytes };

    let bytes: Vec<u8> = match section.specifier {
        PartSpecifier::Entire if section.path.is_empty() => raw.to_vec(),
        PartSpecifier::Entire | PartSpecifier::Text => body_block(entity)?.to_vec(),
        PartSpecifier::Header | PartSpecifier::Mime => header_block(entity)?.to_vec(),
        PartSpecifier::HeaderFields | PartSpecifier::HeaderFieldsNot => {
            let keep = section.specifier == PartSpecifier::HeaderFields;
            let mut out = Vec::new();
            for (name, field) in header_fields(header_block(entity)?) {
                let listed = section.fields.iter().any(|f| f.eq_ignore_ascii_case(&name));
                if listed == keep {
                    out.extend_from_slice(field);
                }
            }
            out.extend_from_slice(b"\r\n");
            out
        }
    };

    Ok(match section.partial {
        Some((start, len)) => {
            let start = (start as usize).min(bytes.len());
            let end = start.saturating_add(len as usize).min(bytes.len());
            bytes[start..end].to_vec()
        }
        None => bytes,
    })
}
