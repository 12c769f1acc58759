//! `.msg` mail container reader.
//!
//! Outlook messages are OLE compound files (MS-OXMSG): MAPI properties live
//! in streams named after the property tag, attachments in numbered
//! sub-storages. Only the properties the pipeline needs are read: body
//! text, client submit time, and the attachment name/data pairs.

use std::io::{Cursor, Read};

use cfb::CompoundFile;
use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;
use tracing::debug;

use crate::models::message::AttachmentCandidate;

const BODY_UNICODE: &str = "/__substg1.0_1000001F";
const BODY_ANSI: &str = "/__substg1.0_1000001E";
const PROPERTIES_STREAM: &str = "/__properties_version1.0";
const ATTACH_PREFIX: &str = "__attach_version1.0_";
const ATTACH_LONG_FILENAME: &str = "__substg1.0_3707001F";
const ATTACH_SHORT_FILENAME: &str = "__substg1.0_3704001F";
const ATTACH_DATA: &str = "__substg1.0_37010102";

// PidTagClientSubmitTime / PidTagMessageDeliveryTime, both PT_SYSTIME.
const TAG_CLIENT_SUBMIT_TIME: u32 = 0x0039_0040;
const TAG_MESSAGE_DELIVERY_TIME: u32 = 0x0E06_0040;

// Top-level property stream header size (MS-OXMSG §2.4.1.1).
const TOP_LEVEL_PROPERTIES_HEADER: usize = 32;

// Seconds between 1601-01-01 (FILETIME epoch) and 1970-01-01.
const FILETIME_UNIX_EPOCH_SECS: i64 = 11_644_473_600;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("not a valid .msg container: {0}")]
    Container(#[from] std::io::Error),
}

/// The parts of a message the pipeline consumes.
#[derive(Debug)]
pub struct ParsedMail {
    pub body: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub attachments: Vec<AttachmentCandidate>,
}

/// Parses a `.msg` blob. Missing optional properties (body, date,
/// attachment names) degrade to empty values; only a broken container is an
/// error.
pub fn parse_msg(bytes: &[u8]) -> Result<ParsedMail, MailError> {
    let mut ole = CompoundFile::open(Cursor::new(bytes))?;

    let body = read_string_stream(&mut ole, BODY_UNICODE)
        .or_else(|| read_string_stream(&mut ole, BODY_ANSI))
        .unwrap_or_default();

    let sent_at = read_submit_time(&mut ole);

    // Attachment storages are numbered; sorting the names restores the
    // container's natural attachment order.
    let mut storage_names: Vec<String> = ole
        .read_storage("/")?
        .filter(|entry| entry.is_storage() && entry.name().starts_with(ATTACH_PREFIX))
        .map(|entry| entry.name().to_string())
        .collect();
    storage_names.sort();

    let mut attachments = Vec::with_capacity(storage_names.len());
    for storage in &storage_names {
        let filename = read_string_stream(&mut ole, &format!("/{storage}/{ATTACH_LONG_FILENAME}"))
            .or_else(|| read_string_stream(&mut ole, &format!("/{storage}/{ATTACH_SHORT_FILENAME}")));
        let data =
            read_binary_stream(&mut ole, &format!("/{storage}/{ATTACH_DATA}")).unwrap_or_default();
        attachments.push(AttachmentCandidate { filename, data });
    }

    debug!(
        "parsed .msg: {} byte body, {} attachment(s)",
        body.len(),
        attachments.len()
    );

    Ok(ParsedMail {
        body,
        sent_at,
        attachments,
    })
}

/// LinkedIn application notifications lead with the candidate line, then
/// the profile headline, then the location. Best effort: `N/A` when the
/// body is shorter than that.
pub fn extract_linkedin_info(body: &str) -> (String, String) {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());
    let _candidate_line = lines.next();
    let title = lines.next().unwrap_or("N/A").to_string();
    let address = lines.next().unwrap_or("N/A").to_string();
    (title, address)
}

fn read_binary_stream(ole: &mut CompoundFile<Cursor<&[u8]>>, path: &str) -> Option<Vec<u8>> {
    let mut stream = ole.open_stream(path).ok()?;
    let mut data = Vec::new();
    stream.read_to_end(&mut data).ok()?;
    Some(data)
}

fn read_string_stream(ole: &mut CompoundFile<Cursor<&[u8]>>, path: &str) -> Option<String> {
    let data = read_binary_stream(ole, path)?;
    // `001F` streams are UTF-16LE, `001E`/binary fall back to lossy UTF-8.
    let text = if path.ends_with("001F") {
        decode_utf16le(&data)
    } else {
        String::from_utf8_lossy(&data).into_owned()
    };
    let text = text.trim_end_matches('\0').to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Scans the fixed-size property records for the submit time, falling back
/// to the delivery time.
fn read_submit_time(ole: &mut CompoundFile<Cursor<&[u8]>>) -> Option<DateTime<Utc>> {
    let data = read_binary_stream(ole, PROPERTIES_STREAM)?;
    let records = data.get(TOP_LEVEL_PROPERTIES_HEADER..)?;

    let mut delivery_time = None;
    for record in records.chunks_exact(16) {
        let tag = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let value = u64::from_le_bytes([
            record[8], record[9], record[10], record[11], record[12], record[13], record[14],
            record[15],
        ]);
        match tag {
            TAG_CLIENT_SUBMIT_TIME => return filetime_to_utc(value),
            TAG_MESSAGE_DELIVERY_TIME => delivery_time = filetime_to_utc(value),
            _ => {}
        }
    }
    delivery_time
}

fn filetime_to_utc(filetime: u64) -> Option<DateTime<Utc>> {
    if filetime == 0 {
        return None;
    }
    let secs = (filetime / 10_000_000) as i64 - FILETIME_UNIX_EPOCH_SECS;
    let nanos = ((filetime % 10_000_000) * 100) as u32;
    Utc.timestamp_opt(secs, nanos).single()
}
