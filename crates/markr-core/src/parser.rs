//! XML result batch decoder.
//!
//! Scans a `mcq-test-results` document into raw entries, then validates each
//! entry into a [`CanonicalResult`]. Scanning checks well-formedness of the
//! whole document before any entry is validated, so a malformed tail always
//! wins over a bad field earlier in the batch.
//!
//! Per-question `answer` elements are skipped unread, and unknown elements
//! inside an entry are tolerated, including scanner junk whose end tag only
//! repeats the first name token (`<how about this>...</how about this>`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{IngestError, NOT_AVAILABLE};
use crate::model::CanonicalResult;

pub const ROOT_ELEMENT: &str = "mcq-test-results";
pub const ENTRY_ELEMENT: &str = "mcq-test-result";
const ANSWER_ELEMENT: &str = "answer";
const SUMMARY_MARKS_ELEMENT: &str = "summary-marks";

const SCANNED_ON_ATTR: &str = "scanned-on";
const AVAILABLE_ATTR: &str = "available";
const OBTAINED_ATTR: &str = "obtained";

/// Timestamp layouts accepted without an offset; interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// One `mcq-test-result` entry exactly as scanned, before validation.
///
/// Values are whitespace-trimmed; `None` means the element or attribute was
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub scanned_on: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub student_number: Option<String>,
    pub test_id: Option<String>,
    pub marks_available: Option<String>,
    pub marks_obtained: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    FirstName,
    LastName,
    StudentNumber,
    TestId,
}

impl Field {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"first-name" => Some(Field::FirstName),
            b"last-name" => Some(Field::LastName),
            b"student-number" => Some(Field::StudentNumber),
            b"test-id" => Some(Field::TestId),
            _ => None,
        }
    }

    fn slot<'a>(&self, entry: &'a mut RawEntry) -> &'a mut Option<String> {
        match self {
            Field::FirstName => &mut entry.first_name,
            Field::LastName => &mut entry.last_name,
            Field::StudentNumber => &mut entry.student_number,
            Field::TestId => &mut entry.test_id,
        }
    }
}

/// Decode a batch into canonical records, in document order.
///
/// Duplicates are preserved; see [`crate::reconcile`]. The first invalid
/// entry fails the whole batch.
pub fn decode_results(xml: &str) -> Result<Vec<CanonicalResult>, IngestError> {
    let entries = scan_entries(xml)?;
    if entries.is_empty() {
        return Err(IngestError::NoResultsFound);
    }

    let records = entries
        .iter()
        .map(validate_entry)
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(entries = records.len(), "decoded result batch");
    Ok(records)
}

/// Scan the document structure and collect raw entries.
///
/// Fails with [`IngestError::MalformedInput`] if the markup is broken or the
/// input holds no element at all. A document whose root is not
/// `mcq-test-results` yields no entries.
pub fn scan_entries(xml: &str) -> Result<Vec<RawEntry>, IngestError> {
    let src = xml.trim_start();
    // Byte offset of `reader`'s input within `src`; moves forward each time
    // an `answer` body is skipped.
    let mut base = 0usize;
    let mut reader = lenient_reader(src);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut saw_element = false;
    let mut entries = Vec::new();
    let mut entry: Option<RawEntry> = None;
    let mut capture: Option<(Field, String)> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(IngestError::MalformedInput(format!(
                    "{err} (near byte {})",
                    base + reader.buffer_position() as usize
                )))
            }
        };

        match event {
            Event::Start(start) => {
                saw_element = true;
                let name = start.name().as_ref().to_vec();
                match stack.len() {
                    1 if is_root(&stack) && name == ENTRY_ELEMENT.as_bytes() => {
                        entry = Some(begin_entry(&start)?);
                    }
                    2 if in_entry(&stack) => {
                        if name == ANSWER_ELEMENT.as_bytes() {
                            // Per-question detail: skip the raw body and resume after it.
                            let body = base + reader.buffer_position() as usize;
                            base = skip_raw_element(src, body, ANSWER_ELEMENT).ok_or_else(|| {
                                IngestError::MalformedInput(format!(
                                    "unterminated <answer> starting near byte {body}"
                                ))
                            })?;
                            reader = lenient_reader(&src[base..]);
                            continue;
                        }
                        if let Some(current) = entry.as_mut() {
                            read_child(&start, current)?;
                        }
                        capture = Field::from_name(&name).map(|field| (field, String::new()));
                    }
                    _ => {}
                }
                stack.push(name);
            }
            Event::Empty(start) => {
                saw_element = true;
                let name = start.name();
                if stack.len() == 1 && is_root(&stack) && name.as_ref() == ENTRY_ELEMENT.as_bytes()
                {
                    entries.push(begin_entry(&start)?);
                } else if stack.len() == 2 && in_entry(&stack) {
                    if let Some(current) = entry.as_mut() {
                        read_child(&start, current)?;
                    }
                }
            }
            Event::Text(text) => {
                if let Some((_, buf)) = capture.as_mut() {
                    if stack.len() == 3 {
                        let value = text
                            .unescape()
                            .map_err(|err| IngestError::MalformedInput(err.to_string()))?;
                        buf.push_str(&value);
                    }
                }
            }
            Event::CData(data) => {
                if let Some((_, buf)) = capture.as_mut() {
                    if stack.len() == 3 {
                        buf.push_str(String::from_utf8_lossy(&data).trim());
                    }
                }
            }
            Event::End(end) => {
                let end_name = end.name();
                let closing = first_token(end_name.as_ref());
                let Some(open) = stack.pop() else {
                    return Err(IngestError::MalformedInput(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(closing)
                    )));
                };
                if closing != open.as_slice() {
                    return Err(IngestError::MalformedInput(format!(
                        "expected </{}>, found </{}>",
                        String::from_utf8_lossy(&open),
                        String::from_utf8_lossy(closing)
                    )));
                }
                match stack.len() {
                    2 => {
                        if let (Some((field, value)), Some(current)) = (capture.take(), entry.as_mut())
                        {
                            *field.slot(current) = Some(value.trim().to_string());
                        }
                    }
                    1 => {
                        if let Some(done) = entry.take() {
                            entries.push(done);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(IngestError::MalformedInput(format!(
            "unexpected end of input, <{}> is not closed",
            String::from_utf8_lossy(open)
        )));
    }
    if !saw_element {
        return Err(IngestError::MalformedInput(
            "document contains no root element".to_string(),
        ));
    }

    Ok(entries)
}

/// Validate one raw entry.
pub fn validate_entry(entry: &RawEntry) -> Result<CanonicalResult, IngestError> {
    let student_number = present(&entry.student_number);
    let test_id = present(&entry.test_id);

    let (
        Some(first_name),
        Some(last_name),
        Some(student_number),
        Some(test_id),
        Some(scanned_on_raw),
        Some(available_raw),
        Some(obtained_raw),
    ) = (
        present(&entry.first_name),
        present(&entry.last_name),
        student_number,
        test_id,
        present(&entry.scanned_on),
        present(&entry.marks_available),
        present(&entry.marks_obtained),
    )
    else {
        return Err(IngestError::MissingRequiredField {
            student_number: student_number.unwrap_or(NOT_AVAILABLE).to_string(),
            test_id: test_id.unwrap_or(NOT_AVAILABLE).to_string(),
        });
    };

    let scanned_on =
        parse_scanned_on(scanned_on_raw).ok_or_else(|| IngestError::InvalidDateFormat {
            raw: scanned_on_raw.to_string(),
            student_number: student_number.to_string(),
            test_id: test_id.to_string(),
        })?;

    let (Ok(marks_available), Ok(marks_obtained)) = (
        available_raw.parse::<u32>(),
        obtained_raw.parse::<u32>(),
    ) else {
        return Err(IngestError::InvalidMarks {
            available: available_raw.to_string(),
            obtained: obtained_raw.to_string(),
            student_number: student_number.to_string(),
            test_id: test_id.to_string(),
        });
    };

    Ok(CanonicalResult {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        student_number: student_number.to_string(),
        test_id: test_id.to_string(),
        scanned_on,
        marks_available,
        marks_obtained,
    })
}

/// Parse a `scanned-on` value.
///
/// Accepts RFC 3339, naive date-times (taken as UTC) and bare dates
/// (midnight UTC).
pub fn parse_scanned_on(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn begin_entry(start: &BytesStart<'_>) -> Result<RawEntry, IngestError> {
    Ok(RawEntry {
        scanned_on: attribute(start, SCANNED_ON_ATTR)?,
        ..RawEntry::default()
    })
}

/// Pick up attributes carried by a direct child of an entry.
fn read_child(start: &BytesStart<'_>, entry: &mut RawEntry) -> Result<(), IngestError> {
    if start.name().as_ref() == SUMMARY_MARKS_ELEMENT.as_bytes() {
        entry.marks_available = attribute(start, AVAILABLE_ATTR)?;
        entry.marks_obtained = attribute(start, OBTAINED_ATTR)?;
    }
    Ok(())
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Result<Option<String>, IngestError> {
    let attr = start
        .try_get_attribute(name)
        .map_err(|err| IngestError::MalformedInput(err.to_string()))?;
    attr.map(|attr| {
        attr.unescape_value()
            .map(|value| value.trim().to_string())
            .map_err(|err| IngestError::MalformedInput(err.to_string()))
    })
    .transpose()
}

fn is_root(stack: &[Vec<u8>]) -> bool {
    stack.first().is_some_and(|name| name == ROOT_ELEMENT.as_bytes())
}

fn in_entry(stack: &[Vec<u8>]) -> bool {
    is_root(stack) && stack.get(1).is_some_and(|name| name == ENTRY_ELEMENT.as_bytes())
}

fn lenient_reader(src: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(src);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;
    reader
}

/// Offset just past the `</name ...>` that closes an element whose body
/// starts at `from`. The body is not tokenized.
fn skip_raw_element(src: &str, from: usize, name: &str) -> Option<usize> {
    let closing = format!("</{name}");
    let mut cursor = from;
    loop {
        let found = cursor + src.get(cursor..)?.find(&closing)?;
        let after = found + closing.len();
        let rest = src.get(after..)?;
        if rest.starts_with('>') || rest.starts_with(|c: char| c.is_ascii_whitespace()) {
            return Some(after + rest.find('>')? + 1);
        }
        cursor = after;
    }
}

fn first_token(name: &[u8]) -> &[u8] {
    name.split(|b| b.is_ascii_whitespace())
        .next()
        .unwrap_or(name)
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
