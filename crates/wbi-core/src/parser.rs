//! Parser for the Waldbrandgefahrenindex XML document
//!
//! Expected shape:
//!
//! ```xml
//! <wbs>
//!   <tag>
//!     <datum>2025-03-11</datum>
//!     <landkreis name="Barnim">3</landkreis>
//!     <landkreis name="Uckermark">2</landkreis>
//!   </tag>
//! </wbs>
//! ```
//!
//! Text and attributes are decoded with the encoding named in the XML
//! declaration (UTF-8 when there is none).
//!
//! Structure is checked strictly, entries leniently: a document that is not
//! well-formed or lacks the `<tag>` container with `<landkreis>` entries is
//! rejected, while a single entry with a non-numeric level becomes level 0.

use crate::error::CoreError;
use crate::models::DistrictRiskMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, warn};

const CONTAINER: &[u8] = b"tag";
const DATE: &[u8] = b"datum";
const DISTRICT: &[u8] = b"landkreis";

/// Result of parsing one index document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedIndex {
    pub districts: DistrictRiskMap,
    /// Publication date as written by the source, `None` if absent or blank
    pub last_updated: Option<String>,
    /// Entries that were skipped, one message per entry
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    NotSeen,
    Inside,
    Done,
}

/// Element whose text content is being collected
enum Capture {
    Date(String),
    District { name: Option<String>, text: String },
}

/// Coerce risk text the way a PHP `(int)` cast does
///
/// Surrounding whitespace is ignored and the longest numeric prefix is read:
/// an optional sign, digits, an optional fraction and an optional exponent.
/// A prefix with a fraction or exponent is evaluated as a float and truncated
/// toward zero (`"1e1"` is 10, `"5e-1"` is 0). Text without a numeric prefix
/// is 0. Overflow saturates.
pub fn coerce_level(text: &str) -> i64 {
    numeric_prefix(text).unwrap_or(0)
}

/// Value of the numeric prefix of `text`, `None` if there is none
fn numeric_prefix(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let bytes = trimmed.as_bytes();
    let digits_from = |start: usize| {
        start
            + bytes[start.min(bytes.len())..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count()
    };

    let sign_len = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits_from(sign_len);
    let int_digits = end - sign_len;
    let mut is_float = false;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if int_digits > 0 || frac_end > end + 1 {
            end = frac_end;
            is_float = true;
        }
    }
    if int_digits == 0 && !is_float {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_start = end + 1 + exp_sign;
        let exp_end = digits_from(exp_start);
        if exp_end > exp_start {
            end = exp_end;
            is_float = true;
        }
    }

    let numeric = &trimmed[..end];
    if is_float {
        // `as` truncates toward zero and saturates
        return numeric.parse::<f64>().ok().map(|value| value as i64);
    }

    let negative = bytes.first() == Some(&b'-');
    let magnitude = numeric[sign_len..].bytes().fold(0i64, |acc, b| {
        acc.saturating_mul(10).saturating_add(i64::from(b - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// Parse raw document bytes into the district map and publication date
pub fn parse_document(bytes: &[u8]) -> Result<ParsedIndex, CoreError> {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut container = Container::NotSeen;
    let mut capture: Option<Capture> = None;
    let mut parsed = ParsedIndex::default();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(&reader, e))?;

        match event {
            Event::Start(e) => {
                if depth == 0 {
                    enter_root(&mut seen_root, &reader)?;
                } else if depth == 1 && e.name().as_ref() == CONTAINER {
                    if container == Container::NotSeen {
                        container = Container::Inside;
                    }
                } else if depth == 2 && container == Container::Inside {
                    capture = start_capture(&e, &reader)?;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    enter_root(&mut seen_root, &reader)?;
                } else if depth == 1 && e.name().as_ref() == CONTAINER {
                    if container == Container::NotSeen {
                        container = Container::Done;
                    }
                } else if depth == 2 && container == Container::Inside {
                    if let Some(empty) = start_capture(&e, &reader)? {
                        finish_capture(empty, &mut parsed);
                    }
                }
            }
            Event::Text(t) if depth == 3 => {
                if let Some(capture) = capture.as_mut() {
                    let text = t.unescape().map_err(|e| xml_error(&reader, e))?;
                    capture.push_text(&text);
                }
            }
            Event::CData(c) if depth == 3 => {
                if let Some(capture) = capture.as_mut() {
                    let text = reader.decoder().decode(&c).map_err(|e| xml_error(&reader, e))?;
                    capture.push_text(&text);
                }
            }
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| CoreError::XmlParse {
                    position: reader.buffer_position(),
                    message: "closing tag without matching opening tag".to_string(),
                })?;
                if depth == 2 {
                    if let Some(done) = capture.take() {
                        finish_capture(done, &mut parsed);
                    }
                } else if depth == 1 && container == Container::Inside {
                    container = Container::Done;
                }
            }
            Event::Eof => {
                if depth != 0 {
                    return Err(CoreError::XmlParse {
                        position: reader.buffer_position(),
                        message: format!("unexpected end of document, {depth} element(s) not closed"),
                    });
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(CoreError::XmlParse {
            position: 0,
            message: "document has no root element".to_string(),
        });
    }
    if container == Container::NotSeen {
        return Err(CoreError::MissingElement { element: "tag" });
    }
    if parsed.districts.is_empty() {
        return Err(CoreError::MissingElement {
            element: "landkreis",
        });
    }

    debug!(
        districts = parsed.districts.len(),
        skipped = parsed.warnings.len(),
        date = parsed.last_updated.as_deref().unwrap_or("-"),
        "Parsed index document"
    );

    Ok(parsed)
}

fn enter_root(seen_root: &mut bool, reader: &Reader<&[u8]>) -> Result<(), CoreError> {
    if *seen_root {
        return Err(CoreError::XmlParse {
            position: reader.buffer_position(),
            message: "more than one root element".to_string(),
        });
    }
    *seen_root = true;
    Ok(())
}

fn start_capture(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Option<Capture>, CoreError> {
    match e.name().as_ref() {
        DATE => Ok(Some(Capture::Date(String::new()))),
        DISTRICT => {
            let name = match e.try_get_attribute("name") {
                Ok(Some(attr)) => Some(
                    attr.decode_and_unescape_value(reader)
                        .map_err(|err| xml_error(reader, err))?
                        .into_owned(),
                ),
                Ok(None) => None,
                Err(err) => return Err(xml_error(reader, err)),
            };
            Ok(Some(Capture::District {
                name,
                text: String::new(),
            }))
        }
        _ => Ok(None),
    }
}

fn finish_capture(capture: Capture, parsed: &mut ParsedIndex) {
    match capture {
        Capture::Date(text) => {
            // Only the first <datum> counts
            if parsed.last_updated.is_none() {
                let date = text.trim();
                if !date.is_empty() {
                    parsed.last_updated = Some(date.to_string());
                }
            }
        }
        Capture::District { name, text } => {
            let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
            if name.is_empty() {
                warn!(text = %text.trim(), "Skipping <landkreis> entry without name");
                parsed
                    .warnings
                    .push(format!("<landkreis> entry without name (content '{}')", text.trim()));
                return;
            }

            let level = numeric_prefix(&text).unwrap_or_else(|| {
                warn!(district = %name, text = %text.trim(), "Non-numeric risk level, using 0");
                0
            });
            parsed.districts.insert(name, level);
        }
    }
}

impl Capture {
    fn push_text(&mut self, chunk: &str) {
        match self {
            Capture::Date(text) | Capture::District { text, .. } => text.push_str(chunk),
        }
    }
}

fn xml_error(reader: &Reader<&[u8]>, err: impl std::fmt::Display) -> CoreError {
    CoreError::XmlParse {
        position: reader.buffer_position(),
        message: err.to_string(),
    }
}
