use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, TranscriptError};
use crate::transcript::Segment;

/// Substituted when a caption entry carries no usable duration. The site
/// omits `dur` on some tracks; 2 seconds keeps `end >= start` without
/// inventing timing that was never there.
const DEFAULT_DURATION_SECS: f64 = 2.0;

/// Parse a caption document in either of the two dialects the site serves:
///
/// - dialect A: `<transcript><text start=".." dur="..">..</text></transcript>`
/// - dialect B: `<timedtext><body>` with direct `<text>` children or
///   `<p t=".." d=".."><s>..</s></p>` paragraphs
///
/// Dialect A is attempted first; any failure falls back to dialect B.
pub fn parse_transcript_xml(body: &str) -> Result<Vec<Segment>> {
    let body = strip_prologue(body);
    if body.is_empty() {
        return Err(TranscriptError::Parsing("empty caption document".into()));
    }

    match parse_dialect_a(body) {
        Ok(segments) => Ok(segments),
        Err(_) => parse_dialect_b(body),
    }
}

/// Drop a UTF-8 BOM and any XML declaration / leading whitespace.
fn strip_prologue(body: &str) -> &str {
    let body = body.strip_prefix('\u{feff}').unwrap_or(body);
    body.trim_start()
}

fn parse_dialect_a(body: &str) -> Result<Vec<Segment>> {
    let mut reader = Reader::from_str(body);
    let mut segments = Vec::new();
    let mut saw_root = false;
    let mut pending: Option<(f64, f64)> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"transcript" => saw_root = true,
                b"text" if saw_root => {
                    pending = Some(read_timing(&e, b"start", b"dur")?);
                    text_buf.clear();
                }
                other => {
                    if !saw_root {
                        return Err(TranscriptError::Parsing(format!(
                            "unexpected root element <{}>",
                            String::from_utf8_lossy(other)
                        )));
                    }
                }
            },
            Ok(Event::Text(e)) => {
                if pending.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::CData(e)) => {
                if pending.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == b"text" {
                    if let Some((start, duration)) = pending.take() {
                        push_segment(&mut segments, &text_buf, start, duration);
                    }
                }
            }
            Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(TranscriptError::Parsing(format!("malformed XML: {e}"))),
        }
    }

    if !saw_root {
        return Err(TranscriptError::Parsing("no <transcript> root".into()));
    }
    Ok(segments)
}

fn parse_dialect_b(body: &str) -> Result<Vec<Segment>> {
    let mut reader = Reader::from_str(body);
    let mut segments = Vec::new();
    let mut saw_root = false;
    let mut in_body = false;
    // Timing of the open <text> or <p>, and the accumulated text. Inside a
    // <p>, <s> runs concatenate into the same paragraph segment.
    let mut pending: Option<(f64, f64)> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"timedtext" => saw_root = true,
                b"body" if saw_root => in_body = true,
                b"text" if in_body => {
                    pending = Some(read_timing(&e, b"start", b"dur")?);
                    text_buf.clear();
                }
                b"p" if in_body => {
                    pending = Some(read_timing(&e, b"t", b"d")?);
                    text_buf.clear();
                }
                b"s" if in_body => {}
                other => {
                    if !saw_root {
                        return Err(TranscriptError::Parsing(format!(
                            "unexpected root element <{}>",
                            String::from_utf8_lossy(other)
                        )));
                    }
                }
            },
            Ok(Event::Text(e)) => {
                if pending.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::CData(e)) => {
                if pending.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"text" | b"p" => {
                    if let Some((start, duration)) = pending.take() {
                        push_segment(&mut segments, &text_buf, start, duration);
                    }
                }
                b"body" => in_body = false,
                _ => {}
            },
            Ok(Event::Empty(_)) => {}
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(TranscriptError::Parsing(format!("malformed XML: {e}"))),
        }
    }

    if !saw_root {
        return Err(TranscriptError::Parsing("no <timedtext> root".into()));
    }
    Ok(segments)
}

fn read_timing(
    e: &quick_xml::events::BytesStart<'_>,
    start_attr: &[u8],
    dur_attr: &[u8],
) -> Result<(f64, f64)> {
    let mut start = 0.0;
    let mut duration = DEFAULT_DURATION_SECS;

    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| TranscriptError::Parsing(format!("bad attribute: {e}")))?;
        let value = String::from_utf8_lossy(&attr.value);
        if attr.key.as_ref() == start_attr {
            start = value.parse::<f64>().unwrap_or(0.0).max(0.0);
        } else if attr.key.as_ref() == dur_attr {
            let parsed = value.parse::<f64>().unwrap_or(0.0);
            if parsed > 0.0 {
                duration = parsed;
            }
        }
    }
    Ok((start, duration))
}

fn push_segment(segments: &mut Vec<Segment>, raw: &str, start: f64, duration: f64) {
    let text = clean_text(raw);
    if !text.is_empty() {
        segments.push(Segment::new(text, start, duration));
    }
}

/// Resolve HTML entities and normalize whitespace. Caption payloads often
/// carry double-escaped entities (`&amp;#39;`), so decoding runs twice.
pub fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    let decoded = html_escape::decode_html_entities(decoded.as_ref()).into_owned();

    let replaced = decoded.replace(['\n', '\r'], " ").replace('\u{a0}', " ");
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_a_basic() {
        let xml = r#"<transcript><text start="0" dur="2">Hello world</text><text start="2" dur="3">This is a test</text></transcript>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].duration, 2.0);
        assert_eq!(segments[1].end, 5.0);
    }

    #[test]
    fn test_dialect_a_with_prologue_and_bom() {
        let xml = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<transcript><text start=\"1.5\" dur=\"2.5\">hi</text></transcript>";
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.5);
        assert_eq!(segments[0].end, 4.0);
    }

    #[test]
    fn test_dialect_b_paragraphs() {
        let xml = r#"<timedtext><body><p t="0" d="2"><s>Hello world</s></p></body></timedtext>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hello world");
        assert_eq!(segments[0].start, 0.0);
        assert_eq!(segments[0].duration, 2.0);
        assert_eq!(segments[0].end, 2.0);
    }

    #[test]
    fn test_dialect_b_sentence_runs_concatenate() {
        let xml = r#"<timedtext><body><p t="0" d="3"><s>Hello </s><s>world</s></p></body></timedtext>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "Hello world");
    }

    #[test]
    fn test_dialect_b_direct_text_children() {
        let xml = r#"<timedtext><body><text start="0" dur="1">one</text><text start="1" dur="1">two</text></body></timedtext>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "two");
        assert_eq!(segments[1].start, 1.0);
    }

    #[test]
    fn test_missing_duration_substitutes_default() {
        let xml = r#"<transcript><text start="3">no dur</text></transcript>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments[0].duration, 2.0);
        assert_eq!(segments[0].end, 5.0);

        let xml = r#"<transcript><text start="3" dur="0">zero dur</text></transcript>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments[0].duration, 2.0);
    }

    #[test]
    fn test_entity_resolution() {
        let xml = r#"<transcript><text start="0" dur="1">Tom &amp; Jerry &lt;3 &quot;cheese&quot;</text></transcript>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments[0].text, "Tom & Jerry <3 \"cheese\"");
    }

    #[test]
    fn test_double_escaped_apostrophe() {
        let xml = r#"<transcript><text start="0" dur="1">it&amp;#39;s fine</text></transcript>"#;
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments[0].text, "it's fine");
    }

    #[test]
    fn test_whitespace_collapsed_and_empty_dropped() {
        let xml = "<transcript><text start=\"0\" dur=\"1\">  a\n\n b\tc  </text><text start=\"1\" dur=\"1\">   </text></transcript>";
        let segments = parse_transcript_xml(xml).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "a b c");
    }

    #[test]
    fn test_not_xml_at_all() {
        assert!(parse_transcript_xml("<html><body>nope</body></html>").is_err());
        assert!(parse_transcript_xml("").is_err());
        assert!(parse_transcript_xml("{\"not\": \"xml\"}").is_err());
    }

    #[test]
    fn test_clean_text_nbsp() {
        assert_eq!(clean_text("a&nbsp;b"), "a b");
    }
}
