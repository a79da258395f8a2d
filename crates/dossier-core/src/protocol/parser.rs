//! Lenient parsing of server frames.
//!
//! The server is a black box, so nothing here trusts the payload shape:
//! optional fields may be missing, `output` may be a string or any JSON
//! value, and source/image entries may be bare URLs or objects.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{CompletedPayload, EventKind, ServerEvent};
use crate::error::ParseError;
use crate::session::{Image, Source};

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    timestamp: Value,
    #[serde(default)]
    report: Value,
    #[serde(default)]
    sources: Option<Vec<Value>>,
    #[serde(default)]
    images: Option<Vec<Value>>,
    #[serde(default)]
    costs: Value,
}

#[derive(Debug, Deserialize)]
struct SourceObject {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse one text frame into a [`ServerEvent`].
pub fn parse_frame(text: &str) -> Result<ServerEvent, ParseError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let kind: EventKind = raw.kind.parse().map_err(ParseError::UnknownType)?;

    let completed = (kind == EventKind::Completed).then(|| CompletedPayload {
        report: match raw.report {
            Value::String(s) => Some(s),
            _ => None,
        },
        sources: raw
            .sources
            .map(|entries| entries.iter().filter_map(source_from_value).collect()),
        images: raw
            .images
            .map(|entries| entries.iter().filter_map(image_from_value).collect()),
        costs: raw.costs.as_f64(),
    });

    Ok(ServerEvent {
        kind,
        output: output_text(raw.output),
        timestamp: parse_timestamp(&raw.timestamp).unwrap_or_else(Utc::now),
        completed,
    })
}

/// Decode a `source` payload: a JSON object with `url`/`title`, or a bare URL.
pub fn decode_source(raw: &str) -> Source {
    match serde_json::from_str::<SourceObject>(raw) {
        Ok(obj) => Source {
            url: obj.url.filter(|u| !u.is_empty()).unwrap_or_else(|| raw.to_string()),
            title: obj.title,
        },
        Err(_) => Source::from_url(raw),
    }
}

/// Decode an `image` payload: a JSON object with `url`/`description`, or a bare URL.
pub fn decode_image(raw: &str) -> Image {
    match serde_json::from_str::<ImageObject>(raw) {
        Ok(obj) => Image {
            url: obj.url.filter(|u| !u.is_empty()).unwrap_or_else(|| raw.to_string()),
            description: obj.description,
        },
        Err(_) => Image::from_url(raw),
    }
}

fn output_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        // Numeric timestamps are epoch milliseconds.
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

fn source_from_value(value: &Value) -> Option<Source> {
    match value {
        Value::String(url) if !url.is_empty() => Some(Source::from_url(url.clone())),
        Value::Object(map) => {
            let url = map.get("url")?.as_str()?.to_string();
            let title = map.get("title").and_then(Value::as_str).map(str::to_string);
            Some(Source { url, title })
        }
        _ => None,
    }
}

fn image_from_value(value: &Value) -> Option<Image> {
    match value {
        Value::String(url) if !url.is_empty() => Some(Image::from_url(url.clone())),
        Value::Object(map) => {
            let url = map.get("url")?.as_str()?.to_string();
            let description = map
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            Some(Image { url, description })
        }
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod frames {
        use super::*;

        #[test]
        fn parses_progress_frame() {
            let event = parse_frame(r#"{"type":"search","output":"Searching..."}"#).unwrap();
            assert_eq!(event.kind, EventKind::Search);
            assert_eq!(event.output.as_deref(), Some("Searching..."));
            assert!(event.completed.is_none());
        }

        #[test]
        fn rejects_invalid_json() {
            assert!(matches!(parse_frame("{not json"), Err(ParseError::Json(_))));
        }

        #[test]
        fn rejects_missing_type() {
            assert!(matches!(
                parse_frame(r#"{"output":"x"}"#),
                Err(ParseError::Json(_))
            ));
        }

        #[test]
        fn rejects_unknown_type() {
            match parse_frame(r#"{"type":"telemetry","output":"x"}"#) {
                Err(ParseError::UnknownType(t)) => assert_eq!(t, "telemetry"),
                other => panic!("Expected UnknownType, got {other:?}"),
            }
        }

        #[test]
        fn non_string_output_is_rendered_as_json() {
            let event = parse_frame(r#"{"type":"source","output":{"url":"https://a.com"}}"#).unwrap();
            assert_eq!(event.output.as_deref(), Some(r#"{"url":"https://a.com"}"#));
        }

        #[test]
        fn null_output_is_none() {
            let event = parse_frame(r#"{"type":"plan","output":null}"#).unwrap();
            assert!(event.output.is_none());
        }

        #[test]
        fn parses_rfc3339_and_millis_timestamps() {
            let a = parse_frame(r#"{"type":"plan","timestamp":"2025-03-01T10:00:00Z"}"#).unwrap();
            assert_eq!(a.timestamp.to_rfc3339(), "2025-03-01T10:00:00+00:00");

            let b = parse_frame(r#"{"type":"plan","timestamp":1740823200000}"#).unwrap();
            assert_eq!(b.timestamp.to_rfc3339(), "2025-03-01T10:00:00+00:00");
        }
    }

    mod completed {
        use super::*;

        #[test]
        fn parses_full_payload() {
            let event = parse_frame(
                r#"{"type":"completed","output":"done","report":"R","sources":["u1",{"url":"u2","title":"Two"}],"images":["i1"],"costs":0.12}"#,
            )
            .unwrap();

            let payload = event.completed.unwrap();
            assert_eq!(payload.report.as_deref(), Some("R"));
            assert_eq!(
                payload.sources.unwrap(),
                vec![
                    Source::from_url("u1"),
                    Source {
                        url: "u2".to_string(),
                        title: Some("Two".to_string())
                    }
                ]
            );
            assert_eq!(payload.images.unwrap(), vec![Image::from_url("i1")]);
            assert_eq!(payload.costs, Some(0.12));
        }

        #[test]
        fn missing_fields_stay_none() {
            let event = parse_frame(r#"{"type":"completed"}"#).unwrap();
            let payload = event.completed.unwrap();
            assert_eq!(payload, CompletedPayload::default());
        }

        #[test]
        fn malformed_entries_are_skipped() {
            let event = parse_frame(r#"{"type":"completed","sources":[42,{"title":"no url"},"ok"]}"#).unwrap();
            assert_eq!(
                event.completed.unwrap().sources.unwrap(),
                vec![Source::from_url("ok")]
            );
        }
    }

    mod payloads {
        use super::*;

        #[test]
        fn source_object_is_decoded() {
            let source = decode_source(r#"{"url":"https://a.com","title":"A"}"#);
            assert_eq!(source.url, "https://a.com");
            assert_eq!(source.title.as_deref(), Some("A"));
        }

        #[test]
        fn bare_source_url_falls_back() {
            let source = decode_source("https://b.com/page");
            assert_eq!(source, Source::from_url("https://b.com/page"));
        }

        #[test]
        fn source_object_without_url_uses_raw_payload() {
            let raw = r#"{"title":"orphan"}"#;
            let source = decode_source(raw);
            assert_eq!(source.url, raw);
            assert_eq!(source.title.as_deref(), Some("orphan"));
        }

        #[test]
        fn image_object_is_decoded() {
            let image = decode_image(r#"{"url":"https://img/1.png","description":"chart"}"#);
            assert_eq!(image.url, "https://img/1.png");
            assert_eq!(image.description.as_deref(), Some("chart"));
        }

        #[test]
        fn bare_image_url_falls_back() {
            assert_eq!(decode_image("https://img/2.png"), Image::from_url("https://img/2.png"));
        }
    }
}
