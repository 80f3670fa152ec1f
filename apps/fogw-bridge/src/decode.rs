//! Gateway payload decoding.
//!
//! The live-data endpoint answers with JSON. Newer firmware groups readings into sections:
//!
//! ```json
//! {
//!   "common_list": [{"id": "0x02", "val": "23.5", "unit": "C"}, {"id": "0x07", "val": "61%"}],
//!   "rain": [{"id": "0x0E", "val": "0.0 mm/Hr"}],
//!   "wh25": [{"intemp": "21.9", "unit": "C", "inhumi": "48%", "abs": "1003.2 hPa"}]
//! }
//! ```
//!
//! while register-style firmware reports a flat object such as `{"outtemp": 235}`.
//! Both shapes (and mixes of them) flatten into one ordered list of [`RawField`]s.

use crate::error::DecodeError;
use serde_json::{Map, Value as JsonValue};

#[derive(Debug, Clone, PartialEq)]
pub struct RawField {
    pub id: String,
    pub value: f64,
    /// Unit token printed by the gateway, e.g. `km/h`.
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPayload {
    pub fields: Vec<RawField>,
    /// Ids whose value could not be read as a number.
    pub malformed: Vec<String>,
    /// Ids the gateway reported with a "no reading" placeholder such as `--`.
    pub placeholders: Vec<String>,
}

impl DecodedPayload {
    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.id.as_str())
    }
}

pub fn decode(payload: &[u8]) -> Result<DecodedPayload, DecodeError> {
    let root: JsonValue = serde_json::from_slice(payload)?;
    let JsonValue::Object(root) = root else {
        return Err(DecodeError::NotAnObject(json_kind(&root)));
    };

    let mut out = DecodedPayload::default();
    for (key, value) in &root {
        match value {
            JsonValue::Array(entries) => {
                for entry in entries {
                    if let JsonValue::Object(entry) = entry {
                        decode_section_entry(entry, &mut out);
                    }
                }
            }
            JsonValue::Object(entry) => decode_keyed_object(entry, &mut out),
            scalar => push_value(&mut out, key, scalar, None),
        }
    }
    Ok(out)
}

fn decode_section_entry(entry: &Map<String, JsonValue>, out: &mut DecodedPayload) {
    let Some(id) = entry.get("id").and_then(id_string) else {
        if entry.contains_key("val") {
            tracing::debug!("skipping live-data entry without an id");
        } else {
            decode_keyed_object(entry, out);
        }
        return;
    };
    let unit = entry.get("unit").and_then(JsonValue::as_str);
    match entry.get("val").or_else(|| entry.get("value")) {
        Some(value) => push_value(out, &id, value, unit),
        None => out.placeholders.push(id),
    }
}

fn decode_keyed_object(entry: &Map<String, JsonValue>, out: &mut DecodedPayload) {
    let shared_unit = entry.get("unit").and_then(JsonValue::as_str);
    for (key, value) in entry {
        if key == "unit" || value.is_array() || value.is_object() {
            continue;
        }
        push_value(out, key, value, shared_unit);
    }
}

fn push_value(out: &mut DecodedPayload, id: &str, value: &JsonValue, unit: Option<&str>) {
    let id = id.trim();
    if id.is_empty() {
        return;
    }
    match parse_value(value) {
        ParsedValue::Number(number, inline_unit) => out.fields.push(RawField {
            id: id.to_string(),
            value: number,
            unit: inline_unit
                .or(unit)
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
        }),
        ParsedValue::Placeholder => out.placeholders.push(id.to_string()),
        ParsedValue::Malformed => {
            tracing::debug!(field = id, value = %value, "dropping unparsable gateway field");
            out.malformed.push(id.to_string());
        }
    }
}

enum ParsedValue<'a> {
    Number(f64, Option<&'a str>),
    Placeholder,
    Malformed,
}

fn parse_value(value: &JsonValue) -> ParsedValue<'_> {
    match value {
        JsonValue::Number(number) => match number.as_f64() {
            Some(number) if number.is_finite() => ParsedValue::Number(number, None),
            _ => ParsedValue::Malformed,
        },
        JsonValue::String(text) => parse_text(text),
        JsonValue::Null => ParsedValue::Placeholder,
        _ => ParsedValue::Malformed,
    }
}

/// Splits `"5.4 km/h"` into `5.4` and `km/h`.
fn parse_text(text: &str) -> ParsedValue<'_> {
    let trimmed = text.trim();
    if is_placeholder(trimmed) {
        return ParsedValue::Placeholder;
    }

    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut digits = 0;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => digits += 1,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if digits == 0 {
        return ParsedValue::Malformed;
    }

    let (number, rest) = trimmed.split_at(end);
    match number.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            let rest = rest.trim();
            ParsedValue::Number(value, (!rest.is_empty()).then_some(rest))
        }
        _ => ParsedValue::Malformed,
    }
}

/// `--`, `---.-` and the same with a unit attached (`--.- C`, `--%`).
fn is_placeholder(text: &str) -> bool {
    let marker_len = text
        .find(|ch: char| ch != '-' && ch != '.')
        .unwrap_or(text.len());
    if marker_len == text.len() {
        return true;
    }
    marker_len > 0 && !text[marker_len..].starts_with(|ch: char| ch.is_ascii_digit())
}

fn id_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(text) => Some(text.trim().to_string()),
        JsonValue::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::LIVEDATA_GW2000;

    fn field<'a>(decoded: &'a DecodedPayload, id: &str) -> Option<&'a RawField> {
        decoded.fields.iter().find(|field| field.id == id)
    }

    #[test]
    fn flattens_sectioned_livedata_in_payload_order() {
        let decoded = decode(LIVEDATA_GW2000.as_bytes()).expect("decode");
        let ids: Vec<&str> = decoded.field_ids().collect();
        assert_eq!(&ids[..3], &["0x02", "0x07", "3"]);
        assert!(ids.contains(&"0x13"));
        assert!(ids.contains(&"abs"));
        assert!(decoded.malformed.is_empty());

        let temp = field(&decoded, "0x02").expect("outdoor temp");
        assert_eq!(temp.value, 23.5);
        assert_eq!(temp.unit.as_deref(), Some("C"));

        let wind = field(&decoded, "0x0B").expect("wind speed");
        assert_eq!(wind.value, 7.2);
        assert_eq!(wind.unit.as_deref(), Some("km/h"));

        let humidity = field(&decoded, "inhumi").expect("indoor humidity");
        assert_eq!(humidity.value, 48.0);
        assert_eq!(humidity.unit.as_deref(), Some("%"));

        // The section-level unit only applies when the value has none of its own.
        let pressure = field(&decoded, "abs").expect("absolute pressure");
        assert_eq!(pressure.unit.as_deref(), Some("hPa"));
        let indoor = field(&decoded, "intemp").expect("indoor temp");
        assert_eq!(indoor.unit.as_deref(), Some("C"));
    }

    #[test]
    fn reads_flat_register_style_objects() {
        let decoded = decode(br#"{"outtemp": 235, "outhumi": "61", "model": "GW1000"}"#)
            .expect("decode");
        assert_eq!(
            decoded.fields,
            vec![
                RawField {
                    id: "outtemp".to_string(),
                    value: 235.0,
                    unit: None
                },
                RawField {
                    id: "outhumi".to_string(),
                    value: 61.0,
                    unit: None
                },
            ]
        );
        assert_eq!(decoded.malformed, vec!["model".to_string()]);
    }

    #[test]
    fn drops_single_bad_fields_without_failing() {
        let payload = br#"{"common_list": [
            {"id": "0x02", "val": "warm"},
            {"id": "0x07", "val": "--"},
            {"id": "0x0A", "val": "---.-"},
            {"id": "0x0B", "val": "3.6 km/h"},
            {"id": "0x15"},
            {"val": "12"}
        ]}"#;
        let decoded = decode(payload).expect("decode");
        assert_eq!(decoded.field_ids().collect::<Vec<_>>(), vec!["0x0B"]);
        assert_eq!(decoded.malformed, vec!["0x02".to_string()]);
        assert_eq!(
            decoded.placeholders,
            vec!["0x07".to_string(), "0x0A".to_string(), "0x15".to_string()]
        );
    }

    #[test]
    fn placeholders_with_units_are_not_malformed() {
        let payload = br#"{"common_list": [
            {"id": "0x02", "val": "--.- C"},
            {"id": "0x07", "val": "--%"},
            {"id": "0x0B", "val": "---.- km/h"},
            {"id": "0x03", "val": "-.5 C"}
        ]}"#;
        let decoded = decode(payload).expect("decode");
        assert!(decoded.malformed.is_empty());
        assert_eq!(
            decoded.placeholders,
            vec!["0x02".to_string(), "0x07".to_string(), "0x0B".to_string()]
        );
        assert_eq!(decoded.fields[0].value, -0.5);
        assert_eq!(decoded.fields[0].unit.as_deref(), Some("C"));
    }

    #[test]
    fn negative_and_signed_values_keep_their_sign() {
        let decoded = decode(br#"{"a": "-12.5 C", "b": "+3", "c": -1000}"#).expect("decode");
        let values: Vec<f64> = decoded.fields.iter().map(|field| field.value).collect();
        assert_eq!(values, vec![-12.5, 3.0, -1000.0]);
        assert_eq!(decoded.fields[0].unit.as_deref(), Some("C"));
    }

    #[test]
    fn syntax_errors_fail_the_whole_payload() {
        assert!(matches!(
            decode(b"{\"common_list\": [").unwrap_err(),
            DecodeError::Syntax(_)
        ));
        assert!(matches!(decode(b"").unwrap_err(), DecodeError::Syntax(_)));
        assert!(matches!(
            decode(b"[1, 2]").unwrap_err(),
            DecodeError::NotAnObject("an array")
        ));
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let decoded = decode(br#"{"common_list": [{"id": 3, "val": "22.0"}]}"#).expect("decode");
        assert_eq!(decoded.fields[0].id, "3");
    }
}
