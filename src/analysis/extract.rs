//! Best-effort recovery of verdict fields from free-form model output.
//!
//! The algorithm is deterministic:
//!
//! 1. For every `{` in the text, find its matching `}` with a brace-depth
//!    scanner that skips over JSON string literals (and their escapes).
//! 2. Keep the candidates that parse as a JSON object and pick the longest;
//!    the earliest wins a tie. Scanning resumes after each parsed object, so
//!    nested objects never compete with their parent.
//! 3. If that object carries any verdict field, read fields from it leniently
//!    (string confidences, key points given as bare strings, `source_ids`
//!    instead of `citation`, ...). Otherwise the answer was most likely cut
//!    off, and only complete `{"statement": ...}` objects are kept as key points.
//! 4. Whatever `verdict` or `confidence` is still missing is pattern-matched
//!    directly in the text. A number must be followed by a delimiter, so a
//!    response truncated mid-number yields no confidence rather than a wrong one.

use crate::models::{clamp_confidence, EvidenceDriver, KeyPoint, Verdict};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)verdict["']?\s*[:=]?\s*["']?(strong|moderate|weak|no[ _-]evidence|inconclusive)\b"#)
        .expect("valid regex")
});

static CONFIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)confidence["']?\s*[:=]\s*["']?(\d+(?:\.\d+)?)(%?)["']?\s*[,}\]\n]"#).expect("valid regex")
});

/// Fields recovered from a malformed response. `None` means not recoverable.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Recovered {
    pub verdict: Option<Verdict>,
    pub confidence: Option<f64>,
    pub key_points: Vec<KeyPoint>,
    pub drivers: BTreeMap<String, EvidenceDriver>,
    pub recommended_next_steps: Vec<String>,
}

/// Byte index of the `}` that closes the `{` at `start`.
fn matching_brace(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in text.bytes().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Every well-formed JSON object in `text`, outermost only, with its length.
fn json_objects(text: &str) -> Vec<(usize, Map<String, Value>)> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        let parsed = matching_brace(text, start).and_then(|end| {
            match serde_json::from_str::<Value>(&text[start..=end]) {
                Ok(Value::Object(map)) => Some((end, map)),
                _ => None,
            }
        });

        match parsed {
            Some((end, map)) => {
                found.push((end + 1 - start, map));
                cursor = end + 1;
            }
            None => cursor = start + 1,
        }
    }
    found
}

/// The longest substring of `text` that is a well-formed JSON object.
pub fn largest_json_object(text: &str) -> Option<Map<String, Value>> {
    let mut best: Option<(usize, Map<String, Value>)> = None;
    for (len, map) in json_objects(text) {
        if best.as_ref().map(|(l, _)| len > *l).unwrap_or(true) {
            best = Some((len, map));
        }
    }
    best.map(|(_, map)| map)
}

const VERDICT_FIELDS: [&str; 5] = ["verdict", "confidence", "key_points", "drivers", "recommended_next_steps"];

fn has_verdict_fields(map: &Map<String, Value>) -> bool {
    VERDICT_FIELDS.iter().any(|k| map.contains_key(*k))
}

/// Complete key-point objects left behind when the enclosing answer was cut off.
fn stray_key_points(text: &str) -> Vec<KeyPoint> {
    json_objects(text)
        .into_iter()
        .filter(|(_, map)| map.contains_key("statement"))
        .filter_map(|(_, map)| lenient_key_point(&Value::Object(map)))
        .collect()
}

fn lenient_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
                None => s.parse().ok(),
            }
        }
        _ => None,
    }
    .map(clamp_confidence)
}

fn joined_strings(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn lenient_key_point(item: &Value) -> Option<KeyPoint> {
    match item {
        Value::String(s) if !s.trim().is_empty() => Some(KeyPoint {
            statement: s.trim().to_string(),
            citation: None,
        }),
        Value::Object(map) => {
            let statement = ["statement", "point", "text"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))?
                .trim()
                .to_string();
            let citation = ["citation", "source_ids", "sources", "source"]
                .iter()
                .find_map(|k| map.get(*k).and_then(joined_strings));
            Some(KeyPoint { statement, citation })
        }
        _ => None,
    }
}

fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn lenient_driver(value: &Value) -> Option<EvidenceDriver> {
    match value {
        Value::Object(map) => Some(EvidenceDriver {
            present: map.get("present").and_then(lenient_bool).unwrap_or(false),
            summary: map
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        other => lenient_bool(other).map(|present| EvidenceDriver {
            present,
            summary: String::new(),
        }),
    }
}

/// Read whatever verdict fields an object carries.
pub fn recover_from_object(map: &Map<String, Value>) -> Recovered {
    let key_points = map
        .get("key_points")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(lenient_key_point).collect())
        .unwrap_or_default();

    let drivers = map
        .get("drivers")
        .and_then(Value::as_object)
        .map(|drivers| {
            drivers
                .iter()
                .filter_map(|(name, v)| lenient_driver(v).map(|d| (name.clone(), d)))
                .collect()
        })
        .unwrap_or_default();

    let recommended_next_steps = map
        .get("recommended_next_steps")
        .and_then(Value::as_array)
        .map(|steps| steps.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    Recovered {
        verdict: map
            .get("verdict")
            .and_then(Value::as_str)
            .and_then(Verdict::parse_lenient),
        confidence: map.get("confidence").and_then(lenient_confidence),
        key_points,
        drivers,
        recommended_next_steps,
    }
}

/// Pattern-match verdict and confidence in text that holds no JSON object.
pub fn recover_from_text(text: &str) -> Recovered {
    let verdict = VERDICT_RE
        .captures(text)
        .and_then(|c| Verdict::parse_lenient(&c[1]));
    let confidence = CONFIDENCE_RE.captures(text).and_then(|c| {
        let value: f64 = c[1].parse().ok()?;
        let value = if &c[2] == "%" { value / 100.0 } else { value };
        Some(clamp_confidence(value))
    });

    Recovered {
        verdict,
        confidence,
        ..Recovered::default()
    }
}

/// Run the whole recovery algorithm over raw model output.
pub fn recover(text: &str) -> Recovered {
    let mut recovered = match largest_json_object(text) {
        Some(map) if has_verdict_fields(&map) => recover_from_object(&map),
        _ => Recovered {
            key_points: stray_key_points(text),
            ..Recovered::default()
        },
    };

    if recovered.verdict.is_none() || recovered.confidence.is_none() {
        let scanned = recover_from_text(text);
        recovered.verdict = recovered.verdict.or(scanned.verdict);
        recovered.confidence = recovered.confidence.or(scanned.confidence);
    }
    recovered
}
