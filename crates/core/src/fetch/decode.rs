//! Response decoders for both upstream formats.
//!
//! Decoders are pure: they take the body text and the requested key and
//! return `Ok(Some(record))` for a candidate, `Ok(None)` for a definitive
//! miss and `Err` when the body cannot be understood at all.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::partition::CandidateKey;
use crate::record::{parse_score, Record, Subject};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    data: Option<Vec<Value>>,
}

/// Decode the JSON score API body.
pub fn decode_api_response(
    body: &str,
    key: &CandidateKey,
    captured_at: DateTime<Utc>,
) -> Result<Option<Record>, DecodeError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    if !response.success || response.total == 0 {
        return Ok(None);
    }
    let Some(first) = response.data.as_ref().and_then(|d| d.first()) else {
        return Ok(None);
    };
    let row = first
        .as_object()
        .ok_or_else(|| DecodeError::Shape("data[0] is not an object".to_string()))?;

    let expected = key.to_string();
    match row.get("SBD").and_then(text_of) {
        Some(sbd) if sbd == expected => {}
        _ => return Ok(None),
    }

    let scores = api_scores(row);
    if scores.is_empty() {
        return Ok(None);
    }
    Ok(Some(Record::new(key, scores, captured_at)))
}

fn api_scores(row: &Map<String, Value>) -> BTreeMap<Subject, String> {
    let mut scores = BTreeMap::new();
    for subject in Subject::ALL {
        let Some(text) = row.get(subject.api_field()).and_then(text_of) else {
            continue;
        };
        // -1 marks a subject the candidate did not sit
        if parse_score(&text).is_some() {
            scores.insert(subject, text);
        }
    }
    scores
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

static USER_INFO: Lazy<Selector> = Lazy::new(|| selector(".user-infor"));
static SBD: Lazy<Selector> = Lazy::new(|| selector(".user-sbd .sbd"));
static MAJORS_TABLE: Lazy<Selector> = Lazy::new(|| selector(".list-majors-table"));
static ROW: Lazy<Selector> = Lazy::new(|| selector("tbody tr"));
static CELL: Lazy<Selector> = Lazy::new(|| selector("td"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Decode the HTML result page.
///
/// The page is parsed as a full HTML document, so tag case, attribute
/// quoting and implied `<tbody>` elements do not affect the result.
pub fn decode_result_page(
    html: &str,
    key: &CandidateKey,
    captured_at: DateTime<Utc>,
) -> Result<Option<Record>, DecodeError> {
    let document = Html::parse_document(html);
    if document.select(&USER_INFO).next().is_none() {
        return Ok(None);
    }

    if let Some(shown) = document.select(&SBD).next() {
        if element_text(shown) != key.to_string() {
            return Ok(None);
        }
    }

    let Some(table) = document.select(&MAJORS_TABLE).next() else {
        return Err(DecodeError::Shape(
            "result section without score table".to_string(),
        ));
    };

    let mut scores = BTreeMap::new();
    for row in table.select(&ROW) {
        let cells: Vec<String> = row.select(&CELL).map(element_text).collect();
        if cells.len() < 2 {
            continue;
        }
        let Some(subject) = Subject::from_page_label(&cells[0]) else {
            continue;
        };
        if parse_score(&cells[1]).is_some() {
            scores.insert(subject, cells[1].clone());
        }
    }

    if scores.is_empty() {
        return Ok(None);
    }
    Ok(Some(Record::new(key, scores, captured_at)))
}

fn element_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.replace('\u{a0}', " ").trim().to_string()
}
