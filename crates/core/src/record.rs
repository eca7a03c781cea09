//! Harvested exam records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::partition::CandidateKey;

/// Exam subjects, in storage column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Math,
    Literature,
    ForeignLanguage,
    Physics,
    Chemistry,
    Biology,
    History,
    Geography,
    CivicEducation,
    EconomicsLaw,
    ComputerScience,
    IndustrialTechnology,
    AgriculturalTechnology,
}

impl Subject {
    pub const ALL: [Subject; 13] = [
        Subject::Math,
        Subject::Literature,
        Subject::ForeignLanguage,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::History,
        Subject::Geography,
        Subject::CivicEducation,
        Subject::EconomicsLaw,
        Subject::ComputerScience,
        Subject::IndustrialTechnology,
        Subject::AgriculturalTechnology,
    ];

    /// Storage column name.
    pub fn column(&self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Literature => "literature",
            Subject::ForeignLanguage => "foreign_language",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::CivicEducation => "civic_education",
            Subject::EconomicsLaw => "economics_law",
            Subject::ComputerScience => "computer_science",
            Subject::IndustrialTechnology => "industrial_technology",
            Subject::AgriculturalTechnology => "agricultural_technology",
        }
    }

    /// Field name in the JSON API payload.
    pub fn api_field(&self) -> &'static str {
        match self {
            Subject::Math => "TOAN",
            Subject::Literature => "VAN",
            Subject::ForeignLanguage => "NGOAI_NGU",
            Subject::Physics => "LI",
            Subject::Chemistry => "HOA",
            Subject::Biology => "SINH",
            Subject::History => "SU",
            Subject::Geography => "DIA",
            Subject::CivicEducation => "GIAO_DUC_CONG_DAN",
            Subject::EconomicsLaw => "GDKT_PL",
            Subject::ComputerScience => "TIN_HOC",
            Subject::IndustrialTechnology => "CN_CONG_NGHIEP",
            Subject::AgriculturalTechnology => "CN_NONG_NGHIEP",
        }
    }

    /// Match a subject label from the HTML result page.
    pub fn from_page_label(label: &str) -> Option<Subject> {
        let subject = match label.trim() {
            "Toán" => Subject::Math,
            "Văn" | "Ngữ văn" => Subject::Literature,
            "Ngoại ngữ" => Subject::ForeignLanguage,
            "Vật lý" | "Vật lí" => Subject::Physics,
            "Hóa học" => Subject::Chemistry,
            "Sinh học" => Subject::Biology,
            "Lịch sử" => Subject::History,
            "Địa lý" | "Địa lí" => Subject::Geography,
            "Giáo dục công dân" => Subject::CivicEducation,
            "Kinh tế pháp luật" | "Giáo dục kinh tế và pháp luật" => Subject::EconomicsLaw,
            "Tin học" => Subject::ComputerScience,
            "Công nghệ công nghiệp" => Subject::IndustrialTechnology,
            "Công nghệ nông nghiệp" => Subject::AgriculturalTechnology,
            _ => return None,
        };
        Some(subject)
    }
}

/// One candidate's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub registration_number: String,
    pub council_code: String,
    /// Scores kept as the upstream decimal text ("7.75").
    pub scores: BTreeMap<Subject, String>,
    /// Sum of all subject scores, two decimals.
    pub total_score: String,
    pub captured_at: DateTime<Utc>,
}

impl Record {
    /// Build a record for `key`. The council code is taken from the key so
    /// the two can never disagree.
    pub fn new(
        key: &CandidateKey,
        scores: BTreeMap<Subject, String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let total_score = total_of(scores.values().map(String::as_str));
        Self {
            registration_number: key.to_string(),
            council_code: key.partition().to_string(),
            scores,
            total_score,
            captured_at,
        }
    }

    pub fn score(&self, subject: Subject) -> Option<&str> {
        self.scores.get(&subject).map(String::as_str)
    }
}

/// Parse a non-negative decimal score into thousandths.
pub fn parse_score(text: &str) -> Option<u64> {
    let text = text.trim();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if int_part.is_empty() || frac_part.len() > 3 {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: u64 = int_part.parse().ok()?;
    let mut frac: u64 = 0;
    for (i, digit) in frac_part.bytes().enumerate() {
        frac += u64::from(digit - b'0') * 10u64.pow(2 - i as u32);
    }
    whole.checked_mul(1000)?.checked_add(frac)
}

fn total_of<'a>(scores: impl Iterator<Item = &'a str>) -> String {
    let thousandths = scores
        .filter_map(parse_score)
        .fold(0u64, u64::saturating_add);
    let whole = thousandths / 1000;
    let frac = thousandths % 1000;
    if frac % 10 == 0 {
        format!("{}.{:02}", whole, frac / 10)
    } else {
        format!("{}.{:03}", whole, frac)
    }
}
