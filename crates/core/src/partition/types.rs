use serde::{Deserialize, Serialize};
use std::fmt;

use super::KeyError;

/// Number of exam councils.
pub const PARTITION_COUNT: usize = 65;

/// Two-digit council code.
///
/// Always compared and stored as a string so leading zeros survive
/// serialization ("01" never turns into 1).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionCode(String);

impl PartitionCode {
    /// Validate and wrap a council code ("01"..="65").
    pub fn new(code: &str) -> Result<Self, KeyError> {
        if code.len() != 2 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyError::InvalidPartition(code.to_string()));
        }
        if code < "01" || code > "65" {
            return Err(KeyError::InvalidPartition(code.to_string()));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human readable council name.
    pub fn display_name(&self) -> &'static str {
        display_name(&self.0)
    }
}

impl fmt::Display for PartitionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PartitionCode {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<PartitionCode> for String {
    fn from(code: PartitionCode) -> Self {
        code.0
    }
}

/// All 65 council codes in scan order.
pub fn all_partitions() -> Vec<PartitionCode> {
    (1..=PARTITION_COUNT)
        .map(|n| PartitionCode(format!("{:02}", n)))
        .collect()
}

/// Council names keyed by code.
const COUNCIL_NAMES: &[(&str, &str)] = &[
    ("01", "Hà Nội"),
    ("02", "TP. Hồ Chí Minh"),
    ("03", "Hải Phòng"),
    ("04", "Đà Nẵng"),
    ("05", "Hà Giang"),
    ("06", "Cao Bằng"),
    ("07", "Lai Châu"),
    ("08", "Lào Cai"),
    ("09", "Tuyên Quang"),
    ("10", "Lạng Sơn"),
    ("11", "Bắc Kạn"),
    ("12", "Thái Nguyên"),
    ("13", "Yên Bái"),
    ("14", "Sơn La"),
    ("15", "Phú Thọ"),
    ("16", "Vĩnh Phúc"),
    ("17", "Quảng Ninh"),
    ("18", "Bắc Giang"),
    ("19", "Bắc Ninh"),
    ("21", "Hải Dương"),
    ("22", "Hưng Yên"),
    ("23", "Hòa Bình"),
    ("24", "Hà Nam"),
    ("25", "Nam Định"),
    ("26", "Thái Bình"),
    ("27", "Ninh Bình"),
    ("28", "Thanh Hóa"),
    ("29", "Nghệ An"),
    ("30", "Hà Tĩnh"),
    ("31", "Quảng Bình"),
    ("32", "Quảng Trị"),
    ("33", "Thừa Thiên Huế"),
    ("34", "Quảng Nam"),
    ("35", "Quảng Ngãi"),
    ("36", "Kon Tum"),
    ("37", "Bình Định"),
    ("38", "Gia Lai"),
    ("39", "Phú Yên"),
    ("40", "Đắk Lắk"),
    ("41", "Khánh Hòa"),
    ("42", "Lâm Đồng"),
    ("43", "Bình Phước"),
    ("44", "Bình Dương"),
    ("45", "Ninh Thuận"),
    ("46", "Tây Ninh"),
    ("47", "Bình Thuận"),
    ("48", "Đồng Nai"),
    ("49", "Long An"),
    ("50", "Đồng Tháp"),
    ("51", "An Giang"),
    ("52", "Bà Rịa - Vũng Tàu"),
    ("53", "Tiền Giang"),
    ("54", "Kiên Giang"),
    ("55", "Cần Thơ"),
    ("56", "Bến Tre"),
    ("57", "Vĩnh Long"),
    ("58", "Trà Vinh"),
    ("59", "Sóc Trăng"),
    ("60", "Bạc Liêu"),
    ("61", "Cà Mau"),
    ("62", "Điện Biên"),
    ("63", "Đắk Nông"),
    ("64", "Hậu Giang"),
    ("65", "Cục Nhà trường - Bộ Quốc phòng"),
];

/// Name for a council code; codes without an assigned council get a generic label.
pub fn display_name(code: &str) -> &'static str {
    COUNCIL_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
        .unwrap_or("Unassigned council")
}
