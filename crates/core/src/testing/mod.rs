//! Testing utilities and mock implementations.
//!
//! Provides a scriptable fetch client and payload fixtures so harvests can be
//! exercised end to end without the upstream source.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvester_core::testing::{MockFetchClient, MockResponse};
//!
//! let client = MockFetchClient::new();
//! client.set_pattern("01", "FNFNNNFN");
//! client.script("02000001", &[MockResponse::Transient, MockResponse::Found]);
//! ```

mod mock_fetch_client;

pub use mock_fetch_client::{MockFetchClient, MockResponse};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};

    use crate::orchestrator::HarvestOptions;
    use crate::partition::{CandidateKey, PartitionCode};
    use crate::record::{Record, Subject};

    /// Record for `key` with math 8.25, literature 7.5 and foreign language 9.2.
    ///
    /// Panics on an invalid key.
    pub fn record(key: &str) -> Record {
        let key: CandidateKey = key.parse().expect("fixture key");
        let mut scores = BTreeMap::new();
        scores.insert(Subject::Math, "8.25".to_string());
        scores.insert(Subject::Literature, "7.5".to_string());
        scores.insert(Subject::ForeignLanguage, "9.2".to_string());
        let captured_at = Utc
            .with_ymd_and_hms(2025, 7, 16, 8, 0, 0)
            .single()
            .expect("fixture timestamp");
        Record::new(&key, scores, captured_at)
    }

    /// JSON API body for a found candidate; physics is -1 (not taken).
    pub fn api_found_body(sbd: &str) -> String {
        format!(
            r#"{{"success":true,"total":1,"data":[{{"Id":1,"SBD":"{}","TOAN":8.25,"VAN":7.5,"NGOAI_NGU":9.2,"LI":-1,"HOA":-1,"SINH":-1,"SU":-1,"DIA":-1,"GDKT_PL":-1,"TIN_HOC":-1,"TONGDIEM":24.95}}]}}"#,
            sbd
        )
    }

    /// JSON API body for an unknown registration number.
    pub fn api_not_found_body() -> String {
        r#"{"success":true,"total":0,"data":[]}"#.to_string()
    }

    /// Result page HTML for a found candidate.
    pub fn result_page_html(sbd: &str) -> String {
        format!(
            r#"<html><body>
<div class="user-infor">
  <div class="user-sbd">Số báo danh: <span class="sbd">{}</span></div>
  <table class="list-majors-table">
    <thead><tr><th>Môn</th><th>Điểm</th></tr></thead>
    <tbody>
      <tr><td>Toán</td><td>8.4</td></tr>
      <tr><td><span>Văn</span></td><td>7.25</td></tr>
      <tr><td>Ngoại ngữ</td><td> 9.6 </td></tr>
      <tr><td>Tổng điểm</td><td>25.25</td></tr>
    </tbody>
  </table>
</div>
</body></html>"#,
            sbd
        )
    }

    pub fn partition(code: &str) -> PartitionCode {
        PartitionCode::new(code).expect("fixture partition")
    }

    /// Small, fast options restricted to `partitions`.
    pub fn options(partitions: &[&str]) -> HarvestOptions {
        HarvestOptions {
            concurrency: 2,
            batch_size: 4,
            failure_threshold: 3,
            flush_every: 100,
            per_fetch_timeout: Duration::from_millis(500),
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            dry_run_keys: None,
            probe_key: None,
            partitions: Some(partitions.iter().map(|c| partition(c)).collect()),
        }
    }
}
