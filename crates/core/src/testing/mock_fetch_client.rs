//! Mock fetch client for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::fetch::{FetchClient, FetchError, Outcome};
use crate::partition::{CandidateKey, PartitionCode};

use super::fixtures;

/// Scripted answer for one fetch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockResponse {
    Found,
    NotFound,
    /// Connection-style transient failure.
    Transient,
    /// Never completes; only a timeout ends the call.
    Hang,
}

impl MockResponse {
    /// Parse a pattern character: `F` found, `N` not found, `T` transient,
    /// `H` hang.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'F' => Some(MockResponse::Found),
            'N' => Some(MockResponse::NotFound),
            'T' => Some(MockResponse::Transient),
            'H' => Some(MockResponse::Hang),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    responses: HashMap<String, VecDeque<MockResponse>>,
    delays: HashMap<String, Duration>,
    jitter: Option<(u64, Duration)>,
    calls: Vec<String>,
}

/// Mock implementation of the FetchClient trait.
///
/// Provides controllable behavior for testing:
/// - Script responses per key (the last scripted response repeats)
/// - Add fixed or seeded pseudo-random latency
/// - Record calls and peak concurrency for assertions
///
/// # Example
///
/// ```rust,ignore
/// let client = MockFetchClient::new();
/// client.set_pattern("01", "FNFNNNFN");
/// client.script("02000001", &[MockResponse::Transient, MockResponse::Found]);
///
/// // Unscripted keys answer NotFound
/// assert_eq!(client.calls().len(), 0);
/// ```
#[derive(Debug)]
pub struct MockFetchClient {
    default: Mutex<MockResponse>,
    script: Mutex<Script>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

impl Default for MockFetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetchClient {
    /// Create a mock that answers NotFound for every key.
    pub fn new() -> Self {
        Self::with_default(MockResponse::NotFound)
    }

    pub fn with_default(response: MockResponse) -> Self {
        Self {
            default: Mutex::new(response),
            script: Mutex::new(Script::default()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn set_default(&self, response: MockResponse) {
        if let Ok(mut default) = self.default.lock() {
            *default = response;
        }
    }

    /// Script successive responses for `key`.
    pub fn script(&self, key: &str, responses: &[MockResponse]) {
        if let Ok(mut script) = self.script.lock() {
            script
                .responses
                .insert(key.to_string(), responses.iter().copied().collect());
        }
    }

    /// Script keys `<partition>000001..` from a pattern string such as
    /// `"FNFNNNFN"`.
    pub fn set_pattern(&self, partition: &str, pattern: &str) {
        let Ok(code) = PartitionCode::new(partition) else {
            return;
        };
        for (i, c) in pattern.chars().enumerate() {
            let Some(response) = MockResponse::from_char(c) else {
                continue;
            };
            if let Ok(key) = CandidateKey::new(code.clone(), i as u32 + 1) {
                self.script(&key.to_string(), &[response]);
            }
        }
    }

    pub fn set_delay(&self, key: &str, delay: Duration) {
        if let Ok(mut script) = self.script.lock() {
            script.delays.insert(key.to_string(), delay);
        }
    }

    /// Give every call a pseudo-random delay up to `max`, derived from the
    /// key and `seed` so a run is reproducible.
    pub fn set_jitter(&self, seed: u64, max: Duration) {
        if let Ok(mut script) = self.script.lock() {
            script.jitter = Some((seed, max));
        }
    }

    /// Keys fetched, in call order (retries included).
    pub fn calls(&self) -> Vec<String> {
        self.script
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, key: &str) -> usize {
        self.calls().iter().filter(|k| k.as_str() == key).count()
    }

    /// Distinct keys fetched, sorted.
    pub fn fetched_keys(&self) -> Vec<String> {
        let mut keys = self.calls();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Highest number of simultaneous calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_response(&self, key: &str) -> (MockResponse, Duration) {
        let default = self
            .default
            .lock()
            .map(|d| *d)
            .unwrap_or(MockResponse::NotFound);
        let Ok(mut script) = self.script.lock() else {
            return (default, Duration::ZERO);
        };
        script.calls.push(key.to_string());

        let response = match script.responses.get_mut(key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(default),
            Some(queue) => queue.front().copied().unwrap_or(default),
            None => default,
        };

        let mut delay = script.delays.get(key).copied().unwrap_or_default();
        if let Some((seed, max)) = script.jitter {
            delay += jitter_for(key, seed, max);
        }
        (response, delay)
    }
}

fn jitter_for(key: &str, seed: u64, max: Duration) -> Duration {
    let max_us = max.as_micros() as u64;
    if max_us == 0 {
        return Duration::ZERO;
    }
    // FNV-1a over the key, mixed with the seed
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ seed;
    for byte in key.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    Duration::from_micros(hash % max_us)
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FetchClient for MockFetchClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, key: &CandidateKey) -> Outcome {
        let key_str = key.to_string();
        let (response, delay) = self.next_response(&key_str);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match response {
            MockResponse::Found => Outcome::Found(fixtures::record(&key_str)),
            MockResponse::NotFound => Outcome::NotFound,
            MockResponse::Transient => {
                Outcome::Transient(FetchError::Connection("mock connection refused".to_string()))
            }
            MockResponse::Hang => std::future::pending::<Outcome>().await,
        }
    }
}
