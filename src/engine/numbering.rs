use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

const TRACKING_SUFFIX_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNumbers {
    pub order_number: String,
    pub tracking_number: String,
}

/// Time-derived order and tracking numbers.
///
/// The millisecond stamp is forced strictly increasing so two orders created
/// within the same millisecond still get distinct numbers.
#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    last_millis: AtomicI64,
}

impl OrderNumberGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self, now: DateTime<Utc>) -> OrderNumbers {
        let millis = self.next_millis(now.timestamp_millis());
        let suffix = Uuid::new_v4().simple().to_string()[..TRACKING_SUFFIX_LEN].to_uppercase();

        OrderNumbers {
            order_number: format!("ORD-{millis}"),
            tracking_number: format!("TRK{millis}{suffix}"),
        }
    }

    fn next_millis(&self, now_millis: i64) -> i64 {
        let previous = self
            .last_millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now_millis.max(last + 1))
            })
            .unwrap_or_else(|last| last);

        now_millis.max(previous + 1)
    }
}
