use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Authority-assigned invoice numbering range.
///
/// A resolution grants a prefix and a consecutive block of numbers,
/// valid only inside a date window. Invoice numbers must be consumed
/// in order and must fall inside the currently active range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberingRange {
    pub prefix: String,
    pub start_number: u64,
    pub end_number: u64,
    pub validity_start: NaiveDate,
    pub validity_end: NaiveDate,
    pub active: bool,
    /// Document type the range applies to ("01" = sales invoice).
    pub document_type: String,
}

impl NumberingRange {
    /// Whether the range window covers the given date.
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.validity_start <= date && date <= self.validity_end
    }

    /// Whether a formatted invoice number belongs to this range:
    /// correct prefix and a sequential part inside [start, end].
    pub fn contains_number(&self, invoice_number: &str) -> bool {
        let Some(rest) = invoice_number.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        match rest.parse::<u64>() {
            Ok(n) => self.start_number <= n && n <= self.end_number,
            Err(_) => false,
        }
    }

    /// Render the number `n` as issued under this range.
    pub fn format_number(&self, n: u64) -> String {
        format!("{}{n}", self.prefix)
    }
}

/// Serialized next-number allocation over a range.
///
/// Concurrent invoice creation must not read-then-write the counter;
/// the fetch-add here makes each allocation atomic, so two invoices
/// can never receive the same number from one allocator.
#[derive(Debug)]
pub struct NumberAllocator {
    range: NumberingRange,
    next: AtomicU64,
}

impl NumberAllocator {
    /// Start allocating at the beginning of the range.
    pub fn new(range: NumberingRange) -> Self {
        let next = AtomicU64::new(range.start_number);
        Self { range, next }
    }

    /// Continue from a persisted counter position.
    pub fn resuming_at(range: NumberingRange, next: u64) -> Self {
        Self {
            range,
            next: AtomicU64::new(next),
        }
    }

    /// Take the next number. `None` once the range is exhausted.
    pub fn allocate(&self) -> Option<String> {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        if n > self.range.end_number {
            return None;
        }
        Some(self.range.format_number(n))
    }

    /// Numbers still available, including the next one.
    pub fn remaining(&self) -> u64 {
        let n = self.next.load(Ordering::SeqCst);
        if n > self.range.end_number {
            0
        } else {
            self.range.end_number - n + 1
        }
    }

    pub fn range(&self) -> &NumberingRange {
        &self.range
    }
}
