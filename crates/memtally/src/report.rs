use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::output::format_bytes;
use crate::record::{Address, BlockRecord, Operation};
use crate::stats::UsageStats;
use crate::CallSite;

/// A single reported quantity, kept raw and formatted on display.
///
/// `Display` prints the raw number so text reports stay stable and easy to grep;
/// [`human`](Self::human) gives the unit-scaled form used by the table reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
    Count(u64),
    Bytes(u64),
    Unavailable,
}

impl MetricValue {
    pub fn human(&self) -> String {
        match self {
            MetricValue::Count(count) => count.to_string(),
            MetricValue::Bytes(bytes) => format_bytes(*bytes),
            MetricValue::Unavailable => "N/A".to_string(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(value) | MetricValue::Bytes(value) => write!(f, "{}", value),
            MetricValue::Unavailable => write!(f, "N/A"),
        }
    }
}

/// Usage summary: cumulative counts and byte totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub allocations: u64,
    pub allocated_bytes: u64,
    pub resizes: u64,
    pub resize_growth_bytes: u64,
    pub total_charged_bytes: u64,
    pub releases: u64,
    pub released_bytes: u64,
    pub double_releases: u64,
    pub largest_block: Option<u64>,
    pub smallest_block: Option<u64>,
}

impl From<&UsageStats> for UsageReport {
    fn from(stats: &UsageStats) -> Self {
        Self {
            allocations: stats.allocations,
            allocated_bytes: stats.allocated_bytes,
            resizes: stats.resizes,
            resize_growth_bytes: stats.resize_growth_bytes,
            total_charged_bytes: stats.total_charged_bytes(),
            releases: stats.releases,
            released_bytes: stats.released_bytes,
            double_releases: stats.double_releases,
            largest_block: stats.largest_block,
            smallest_block: stats.smallest_block,
        }
    }
}

impl UsageReport {
    /// Labelled rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, MetricValue)> {
        let extremum = |value: Option<u64>| value.map_or(MetricValue::Unavailable, MetricValue::Bytes);

        vec![
            ("total allocations", MetricValue::Count(self.allocations)),
            ("total allocated memory", MetricValue::Bytes(self.allocated_bytes)),
            ("total resizes", MetricValue::Count(self.resizes)),
            ("resize growth", MetricValue::Bytes(self.resize_growth_bytes)),
            ("total charged memory", MetricValue::Bytes(self.total_charged_bytes)),
            ("total releases", MetricValue::Count(self.releases)),
            ("total released memory", MetricValue::Bytes(self.released_bytes)),
            ("double releases", MetricValue::Count(self.double_releases)),
            ("largest block", extremum(self.largest_block)),
            ("smallest block", extremum(self.smallest_block)),
        ]
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.rows() {
            writeln!(f, "{} : {}", label, value)?;
        }
        Ok(())
    }
}

/// One block still live at report time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakEntry {
    pub address: Address,
    pub size: u64,
    pub operation: Operation,
    pub call_site: CallSite,
}

impl From<&BlockRecord> for LeakEntry {
    fn from(record: &BlockRecord) -> Self {
        Self {
            address: record.address(),
            size: record.size() as u64,
            operation: record.operation(),
            call_site: record.call_site().clone(),
        }
    }
}

impl fmt::Display for LeakEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {}, {} bytes leaked ({} at {})",
            self.address, self.size, self.operation, self.call_site
        )
    }
}

/// Every live block in insertion order, plus totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    pub entries: Vec<LeakEntry>,
    pub total_leaks: u64,
    pub total_leaked_bytes: u64,
}

impl LeakReport {
    /// Single pass over `records`, keeping the live ones.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a BlockRecord>) -> Self {
        let mut report = LeakReport::default();

        for record in records.into_iter().filter(|record| record.is_live()) {
            report.total_leaks += 1;
            report.total_leaked_bytes += record.size() as u64;
            report.entries.push(LeakEntry::from(record));
        }

        report
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries shown when at most `limit` are listed (0 shows all).
    pub fn shown(&self, limit: usize) -> usize {
        if limit > 0 {
            limit.min(self.entries.len())
        } else {
            self.entries.len()
        }
    }

    fn fmt_limited(&self, f: &mut fmt::Formatter<'_>, limit: usize) -> fmt::Result {
        let shown = self.shown(limit);
        for entry in &self.entries[..shown] {
            writeln!(f, "{}", entry)?;
        }
        if shown < self.entries.len() {
            writeln!(f, "... {} more leaks not shown", self.entries.len() - shown)?;
        }
        writeln!(f, "total leaks : {}", self.total_leaks)?;
        writeln!(f, "total leaked memory : {}", self.total_leaked_bytes)
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_limited(f, 0)
    }
}

/// How a report is labelled and trimmed.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub caller_name: String,
    pub elapsed: Duration,
    /// Maximum leak rows rendered by text and table output (0 = all). JSON output always
    /// carries every leak.
    pub leak_limit: usize,
}

impl Default for ReportHeader {
    fn default() -> Self {
        Self {
            caller_name: "memtally".to_string(),
            elapsed: Duration::ZERO,
            leak_limit: 0,
        }
    }
}

/// Teardown output: the usage section followed by the leak section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub caller_name: String,
    pub elapsed_ns: u64,
    #[serde(skip)]
    pub leak_limit: usize,
    pub usage: UsageReport,
    pub leaks: LeakReport,
}

impl Report {
    pub fn new(header: ReportHeader, usage: UsageReport, leaks: LeakReport) -> Self {
        Self {
            caller_name: header.caller_name,
            elapsed_ns: header.elapsed.as_nanos() as u64,
            leak_limit: header.leak_limit,
            usage,
            leaks,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_ns)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "[memtally] usage - {} ({:.2?})",
            self.caller_name,
            self.elapsed()
        )?;
        write!(f, "{}", self.usage)?;
        writeln!(f, "[memtally] leaks - {}", self.caller_name)?;
        self.leaks.fmt_limited(f, self.leak_limit)
    }
}
