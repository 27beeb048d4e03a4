//! An instrumented allocation layer that records every block it hands out, attributes it
//! to the call site that asked for it, and reports usage and leaks at teardown.
//!
//! ```rust
//! use memtally::{call_site, Tracker};
//!
//! let mut tracker = Tracker::system();
//! let buf = tracker.allocate(1000, call_site!()).unwrap();
//! let arr = tracker.zero_allocate(10, 1, call_site!()).unwrap();
//! unsafe { tracker.free(buf, call_site!()) };
//! let arr = unsafe { tracker.resize_array(Some(arr), 20, 1, call_site!()) }.unwrap();
//!
//! let report = tracker.report();
//! assert_eq!(report.leaks.total_leaks, 1);
//! assert_eq!(report.leaks.total_leaked_bytes, 20);
//! # unsafe { tracker.free(arr, call_site!()) };
//! ```
//!
//! Most programs use the [`main`] attribute or a [`TrackerBuilder`] guard instead, which
//! print the reports when the program exits.

mod allocator;
mod call_site;
mod error;
mod guard;
mod output;
mod record;
mod registry;
mod report;
mod reporters;
mod shared;
mod stats;
mod tracker;

pub use allocator::{LibcAllocator, RawAllocator};
pub use call_site::{CallSite, MAX_SOURCE_LEN};
pub use error::TrackError;
pub use guard::{MemTally, TrackerBuilder};
pub use output::{format_bytes, Format, Reporter};
pub use record::{Address, BlockRecord, BlockState, Operation};
pub use registry::{RecordId, Registry};
pub use report::{LeakEntry, LeakReport, MetricValue, Report, ReportHeader, UsageReport};
pub use reporters::{JsonPrettyReporter, JsonReporter, TableReporter, TextReporter};
pub use shared::SharedTracker;
pub use stats::UsageStats;
pub use tracker::{Tracker, INITIAL_CAPACITY};

/// Wraps an entry point in a [`MemTally`] guard.
///
/// The function may take no parameters, or a single `&mut memtally::Tracker` bound to the
/// guard's tracker. Reports are printed when the function returns.
///
/// # Parameters
///
/// * `format` - `"table"` (default), `"json"`, `"json-pretty"` or `"text"`
/// * `limit` - maximum leak rows shown (0 = all)
/// * `reclaim` - release still-live blocks at teardown
///
/// ```rust,ignore
/// #[memtally::main(format = "text", limit = 10)]
/// fn main(tracker: &mut memtally::Tracker) {
///     let ptr = tracker.allocate(64, memtally::call_site!()).unwrap();
/// }
/// ```
pub use memtally_macros::main;
