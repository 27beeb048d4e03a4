use std::ops::{Deref, DerefMut};
use std::time::Instant;

use tracing::error;

use crate::allocator::{LibcAllocator, RawAllocator};
use crate::error::TrackError;
use crate::output::{env_flag, env_usize, Format, Reporter};
use crate::report::ReportHeader;
use crate::reporters::{JsonPrettyReporter, JsonReporter, TableReporter, TextReporter};
use crate::tracker::Tracker;

enum ReporterConfig {
    Format(Format),
    Custom(Box<dyn Reporter>),
    None,
}

/// Builder for a [`MemTally`] guard.
///
/// The guard owns a [`Tracker`] and tears it down when dropped, handing the usage and leak
/// reports to the configured reporter.
///
/// # Examples
///
/// Basic usage with default settings:
///
/// ```rust
/// use memtally::{call_site, TrackerBuilder};
///
/// let mut tally = TrackerBuilder::new("my_program").build();
/// let ptr = tally.allocate(64, call_site!()).unwrap();
/// unsafe { tally.free(ptr, call_site!()) };
/// // Report is printed when `tally` goes out of scope
/// ```
///
/// Custom configuration:
///
/// ```rust
/// use memtally::{Format, TrackerBuilder};
///
/// let _tally = TrackerBuilder::new("benchmark")
///     .format(Format::JsonPretty)
///     .limit(10)
///     .reclaim_leaks(true)
///     .build();
/// ```
///
/// # Environment
///
/// * `MEMTALLY_JSON=1` - forces compact JSON output regardless of the configured reporter
/// * `MEMTALLY_LEAK_LIMIT=<n>` - overrides [`limit`](Self::limit)
/// * `NO_COLOR` - disables colors in table output
#[must_use = "builder is discarded without creating a guard"]
pub struct TrackerBuilder<A: RawAllocator = LibcAllocator> {
    caller_name: &'static str,
    allocator: A,
    reporter: ReporterConfig,
    limit: usize,
    reclaim_leaks: bool,
}

impl TrackerBuilder<LibcAllocator> {
    /// Creates a builder over the C library allocator. The caller name labels the report.
    pub fn new(caller_name: &'static str) -> Self {
        Self {
            caller_name,
            allocator: LibcAllocator,
            reporter: ReporterConfig::None,
            limit: 0,
            reclaim_leaks: false,
        }
    }
}

impl<A: RawAllocator> TrackerBuilder<A> {
    /// Swaps the underlying allocator.
    pub fn allocator<B: RawAllocator>(self, allocator: B) -> TrackerBuilder<B> {
        TrackerBuilder {
            caller_name: self.caller_name,
            allocator,
            reporter: self.reporter,
            limit: self.limit,
            reclaim_leaks: self.reclaim_leaks,
        }
    }

    pub fn format(mut self, format: Format) -> Self {
        self.reporter = ReporterConfig::Format(format);
        self
    }

    /// Sets a custom reporter. Overrides any format setting.
    pub fn reporter(mut self, reporter: Box<dyn Reporter>) -> Self {
        self.reporter = ReporterConfig::Custom(reporter);
        self
    }

    /// Maximum number of leak rows rendered by table and text output. 0 shows all.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Release still-live blocks through the allocator at teardown.
    pub fn reclaim_leaks(mut self, reclaim: bool) -> Self {
        self.reclaim_leaks = reclaim;
        self
    }

    /// Builds the guard and initializes the registry up front.
    pub fn try_build(self) -> Result<MemTally<A>, TrackError> {
        let mut tally = self.build_lazy();
        tally.tracker.init()?;
        Ok(tally)
    }

    /// Builds the guard. If the registry cannot be initialized now, the failure is logged
    /// and initialization is retried on the first tracked block.
    pub fn build(self) -> MemTally<A> {
        let mut tally = self.build_lazy();
        if let Err(e) = tally.tracker.init() {
            error!(error = %e, "memtally init failed, continuing lazily");
        }
        tally
    }

    fn build_lazy(self) -> MemTally<A> {
        let reporter: Box<dyn Reporter> = match self.reporter {
            ReporterConfig::Format(format) => match format {
                Format::Table => Box::new(TableReporter),
                Format::Json => Box::new(JsonReporter),
                Format::JsonPretty => Box::new(JsonPrettyReporter),
                Format::Text => Box::new(TextReporter),
            },
            ReporterConfig::Custom(reporter) => reporter,
            ReporterConfig::None => Box::new(TableReporter),
        };

        // Override reporter with JsonReporter when MEMTALLY_JSON env var is enabled
        let reporter: Box<dyn Reporter> = if env_flag("MEMTALLY_JSON") {
            Box::new(JsonReporter)
        } else {
            reporter
        };

        let limit = env_usize("MEMTALLY_LEAK_LIMIT").unwrap_or(self.limit);

        MemTally {
            tracker: Tracker::new(self.allocator).with_reclaim_leaks(self.reclaim_leaks),
            reporter,
            caller_name: self.caller_name,
            start: Instant::now(),
            limit,
        }
    }
}

/// Guard owning a [`Tracker`]. Dereferences to it, and reports then tears it down on drop.
///
/// Created by [`TrackerBuilder`] or the [`main`](crate::main) attribute macro.
#[must_use = "guard is dropped immediately without generating a report"]
pub struct MemTally<A: RawAllocator = LibcAllocator> {
    tracker: Tracker<A>,
    reporter: Box<dyn Reporter>,
    caller_name: &'static str,
    start: Instant,
    limit: usize,
}

impl<A: RawAllocator> MemTally<A> {
    pub fn caller_name(&self) -> &'static str {
        self.caller_name
    }

    fn header(&self) -> ReportHeader {
        ReportHeader {
            caller_name: self.caller_name.to_string(),
            elapsed: self.start.elapsed(),
            leak_limit: self.limit,
        }
    }
}

impl<A: RawAllocator> Deref for MemTally<A> {
    type Target = Tracker<A>;

    fn deref(&self) -> &Self::Target {
        &self.tracker
    }
}

impl<A: RawAllocator> DerefMut for MemTally<A> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tracker
    }
}

impl<A: RawAllocator> Drop for MemTally<A> {
    fn drop(&mut self) {
        let header = self.header();
        if let Err(e) = self.tracker.finish(header, self.reporter.as_ref()) {
            eprintln!("Failed to report memtally metrics: {}", e);
        }
    }
}
