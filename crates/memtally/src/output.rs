use crate::report::Report;

/// Trait for implementing custom report output.
///
/// Implement this trait to control where teardown reports go. Custom reporters can route
/// memtally into logging systems, CI checks, or files.
///
/// # Examples
///
/// ```rust
/// use memtally::{Report, Reporter};
/// use std::error::Error;
///
/// struct LeakCounter;
///
/// impl Reporter for LeakCounter {
///     fn report(&self, report: &Report) -> Result<(), Box<dyn Error>> {
///         println!("{}: {} leaks", report.caller_name, report.leaks.total_leaks);
///         Ok(())
///     }
/// }
/// ```
///
/// # See Also
///
/// * [`TrackerBuilder::reporter`](crate::TrackerBuilder::reporter) - Method to set a custom reporter
/// * [`Tracker::teardown`](crate::Tracker::teardown) - Explicit teardown with a reporter
pub trait Reporter: Send + Sync {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>>;
}

/// Output format for teardown reports.
///
/// # Variants
///
/// * `Table` - Human-readable tables (default)
/// * `Json` - Compact JSON format (single line)
/// * `JsonPretty` - Pretty-printed JSON format with indentation
/// * `Text` - Plain `label : value` lines, stable enough to grep
///
/// # Examples
///
/// ```rust
/// use memtally::{Format, TrackerBuilder};
///
/// let _tally = TrackerBuilder::new("main")
///     .format(Format::Text)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Table,
    Json,
    JsonPretty,
    Text,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(Format::Table),
            "json" => Ok(Format::Json),
            "json-pretty" => Ok(Format::JsonPretty),
            "text" => Ok(Format::Text),
            other => Err(format!(
                "unknown format '{}', expected one of: table, json, json-pretty, text",
                other
            )),
        }
    }
}

/// Formats a byte count with a binary unit, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log(THRESHOLD).floor() as usize).min(UNITS.len() - 1);
    let unit_value = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", unit_value, UNITS[unit_index])
    }
}

#[inline]
pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

pub(crate) fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

pub(crate) fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}
