use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

/// Longest source identifier kept for a call site, in bytes.
pub const MAX_SOURCE_LEN: usize = 255;

/// Attribution of a tracked operation to the code that issued it.
///
/// The source identifier is stored verbatim (no canonicalization), cut to at most
/// [`MAX_SOURCE_LEN`] bytes on a char boundary.
///
/// # Examples
///
/// ```rust
/// use memtally::{call_site, CallSite};
///
/// let site = call_site!();
/// assert!(site.source().ends_with(".rs"));
///
/// let manual = CallSite::new("parser.c", 42);
/// assert_eq!(manual.to_string(), "parser.c:42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    source: Cow<'static, str>,
    line: u32,
}

impl CallSite {
    pub fn new(source: impl Into<Cow<'static, str>>, line: u32) -> Self {
        Self {
            source: truncate_source(source.into()),
            line,
        }
    }

    /// Call site of whoever called the function this is evaluated in.
    ///
    /// Only useful from functions marked `#[track_caller]`; elsewhere it is the same as
    /// [`call_site!`](crate::call_site).
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.line)
    }
}

fn truncate_source(source: Cow<'static, str>) -> Cow<'static, str> {
    if source.len() <= MAX_SOURCE_LEN {
        return source;
    }

    let mut end = MAX_SOURCE_LEN;
    while !source.is_char_boundary(end) {
        end -= 1;
    }

    match source {
        Cow::Borrowed(s) => Cow::Borrowed(&s[..end]),
        Cow::Owned(mut s) => {
            s.truncate(end);
            Cow::Owned(s)
        }
    }
}

/// Captures the current file and line as a [`CallSite`].
///
/// ```rust
/// let mut tracker = memtally::Tracker::system();
/// let block = tracker.allocate(64, memtally::call_site!()).unwrap();
/// tracker.release(block, memtally::call_site!());
/// ```
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(file!(), line!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_site_macro_captures_this_file() {
        let site = crate::call_site!();
        assert_eq!(site.source(), file!());
        assert!(site.line() > 0);
    }

    #[track_caller]
    fn attributed() -> CallSite {
        CallSite::caller()
    }

    #[test]
    fn test_caller_reports_the_calling_line() {
        let expected_line = line!() + 1;
        let site = attributed();
        assert_eq!(site.line(), expected_line);
        assert_eq!(site.source(), file!());
    }

    #[test]
    fn test_long_sources_are_bounded() {
        let long = "a".repeat(MAX_SOURCE_LEN + 40);
        let site = CallSite::new(long, 1);
        assert_eq!(site.source().len(), MAX_SOURCE_LEN);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes, so the cut lands inside a char at MAX_SOURCE_LEN
        let long = format!("{}{}", "a".repeat(MAX_SOURCE_LEN - 1), "é".repeat(4));
        let site = CallSite::new(long, 7);
        assert_eq!(site.source().len(), MAX_SOURCE_LEN - 1);
        assert!(site.source().chars().all(|c| c == 'a'));
    }

    #[test]
    fn test_short_sources_are_kept_verbatim() {
        let site = CallSite::new("./src/../src/main.c", 10);
        assert_eq!(site.source(), "./src/../src/main.c");
        assert_eq!(site.to_string(), "./src/../src/main.c:10");
    }
}
