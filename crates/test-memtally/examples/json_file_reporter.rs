use std::path::PathBuf;

use memtally::{call_site, Report, Reporter, TrackerBuilder};

struct JsonFileReporter {
    path: PathBuf,
}

impl Reporter for JsonFileReporter {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        let json_string = serde_json::to_string_pretty(report)?;
        std::fs::write(&self.path, json_string)?;
        println!("Report saved to {}", self.path.display());
        Ok(())
    }
}

fn main() {
    let path = std::env::var_os("MEMTALLY_REPORT_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("memtally_report.json"));

    let mut tally = TrackerBuilder::new("json_file_reporter")
        .reporter(Box::new(JsonFileReporter { path }))
        .reclaim_leaks(true)
        .build();

    let mut lines = Vec::new();
    for i in 1..=5 {
        lines.push(tally.allocate(i * 100, call_site!()).unwrap());
    }
    for line in lines.drain(1..) {
        unsafe { tally.free(line, call_site!()) };
    }
}
