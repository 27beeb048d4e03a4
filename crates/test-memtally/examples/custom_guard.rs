use memtally::{call_site, Report, Reporter, TrackerBuilder};
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, report: &Report) -> Result<(), Box<dyn std::error::Error>> {
        info!("memtally report for: {}", report.caller_name);

        for (label, value) in report.usage.rows() {
            info!("{}: {}", label, value.human());
        }

        for entry in &report.leaks.entries {
            let leak_span = info_span!("leak", address = %entry.address);
            let _enter = leak_span.enter();
            warn!("{} bytes from {} at {}", entry.size, entry.operation, entry.call_site);
        }

        Ok(())
    }
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MEMTALLY_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .init();

    let mut tally = TrackerBuilder::new("custom_guard")
        .reporter(Box::new(TracingReporter))
        .reclaim_leaks(true)
        .try_build()?;

    let header = tally.allocate(48, call_site!())?;
    let body = tally.allocate(512, call_site!())?;
    let body = unsafe { tally.resize(Some(body), 2048, call_site!()) }?;
    unsafe { tally.free(header, call_site!()) };

    tally.release(body, call_site!());
    tally.release(body, call_site!());
    unsafe { memtally::RawAllocator::release(tally.allocator(), body) };

    let _leaked = tally.zero_allocate(4, 16, call_site!())?;

    Ok(())
}
