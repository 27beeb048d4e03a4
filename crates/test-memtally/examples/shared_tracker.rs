use std::thread;

use memtally::{call_site, ReportHeader, SharedTracker, TextReporter, Tracker};

fn main() {
    let shared = SharedTracker::new(Tracker::system().with_reclaim_leaks(true));

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let shared = shared.clone();
            thread::spawn(move || {
                for round in 0..25 {
                    let ptr = shared.allocate(64, call_site!()).unwrap();
                    let ptr = unsafe { shared.resize(Some(ptr), 128, call_site!()) }.unwrap();
                    // worker 0 leaks its last block
                    if worker == 0 && round == 24 {
                        continue;
                    }
                    unsafe { shared.free(ptr, call_site!()) };
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    shared.with(|tracker| {
        println!(
            "live blocks before teardown: {}",
            tracker.registry().live().count()
        );
    });

    let header = ReportHeader {
        caller_name: "shared_tracker".to_string(),
        ..ReportHeader::default()
    };
    if let Err(e) = shared.teardown(header, &TextReporter) {
        eprintln!("Failed to report memtally metrics: {}", e);
    }
}
