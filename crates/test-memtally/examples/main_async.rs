use memtally::{call_site, Tracker};

async fn fill(tracker: &mut Tracker, rounds: usize) {
    for i in 0..rounds {
        let ptr = tracker.zero_allocate(i + 1, 8, call_site!()).unwrap();
        tokio::task::yield_now().await;
        unsafe { tracker.free(ptr, call_site!()) };
    }
}

#[memtally::main(format = "text")]
#[tokio::main(flavor = "current_thread")]
async fn main(tracker: &mut Tracker) {
    fill(tracker, 10).await;
    println!("async rounds done");
}
