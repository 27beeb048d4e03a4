use memtally::call_site;

// A = 100 bytes, B = 10 x 4 zeroed bytes, A is released, B grows to 100 and leaks.
#[memtally::main(format = "text", reclaim = true)]
fn main(tracker: &mut memtally::Tracker) {
    let a = tracker.allocate(100, call_site!()).unwrap();
    let b = tracker.zero_allocate(10, 4, call_site!()).unwrap();
    unsafe { tracker.free(a, call_site!()) };
    let _c = unsafe { tracker.resize(Some(b), 100, call_site!()) }.unwrap();
}
