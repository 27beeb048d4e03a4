use memtally::call_site;

#[memtally::main(format = "json-pretty", reclaim = true)]
fn main(tracker: &mut memtally::Tracker) {
    let mut blocks = Vec::new();
    for size in [16, 32, 64, 128] {
        blocks.push(tracker.allocate(size, call_site!()).unwrap());
    }

    for block in blocks.drain(..2) {
        unsafe { tracker.free(block, call_site!()) };
    }
}
