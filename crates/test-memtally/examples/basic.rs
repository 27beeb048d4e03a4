use memtally::call_site;

#[allow(dead_code)]
struct TestStruct {
    x: i32,
    y: i32,
    string: [u8; 256],
}

#[memtally::main]
fn main(tracker: &mut memtally::Tracker) {
    let ptr = tracker.allocate(1000, call_site!()).unwrap();
    let _st = tracker
        .allocate(std::mem::size_of::<TestStruct>(), call_site!())
        .unwrap();
    let array = tracker.zero_allocate(10, 1, call_site!()).unwrap();

    unsafe { tracker.free(ptr, call_site!()) };
    let _array = unsafe { tracker.resize_array(Some(array), 20, 1, call_site!()) }.unwrap();
}
