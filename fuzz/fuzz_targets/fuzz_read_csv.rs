#![no_main]

use libfuzzer_sys::fuzz_target;
use tq_io::ReadOptions;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = tq_io::read_csv_str(input, &ReadOptions::default());
    }
});
