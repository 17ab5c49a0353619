#![no_main]

use libfuzzer_sys::fuzz_target;
use modscope::metadata::signatures::{parse_generic_instance, parse_string_attribute};

fuzz_target!(|data: &[u8]| {
    let _ = parse_generic_instance(data);
    let _ = parse_string_attribute(data);
});
