#![no_main]

use libfuzzer_sys::fuzz_target;
use modscope::{
    gate::CompatibilityGate,
    image::{ModuleImage, RuntimeVersion},
    metadata::module::ModuleMetadata,
};

fuzz_target!(|data: &[u8]| {
    if let Ok(image) = ModuleImage::parse(data) {
        let _ = CompatibilityGate::new(RuntimeVersion::new(4, 0)).evaluate(&image);
        let _ = ModuleMetadata::read(data, &image);
    }
});
