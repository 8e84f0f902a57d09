#![no_main]
use libfuzzer_sys::fuzz_target;
use p2bin::build::{BuildOptions, build_rom};

fuzz_target!(|data: &[u8]| {
    // Arbitrary object files must produce an image or an error, never a panic.
    let opts = BuildOptions {
        max_image_size: 1 << 22,
        ..Default::default()
    };
    let _ = build_rom(data, &opts);

    // Same bytes behind a valid magic.
    let mut object = vec![0x89, 0x14];
    object.extend_from_slice(data);
    if let Ok(result) = build_rom(&object[..], &opts) {
        assert!(result.image.len() as u64 <= opts.max_image_size);
    }
});
