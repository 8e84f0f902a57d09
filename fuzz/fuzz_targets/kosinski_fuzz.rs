#![no_main]
use libfuzzer_sys::fuzz_target;
use p2bin::codec::kosinski;

fuzz_target!(|data: &[u8]| {
    let _ = kosinski::decompress(data);
});
