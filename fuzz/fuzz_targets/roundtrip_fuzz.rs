#![no_main]
use libfuzzer_sys::fuzz_target;
use p2bin::codec::kosinski;

fuzz_target!(|data: &[u8]| {
    let packed = kosinski::compress(data);
    let unpacked = kosinski::decompress(&packed).expect("own output must decode");
    assert_eq!(unpacked, data);
});
