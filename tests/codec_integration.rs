use p2bin::build::{BuildOptions, build_rom};
use p2bin::codec::{Codec, CompressBackend, Kosinski};

fn object_with_driver(driver: &[u8]) -> Vec<u8> {
    let mut out = vec![0x89, 0x14, 0x51];
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&(driver.len() as u16).to_le_bytes());
    out.extend_from_slice(driver);
    out.push(0x00);
    out
}

fn driver() -> Vec<u8> {
    let text = b"ld a,(ix+0) / call UpdateChannel / djnz .loop / ";
    text.iter().cycle().take(4000).copied().collect()
}

fn check_codec(codec: Codec) {
    let driver = driver();
    let opts = BuildOptions {
        codec,
        ..Default::default()
    };
    let result = build_rom(&object_with_driver(&driver)[..], &opts).unwrap();
    assert_eq!(result.compressed_length as usize, result.image.len());

    let backend = codec.backend();
    assert_eq!(backend.name(), codec.name());
    assert_eq!(backend.decompress(&result.image).unwrap(), driver);
}

#[test]
fn kosinski_driver_roundtrip() {
    check_codec(Codec::Kosinski);
}

#[cfg(feature = "zlib-codec")]
#[test]
fn zlib_driver_roundtrip() {
    check_codec(Codec::Zlib { level: 9 });
}

#[cfg(feature = "lzma-codec")]
#[test]
fn lzma_driver_roundtrip() {
    check_codec(Codec::Lzma);
}

#[test]
fn kosinski_is_deterministic_across_backend_instances() {
    let data = driver();
    let a = Kosinski.compress(&data).unwrap();
    let b = Codec::Kosinski.backend().compress(&data).unwrap();
    assert_eq!(a, b);
}

#[test]
fn kosinski_stream_is_self_delimiting() {
    let data = driver();
    let mut packed = Kosinski.compress(&data).unwrap();
    packed.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(Kosinski.decompress(&packed).unwrap(), data);
}
