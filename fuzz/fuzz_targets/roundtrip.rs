#![no_main]
use libfuzzer_sys::fuzz_target;
use lzwpage::{decode, encode, SliceSource};

fuzz_target!(|data: &[u8]| {
    // Small pages with a clear code after every second one, on a small dictionary.
    const PAGE: usize = 7;
    const MAX_CODE: u32 = 512;

    let mut encoder = encode::Encoder::with_max_code(MAX_CODE).unwrap();
    let mut buffer = Vec::with_capacity(2 * data.len() + 40);
    let mut source = SliceSource::new(data);
    let mut pages = 0;
    while encoder.process_chunk(&mut source, &mut buffer, PAGE).unwrap() > 0 {
        pages += 1;
        if pages % 2 == 0 {
            encoder.emit_clear_code(&mut buffer).unwrap();
        }
    }
    encoder.finish(&mut buffer).unwrap();

    let mut decoder = decode::Decoder::with_max_code(MAX_CODE).unwrap();
    let mut compare = vec![];
    let mut source = SliceSource::new(&buffer);
    while decoder.process_chunk(&mut source, &mut compare, PAGE).unwrap() > 0 {}
    assert!(decoder.has_ended());
    assert_eq!(compare, data);
});
