#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|raw_data: &[u8]| {
    // The first two bytes pick a dictionary bound, zero or at least 257.
    let (bound, stream) = match raw_data {
        [hi, lo, rest @ ..] => (u32::from(*hi) << 8 | u32::from(*lo), rest),
        _ => (0, raw_data),
    };
    let max_code = if bound <= 256 { 0 } else { bound };

    let mut decoder = lzwpage::Decoder::with_max_code(max_code).unwrap();
    let mut out = vec![];
    let _ = decoder.process_chunk(lzwpage::SliceSource::new(stream), &mut out, 1 << 20);
    assert_eq!(out.len() as u64, decoder.bytes_written());
});
