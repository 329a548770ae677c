use lzwpage::{decode, encode, Code, LzwError, SliceSource, CLEAR_CODE};
use std::{env, fs, io};

/// Deterministic noise with a tunable alphabet so that strings repeat at different rates.
fn noise(len: usize, alphabet: u32, mut seed: u32) -> Vec<u8> {
    (0..len)
        .map(|_| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            ((seed >> 16) % alphabet) as u8
        })
        .collect()
}

fn corpus() -> Vec<(&'static str, Vec<u8>)> {
    let own = env::args()
        .next()
        .and_then(|file| fs::read(file).ok())
        .map(|mut data| {
            data.truncate(1 << 16);
            data
        })
        .unwrap_or_default();

    vec![
        ("empty", vec![]),
        ("single", vec![0x2d]),
        ("run", vec![b'-'; 5000]),
        ("all bytes", (0..=255).collect()),
        ("text", b"TOBEORNOTTOBEORTOBEORNOT".repeat(200)),
        ("binary", noise(20_000, 256, 7)),
        ("small alphabet", noise(60_000, 4, 11)),
        ("self", own),
    ]
}

const MAX_CODES: &[Code] = &[0, 257, 258, 300, 511, 512, 1023, 4096];

fn encode_chunked(data: &[u8], max_code: Code, chunk: usize) -> Vec<u8> {
    let mut out = vec![];
    let mut source = SliceSource::new(data);
    let mut encoder = encode::Encoder::with_max_code(max_code).unwrap();
    while encoder.process_chunk(&mut source, &mut out, chunk).unwrap() > 0 {}
    encoder.finish(&mut out).unwrap();
    assert_eq!(encoder.bytes_read(), data.len() as u64);
    assert_eq!(encoder.bytes_written(), out.len() as u64);
    out
}

fn decode_chunked(stream: &[u8], max_code: Code, chunk: usize) -> Result<Vec<u8>, LzwError> {
    let mut out = vec![];
    let mut source = SliceSource::new(stream);
    let mut decoder = decode::Decoder::with_max_code(max_code).unwrap();
    while decoder.process_chunk(&mut source, &mut out, chunk)? > 0 {}
    assert!(decoder.has_ended());
    assert_eq!(decoder.bytes_read(), stream.len() as u64);
    Ok(out)
}

#[test]
fn roundtrip_all() {
    for (name, data) in corpus() {
        for &max_code in MAX_CODES {
            assert_roundtrips(&data, name, max_code);
        }
    }
}

fn assert_roundtrips(data: &[u8], name: &str, max_code: Code) {
    eprintln!("Roundtrip test {} {}", name, max_code);
    let mut encoder = encode::Encoder::with_max_code(max_code).unwrap();
    let mut buffer = Vec::with_capacity(2 * data.len() + 40);
    let result = encoder.into_stream(&mut buffer).encode_all(data);
    assert!(result.status.is_ok(), "{}, {}, {:?}", name, max_code, result.status);
    assert_eq!(result.bytes_read, data.len());
    assert_eq!(result.bytes_written, buffer.len());

    let mut decoder = decode::Decoder::with_max_code(max_code).unwrap();
    let mut compare = vec![];
    let result = decoder.into_stream(&mut compare).decode_all(buffer.as_slice());
    assert!(result.status.is_ok(), "{}, {}, {:?}", name, max_code, result.status);
    assert!(data == &*compare, "{}, {}", name, max_code);
}

#[test]
fn chunk_size_independence() {
    let data = noise(30_000, 16, 3);
    for &max_code in &[0, 600] {
        let whole = encode_chunked(&data, max_code, usize::MAX);
        for &chunk in &[1, 3, 4096] {
            assert_eq!(encode_chunked(&data, max_code, chunk), whole, "chunk {}", chunk);
        }
        for &chunk in &[1, 3, usize::MAX] {
            let decoded = decode_chunked(&whole, max_code, chunk).unwrap();
            assert!(decoded == data, "chunk {}", chunk);
        }
    }
}

#[test]
fn repeated_byte_scenario() {
    let stream = encode_chunked(b"----", 0, 1);
    assert_eq!(stream, [0x16, 0xc0, 0x45, 0xa0]);
    assert_eq!(decode_chunked(&stream, 0, 1).unwrap(), b"----");
}

/// Encode blocks separated by clear codes into one stream.
fn encode_blocks(blocks: &[&[u8]], max_code: Code) -> Vec<u8> {
    let mut out = vec![];
    let mut encoder = encode::Encoder::with_max_code(max_code).unwrap();
    for (idx, block) in blocks.iter().enumerate() {
        if idx > 0 {
            encoder.emit_clear_code(&mut out).unwrap();
        }
        encoder.encode_bytes(block, &mut out).unwrap();
    }
    encoder.finish(&mut out).unwrap();
    out
}

#[test]
fn clear_codes_are_transparent() {
    let first = noise(10_000, 8, 1);
    let second = b"TOBEORNOTTOBEORTOBEORNOT".repeat(50);
    let third = noise(3_000, 256, 2);
    let (first, second, third, empty) = (&first[..], &second[..], &third[..], &b""[..]);
    let cases: Vec<Vec<&[u8]>> = vec![
        vec![first, second],
        vec![first, second, third],
        vec![empty, second],
        vec![first, empty, empty, third],
        vec![second, empty],
    ];

    for &max_code in &[0, 257, 700] {
        for blocks in &cases {
            let stream = encode_blocks(blocks, max_code);
            let expected = blocks.concat();
            for &chunk in &[1, 7, usize::MAX] {
                let decoded = decode_chunked(&stream, max_code, chunk).unwrap();
                assert!(decoded == expected, "{} {}", max_code, chunk);
            }
        }
    }
}

#[test]
fn clear_code_right_before_width_change() {
    // The block ends when the decoder is about to learn code 511 and widen.
    for len in 253..=258 {
        let block: Vec<u8> = (0..len).map(|b| b as u8).collect();
        let stream = encode_blocks(&[&block[..], &b"after the reset"[..]], 0);
        let mut expected = block.clone();
        expected.extend_from_slice(b"after the reset");
        assert_eq!(decode_chunked(&stream, 0, usize::MAX).unwrap(), expected, "len {}", len);
    }
}

#[test]
fn bounded_dictionary_near_width_boundary() {
    // A bound right below a power of two keeps the encoder at the smaller width.
    let data = noise(50_000, 32, 5);
    for &max_code in &[510, 511, 512, 513, 1023, 1024] {
        let stream = encode_chunked(&data, max_code, usize::MAX);
        let decoded = decode_chunked(&stream, max_code, usize::MAX).unwrap();
        assert!(decoded == data, "max code {}", max_code);
    }
}

#[test]
fn widths_grow_over_long_input() {
    let data = noise(400_000, 16, 9);
    let mut out = vec![];
    let mut encoder = encode::Encoder::new();
    encoder.encode_bytes(&data, &mut out).unwrap();
    assert!(encoder.code_width() >= 14, "{}", encoder.code_width());
    encoder.finish(&mut out).unwrap();
    assert!(out.len() < data.len());
    assert!(decode_chunked(&out, 0, usize::MAX).unwrap() == data);
}

#[test]
fn clear_code_never_decodes_to_data() {
    let stream = encode_blocks(&[&b"abc"[..], &b"def"[..]], 0);
    let mut decoder = decode::Decoder::new();
    let mut out = vec![];
    // The first block is a run of three codes, the clear code then yields nothing.
    let mut source = SliceSource::new(&stream);
    let mut sizes = vec![];
    loop {
        let before = out.len();
        let produced = decoder.process_chunk(&mut source, &mut out, 1).unwrap();
        assert_eq!(out.len() - before, produced);
        if produced == 0 {
            break;
        }
        sizes.push(produced);
    }
    assert_eq!(out, b"abcdef");
    assert_eq!(sizes, [1; 6]);
    assert!(decoder.dictionary().sequence(CLEAR_CODE).is_none());
}

#[test]
fn garbage_is_rejected_without_panic() {
    let mut failures = 0;
    for seed in 0..200 {
        let garbage = noise(64, 256, seed);
        let mut decoder = decode::Decoder::new();
        let mut out = vec![];
        let result = decoder.process_chunk(SliceSource::new(&garbage), &mut out, usize::MAX);
        if result.is_err() {
            failures += 1;
        }
    }
    assert!(failures > 0);
}

#[test]
fn trailing_bits_must_be_padding() {
    // Five bits of padding and a stray byte: one more code fits, its remainder is not zero.
    let mut stream = encode_chunked(b"----", 0, usize::MAX);
    stream.push(0xff);
    assert!(matches!(
        decode_chunked(&stream, 0, usize::MAX),
        Err(LzwError::InvalidPadding)
    ));

    let stream = encode_chunked(b"----", 0, usize::MAX);
    assert!(matches!(
        decode_chunked(&stream[..1], 0, usize::MAX),
        Err(LzwError::TruncatedCode { bits: 8 })
    ));
}

struct BrokenPipe;

impl lzwpage::ByteSink for BrokenPipe {
    fn emit_byte(&mut self, _: u8) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }
}

#[test]
fn sink_errors_propagate() {
    let mut encoder = encode::Encoder::new();
    let err = encoder
        .process_chunk(SliceSource::new(b"abcdef"), BrokenPipe, usize::MAX)
        .unwrap_err();
    match err {
        LzwError::Io(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("{:?}", other),
    }
}
