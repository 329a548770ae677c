use lzwpage::{decode::Decoder, encode::Encoder};
use tokio_util::compat::{TokioAsyncReadCompatExt, TokioAsyncWriteCompatExt};

fn sample() -> Vec<u8> {
    let mut data = b"TOBEORNOTTOBEORTOBEORNOT#".repeat(2000);
    data.extend((0..=255u8).cycle().take(10_000));
    data
}

#[tokio::test]
async fn roundtrip_over_duplex() {
    let data = sample();
    let (client, server) = tokio::io::duplex(512);

    let encode = async {
        let mut encoder = Encoder::new();
        // Dropping the stream at the end closes the pipe for the reader.
        let result = encoder
            .into_async(client.compat_write())
            .encode_all(&data[..])
            .await;
        assert!(result.status.is_ok(), "{:?}", result.status);
        assert_eq!(result.bytes_read, data.len());
        result.bytes_written
    };

    let decode = async {
        let mut decoder = Decoder::new();
        let mut out = vec![];
        let read = futures::io::BufReader::new(server.compat());
        let result = decoder.into_async(&mut out).decode_all(read).await;
        assert!(result.status.is_ok(), "{:?}", result.status);
        assert!(decoder.has_ended());
        (out, result.bytes_read)
    };

    let (written, (out, read)) = tokio::join!(encode, decode);
    assert_eq!(written, read);
    assert!(out == data);
}

#[tokio::test]
async fn partial_encodes_continue_one_stream() {
    let data = sample();
    let (head, tail) = data.split_at(7777);

    let mut compressed = futures::io::Cursor::new(vec![]);
    let mut encoder = Encoder::new();
    let mut stream = encoder.into_async(&mut compressed);
    assert!(stream.encode(head).await.status.is_ok());
    assert!(stream.encode_all(tail).await.status.is_ok());
    assert!(encoder.has_ended());

    let compressed = compressed.into_inner();
    let mut out = vec![];
    let result = Decoder::new()
        .into_async(&mut out)
        .decode_all(&compressed[..])
        .await;
    assert!(result.status.is_ok(), "{:?}", result.status);
    assert_eq!(result.bytes_written, data.len());
    assert!(out == data);
}

#[tokio::test]
async fn corrupt_stream_reports_invalid_data() {
    // A code far beyond the first free entry.
    let compressed = [0xff, 0xff, 0xff];
    let mut out = vec![];
    let result = Decoder::new()
        .into_async(&mut out)
        .decode_all(&compressed[..])
        .await;
    let err = result.status.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
