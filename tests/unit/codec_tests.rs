//! Unit tests for `FrameCodec` decoding and encoding.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use buildwire::framing::{Frame, FrameCodec};
use buildwire::AppError;

// ── Decoding ────────────────────────────────────────────────────────────────

#[test]
fn decodes_single_frame() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("5\nhello");

    let frame = codec.decode(&mut buf).expect("decode");
    assert_eq!(frame, Some(Frame::Payload(Bytes::from_static(b"hello"))));
    assert!(buf.is_empty());
}

#[test]
fn decodes_back_to_back_frames() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("2\nab3\ncde0\n");

    let a = codec.decode(&mut buf).unwrap().unwrap();
    let b = codec.decode(&mut buf).unwrap().unwrap();
    let c = codec.decode(&mut buf).unwrap().unwrap();

    assert_eq!(a.into_bytes(), "ab");
    assert_eq!(b.into_bytes(), "cde");
    assert_eq!(c, Frame::Payload(Bytes::new()));
    assert_eq!(codec.decode(&mut buf).unwrap(), None);
}

#[test]
fn partial_body_is_buffered_until_complete() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("10\nhello");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    buf.extend_from_slice(b"world");
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.into_bytes(), "helloworld");
}

#[test]
fn partial_header_is_buffered_until_newline() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("1");

    assert_eq!(codec.decode(&mut buf).unwrap(), None);
    buf.extend_from_slice(b"2\nabcdefghijkl");
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.into_bytes().len(), 12);
}

#[test]
fn bare_newline_is_an_empty_frame() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("\n");
    assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Empty));
}

#[test]
fn non_numeric_header_is_a_protocol_error() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("abc\nxyz");
    let err = codec.decode(&mut buf).unwrap_err();
    assert!(matches!(err, AppError::Protocol(_)), "got {err:?}");
}

#[test]
fn signed_header_is_a_protocol_error() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("-1\n");
    assert!(matches!(
        codec.decode(&mut buf),
        Err(AppError::Protocol(_))
    ));
}

#[test]
fn runaway_header_without_newline_is_rejected() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("123456789012345678901");
    assert!(matches!(
        codec.decode(&mut buf),
        Err(AppError::Protocol(_))
    ));
}

#[test]
fn frame_over_cap_is_rejected() {
    let mut codec = FrameCodec::with_max_length(4);
    assert_eq!(codec.max_length(), Some(4));

    let mut buf = BytesMut::from("5\nhello");
    match codec.decode(&mut buf) {
        Err(AppError::Protocol(msg)) => {
            assert_eq!(msg, "frame of 5 bytes exceeds the 4 byte limit");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[test]
fn frame_at_cap_is_accepted() {
    let mut codec = FrameCodec::with_max_length(4);
    let mut buf = BytesMut::from("4\nabcd");
    assert_eq!(codec.decode(&mut buf).unwrap().unwrap().into_bytes(), "abcd");
}

#[test]
fn eof_on_empty_buffer_ends_stream() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
}

#[test]
fn eof_mid_body_reports_partial_bytes() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("5\nhel");

    match codec.decode_eof(&mut buf) {
        Err(AppError::ConnectionClosed { partial }) => assert_eq!(partial, b"hel"),
        other => panic!("expected connection closed, got {other:?}"),
    }
}

#[test]
fn eof_mid_header_reports_partial_bytes() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("12");

    match codec.decode_eof(&mut buf) {
        Err(AppError::ConnectionClosed { partial }) => assert_eq!(partial, b"12"),
        other => panic!("expected connection closed, got {other:?}"),
    }
}

#[test]
fn multibyte_payload_length_counts_bytes() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from("4\n\u{1F980}");
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.into_bytes(), "\u{1F980}".as_bytes());
}

// ── Encoding ────────────────────────────────────────────────────────────────

#[test]
fn encodes_str_with_byte_length_header() {
    let mut codec = FrameCodec::new();
    let mut dst = BytesMut::new();
    codec.encode("héllo", &mut dst).unwrap();
    assert_eq!(&dst[..], "6\nhéllo".as_bytes());
}

#[test]
fn encodes_empty_payload_as_zero_header() {
    let mut codec = FrameCodec::new();
    let mut dst = BytesMut::new();
    codec.encode(String::new(), &mut dst).unwrap();
    assert_eq!(&dst[..], b"0\n");
}

#[test]
fn encoded_bytes_decode_back() {
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::new();
    codec.encode(Bytes::from_static(b"{\"step\":1}"), &mut buf).unwrap();
    codec.encode("second", &mut buf).unwrap();

    let first = codec.decode(&mut buf).unwrap().unwrap();
    let second = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(first.into_bytes(), "{\"step\":1}");
    assert_eq!(second.into_bytes(), "second");
}
