//! Integration tests for the pairline-core framing codec.
//!
//! These tests verify complete round trips of token lists through the public
//! API, covering the empty message, block-boundary payload sizes, and
//! multi-block messages.

use pairline_core::{
    decode_frame, encode_frame, pad_numeric, parse_numeric, FrameHeader, BLOCK_SIZE, HEADER_SIZE,
};

/// Encodes a token list and then decodes it, asserting that every byte is
/// consumed.
fn roundtrip(tokens: &[String]) -> Vec<String> {
    let bytes = encode_frame(tokens);
    let (decoded, consumed) = decode_frame(&bytes).expect("decode must succeed");
    assert_eq!(consumed, bytes.len(), "all bytes must be consumed");
    decoded
}

/// Builds a list of single-word tokens whose joined payload is exactly `len` bytes.
fn tokens_with_payload_len(len: usize) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut used = 0;
    while used < len {
        let separator = usize::from(!tokens.is_empty());
        let room = len - used - separator;
        if room == 0 {
            // A separator alone would overshoot; grow the previous token instead.
            let last: &mut String = tokens.last_mut().expect("at least one token");
            last.push('z');
            used += 1;
            continue;
        }
        let word_len = room.min(7);
        tokens.push("w".repeat(word_len));
        used += separator + word_len;
    }
    tokens
}

#[test]
fn test_roundtrip_empty_message() {
    assert!(roundtrip(&[]).is_empty());
}

#[test]
fn test_roundtrip_ping_scenario() {
    let original = vec!["ping".to_string(), "1".to_string()];

    assert_eq!(roundtrip(&original), original);
}

#[test]
fn test_roundtrip_payload_sizes_around_block_boundaries() {
    for len in [
        1,
        BLOCK_SIZE - 1,
        BLOCK_SIZE,
        BLOCK_SIZE + 1,
        2 * BLOCK_SIZE,
        3 * BLOCK_SIZE + 17,
    ] {
        // Arrange
        let original = tokens_with_payload_len(len);
        assert_eq!(original.join(" ").len(), len, "fixture for {len}");

        // Act
        let bytes = encode_frame(&original);

        // Assert
        let header = FrameHeader::decode(&bytes).unwrap();
        assert_eq!(header.full_blocks as usize, len / BLOCK_SIZE);
        assert_eq!(header.part_size, len % BLOCK_SIZE);
        assert_eq!(bytes.len(), HEADER_SIZE + len + 1);
        assert_eq!(roundtrip(&original), original, "payload length {len}");
    }
}

#[test]
fn test_roundtrip_unicode_tokens_spanning_block_boundary() {
    // "xy " puts the two-byte characters at odd offsets, so the cut at
    // BLOCK_SIZE lands inside one of them; reassembly restores it.
    let original = vec!["xy".to_string(), "é".repeat(BLOCK_SIZE), "ß".to_string()];

    assert_eq!(roundtrip(&original), original);
}

#[test]
fn test_roundtrip_keeps_empty_tokens() {
    for tokens in [vec!["", "a"], vec!["a", "", "b"], vec!["a", ""], vec!["", ""]] {
        let original: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();

        assert_eq!(roundtrip(&original), original, "tokens {tokens:?}");
    }
}

#[test]
fn test_single_empty_token_decodes_as_empty_message() {
    // An empty payload is the same bytes as the empty list.
    assert_eq!(encode_frame(&[""]), encode_frame::<&str>(&[]));
    assert!(roundtrip(&[String::new()]).is_empty());
}

#[test]
fn test_two_frames_back_to_back_decode_in_order() {
    let mut stream = encode_frame(&["first", "frame"]);
    stream.extend(encode_frame(&["second"]));

    let (first, used) = decode_frame(&stream).unwrap();
    let (second, rest) = decode_frame(&stream[used..]).unwrap();

    assert_eq!(first, vec!["first", "frame"]);
    assert_eq!(second, vec!["second"]);
    assert_eq!(used + rest, stream.len());
}

#[test]
fn test_numeric_fields_roundtrip() {
    for value in [0u64, 42, 4242, 1_000_000_007, u64::MAX] {
        assert_eq!(parse_numeric(&pad_numeric(value)).unwrap(), value);
    }
}
