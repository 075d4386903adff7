use bytes::BytesMut;
use emberdb::protocol::{self, DecodeError, Value};
use rand::distributions::Alphanumeric;
use rand::Rng;

#[test]
fn decodes_an_array_of_bulk_strings() {
    let tokens = protocol::decode_request(b"*3\r\n$3\r\nPUT\r\n$1\r\nK\r\n$1\r\nV\r\n").unwrap();
    assert_eq!(tokens, vec!["PUT", "K", "V"]);
}

#[test]
fn empty_array_yields_no_tokens() {
    let tokens = protocol::decode_request(b"*0\r\n").unwrap();
    assert!(tokens.is_empty());
}

#[test]
fn empty_buffer_is_a_decode_error() {
    assert_eq!(protocol::decode_request(b""), Err(DecodeError::Incomplete));
}

#[test]
fn truncated_bulk_string_is_a_decode_error() {
    // Declared length exceeds the available bytes.
    assert_eq!(
        protocol::decode_request(b"$5\r\nabc\r\n"),
        Err(DecodeError::Incomplete)
    );
}

#[test]
fn non_array_request_is_rejected() {
    assert_eq!(
        protocol::decode_request(b"+PING\r\n"),
        Err(DecodeError::ExpectedArray)
    );
}

#[test]
fn non_string_element_is_rejected() {
    assert_eq!(
        protocol::decode_request(b"*1\r\n:5\r\n"),
        Err(DecodeError::ExpectedString)
    );
}

#[test]
fn request_round_trip() {
    let tokens = ["SET", "key", "value with spaces"];
    let mut buf = BytesMut::new();
    protocol::write_request(&tokens, &mut buf);
    let decoded = protocol::decode_request(&buf).unwrap();
    assert_eq!(decoded, tokens);
}

#[test]
fn request_round_trip_randomized() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let count = rng.gen_range(0..6);
        let tokens: Vec<String> = (0..count)
            .map(|_| {
                let len = rng.gen_range(0..40);
                (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect()
            })
            .collect();

        let mut buf = BytesMut::new();
        protocol::write_request(&tokens, &mut buf);
        assert_eq!(protocol::decode_request(&buf).unwrap(), tokens);
    }
}

#[test]
fn every_prefix_of_a_request_is_incomplete() {
    let full = b"*2\r\n$4\r\nPING\r\n$5\r\nhello\r\n";
    for cut in 0..full.len() {
        assert_eq!(
            protocol::parse_request(&full[..cut]).unwrap(),
            None,
            "prefix of {} bytes should be incomplete",
            cut
        );
    }
    let (tokens, consumed) = protocol::parse_request(full).unwrap().unwrap();
    assert_eq!(consumed, full.len());
    assert_eq!(tokens, vec!["PING", "hello"]);
}

#[test]
fn consumed_count_leaves_pipelined_requests_intact() {
    let mut buf = BytesMut::new();
    protocol::write_request(&["PING"], &mut buf);
    protocol::write_request(&["PING", "again"], &mut buf);

    let (first, used) = protocol::parse_request(&buf).unwrap().unwrap();
    assert_eq!(first, vec!["PING"]);

    let (second, rest) = protocol::parse_request(&buf[used..]).unwrap().unwrap();
    assert_eq!(second, vec!["PING", "again"]);
    assert_eq!(used + rest, buf.len());
}

#[test]
fn null_bulk_and_null_array_decode_to_null() {
    assert_eq!(protocol::parse(b"$-1\r\n").unwrap().0, Value::Null);
    assert_eq!(protocol::parse(b"*-1\r\n").unwrap().0, Value::Null);
}

#[test]
fn reply_encoders_match_the_wire_format() {
    let mut out = BytesMut::new();
    protocol::write_simple("PONG", &mut out);
    assert_eq!(&out[..], b"+PONG\r\n");

    out.clear();
    protocol::write_bulk(b"hello", &mut out);
    assert_eq!(&out[..], b"$5\r\nhello\r\n");

    out.clear();
    protocol::write_error("ERR boom", &mut out);
    assert_eq!(&out[..], b"-ERR boom\r\n");
}
