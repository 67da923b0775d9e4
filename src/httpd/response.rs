//! The fixed reply sent on every connection.

/// Byte-exact response written once per connection.
pub const RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/plain\r\n\
Content-Length: 13\r\n\
Connection: close\r\n\
\r\n\
Hello, world!";

/// Length of [`RESPONSE`] in bytes.
pub const RESPONSE_LEN: usize = RESPONSE.len();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_is_byte_exact() {
        let expected = "HTTP/1.1 200 OK\r\n".to_string()
            + "Content-Type: text/plain\r\n"
            + "Content-Length: 13\r\n"
            + "Connection: close\r\n"
            + "\r\n"
            + "Hello, world!";
        assert_eq!(RESPONSE, expected.as_bytes());
        assert_eq!(RESPONSE_LEN, 97);
    }

    #[test]
    fn content_length_matches_body() {
        let text = std::str::from_utf8(RESPONSE).unwrap();
        let (_, body) = text.split_once("\r\n\r\n").unwrap();
        assert_eq!(body.len(), 13);
    }
}
