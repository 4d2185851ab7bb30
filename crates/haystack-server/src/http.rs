//! A minimal blocking HTTP/1.1 request/response reader and writer.
//!
//! No keep-alive, no chunked transfer-encoding, no pipelining — exactly
//! what the three routes in §4.6 need: a request line, headers, and a
//! `Content-Length`-bounded body.

use std::io::{BufRead, BufReader, Read, Write};

use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Reads one request from `stream`: request line, headers up to the
/// blank line, then exactly `Content-Length` bytes of body (0 if the
/// header is absent).
pub fn read_request(stream: &mut impl Read) -> ServerResult<Request> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    if request_line.is_empty() {
        return Err(ServerError::MalformedRequest("connection closed before a request line".into()));
    }
    let mut parts = request_line.trim_end().splitn(3, ' ');
    let method = parts
        .next()
        .ok_or_else(|| ServerError::MalformedRequest("missing method".into()))?
        .to_string();
    let path = parts
        .next()
        .ok_or_else(|| ServerError::MalformedRequest("missing path".into()))?
        .to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ServerError::MalformedRequest(format!("malformed header line {line:?}")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse::<usize>())
        .transpose()
        .map_err(|_| ServerError::MalformedRequest("invalid Content-Length".into()))?
        .unwrap_or(0);

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(Request { method, path, headers, body })
}

pub struct Response {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            headers: Vec::new(),
            body,
        }
    }

    pub fn ok_text(body: impl Into<String>) -> Self {
        let mut response = Self::ok(body.into().into_bytes());
        response.headers.push(("Content-Type".to_string(), "text/plain".to_string()));
        response
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            reason: "Bad Request",
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: message.into().into_bytes(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: 404,
            reason: "Not Found",
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: message.into().into_bytes(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status: 500,
            reason: "Internal Server Error",
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: message.into().into_bytes(),
        }
    }
}

pub fn write_response(stream: &mut impl Write, response: &Response) -> ServerResult<()> {
    write!(stream, "HTTP/1.1 {} {}\r\n", response.status, response.reason)?;
    write!(stream, "Content-Length: {}\r\n", response.body.len())?;
    for (name, value) in &response.headers {
        write!(stream, "{name}: {value}\r\n")?;
    }
    write!(stream, "Connection: close\r\n\r\n")?;
    stream.write_all(&response.body)?;
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parses_a_simple_get_request() {
        let raw = b"GET /read/1/0/5/9 HTTP/1.1\r\nHost: x\r\n\r\n";
        let request = read_request(&mut Cursor::new(raw.as_slice())).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/read/1/0/5/9");
        assert!(request.body.is_empty());
    }

    #[test]
    fn reads_body_by_content_length() {
        let raw = b"POST /write HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let request = read_request(&mut Cursor::new(raw.as_slice())).unwrap();
        assert_eq!(request.body, b"hello");
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n";
        let request = read_request(&mut Cursor::new(raw.as_slice())).unwrap();
        assert_eq!(request.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn malformed_header_line_is_rejected() {
        let raw = b"GET / HTTP/1.1\r\nnotaheader\r\n\r\n";
        let err = read_request(&mut Cursor::new(raw.as_slice())).unwrap_err();
        assert!(matches!(err, ServerError::MalformedRequest(_)));
    }
}
