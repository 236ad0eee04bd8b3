//! HTTP/1.1 response builder.
//!
//! A response carries the JSON payload the host produced alongside its
//! serialized body, so post-dispatch middleware can classify and fingerprint
//! the payload without re-parsing bytes.

use bytes::{BufMut, BytesMut};
use serde_json::Value;

use super::{Headers, StatusCode, header};

/// An HTTP/1.1 response, ready to be decorated and serialized.
///
/// # Examples
///
/// ```
/// use rttp_etag::http::{Response, StatusCode};
/// use serde_json::json;
///
/// let response = Response::json(StatusCode::Ok, json!({"id": 1}));
/// assert_eq!(response.payload(), Some(&json!({"id": 1})));
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.ends_with("{\"id\":1}"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    payload: Option<Value>,
    headers_committed: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            payload: None,
            headers_committed: false,
        }
    }

    /// Creates a JSON response and keeps the payload for inspection.
    pub fn json(status: StatusCode, payload: Value) -> Self {
        let mut response = Self::new(status).header(header::CONTENT_TYPE, "application/json");
        response.body = payload.to_string().into_bytes();
        response.payload = Some(payload);
        response
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body from a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// The JSON payload the response was built from, if any.
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Marks the header block as already handed to the transport.
    ///
    /// Streaming hosts call this once the status line and headers are on the
    /// wire; later header writes are ignored by the cache layer.
    pub fn commit_headers(&mut self) {
        self.headers_committed = true;
    }

    pub fn headers_committed(&self) -> bool {
        self.headers_committed
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// `Content-Length` is always written last. A `304` never carries a body.
    pub fn into_bytes(self) -> BytesMut {
        let body: &[u8] = if self.status == StatusCode::NotModified {
            &[]
        } else {
            &self.body
        };

        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + body.len());
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(body);
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
