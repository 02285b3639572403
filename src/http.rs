use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target exactly as received, query string included.
    pub target: String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(target: &str) -> Self {
        Self {
            method: "GET".to_string(),
            target: target.to_string(),
            headers: Vec::new(),
        }
    }

    /// Raw (still percent-encoded) path component of the target.
    pub fn path(&self) -> &str {
        let path = self.target.split(['?', '#']).next().unwrap_or("");
        if path.is_empty() {
            "/"
        } else {
            path
        }
    }

    /// Raw query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        let without_fragment = self.target.split('#').next().unwrap_or("");
        without_fragment
            .split_once('?')
            .map(|(_, query)| query)
            .filter(|query| !query.is_empty())
    }
}

/// Reads the request line and headers. Returns `None` when the peer closed the
/// connection before sending anything.
pub fn read_request<R: BufRead>(reader: &mut R) -> io::Result<Option<Request>> {
    let mut first_line = String::new();
    if reader.read_line(&mut first_line)? == 0 {
        return Ok(None);
    }

    let mut parts = first_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method.to_string(), target.to_string()),
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed request line: {}", first_line.trim()),
            ))
        }
    };

    let mut headers = Vec::new();
    let mut line = String::new();
    while {
        line.clear();
        reader.read_line(&mut line)? > 0 && !line.trim().is_empty()
    } {
        if let Some((key, value)) = line.split_once(':') {
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(Some(Request {
        method,
        target,
        headers,
    }))
}

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        410 => "Gone",
        418 => "I'm a teapot",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Response sink that remembers whether the head has gone out, which decides
/// whether a failure can still become a 404 or must cut the connection.
pub struct ResponseWriter<W: Write> {
    inner: W,
    headers_sent: bool,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            headers_sent: false,
        }
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn write_head(&mut self, status: u16, headers: &[(String, String)]) -> io::Result<()> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", status, reason_phrase(status));
        for (key, value) in headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str("Connection: close\r\n\r\n");

        self.headers_sent = true;
        self.inner.write_all(head.as_bytes())
    }

    pub fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.inner.write_all(body)
    }

    pub fn body_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
