//! `multipart/form-data` body encoder.
//!
//! Providers reject bodies that deviate from the grammar, so parts are
//! written byte-for-byte: `--{boundary}` CRLF, headers, blank line, payload,
//! CRLF; the body ends with `--{boundary}--` CRLF.

use rand::Rng;
use rand::distributions::Alphanumeric;

const CRLF: &[u8] = b"\r\n";

pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartBody {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buf: Vec::new(),
        }
    }

    pub fn with_random_boundary() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::new(format!("----ReactShareBoundary{suffix}"))
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn text(&mut self, name: &str, value: &str) -> &mut Self {
        self.open_part();
        self.push_line(&format!(
            "Content-Disposition: form-data; name=\"{}\"",
            escape(name)
        ));
        self.buf.extend_from_slice(CRLF);
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(CRLF);
        self
    }

    pub fn file(
        &mut self,
        name: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> &mut Self {
        self.open_part();
        self.push_line(&format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            escape(name),
            escape(file_name)
        ));
        self.push_line(&format!("Content-Type: {content_type}"));
        self.buf.extend_from_slice(CRLF);
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(CRLF);
        self
    }

    /// Close the body and return its bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(CRLF);
        self.buf
    }

    fn open_part(&mut self) {
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(CRLF);
    }

    fn push_line(&mut self, line: &str) {
        self.buf.extend_from_slice(line.as_bytes());
        self.buf.extend_from_slice(CRLF);
    }
}

// Quoted header parameters cannot carry quotes or line breaks.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_fields_and_file_exactly() {
        let mut body = MultipartBody::new("XyZ");
        body.text("title", "Hello")
            .file("video", "take.mp4", "video/mp4", b"\x00\x01bin");

        let expected: &[u8] = b"--XyZ\r\n\
Content-Disposition: form-data; name=\"title\"\r\n\
\r\n\
Hello\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"video\"; filename=\"take.mp4\"\r\n\
Content-Type: video/mp4\r\n\
\r\n\
\x00\x01bin\r\n\
--XyZ--\r\n";

        assert_eq!(body.content_type(), "multipart/form-data; boundary=XyZ");
        assert_eq!(body.finish(), expected);
    }

    #[test]
    fn empty_body_is_only_the_close_delimiter() {
        assert_eq!(MultipartBody::new("b").finish(), b"--b--\r\n");
    }

    #[test]
    fn header_parameters_are_escaped() {
        let mut body = MultipartBody::new("b");
        body.file("video", "evil\"\r\nX-Injected: 1.mp4", "video/mp4", b"");
        let text = String::from_utf8(body.finish()).unwrap();

        assert!(text.contains("filename=\"evil%22%0D%0AX-Injected: 1.mp4\""));
        assert_eq!(text.matches("\r\n").count(), 6);
    }

    #[test]
    fn random_boundaries_differ() {
        let a = MultipartBody::with_random_boundary();
        let b = MultipartBody::with_random_boundary();
        assert_ne!(a.boundary(), b.boundary());
        assert!(a.boundary().starts_with("----ReactShareBoundary"));
    }
}
