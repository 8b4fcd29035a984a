use serde::Serialize;

/// Either a raw byte body or a structured value serialized lazily, at send
/// time, to JSON.
#[derive(Debug)]
enum Body {
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

/// A response value built up with fluent setters and handed to
/// `HttpServerConnection::send`. CORS defaults to enabled for responses
/// built through the ordinary constructors (`text`/`json`/`empty`); the
/// server's own default error pages are built through `bare`, which leaves
/// CORS off, mirroring the source's two send paths.
#[derive(Debug)]
pub struct HttpResponse {
    body: Body,
    code: u16,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    cookies: Vec<(String, String)>,
    cors_enabled: bool,
}

impl HttpResponse {
    fn new(body: Body, cors_enabled: bool) -> Self {
        HttpResponse { body, code: 200, content_type: None, headers: Vec::new(), cookies: Vec::new(), cors_enabled }
    }

    pub fn text(body: impl Into<Vec<u8>>) -> Self {
        Self::new(Body::Bytes(body.into()), true)
    }

    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self::new(Body::Json(serde_json::to_value(value)?), true))
    }

    pub fn empty() -> Self {
        Self::new(Body::Bytes(Vec::new()), true)
    }

    /// Build a response the way the server's own default error pages do:
    /// CORS left off, caller-supplied body and code.
    pub fn bare(body: impl Into<Vec<u8>>, code: u16) -> Self {
        let mut r = Self::new(Body::Bytes(body.into()), false);
        r.code = code;
        r
    }

    pub fn code(mut self, code: u16) -> Self {
        self.code = code;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn set_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn set_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn enable_cors(mut self) -> Self {
        self.cors_enabled = true;
        self
    }

    pub fn disable_cors(mut self) -> Self {
        self.cors_enabled = false;
        self
    }

    pub fn response_code(&self) -> u16 {
        self.code
    }

    /// Render the body and the content type it implies. A JSON body that
    /// fails to serialize (practically unreachable for `serde_json::Value`,
    /// which is already a validated tree) falls back to an empty body.
    pub(crate) fn render(&self) -> (Vec<u8>, String) {
        match &self.body {
            Body::Bytes(b) => {
                let ct = self.content_type.clone().unwrap_or_else(|| "text/plain".to_string());
                (b.clone(), ct)
            }
            Body::Json(v) => {
                let bytes = serde_json::to_vec(v).unwrap_or_default();
                let ct = self.content_type.clone().unwrap_or_else(|| "application/json; charset=utf-8".to_string());
                (bytes, ct)
            }
        }
    }

    pub(crate) fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub(crate) fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub(crate) fn cors_enabled(&self) -> bool {
        self.cors_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_defaults_to_200_and_plain_text() {
        let r = HttpResponse::text("hi");
        assert_eq!(r.response_code(), 200);
        let (bytes, ct) = r.render();
        assert_eq!(bytes, b"hi");
        assert_eq!(ct, "text/plain");
    }

    #[test]
    fn json_sets_the_json_content_type() {
        let r = HttpResponse::json(&serde_json::json!({"a": 1})).unwrap();
        let (_, ct) = r.render();
        assert_eq!(ct, "application/json; charset=utf-8");
    }

    #[test]
    fn bare_disables_cors_by_default() {
        let r = HttpResponse::bare("oops", 500);
        assert!(!r.cors_enabled());
        assert_eq!(r.response_code(), 500);
    }
}
