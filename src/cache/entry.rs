//! Cache Entry Module
//!
//! Request identity, captured responses and the synthetic placeholder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

// == Request Key ==
/// Identity of a cached request: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn get(url: &Url) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.as_str().to_string(),
        }
    }
}

// == Destination ==
/// What kind of content an intercepted request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// A full page
    Document,
    Image,
    Other,
}

impl Destination {
    /// Infers the destination from the `Accept` header, falling back to the
    /// path extension.
    pub fn infer(accept: Option<&str>, path: &str) -> Self {
        if let Some(accept) = accept {
            if accept.contains("text/html") {
                return Destination::Document;
            }
            if accept.starts_with("image/") {
                return Destination::Image;
            }
        }

        if path.is_empty() || path.ends_with('/') {
            return Destination::Document;
        }

        let extension = path
            .rsplit('/')
            .next()
            .and_then(|file| file.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("html" | "htm") => Destination::Document,
            Some("png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" | "avif") => {
                Destination::Image
            }
            _ => Destination::Other,
        }
    }
}

// == Asset Request ==
/// An outbound request seen by the cache controller.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub method: String,
    pub url: Url,
    pub destination: Destination,
    /// End-to-end request headers, forwarded on network passthrough
    pub headers: Vec<(String, String)>,
    /// Forwarded as-is on network passthrough
    pub body: Vec<u8>,
}

impl AssetRequest {
    /// A GET request whose destination is inferred from the path.
    pub fn get(url: Url) -> Self {
        let destination = Destination::infer(None, url.path());
        Self {
            method: "GET".to_string(),
            url,
            destination,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn new(method: impl Into<String>, url: Url, accept: Option<&str>) -> Self {
        let destination = Destination::infer(accept, url.path());
        Self {
            method: method.into().to_ascii_uppercase(),
            url,
            destination,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn key(&self) -> RequestKey {
        RequestKey {
            method: self.method.clone(),
            url: self.url.as_str().to_string(),
        }
    }
}

// == Cached Response ==
/// A captured response. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_body")]
    pub body: Vec<u8>,
    pub cached_at: DateTime<Utc>,
}

const PLACEHOLDER_SVG: &str = r##"<svg width="200" height="200" xmlns="http://www.w3.org/2000/svg">
<rect width="200" height="200" fill="#ddd"/>
<text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle" fill="#aaa">No Image</text>
</svg>"##;

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            cached_at: Utc::now(),
        }
    }

    /// Grey "No Image" SVG served when an image is neither cached nor
    /// reachable.
    pub fn placeholder_image() -> Self {
        Self::new(
            200,
            vec![("content-type".to_string(), "image/svg+xml".to_string())],
            PLACEHOLDER_SVG.as_bytes().to_vec(),
        )
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

mod base64_body {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_from_accept() {
        assert_eq!(
            Destination::infer(Some("text/html,application/xhtml+xml"), "/app"),
            Destination::Document
        );
        assert_eq!(
            Destination::infer(Some("image/avif,image/webp,*/*"), "/thing"),
            Destination::Image
        );
    }

    #[test]
    fn test_infer_from_path() {
        assert_eq!(Destination::infer(None, "/"), Destination::Document);
        assert_eq!(Destination::infer(None, "/index.html"), Destination::Document);
        assert_eq!(Destination::infer(None, "/icons/icon-192.PNG"), Destination::Image);
        assert_eq!(Destination::infer(None, "/app.js"), Destination::Other);
        assert_eq!(Destination::infer(Some("*/*"), "/style.css"), Destination::Other);
    }

    #[test]
    fn test_request_key_uses_method_and_url() {
        let url = Url::parse("http://localhost/app.js").unwrap();
        let get = AssetRequest::get(url.clone()).key();
        let post = AssetRequest::new("post", url.clone(), None).key();

        assert_eq!(get, RequestKey::get(&url));
        assert_ne!(get, post);
        assert_eq!(post.method, "POST");
    }

    #[test]
    fn test_placeholder_is_svg() {
        let placeholder = CachedResponse::placeholder_image();
        assert!(placeholder.is_success());
        assert_eq!(placeholder.header("Content-Type"), Some("image/svg+xml"));
        assert!(String::from_utf8(placeholder.body).unwrap().contains("No Image"));
    }

    #[test]
    fn test_body_serializes_as_base64() {
        let response = CachedResponse::new(200, Vec::new(), vec![0, 159, 146, 150]);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"AJ+Slg==\""));

        let back: CachedResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
