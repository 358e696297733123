//! Turns backend-relative resource references into fetchable absolute ones.

const ABSOLUTE_PREFIXES: [&str; 6] = ["http://", "https://", "ws://", "wss://", "data:", "blob:"];

const STREAM_PATH: &str = "ws/process";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    base: String,
}

impl UrlResolver {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Backend base address without a trailing separator.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Absolute references come back untouched, the empty string stays empty,
    /// anything else is joined onto the base with exactly one `/`.
    pub fn absolutize(&self, reference: &str) -> String {
        if reference.is_empty() || is_absolute(reference) {
            return reference.to_string();
        }
        format!("{}/{}", self.base, reference.trim_start_matches('/'))
    }

    /// HTTP endpoint on the backend, e.g. `endpoint("start-job")`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Streaming URL for a job: same host, `http(s)` swapped for `ws(s)`.
    pub fn stream_url(&self, job_id: &str) -> String {
        let ws_base = if let Some(rest) = self.base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.base.clone()
        };
        format!(
            "{ws_base}/{STREAM_PATH}?job_id={}",
            urlencoding::encode(job_id)
        )
    }
}

fn is_absolute(reference: &str) -> bool {
    let lowered = reference.to_ascii_lowercase();
    ABSOLUTE_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_relative_reference_with_single_separator() {
        let resolver = UrlResolver::new("http://h:8000/");
        assert_eq!(resolver.absolutize("/charts/a.png"), "http://h:8000/charts/a.png");
        assert_eq!(resolver.absolutize("charts/a.png"), "http://h:8000/charts/a.png");

        let no_slash = UrlResolver::new("http://h:8000");
        assert_eq!(no_slash.absolutize("/charts/a.png"), "http://h:8000/charts/a.png");
        assert_eq!(no_slash.absolutize("charts/a.png"), "http://h:8000/charts/a.png");
    }

    #[test]
    fn leaves_absolute_and_empty_references_alone() {
        let resolver = UrlResolver::new("http://h:8000/");
        assert_eq!(resolver.absolutize("http://x/y"), "http://x/y");
        assert_eq!(resolver.absolutize("HTTPS://x/y"), "HTTPS://x/y");
        assert_eq!(
            resolver.absolutize("data:image/jpeg;base64,AAAA"),
            "data:image/jpeg;base64,AAAA"
        );
        assert_eq!(resolver.absolutize(""), "");
    }

    #[test]
    fn stream_url_swaps_scheme_and_encodes_job_id() {
        let resolver = UrlResolver::new("http://localhost:8000/");
        assert_eq!(
            resolver.stream_url("abc-123"),
            "ws://localhost:8000/ws/process?job_id=abc-123"
        );

        let secure = UrlResolver::new("https://api.example.com");
        assert_eq!(
            secure.stream_url("a b"),
            "wss://api.example.com/ws/process?job_id=a%20b"
        );
    }

    #[test]
    fn endpoint_joins_paths() {
        let resolver = UrlResolver::new("http://h:8000/");
        assert_eq!(resolver.endpoint("/start-job"), "http://h:8000/start-job");
        assert_eq!(resolver.endpoint("start-job"), "http://h:8000/start-job");
    }
}
