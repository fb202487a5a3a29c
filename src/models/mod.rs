/// Per-response details the access log picks up from response extensions.
#[derive(Clone)]
pub struct AccessLogMeta {
    pub upload: String,
    pub error: Option<String>,
}
