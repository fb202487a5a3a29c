use axum::http::HeaderMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::SocketAddr;
use std::path::Path;

const HEADER_X_FORWARDED_FOR: &str = "x-forwarded-for";
const HEADER_X_REAL_IP: &str = "x-real-ip";

static SAFE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,8}$").unwrap());

/// Client IP for logging.
///
/// Order of preference:
/// 1. `X-Forwarded-For` (first entry)
/// 2. `X-Real-IP`
/// 3. the TCP peer address
pub fn get_client_ip(headers: &HeaderMap, addr: Option<SocketAddr>) -> String {
    if let Some(xff) = headers.get(HEADER_X_FORWARDED_FOR) {
        if let Ok(xff_str) = xff.to_str() {
            let raw_ip = xff_str.split(',').next().unwrap_or(xff_str).trim();
            return clean_ip(raw_ip);
        }
    }

    if let Some(xri) = headers.get(HEADER_X_REAL_IP) {
        if let Ok(xri_str) = xri.to_str() {
            return clean_ip(xri_str.trim());
        }
    }

    if let Some(addr) = addr {
        return clean_ip(&addr.ip().to_string());
    }

    "unknown".to_string()
}

// Strip the IPv4-mapped IPv6 prefix.
fn clean_ip(ip: &str) -> String {
    if let Some(ipv4) = ip.strip_prefix("::ffff:") {
        ipv4.to_string()
    } else {
        ip.to_string()
    }
}

/// Lower-cased extension of a client-supplied file name, if it is short and
/// plain alphanumeric. The client name itself never reaches the filesystem.
pub fn sanitize_extension(file_name: &str) -> Option<String> {
    // Windows clients may send full paths.
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let ext = Path::new(base).extension()?.to_str()?;
    if SAFE_EXTENSION.is_match(ext) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

/// Value for `Content-Disposition` that keeps quotes and control bytes out of the header.
pub fn attachment_disposition(download_name: &str) -> String {
    let safe: String = download_name
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    let safe = if safe.trim().is_empty() {
        "output.mp4".to_string()
    } else {
        safe
    };
    format!("attachment; filename=\"{}\"", safe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HEADER_X_FORWARDED_FOR,
            HeaderValue::from_static("10.0.0.1, 10.0.0.2"),
        );
        headers.insert(HEADER_X_REAL_IP, HeaderValue::from_static("10.0.0.9"));
        assert_eq!(get_client_ip(&headers, None), "10.0.0.1");
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        let addr: SocketAddr = "[::ffff:192.168.1.5]:4000".parse().unwrap();
        assert_eq!(get_client_ip(&HeaderMap::new(), Some(addr)), "192.168.1.5");
        assert_eq!(get_client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_sanitize_extension() {
        assert_eq!(sanitize_extension("song.MP3"), Some("mp3".to_string()));
        assert_eq!(sanitize_extension("C:\\music\\take.flac"), Some("flac".to_string()));
        assert_eq!(sanitize_extension("../../etc/passwd"), None);
        assert_eq!(sanitize_extension("noext"), None);
        assert_eq!(sanitize_extension("weird.m p3"), None);
        assert_eq!(sanitize_extension("x.verylongextension"), None);
    }

    #[test]
    fn test_attachment_disposition() {
        assert_eq!(
            attachment_disposition("output.mp4"),
            "attachment; filename=\"output.mp4\""
        );
        assert_eq!(
            attachment_disposition("a\"b\r\n.mp4"),
            "attachment; filename=\"ab.mp4\""
        );
        assert_eq!(
            attachment_disposition("\"\""),
            "attachment; filename=\"output.mp4\""
        );
    }
}
