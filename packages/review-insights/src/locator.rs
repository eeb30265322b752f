//! Place locator checks.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::error::{Result, ReviewError};

static PLACE_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/place/([^/?]+)").expect("place pattern is valid"));

/// Short-link hosts that redirect to a place page.
const SHORT_LINK_HOSTS: &[&str] = &["maps.app.goo.gl", "goo.gl"];

/// The `/place/<id>` path segment of a map-service URL.
pub fn place_id_from_url(url: &str) -> Option<String> {
    PLACE_SEGMENT
        .captures(url)
        .map(|caps| caps[1].to_string())
}

pub fn is_short_link(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| SHORT_LINK_HOSTS.contains(&host))
}

/// Reject locators that cannot lead to a place page.
///
/// Short links are accepted as-is; they are expanded when loaded.
pub fn validate_locator(locator: &str) -> Result<Url> {
    let url = Url::parse(locator.trim())
        .map_err(|e| ReviewError::Validation(format!("invalid locator {:?}: {}", locator, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ReviewError::Validation(format!(
            "locator must be an http(s) URL, got scheme {:?}",
            url.scheme()
        )));
    }

    if !is_short_link(&url) && place_id_from_url(url.as_str()).is_none() {
        return Err(ReviewError::Validation(format!(
            "locator has no /place/ segment: {}",
            url
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_id_from_url() {
        assert_eq!(
            place_id_from_url("https://www.google.com/maps/place/Cafe+Lumiere/@25.03,121.56,17z"),
            Some("Cafe+Lumiere".to_string())
        );
        assert_eq!(
            place_id_from_url("https://www.google.com/maps/place/%E5%92%96%E5%95%A1?hl=zh-TW"),
            Some("%E5%92%96%E5%95%A1".to_string())
        );
        assert_eq!(place_id_from_url("https://www.google.com/maps/search/coffee"), None);
    }

    #[test]
    fn test_validate_locator() {
        assert!(validate_locator("https://www.google.com/maps/place/Cafe/@1,2,3z").is_ok());
        assert!(validate_locator("https://maps.app.goo.gl/AbCdEf123").is_ok());

        assert!(matches!(
            validate_locator("https://www.google.com/maps/search/coffee"),
            Err(ReviewError::Validation(_))
        ));
        assert!(matches!(
            validate_locator("ftp://example.com/place/x"),
            Err(ReviewError::Validation(_))
        ));
        assert!(matches!(
            validate_locator("not a url"),
            Err(ReviewError::Validation(_))
        ));
    }
}
