//! Shared User-Agent and locale defaults for both fetch strategies.
//!
//! Both strategies present as a desktop browser unless the site configuration
//! says otherwise.

/// Desktop Chrome User-Agent used when the configuration does not set one.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Default `Accept-Language` for the browser session.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en;q=0.8";

/// Default User-Agent for light-client requests.
#[must_use]
pub(crate) fn default_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}

/// Primary locale tag from an `Accept-Language` value (`"ru-RU,ru;q=0.9"` → `"ru-RU"`).
#[must_use]
pub(crate) fn primary_locale(accept_language: &str) -> &str {
    accept_language
        .split(',')
        .next()
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
        .filter(|tag| !tag.is_empty())
        .unwrap_or("en-US")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_user_agent_looks_like_browser() {
        let ua = default_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"), "unexpected UA: {ua}");
        assert!(ua.contains("Chrome/"), "unexpected UA: {ua}");
    }

    #[test]
    fn test_primary_locale_takes_first_tag() {
        assert_eq!(primary_locale(DEFAULT_ACCEPT_LANGUAGE), "ru-RU");
        assert_eq!(primary_locale("de-DE;q=1.0, en;q=0.5"), "de-DE");
    }

    #[test]
    fn test_primary_locale_falls_back_on_empty() {
        assert_eq!(primary_locale(""), "en-US");
        assert_eq!(primary_locale(" , en"), "en-US");
    }
}
