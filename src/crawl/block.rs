//! Heuristic block detection for fetched pages.
//!
//! False negatives are tolerated: a block page that slips through has no
//! payload and ends the target's pagination anyway.

use scraper::{Html, Selector};

use super::site::SiteProfile;

/// Text of the page's `<title>`, if any.
pub fn page_title(html: &str) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    Html::parse_document(html)
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Classifies a fetched page as blocked or usable.
#[derive(Debug, Clone)]
pub struct BlockDetector {
    title_markers: Vec<String>,
    content_markers: Vec<String>,
}

impl BlockDetector {
    pub fn new(title_markers: &[String], content_markers: &[String]) -> Self {
        let lower = |markers: &[String]| {
            markers
                .iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect()
        };
        Self {
            title_markers: lower(title_markers),
            content_markers: lower(content_markers),
        }
    }

    pub fn from_profile(site: &SiteProfile) -> Self {
        Self::new(&site.block_title_markers, &site.block_content_markers)
    }

    /// Returns the marker that matched, if any.
    pub fn matched_marker(&self, title: &str, content: &str) -> Option<&str> {
        let title = title.to_lowercase();
        if let Some(m) = self.title_markers.iter().find(|m| title.contains(m.as_str())) {
            return Some(m);
        }
        if self.content_markers.is_empty() {
            return None;
        }
        let content = content.to_lowercase();
        self.content_markers
            .iter()
            .find(|m| content.contains(m.as_str()))
            .map(|m| m.as_str())
    }

    pub fn is_blocked(&self, title: &str, content: &str) -> bool {
        self.matched_marker(title, content).is_some()
    }
}

impl Default for BlockDetector {
    fn default() -> Self {
        Self::from_profile(&SiteProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_markers_case_insensitive() {
        let detector = BlockDetector::default();
        assert!(detector.is_blocked("Access to this page has been DENIED", ""));
        assert!(detector.is_blocked("Captcha check", ""));
        assert!(!detector.is_blocked("75071 Real Estate - 312 Homes For Sale", ""));
    }

    #[test]
    fn test_content_markers_only_when_configured() {
        let default = BlockDetector::default();
        assert!(!default.is_blocked("Homes", "<div id=\"px-captcha\"></div>"));

        let strict = BlockDetector::new(&["denied".into()], &["px-captcha".into()]);
        assert_eq!(
            strict.matched_marker("Homes", "<div id=\"PX-CAPTCHA\"></div>"),
            Some("px-captcha")
        );
    }

    #[test]
    fn test_page_title() {
        assert_eq!(
            page_title("<html><head><title> Access Denied </title></head></html>"),
            "Access Denied"
        );
        assert_eq!(page_title("<html></html>"), "");
    }

    #[test]
    fn test_blank_markers_ignored() {
        let detector = BlockDetector::new(&[String::new()], &[]);
        assert!(!detector.is_blocked("anything", "anything"));
    }
}
