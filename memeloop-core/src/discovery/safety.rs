use regex::Regex;

use crate::config::SafetySection;

/// Substring checks that exclude likely-unsafe or low-quality candidates
/// before random selection: watermark/logo/avatar/video markers are banned,
/// and a high-resolution path marker is required.
#[derive(Debug, Clone)]
pub struct SafetyFilter {
    blocked_markers: Vec<String>,
    hires_markers: Vec<String>,
    image_suffix: Regex,
}

impl SafetyFilter {
    pub fn new(config: &SafetySection) -> Self {
        Self {
            blocked_markers: config
                .blocked_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            hires_markers: config
                .hires_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            image_suffix: Regex::new(r"(?i)\.(jpg|jpeg|png)$").expect("valid regex"),
        }
    }

    /// Extraction-time check: only plain image URLs are worth accumulating.
    pub fn is_image_url(&self, url: &str) -> bool {
        !url.is_empty() && self.image_suffix.is_match(url)
    }

    pub fn is_safe(&self, url: &str) -> bool {
        let haystack = url.to_lowercase();
        if self
            .blocked_markers
            .iter()
            .any(|marker| haystack.contains(marker))
        {
            return false;
        }
        self.hires_markers
            .iter()
            .any(|marker| haystack.contains(marker))
    }
}
