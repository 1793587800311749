use crate::config::CaptionSection;

/// Fixed caption carried on every post: headline, attribution line, and a
/// hashtag row.
#[derive(Debug, Clone)]
pub struct CaptionTemplate {
    headline: String,
    attribution: String,
    hashtags: Vec<String>,
}

impl CaptionTemplate {
    pub fn new(section: &CaptionSection) -> Self {
        Self {
            headline: section.headline.clone(),
            attribution: section.attribution.clone(),
            hashtags: section.hashtags.clone(),
        }
    }

    pub fn render(&self) -> String {
        let tags = self
            .hashtags
            .iter()
            .map(|tag| format!("#{}", tag.trim_start_matches('#')))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n\n{}\n{}", self.headline, self.attribution, tags)
    }
}
