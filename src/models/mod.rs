use serde::{Deserialize, Serialize};

mod catalog;
mod resume;
mod title;

pub use catalog::{CatalogCard, HomeRow};
pub use resume::ResumeEntry;
pub use title::{
    MediaAsset, MediaType, NormalizedTitle, Subtitle, SubtitleRow, TitleRecord,
};

/// Options shared by catalog reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOptions {
    /// Pick the 4K manifest when the profile's plan allows it
    #[serde(default = "default_allow_4k")]
    pub allow_4k: bool,
    /// Also read draft titles announced for cinema release
    #[serde(default)]
    pub include_draft_calendar: bool,
}

fn default_allow_4k() -> bool {
    true
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            allow_4k: true,
            include_draft_calendar: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_options_defaults() {
        let options: FetchOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, FetchOptions::default());
        assert!(options.allow_4k);
        assert!(!options.include_draft_calendar);
    }

    #[test]
    fn test_resume_entry_lookup_id() {
        let entry = ResumeEntry {
            id: "9b2f1c1e".to_string(),
            public_id: Some("ep-00012345-s01e02".to_string()),
            ..Default::default()
        };
        assert_eq!(entry.lookup_id(), "ep-00012345-s01e02");

        let bare = ResumeEntry {
            id: " mv-00000042 ".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.lookup_id(), "mv-00000042");
        assert_eq!(bare.updated_at_ms(), 0);
    }
}
