use std::{cmp::Reverse, collections::HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{MediaType, ResumeEntry};

use super::identifiers::parse_episode_public_id;

static DASHED_EPISODE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[•\-–—]\s*T\d+\s*E\d+\s*$").expect("episode suffix regex should compile")
});

static PARENTHESIZED_EPISODE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*\(\s*T\d+\s*E\d+\s*\)\s*$").expect("episode suffix regex should compile")
});

/// `"Dark • T1E02"` -> `"Dark"`
pub fn strip_episode_suffix(title: &str) -> String {
    let title = title.trim();
    let title = DASHED_EPISODE_SUFFIX.replace(title, "");
    let title = PARENTHESIZED_EPISODE_SUFFIX.replace(title.trim(), "");
    title.trim().to_string()
}

/// Rewrites an episode entry into the card of its show
fn into_series_entry(mut entry: ResumeEntry, series_id: String, imdb_id: Option<String>) -> ResumeEntry {
    entry.resume_episode_public_id = Some(entry.lookup_id().to_string());
    entry.public_id = Some(series_id.clone());
    entry.id = series_id;
    entry.series_card = true;
    entry.series_imdb_id = imdb_id;
    entry.media_type = Some(MediaType::Tv);
    // The season/episode chip is derived from the storage path.
    entry.storage_prefix = None;
    entry.title = strip_episode_suffix(&entry.title);
    entry
}

/// Collapses resume entries so each show appears once
///
/// Entries whose id is an episode slug are grouped by show and the most
/// recently updated one stands in for the group; on equal timestamps the
/// later entry wins. Everything else passes through. The result is sorted
/// newest first.
pub fn collapse_continue_watching(entries: Vec<ResumeEntry>) -> Vec<ResumeEntry> {
    let input_len = entries.len();
    let mut out = Vec::with_capacity(input_len);
    let mut order: Vec<String> = Vec::new();
    let mut by_series: HashMap<String, ResumeEntry> = HashMap::new();

    for entry in entries {
        let Some(episode) = parse_episode_public_id(entry.lookup_id()) else {
            out.push(entry);
            continue;
        };

        let series_id = episode.series_public_id();
        let newer = by_series
            .get(&series_id)
            .map_or(true, |current| entry.updated_at_ms() >= current.updated_at_ms());

        if newer {
            if !by_series.contains_key(&series_id) {
                order.push(series_id.clone());
            }
            let card = into_series_entry(entry, series_id.clone(), episode.series_imdb_id());
            by_series.insert(series_id, card);
        }
    }

    out.extend(order.iter().filter_map(|id| by_series.remove(id)));
    out.sort_by_key(|entry| Reverse(entry.updated_at_ms()));

    tracing::debug!(
        entries = input_len,
        collapsed = out.len(),
        "Collapsed continue watching"
    );

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn entry(id: &str, title: &str, month: u32) -> ResumeEntry {
        ResumeEntry {
            id: id.to_string(),
            public_id: Some(id.to_string()),
            title: title.to_string(),
            updated_at: Some(Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()),
            media_type: Some(MediaType::Tv),
            storage_prefix: Some("series/x/temporada 1/episodio 1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_strip_episode_suffix() {
        assert_eq!(strip_episode_suffix("Dark • T1E02"), "Dark");
        assert_eq!(strip_episode_suffix("Dark - t1 e2 "), "Dark");
        assert_eq!(strip_episode_suffix("Dark — T10E12"), "Dark");
        assert_eq!(strip_episode_suffix("Dark (T1E02)"), "Dark");
        assert_eq!(strip_episode_suffix("Spider-Man"), "Spider-Man");
        assert_eq!(strip_episode_suffix("  "), "");
    }

    #[test]
    fn test_latest_episode_represents_show() {
        let entries = vec![
            entry("ep-00012345-s01e01", "Show • T1E01", 1),
            entry("ep-00012345-s01e02", "Show • T1E02", 2),
        ];

        let out = collapse_continue_watching(entries);
        assert_eq!(out.len(), 1);

        let card = &out[0];
        assert_eq!(card.id, "sr-00012345");
        assert_eq!(card.public_id.as_deref(), Some("sr-00012345"));
        assert_eq!(
            card.resume_episode_public_id.as_deref(),
            Some("ep-00012345-s01e02")
        );
        assert_eq!(card.series_imdb_id.as_deref(), Some("tt12345"));
        assert_eq!(card.title, "Show");
        assert_eq!(card.media_type, Some(MediaType::Tv));
        assert_eq!(card.storage_prefix, None);
        assert!(card.series_card);
    }

    #[test]
    fn test_latest_wins_regardless_of_order() {
        let entries = vec![
            entry("ep-00012345-s01e02", "Show", 2),
            entry("ep-00012345-s01e01", "Show", 1),
        ];

        let out = collapse_continue_watching(entries);
        assert_eq!(
            out[0].resume_episode_public_id.as_deref(),
            Some("ep-00012345-s01e02")
        );
    }

    #[test]
    fn test_last_seen_wins_ties() {
        let entries = vec![
            entry("ep-00012345-s01e01", "Show", 3),
            entry("ep-00012345-s02e05", "Show", 3),
        ];

        let out = collapse_continue_watching(entries);
        assert_eq!(
            out[0].resume_episode_public_id.as_deref(),
            Some("ep-00012345-s02e05")
        );
    }

    #[test]
    fn test_non_episodes_pass_through_sorted_by_recency() {
        let mut movie = entry("mv-00111161", "Um Sonho de Liberdade", 3);
        movie.media_type = Some(MediaType::Movie);
        let mut undated = entry("0b6f2b8e-3c1a-4d7e-9f10-2a3b4c5d6e7f", "Aula 1", 1);
        undated.updated_at = None;

        let entries = vec![
            undated,
            entry("ep-00000001-s01e01", "A", 1),
            movie,
            entry("ep-00000002-s01e03", "B • T1E03", 4),
        ];

        let out = collapse_continue_watching(entries);
        let ids: Vec<&str> = out.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "sr-00000002",
                "mv-00111161",
                "sr-00000001",
                "0b6f2b8e-3c1a-4d7e-9f10-2a3b4c5d6e7f"
            ]
        );
        assert_eq!(out[1].storage_prefix.as_deref(), Some("series/x/temporada 1/episodio 1"));
        assert!(!out[1].series_card);
    }

    #[test]
    fn test_episode_id_falls_back_to_display_id() {
        let mut e = entry("ep-00012345-s01e01", "Show", 1);
        e.public_id = None;
        let out = collapse_continue_watching(vec![e]);
        assert_eq!(out[0].id, "sr-00012345");
    }
}
