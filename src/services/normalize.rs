use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::models::{MediaAsset, NormalizedTitle, Subtitle, SubtitleRow, TitleRecord};

static MANIFEST_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.m3u8(\?|$)").expect("manifest regex should compile"));

/// Joins a title row with its newest media asset and its subtitles
pub fn normalize_title(
    record: &TitleRecord,
    media: Option<&MediaAsset>,
    subtitles: &[SubtitleRow],
    allow_4k: bool,
) -> NormalizedTitle {
    let hero_youtube = first_youtube(&[record.hero_youtube.as_deref()]);
    let trailer_youtube = first_youtube(&[
        record.trailer_youtube.as_deref(),
        record.trailer_image_url.as_deref(),
        record.hero_youtube.as_deref(),
    ]);
    let trailer_image = record
        .trailer_image_url
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !is_probably_youtube(v))
        .unwrap_or_default()
        .to_string();

    let hero_image_url = trimmed(record.hero_image_url.as_deref());
    let thumb = trimmed(record.thumb_url.as_deref());
    let hero_image = [&hero_youtube, &hero_image_url, &thumb]
        .into_iter()
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default();

    let media_prefix = safe_prefix(media.and_then(|m| m.storage_prefix.as_deref()).unwrap_or(""));
    let title_prefix = safe_prefix(record.storage_prefix.as_deref().unwrap_or(""));
    let prefix = if media_prefix.is_empty() {
        &title_prefix
    } else {
        &media_prefix
    };

    let master_key = resolve_storage_key(media.and_then(|m| m.hls_master_url.as_deref()), prefix);
    let hd_key = resolve_storage_key(media.and_then(|m| m.hls_master_hd_url.as_deref()), prefix);
    let picked = pick_hls_key(&master_key, &hd_key, allow_4k).to_string();

    let duration_sec = record
        .duration_sec
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);

    let storage_prefix = non_empty(record.storage_prefix.as_deref())
        .or_else(|| Some(prefix.clone()).filter(|p| !p.is_empty()));

    NormalizedTitle {
        id: record.display_id(),
        public_id: non_empty(record.public_id.as_deref()),
        db_id: record.id.trim().to_string(),
        media_type: record.media_type.clone(),
        imdb_id: non_empty(record.imdb_id.as_deref()),
        tmdb_id: non_empty(record.tmdb_id.as_deref()),
        series_id: non_empty(record.series_id.as_deref()),
        is_series: record.is_series,
        storage_prefix,
        storage_prefix_base: non_empty(record.storage_prefix_base.as_deref()),
        status: non_empty(record.status.as_deref()),
        created_at: record.created_at,

        title: record.title.clone(),
        year: record.year,
        maturity: trimmed(record.maturity.as_deref()),
        duration: trimmed(record.duration_label.as_deref()),
        duration_sec,
        synopsis: record.synopsis.clone().unwrap_or_default(),

        hero_image,
        hero_youtube,
        banner_image: if hero_image_url.is_empty() {
            thumb.clone()
        } else {
            hero_image_url
        },
        thumb,
        trailer_youtube,
        trailer_image,
        hero_preview_url: trimmed(record.hero_preview_url.as_deref()),
        hero_preview_poster_url: trimmed(record.hero_preview_poster_url.as_deref()),

        hls_master_key: picked,
        hls_master_4k_key: master_key,
        hls_master_hd_key: hd_key,
        has_4k: media.is_some_and(|m| m.has_4k),
        subtitles: subtitles.iter().map(Subtitle::from).collect(),

        categories: record.categories.clone(),
        tags: record.tags.clone(),
        cast: record.cast_names.clone(),
        director: record.director.clone().unwrap_or_default(),
        creators: record.creators.clone(),

        in_cinema: record.in_cinema,
        release_at: record.release_at,
    }
}

/// `\media\show\` -> `media/show/`; empty stays empty
pub fn safe_prefix(prefix: &str) -> String {
    let value = prefix.trim().replace('\\', "/");
    let value = value.trim_start_matches('/');
    if value.is_empty() {
        return String::new();
    }
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}

/// Turns a stored manifest reference into a storage key
///
/// URLs become their decoded path, values that already look like a key
/// to a manifest are kept, anything else is joined under `prefix`.
pub fn resolve_storage_key(value: Option<&str>, prefix: &str) -> String {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return String::new();
    }

    if is_http_url(value) {
        return url_to_key(value).unwrap_or_default();
    }

    if value.contains('/') && MANIFEST_REGEX.is_match(value) {
        return value.trim_start_matches('/').replace('\\', "/");
    }

    let prefix = safe_prefix(prefix);
    if prefix.is_empty() {
        value.to_string()
    } else {
        format!("{}{}", prefix, value.trim_start_matches('/'))
    }
}

/// Master when 4K is allowed, HD otherwise; each falls back to the other
pub fn pick_hls_key<'a>(master_key: &'a str, hd_key: &'a str, allow_4k: bool) -> &'a str {
    let (first, second) = if allow_4k {
        (master_key, hd_key)
    } else {
        (hd_key, master_key)
    };
    if first.is_empty() {
        second
    } else {
        first
    }
}

/// `yt:` ids and youtube.com / youtu.be links
pub fn is_probably_youtube(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return false;
    }
    value.starts_with("yt:") || value.contains("youtube.com") || value.contains("youtu.be")
}

fn first_youtube(candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .find(|c| is_probably_youtube(c))
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn url_to_key(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let decoded = urlencoding::decode(parsed.path()).ok()?;
    Some(decoded.trim_start_matches('/').to_string())
}

fn trimmed(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn record() -> TitleRecord {
        TitleRecord {
            id: "0b6f2b8e-3c1a-4d7e-9f10-2a3b4c5d6e7f".to_string(),
            public_id: Some("ep-05753222-s01e02".to_string()),
            imdb_id: Some("tt5753222".to_string()),
            media_type: Some(MediaType::Tv),
            storage_prefix: Some("/series/dark/temporada 1/episodio 2".to_string()),
            title: "Dark".to_string(),
            maturity: Some("16".to_string()),
            duration_sec: Some(-3.0),
            hero_youtube: Some("https://youtu.be/abc".to_string()),
            trailer_image_url: Some("yt:xyz".to_string()),
            thumb_url: Some(" https://img/thumb.jpg ".to_string()),
            status: Some("published".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_safe_prefix() {
        assert_eq!(safe_prefix("\\media\\dark"), "media/dark/");
        assert_eq!(safe_prefix("//media/dark/"), "media/dark/");
        assert_eq!(safe_prefix("  "), "");
    }

    #[test]
    fn test_resolve_storage_key_from_url() {
        assert_eq!(
            resolve_storage_key(
                Some("https://cdn.example.com/series/Dark%20S1/master.m3u8?token=1"),
                "ignored/"
            ),
            "series/Dark S1/master.m3u8"
        );
    }

    #[test]
    fn test_resolve_storage_key_keeps_keys_and_joins_names() {
        assert_eq!(
            resolve_storage_key(Some("/series/dark/master.m3u8"), "other/"),
            "series/dark/master.m3u8"
        );
        assert_eq!(
            resolve_storage_key(Some("master.m3u8"), "series/dark"),
            "series/dark/master.m3u8"
        );
        assert_eq!(resolve_storage_key(Some("master.m3u8"), ""), "master.m3u8");
        assert_eq!(resolve_storage_key(None, "series/dark"), "");
    }

    #[test]
    fn test_pick_hls_key() {
        assert_eq!(pick_hls_key("4k.m3u8", "hd.m3u8", true), "4k.m3u8");
        assert_eq!(pick_hls_key("4k.m3u8", "hd.m3u8", false), "hd.m3u8");
        assert_eq!(pick_hls_key("", "hd.m3u8", true), "hd.m3u8");
        assert_eq!(pick_hls_key("4k.m3u8", "", false), "4k.m3u8");
    }

    #[test]
    fn test_youtube_detection() {
        assert!(is_probably_youtube("yt:dQw4w9WgXcQ"));
        assert!(is_probably_youtube("https://www.YouTube.com/watch?v=1"));
        assert!(is_probably_youtube("https://youtu.be/1"));
        assert!(!is_probably_youtube("https://img.example.com/a.jpg"));
        assert!(!is_probably_youtube(""));
    }

    #[test]
    fn test_normalize_title_presentation_fields() {
        let title = normalize_title(&record(), None, &[], true);

        assert_eq!(title.id, "ep-05753222-s01e02");
        assert_eq!(title.db_id, "0b6f2b8e-3c1a-4d7e-9f10-2a3b4c5d6e7f");
        assert_eq!(title.hero_youtube, "https://youtu.be/abc");
        assert_eq!(title.hero_image, "https://youtu.be/abc");
        assert_eq!(title.trailer_youtube, "yt:xyz");
        assert_eq!(title.trailer_image, "");
        assert_eq!(title.banner_image, "https://img/thumb.jpg");
        assert_eq!(title.duration_sec, 0.0);
        assert_eq!(title.maturity, "16");
        assert_eq!(title.hls_master_key, "");
        assert!(!title.has_4k);
    }

    #[test]
    fn test_hero_and_banner_fall_back_to_images() {
        let with_hero = TitleRecord {
            hero_youtube: None,
            hero_image_url: Some("https://img/hero.jpg".to_string()),
            ..record()
        };
        let title = normalize_title(&with_hero, None, &[], true);
        assert_eq!(title.hero_image, "https://img/hero.jpg");
        assert_eq!(title.banner_image, "https://img/hero.jpg");
        assert_eq!(title.thumb, "https://img/thumb.jpg");

        let thumb_only = TitleRecord {
            hero_youtube: None,
            ..record()
        };
        let title = normalize_title(&thumb_only, None, &[], true);
        assert_eq!(title.hero_image, "https://img/thumb.jpg");
        assert_eq!(title.hero_youtube, "");
    }

    #[test]
    fn test_normalize_title_joins_media_and_subtitles() {
        let media = MediaAsset {
            title_id: "0b6f2b8e-3c1a-4d7e-9f10-2a3b4c5d6e7f".to_string(),
            hls_master_url: Some("master.m3u8".to_string()),
            hls_master_hd_url: Some("hd/master.m3u8".to_string()),
            storage_prefix: Some("media/dark-s1e2".to_string()),
            has_4k: true,
            created_at: None,
        };
        let subtitles = vec![SubtitleRow {
            title_id: media.title_id.clone(),
            label: "Português".to_string(),
            lang: "pt-BR".to_string(),
            src: "subs/pt.vtt".to_string(),
            is_default: true,
        }];

        let uhd = normalize_title(&record(), Some(&media), &subtitles, true);
        assert_eq!(uhd.hls_master_4k_key, "media/dark-s1e2/master.m3u8");
        assert_eq!(uhd.hls_master_hd_key, "hd/master.m3u8");
        assert_eq!(uhd.hls_master_key, "media/dark-s1e2/master.m3u8");
        assert!(uhd.has_4k);
        assert_eq!(uhd.subtitles.len(), 1);
        assert!(uhd.subtitles[0].default);

        let hd = normalize_title(&record(), Some(&media), &subtitles, false);
        assert_eq!(hd.hls_master_key, "hd/master.m3u8");
        assert_eq!(
            hd.storage_prefix.as_deref(),
            Some("/series/dark/temporada 1/episodio 2")
        );
    }
}
