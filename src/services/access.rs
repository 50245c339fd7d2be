use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{CatalogCard, ResumeEntry};

/// Maturity assumed when a title or profile does not state one
const DEFAULT_MATURITY: f64 = 18.0;

/// What an access decision needs to know about a title
pub trait TitleView {
    fn display_id(&self) -> &str;
    fn maturity_rating(&self) -> Option<&str>;
    fn genres(&self) -> &[String];
}

impl TitleView for CatalogCard {
    fn display_id(&self) -> &str {
        self.id()
    }

    fn maturity_rating(&self) -> Option<&str> {
        Some(self.title.maturity.as_str())
    }

    fn genres(&self) -> &[String] {
        self.categories()
    }
}

impl TitleView for ResumeEntry {
    fn display_id(&self) -> &str {
        &self.id
    }

    fn maturity_rating(&self) -> Option<&str> {
        self.maturity.as_deref()
    }

    fn genres(&self) -> &[String] {
        &self.categories
    }
}

/// Why a title was hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDenial {
    BlockedTitle,
    Maturity,
    KidsGenre,
    Genre,
}

/// Allow/deny decision applied before anything is aggregated or distributed
pub trait AccessPolicy: Send + Sync {
    fn check(&self, title: &dyn TitleView) -> Result<(), AccessDenial>;

    fn allows(&self, title: &dyn TitleView) -> bool {
        self.check(title).is_ok()
    }
}

/// No profile selected: everything is visible
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn check(&self, _title: &dyn TitleView) -> Result<(), AccessDenial> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenrePolicy {
    #[default]
    Allow,
    Block,
}

/// Restrictions of the active profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePolicy {
    #[serde(default)]
    pub is_kids: bool,
    #[serde(default)]
    pub maturity_limit: Option<i32>,
    /// Only enforced on kids profiles; empty means no genre restriction
    #[serde(default)]
    pub kids_allowed_genres: Vec<String>,
    #[serde(default)]
    pub genre_policy: GenrePolicy,
    #[serde(default)]
    pub allowed_genres: Vec<String>,
    #[serde(default)]
    pub blocked_public_ids: Vec<String>,
}

fn lower_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn title_genres(title: &dyn TitleView) -> Vec<String> {
    title
        .genres()
        .iter()
        .map(|g| g.trim().to_lowercase())
        .filter(|g| !g.is_empty())
        .collect()
}

/// Parsed maturity; an absent rating means adult, an empty one means unrated
///
/// Ratings that are not numbers are not compared.
fn title_maturity(title: &dyn TitleView) -> Option<f64> {
    match title.maturity_rating().map(str::trim) {
        None => Some(DEFAULT_MATURITY),
        Some("") => Some(0.0),
        Some(raw) => raw.parse::<f64>().ok().filter(|m| m.is_finite()),
    }
}

impl ProfilePolicy {
    fn is_blocked(&self, title: &dyn TitleView) -> bool {
        let id = title.display_id().trim();
        !id.is_empty() && self.blocked_public_ids.iter().any(|b| b.trim() == id)
    }

    fn kids_genre_allowed(&self, title: &dyn TitleView) -> bool {
        if !self.is_kids {
            return true;
        }
        let allowed = lower_set(&self.kids_allowed_genres);
        if allowed.is_empty() {
            return true;
        }
        let genres = title_genres(title);
        !genres.is_empty() && genres.iter().any(|g| allowed.contains(g))
    }

    fn genre_allowed(&self, title: &dyn TitleView) -> bool {
        let listed = lower_set(&self.allowed_genres);
        if listed.is_empty() {
            return true;
        }
        let any = title_genres(title).iter().any(|g| listed.contains(g));
        match self.genre_policy {
            GenrePolicy::Allow => any,
            GenrePolicy::Block => !any,
        }
    }
}

impl AccessPolicy for ProfilePolicy {
    fn check(&self, title: &dyn TitleView) -> Result<(), AccessDenial> {
        if self.is_blocked(title) {
            return Err(AccessDenial::BlockedTitle);
        }

        let limit = self.maturity_limit.map(f64::from).unwrap_or(DEFAULT_MATURITY);
        if title_maturity(title).is_some_and(|m| m > limit) {
            return Err(AccessDenial::Maturity);
        }

        if !self.kids_genre_allowed(title) {
            return Err(AccessDenial::KidsGenre);
        }

        if !self.genre_allowed(title) {
            return Err(AccessDenial::Genre);
        }

        Ok(())
    }
}

/// The profile's rules, or no restriction without a profile
pub fn policy_for(profile: Option<ProfilePolicy>) -> Box<dyn AccessPolicy> {
    match profile {
        Some(profile) => Box::new(profile),
        None => Box::new(AllowAll),
    }
}

/// Keeps the items `policy` allows, in order
pub fn filter_allowed<T: TitleView>(items: Vec<T>, policy: &dyn AccessPolicy) -> Vec<T> {
    let before = items.len();
    let allowed: Vec<T> = items.into_iter().filter(|item| policy.allows(item)).collect();

    if allowed.len() != before {
        tracing::debug!(hidden = before - allowed.len(), "Filtered titles by access policy");
    }

    allowed
}

/// First card per display id wins
pub fn dedup_by_display_id(cards: Vec<CatalogCard>) -> Vec<CatalogCard> {
    let mut seen = HashSet::new();
    cards
        .into_iter()
        .filter(|card| {
            let id = card.id().trim();
            id.is_empty() || seen.insert(id.to_string())
        })
        .collect()
}
