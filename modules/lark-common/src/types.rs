use std::borrow::Borrow;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::FilterParseError;

// --- Identifiers ---

/// Canonical tag identifier, e.g. `witchy_wild`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for TagId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// --- Catalogue attributes ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Free,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityClass {
    /// Works for someone on their own.
    SoloFriendly,
    /// Needs companions; excluded from solo requests.
    #[serde(alias = "group_only")]
    SmallGroup,
    /// Works at any group size.
    Any,
}

/// When an entry can be visited. An empty `days` list means every day.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Availability {
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
}

impl Availability {
    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        if self.from.is_some_and(|from| date < from) {
            return false;
        }
        if self.until.is_some_and(|until| date > until) {
            return false;
        }
        self.days.is_empty() || self.days.contains(&date.weekday())
    }
}

/// One recommendable item. Created at catalogue load, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueEntry {
    pub id: String,
    pub name: String,
    pub tags: Vec<TagId>,
    /// Normalized area id (`bethnal_green`), never a compound.
    pub area: String,
    pub price: PriceTier,
    pub capacity: CapacityClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    /// Gentle, low-pressure entry eligible for sensitive-tier selection.
    #[serde(default)]
    pub refuge: bool,
}

impl CatalogueEntry {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.as_str() == tag)
    }
}

// --- Upstream filters ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Low,
    High,
}

impl FromStr for Budget {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::text::normalize(s).as_str() {
            "low" | "cheap" | "free" => Ok(Budget::Low),
            "high" | "splurge" => Ok(Budget::High),
            _ => Err(FilterParseError {
                field: "budget",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupSize {
    Solo,
    Group,
}

impl FromStr for GroupSize {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::text::normalize(s).as_str() {
            "solo" | "alone" => Ok(GroupSize::Solo),
            "group" | "friends" => Ok(GroupSize::Group),
            _ => Err(FilterParseError {
                field: "group",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeConstraint {
    Tonight,
    Tomorrow,
    /// The coming Saturday and Sunday (today included on a weekend).
    Weekend,
    /// Next occurrence of this weekday, today included.
    Day(Weekday),
    Date(NaiveDate),
}

impl TimeConstraint {
    /// Calendar dates this constraint covers, relative to `today`.
    pub fn dates(&self, today: NaiveDate) -> Vec<NaiveDate> {
        match *self {
            TimeConstraint::Tonight => vec![today],
            TimeConstraint::Tomorrow => vec![today + Duration::days(1)],
            TimeConstraint::Weekend => match today.weekday() {
                Weekday::Sat => vec![today, today + Duration::days(1)],
                Weekday::Sun => vec![today],
                other => {
                    let ahead = 5 - other.num_days_from_monday() as i64;
                    let saturday = today + Duration::days(ahead);
                    vec![saturday, saturday + Duration::days(1)]
                }
            },
            TimeConstraint::Day(day) => {
                let ahead = (day.num_days_from_monday() as i64
                    - today.weekday().num_days_from_monday() as i64)
                    .rem_euclid(7);
                vec![today + Duration::days(ahead)]
            }
            TimeConstraint::Date(date) => vec![date],
        }
    }
}

impl FromStr for TimeConstraint {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = crate::text::normalize(s);
        let phrase = normalized.strip_prefix("this ").unwrap_or(&normalized);
        match phrase {
            "tonight" | "today" => return Ok(TimeConstraint::Tonight),
            "tomorrow" => return Ok(TimeConstraint::Tomorrow),
            "weekend" => return Ok(TimeConstraint::Weekend),
            _ => {}
        }
        if let Ok(day) = phrase.parse::<Weekday>() {
            return Ok(TimeConstraint::Day(day));
        }
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(TimeConstraint::Date)
            .map_err(|_| FilterParseError {
                field: "time",
                value: s.to_string(),
            })
    }
}

/// Structured constraints produced upstream from the user's prompt.
/// Every field is optional; an absent field means "no filtering".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRecord {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time: Option<TimeConstraint>,
    #[serde(default)]
    pub budget: Option<Budget>,
    #[serde(default)]
    pub group: Option<GroupSize>,
    /// The user's raw text, always passed through for sensitive-content scanning.
    #[serde(default)]
    pub raw_text: Option<String>,
}

// --- Mood resolution ---

pub const CONFIDENCE_EXACT: f32 = 1.0;
pub const CONFIDENCE_SUBSTRING: f32 = 0.93;
pub const CONFIDENCE_STEM: f32 = 0.85;

/// Below this a resolved mood should be presented as a tentative guess.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.80;

/// Characters compared by the stem strategy.
pub const STEM_PREFIX_CHARS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Fuzzy,
    Stem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMood {
    pub tag: TagId,
    pub confidence: f32,
    pub strategy: MatchStrategy,
}

impl ResolvedMood {
    pub fn is_low_confidence(&self) -> bool {
        self.confidence < LOW_CONFIDENCE_THRESHOLD
    }
}

// --- Sensitive content ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    None,
    Melancholy,
    Distress,
    Crisis,
}

impl SeverityTier {
    pub fn is_sensitive(&self) -> bool {
        !matches!(self, SeverityTier::None)
    }

    /// Crisis and distress results must be rendered with support resources.
    pub fn requires_resources(&self) -> bool {
        matches!(self, SeverityTier::Distress | SeverityTier::Crisis)
    }
}

impl std::fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityTier::None => write!(f, "none"),
            SeverityTier::Melancholy => write!(f, "melancholy"),
            SeverityTier::Distress => write!(f, "distress"),
            SeverityTier::Crisis => write!(f, "crisis"),
        }
    }
}

/// Classification outcome: the tier plus the keywords that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Severity {
    pub tier: SeverityTier,
    pub keywords: Vec<String>,
}

impl Severity {
    pub fn none() -> Self {
        Self {
            tier: SeverityTier::None,
            keywords: Vec::new(),
        }
    }
}

// --- Match results ---

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRole {
    Primary,
    Adjacent,
    Wildcard,
    NeedCluster(String),
}

impl std::fmt::Display for SelectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionRole::Primary => write!(f, "primary"),
            SelectionRole::Adjacent => write!(f, "adjacent"),
            SelectionRole::Wildcard => write!(f, "wildcard"),
            SelectionRole::NeedCluster(name) => write!(f, "need-cluster:{name}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Standard,
    Wildcard,
    CarePathway,
}

/// One selected entry and why it was chosen.
#[derive(Debug, Clone, Serialize)]
pub struct Pick {
    pub role: SelectionRole,
    /// The tag that justified this pick.
    pub via_tag: TagId,
    pub entry: Arc<CatalogueEntry>,
}

/// Structured outcome handed to the downstream renderer.
///
/// `severity` is always present so crisis and distress results can be
/// rendered with support resources regardless of which entries were chosen.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub mode: SelectionMode,
    pub severity: Severity,
    pub mood: Option<ResolvedMood>,
    pub picks: Vec<Pick>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn requires_resources(&self) -> bool {
        self.severity.tier.requires_resources()
    }

    pub fn is_low_confidence(&self) -> bool {
        self.mood.as_ref().is_some_and(ResolvedMood::is_low_confidence)
    }

    pub fn entry_ids(&self) -> Vec<&str> {
        self.picks.iter().map(|p| p.entry.id.as_str()).collect()
    }
}
