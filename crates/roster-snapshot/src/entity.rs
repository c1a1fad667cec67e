use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reference entity kinds that are historized per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Cup,
    Language,
    Currency,
    Country,
    Region,
    League,
    User,
}

impl EntityKind {
    /// All epoch-scoped kinds, in the order their tables were introduced.
    pub fn all() -> [EntityKind; 7] {
        [
            Self::Language,
            Self::Currency,
            Self::Country,
            Self::Region,
            Self::League,
            Self::Cup,
            Self::User,
        ]
    }

    /// Backing table name.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Cup => "cups",
            Self::Language => "languages",
            Self::Currency => "currencies",
            Self::Country => "countries",
            Self::Region => "regions",
            Self::League => "leagues",
            Self::User => "users",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cup" | "cups" => Some(Self::Cup),
            "language" | "languages" => Some(Self::Language),
            "currency" | "currencies" => Some(Self::Currency),
            "country" | "countries" => Some(Self::Country),
            "region" | "regions" => Some(Self::Region),
            "league" | "leagues" => Some(Self::League),
            "user" | "users" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Language {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: i64,
    pub name: String,
    pub rate: Option<f64>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: i64,
    pub name: String,
    pub currency_id: Option<i64>,
    pub country_code: Option<String>,
    pub date_format: Option<String>,
    pub time_format: Option<String>,
    pub flag: Option<String>,
}

impl Country {
    /// Fill `flag` from `country_code` when the provider left it out.
    pub fn with_derived_flag(mut self) -> Self {
        if self.flag.is_none() {
            self.flag = self.country_code.as_deref().and_then(flag_emoji);
        }
        self
    }
}

/// Regional-indicator flag for a two-letter country code.
///
/// Each ASCII letter maps onto U+1F1E6..U+1F1FF; a pair of them renders as
/// the country's flag.
pub fn flag_emoji(code: &str) -> Option<String> {
    if code.len() != 2 {
        return None;
    }

    code.to_ascii_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                char::from_u32(c as u32 + 0x1F1E6 - 'A' as u32)
            } else {
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub country_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    pub country_id: Option<i64>,
    pub short_name: Option<String>,
    pub continent: Option<String>,
    pub season: Option<i64>,
    pub season_offset: Option<i64>,
    pub match_round: Option<i64>,
    pub zone_name: Option<String>,
    pub english_name: Option<String>,
    pub language_id: Option<i64>,
    pub national_team_id: Option<i64>,
    pub active_teams: Option<i64>,
    pub active_users: Option<i64>,
    pub number_of_levels: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cup {
    pub id: i64,
    pub name: String,
    pub league_level: Option<i64>,
    pub level: Option<i64>,
    pub level_index: Option<i64>,
    pub match_round: Option<i64>,
    pub match_rounds_left: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub login_name: String,
    pub supporter_tier: String,
    pub signup_date: Option<String>,
    pub activation_date: Option<String>,
    pub last_login_date: Option<String>,
    pub has_manager_license: Option<bool>,
    pub language_id: Option<i64>,
    pub language_name: Option<String>,
}

/// All rows of one reference kind delivered for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum ReferenceBatch {
    Cups(Vec<Cup>),
    Languages(Vec<Language>),
    Currencies(Vec<Currency>),
    Countries(Vec<Country>),
    Regions(Vec<Region>),
    Leagues(Vec<League>),
    Users(Vec<User>),
}

impl ReferenceBatch {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Cups(_) => EntityKind::Cup,
            Self::Languages(_) => EntityKind::Language,
            Self::Currencies(_) => EntityKind::Currency,
            Self::Countries(_) => EntityKind::Country,
            Self::Regions(_) => EntityKind::Region,
            Self::Leagues(_) => EntityKind::League,
            Self::Users(_) => EntityKind::User,
        }
    }

    /// Natural ids in delivery order.
    pub fn natural_ids(&self) -> Vec<i64> {
        match self {
            Self::Cups(rows) => rows.iter().map(|r| r.id).collect(),
            Self::Languages(rows) => rows.iter().map(|r| r.id).collect(),
            Self::Currencies(rows) => rows.iter().map(|r| r.id).collect(),
            Self::Countries(rows) => rows.iter().map(|r| r.id).collect(),
            Self::Regions(rows) => rows.iter().map(|r| r.id).collect(),
            Self::Leagues(rows) => rows.iter().map(|r| r.id).collect(),
            Self::Users(rows) => rows.iter().map(|r| r.id).collect(),
        }
    }

    /// Natural ids that occur more than once in this batch.
    pub fn duplicate_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in self.natural_ids() {
            if !seen.insert(id) && !duplicates.contains(&id) {
                duplicates.push(id);
            }
        }
        duplicates
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Cups(rows) => rows.len(),
            Self::Languages(rows) => rows.len(),
            Self::Currencies(rows) => rows.len(),
            Self::Countries(rows) => rows.len(),
            Self::Regions(rows) => rows.len(),
            Self::Leagues(rows) => rows.len(),
            Self::Users(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Operational entity kinds kept as a single latest-state row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingletonKind {
    Team,
    Player,
}

impl SingletonKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Team => "teams",
            Self::Player => "players",
        }
    }
}

impl fmt::Display for SingletonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// A team as last written. The `*_name` fields are copies taken from the
/// reference tables at write time, not live references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub user_id: Option<i64>,
    pub name: String,
    pub short_name: Option<String>,
    pub founded_date: Option<String>,
    pub arena_id: Option<i64>,
    pub arena_name: Option<String>,
    pub league_id: Option<i64>,
    pub league_name: Option<String>,
    pub country_id: Option<i64>,
    pub country_name: Option<String>,
    pub region_id: Option<i64>,
    pub region_name: Option<String>,
    pub cup_id: Option<i64>,
    pub cup_name: Option<String>,
    pub logo_url: Option<String>,
    pub is_bot: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub team_id: i64,
    pub first_name: String,
    pub nick_name: Option<String>,
    pub last_name: String,
    pub player_number: Option<i64>,
    pub age: i64,
    pub age_days: Option<i64>,
    pub tsi: i64,
    pub form: i64,
    pub experience: i64,
    pub loyalty: i64,
    pub leadership: i64,
    pub salary: i64,
    pub specialty: Option<i64>,
    pub country_id: Option<i64>,
    pub injury_level: Option<i64>,
    #[serde(default)]
    pub transfer_listed: bool,
    pub stamina_skill: Option<i64>,
    pub keeper_skill: Option<i64>,
    pub playmaker_skill: Option<i64>,
    pub scorer_skill: Option<i64>,
    pub passing_skill: Option<i64>,
    pub winger_skill: Option<i64>,
    pub defender_skill: Option<i64>,
    pub set_pieces_skill: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SingletonRow {
    Team(Team),
    Player(Player),
}

impl SingletonRow {
    pub fn kind(&self) -> SingletonKind {
        match self {
            Self::Team(_) => SingletonKind::Team,
            Self::Player(_) => SingletonKind::Player,
        }
    }

    pub fn natural_id(&self) -> i64 {
        match self {
            Self::Team(team) => team.id,
            Self::Player(player) => player.id,
        }
    }
}

/// A player's rendered avatar for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub player_id: i64,
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| serde::de::Error::custom(format!("base64 decode failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn language(id: i64, name: &str) -> Language {
        Language {
            id,
            name: name.to_owned(),
        }
    }

    #[test]
    fn flag_emoji_maps_letters_to_regional_indicators() {
        assert_eq!(flag_emoji("se").as_deref(), Some("\u{1F1F8}\u{1F1EA}"));
        assert_eq!(flag_emoji("IE").as_deref(), Some("\u{1F1EE}\u{1F1EA}"));
        assert_eq!(flag_emoji("S"), None);
        assert_eq!(flag_emoji("S1"), None);
        assert_eq!(flag_emoji("SWE"), None);
    }

    #[test]
    fn derived_flag_keeps_provider_value() {
        let country = Country {
            id: 1,
            name: "Sverige".to_owned(),
            currency_id: None,
            country_code: Some("SE".to_owned()),
            date_format: None,
            time_format: None,
            flag: Some("custom".to_owned()),
        };
        assert_eq!(country.clone().with_derived_flag().flag.as_deref(), Some("custom"));

        let bare = Country { flag: None, ..country };
        assert_eq!(
            bare.with_derived_flag().flag.as_deref(),
            Some("\u{1F1F8}\u{1F1EA}")
        );
    }

    #[test]
    fn duplicate_ids_are_reported_once() {
        let batch = ReferenceBatch::Languages(vec![
            language(1, "Svenska"),
            language(2, "English"),
            language(1, "Svenska"),
            language(1, "Svenska"),
        ]);
        assert_eq!(batch.kind(), EntityKind::Language);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.duplicate_ids(), vec![1]);
    }

    #[test]
    fn batch_deserializes_from_tagged_json() {
        let json = r#"{"kind":"regions","rows":[{"id":5,"name":"Dalarna","country_id":1}]}"#;
        let batch: ReferenceBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.kind(), EntityKind::Region);
        assert_eq!(batch.natural_ids(), vec![5]);
    }

    #[test]
    fn avatar_image_is_base64_in_json() {
        let json = r#"{"player_id":9,"image":"iVBO\nRw=="}"#;
        let avatar: Avatar = serde_json::from_str(json).unwrap();
        assert_eq!(avatar.image, vec![0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn entity_kind_parses_singular_and_plural() {
        assert_eq!(EntityKind::parse("League"), Some(EntityKind::League));
        assert_eq!(EntityKind::parse("currencies"), Some(EntityKind::Currency));
        assert_eq!(EntityKind::parse("teams"), None);
        assert_eq!(EntityKind::Country.to_string(), "countries");
    }
}
