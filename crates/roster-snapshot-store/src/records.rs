//! Column mapping between domain rows and their tables.

use rusqlite::Row;
use rusqlite::types::Value;
use roster_snapshot::{
    Country, Cup, Currency, EntityKind, Language, League, Player, Region, SingletonKind, Team, User,
};

/// A row of an epoch-scoped reference table, keyed by `(id, download_id)`.
///
/// `COLUMNS` lists the attribute columns in table order, excluding `id` and
/// `download_id`. `values` and `from_row` follow the same order, with
/// `from_row` reading `id` at index 0.
pub trait ReferenceRecord: Sized + PartialEq {
    const KIND: EntityKind;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// A latest-only row keyed by natural id alone.
pub trait SingletonRecord: Sized {
    const KIND: SingletonKind;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> i64;
    fn values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

impl ReferenceRecord for Language {
    const KIND: EntityKind = EntityKind::Language;
    const COLUMNS: &'static [&'static str] = &["name"];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    }
}

impl ReferenceRecord for Currency {
    const KIND: EntityKind = EntityKind::Currency;
    const COLUMNS: &'static [&'static str] = &["name", "rate", "symbol"];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.rate.into(),
            self.symbol.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            rate: row.get(2)?,
            symbol: row.get(3)?,
        })
    }
}

impl ReferenceRecord for Country {
    const KIND: EntityKind = EntityKind::Country;
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "currency_id",
        "country_code",
        "date_format",
        "time_format",
        "flag",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.currency_id.into(),
            self.country_code.clone().into(),
            self.date_format.clone().into(),
            self.time_format.clone().into(),
            self.flag.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            currency_id: row.get(2)?,
            country_code: row.get(3)?,
            date_format: row.get(4)?,
            time_format: row.get(5)?,
            flag: row.get(6)?,
        })
    }
}

impl ReferenceRecord for Region {
    const KIND: EntityKind = EntityKind::Region;
    const COLUMNS: &'static [&'static str] = &["name", "country_id"];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into(), self.country_id.into()]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            country_id: row.get(2)?,
        })
    }
}

impl ReferenceRecord for League {
    const KIND: EntityKind = EntityKind::League;
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "country_id",
        "short_name",
        "continent",
        "season",
        "season_offset",
        "match_round",
        "zone_name",
        "english_name",
        "language_id",
        "national_team_id",
        "active_teams",
        "active_users",
        "number_of_levels",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.country_id.into(),
            self.short_name.clone().into(),
            self.continent.clone().into(),
            self.season.into(),
            self.season_offset.into(),
            self.match_round.into(),
            self.zone_name.clone().into(),
            self.english_name.clone().into(),
            self.language_id.into(),
            self.national_team_id.into(),
            self.active_teams.into(),
            self.active_users.into(),
            self.number_of_levels.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            country_id: row.get(2)?,
            short_name: row.get(3)?,
            continent: row.get(4)?,
            season: row.get(5)?,
            season_offset: row.get(6)?,
            match_round: row.get(7)?,
            zone_name: row.get(8)?,
            english_name: row.get(9)?,
            language_id: row.get(10)?,
            national_team_id: row.get(11)?,
            active_teams: row.get(12)?,
            active_users: row.get(13)?,
            number_of_levels: row.get(14)?,
        })
    }
}

impl ReferenceRecord for Cup {
    const KIND: EntityKind = EntityKind::Cup;
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "league_level",
        "level",
        "level_index",
        "match_round",
        "match_rounds_left",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.league_level.into(),
            self.level.into(),
            self.level_index.into(),
            self.match_round.into(),
            self.match_rounds_left.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            league_level: row.get(2)?,
            level: row.get(3)?,
            level_index: row.get(4)?,
            match_round: row.get(5)?,
            match_rounds_left: row.get(6)?,
        })
    }
}

impl ReferenceRecord for User {
    const KIND: EntityKind = EntityKind::User;
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "login_name",
        "supporter_tier",
        "signup_date",
        "activation_date",
        "last_login_date",
        "has_manager_license",
        "language_id",
        "language_name",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.login_name.clone().into(),
            self.supporter_tier.clone().into(),
            self.signup_date.clone().into(),
            self.activation_date.clone().into(),
            self.last_login_date.clone().into(),
            self.has_manager_license.into(),
            self.language_id.into(),
            self.language_name.clone().into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            login_name: row.get(2)?,
            supporter_tier: row.get(3)?,
            signup_date: row.get(4)?,
            activation_date: row.get(5)?,
            last_login_date: row.get(6)?,
            has_manager_license: row.get(7)?,
            language_id: row.get(8)?,
            language_name: row.get(9)?,
        })
    }
}

impl SingletonRecord for Team {
    const KIND: SingletonKind = SingletonKind::Team;
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "name",
        "short_name",
        "founded_date",
        "arena_id",
        "arena_name",
        "league_id",
        "league_name",
        "country_id",
        "country_name",
        "region_id",
        "region_name",
        "cup_id",
        "cup_name",
        "logo_url",
        "is_bot",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.user_id.into(),
            self.name.clone().into(),
            self.short_name.clone().into(),
            self.founded_date.clone().into(),
            self.arena_id.into(),
            self.arena_name.clone().into(),
            self.league_id.into(),
            self.league_name.clone().into(),
            self.country_id.into(),
            self.country_name.clone().into(),
            self.region_id.into(),
            self.region_name.clone().into(),
            self.cup_id.into(),
            self.cup_name.clone().into(),
            self.logo_url.clone().into(),
            self.is_bot.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            short_name: row.get(3)?,
            founded_date: row.get(4)?,
            arena_id: row.get(5)?,
            arena_name: row.get(6)?,
            league_id: row.get(7)?,
            league_name: row.get(8)?,
            country_id: row.get(9)?,
            country_name: row.get(10)?,
            region_id: row.get(11)?,
            region_name: row.get(12)?,
            cup_id: row.get(13)?,
            cup_name: row.get(14)?,
            logo_url: row.get(15)?,
            is_bot: row.get(16)?,
        })
    }
}

impl SingletonRecord for Player {
    const KIND: SingletonKind = SingletonKind::Player;
    const COLUMNS: &'static [&'static str] = &[
        "team_id",
        "first_name",
        "nick_name",
        "last_name",
        "player_number",
        "age",
        "age_days",
        "tsi",
        "form",
        "experience",
        "loyalty",
        "leadership",
        "salary",
        "specialty",
        "country_id",
        "injury_level",
        "transfer_listed",
        "stamina_skill",
        "keeper_skill",
        "playmaker_skill",
        "scorer_skill",
        "passing_skill",
        "winger_skill",
        "defender_skill",
        "set_pieces_skill",
    ];

    fn id(&self) -> i64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            self.team_id.into(),
            self.first_name.clone().into(),
            self.nick_name.clone().into(),
            self.last_name.clone().into(),
            self.player_number.into(),
            self.age.into(),
            self.age_days.into(),
            self.tsi.into(),
            self.form.into(),
            self.experience.into(),
            self.loyalty.into(),
            self.leadership.into(),
            self.salary.into(),
            self.specialty.into(),
            self.country_id.into(),
            self.injury_level.into(),
            self.transfer_listed.into(),
            self.stamina_skill.into(),
            self.keeper_skill.into(),
            self.playmaker_skill.into(),
            self.scorer_skill.into(),
            self.passing_skill.into(),
            self.winger_skill.into(),
            self.defender_skill.into(),
            self.set_pieces_skill.into(),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            team_id: row.get(1)?,
            first_name: row.get(2)?,
            nick_name: row.get(3)?,
            last_name: row.get(4)?,
            player_number: row.get(5)?,
            age: row.get(6)?,
            age_days: row.get(7)?,
            tsi: row.get(8)?,
            form: row.get(9)?,
            experience: row.get(10)?,
            loyalty: row.get(11)?,
            leadership: row.get(12)?,
            salary: row.get(13)?,
            specialty: row.get(14)?,
            country_id: row.get(15)?,
            injury_level: row.get(16)?,
            transfer_listed: row.get(17)?,
            stamina_skill: row.get(18)?,
            keeper_skill: row.get(19)?,
            playmaker_skill: row.get(20)?,
            scorer_skill: row.get(21)?,
            passing_skill: row.get(22)?,
            winger_skill: row.get(23)?,
            defender_skill: row.get(24)?,
            set_pieces_skill: row.get(25)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_count_matches<T: ReferenceRecord>(sample: &T) {
        assert_eq!(T::COLUMNS.len(), sample.values().len(), "{}", T::KIND);
    }

    #[test]
    fn values_line_up_with_columns() {
        column_count_matches(&Language {
            id: 1,
            name: "Svenska".into(),
        });
        column_count_matches(&Region {
            id: 1,
            name: "Stockholm".into(),
            country_id: 1,
        });
        column_count_matches(&Currency {
            id: 1,
            name: "Krona".into(),
            rate: Some(1.0),
            symbol: Some("kr".into()),
        });

        let player = Player {
            id: 1,
            team_id: 2,
            first_name: "A".into(),
            nick_name: None,
            last_name: "B".into(),
            player_number: None,
            age: 20,
            age_days: None,
            tsi: 1000,
            form: 5,
            experience: 3,
            loyalty: 10,
            leadership: 4,
            salary: 500,
            specialty: None,
            country_id: None,
            injury_level: None,
            transfer_listed: false,
            stamina_skill: None,
            keeper_skill: None,
            playmaker_skill: None,
            scorer_skill: None,
            passing_skill: None,
            winger_skill: None,
            defender_skill: None,
            set_pieces_skill: None,
        };
        assert_eq!(Player::COLUMNS.len(), player.values().len());
    }

    #[test]
    fn optional_values_become_null() {
        let value: Value = Option::<i64>::None.into();
        assert_eq!(value, Value::Null);
        let value: Value = Some(true).into();
        assert_eq!(value, Value::Integer(1));
    }
}
