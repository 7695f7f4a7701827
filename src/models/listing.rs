//! Listing entity model
//!
//! A listing is an affiliate offer ("bonus site"). Listings with no
//! `tenant_id` are global and visible to every tenant; listings are never
//! hard-deleted, only deactivated or archived.

use std::sync::LazyLock;

use regex::Regex;
use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Owning tenant, or `None` for a global listing
    pub tenant_id: Option<Uuid>,

    pub bonus_type: String,

    /// Free-text bonus headline, e.g. `"750 TL"`
    pub bonus_amount: String,

    /// Numeric value extracted from `bonus_amount`
    pub bonus_value: i64,

    /// Wagering multiplier; missing values score as 10.0
    #[sea_orm(column_type = "Double", nullable)]
    pub turnover_requirement: Option<f64>,

    /// Rating in `[0.0, 5.0]`; missing values score as 4.0
    #[sea_orm(column_type = "Double", nullable)]
    pub rating: Option<f64>,

    pub affiliate_url: String,

    pub logo_url: Option<String>,

    pub campaign_start: Option<DateTimeWithTimeZone>,

    pub is_active: bool,

    pub is_archived: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Listed and rankable: active and not archived.
    pub fn is_live(&self) -> bool {
        self.is_active && !self.is_archived
    }

    /// Whether the listing may be shown on the given tenant's domain.
    pub fn is_visible_to(&self, tenant_id: Uuid) -> bool {
        self.tenant_id.is_none_or(|owner| owner == tenant_id)
    }
}

/// Numeric bonus value of a free-text amount: thousands separators (`.` and
/// `,`) are dropped and the first run of digits is taken, so `"1.500 TL"` is
/// 1500 and `"%25 Kayıp"` is 25. Text without digits is worth 0.
pub fn parse_bonus_value(amount: &str) -> i64 {
    let cleaned: String = amount.chars().filter(|c| !matches!(c, '.' | ',')).collect();
    DIGIT_RUN
        .find(&cleaned)
        .and_then(|digits| digits.as_str().parse().ok())
        .unwrap_or(0)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tenant_listing::Entity")]
    TenantListing,
}

impl Related<super::tenant_listing::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TenantListing.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_value_parsing() {
        assert_eq!(parse_bonus_value("750 TL"), 750);
        assert_eq!(parse_bonus_value("1.500 TL"), 1500);
        assert_eq!(parse_bonus_value("2,000 TL + 100 FS"), 2000);
        assert_eq!(parse_bonus_value("%25 Kayıp Bonusu"), 25);
        assert_eq!(parse_bonus_value("Freespin"), 0);
        assert_eq!(parse_bonus_value("99999999999999999999999"), 0);
    }
}
