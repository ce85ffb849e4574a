use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for apprenticeship records.
    ApprenticeshipId
);
string_id!(
    /// Identifier wrapper for apprenticeship categories.
    ApprenticeshipTypeId
);
string_id!(
    /// Internal user identifier, distinct from the messaging channel id.
    UserId
);
string_id!(CuratorId);
string_id!(CuratorGroupId);
string_id!(
    /// Opaque external messaging identifier (a Telegram chat id).
    ChannelId
);

impl ApprenticeshipId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl ApprenticeshipTypeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Inclusive placement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self, InvalidDateRange> {
        if end_date < start_date {
            return Err(InvalidDateRange {
                start_date,
                end_date,
            });
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("end date {end_date} precedes start date {start_date}")]
pub struct InvalidDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One student's practical-training placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apprenticeship {
    pub id: ApprenticeshipId,
    pub user_id: UserId,
    pub apprenticeship_type_id: ApprenticeshipTypeId,
    pub curator_id: Option<CuratorId>,
    pub curator_group_id: Option<CuratorGroupId>,
    #[serde(flatten)]
    pub period: DateRange,
    pub academic_year: Option<String>,
    pub employment_status: Option<String>,
    pub referral: Option<String>,
    pub report: Option<String>,
    pub attendance: bool,
    pub signed: bool,
    pub report_signed: bool,
    pub referral_signed: bool,
}

impl Apprenticeship {
    /// Flags that have been confirmed so far, in declaration order.
    pub fn confirmed_flags(&self) -> Vec<ApprenticeshipFlag> {
        ApprenticeshipFlag::ALL
            .into_iter()
            .filter(|flag| flag.is_set(self))
            .collect()
    }
}

/// One-way workflow milestones tracked on an apprenticeship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprenticeshipFlag {
    Attendance,
    Signed,
    ReportSigned,
    ReferralSigned,
}

impl ApprenticeshipFlag {
    pub const ALL: [ApprenticeshipFlag; 4] = [
        ApprenticeshipFlag::Attendance,
        ApprenticeshipFlag::Signed,
        ApprenticeshipFlag::ReportSigned,
        ApprenticeshipFlag::ReferralSigned,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApprenticeshipFlag::Attendance => "attendance",
            ApprenticeshipFlag::Signed => "signed",
            ApprenticeshipFlag::ReportSigned => "report_signed",
            ApprenticeshipFlag::ReferralSigned => "referral_signed",
        }
    }

    pub const fn slug(self) -> &'static str {
        match self {
            ApprenticeshipFlag::Attendance => "attendance",
            ApprenticeshipFlag::Signed => "signed",
            ApprenticeshipFlag::ReportSigned => "report-signed",
            ApprenticeshipFlag::ReferralSigned => "referral-signed",
        }
    }

    /// Accepts either the snake_case label or the kebab-case URL slug.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|flag| flag.label() == raw || flag.slug() == raw)
    }

    pub fn is_set(self, record: &Apprenticeship) -> bool {
        match self {
            ApprenticeshipFlag::Attendance => record.attendance,
            ApprenticeshipFlag::Signed => record.signed,
            ApprenticeshipFlag::ReportSigned => record.report_signed,
            ApprenticeshipFlag::ReferralSigned => record.referral_signed,
        }
    }

    pub(crate) fn set(self, record: &mut Apprenticeship) {
        match self {
            ApprenticeshipFlag::Attendance => record.attendance = true,
            ApprenticeshipFlag::Signed => record.signed = true,
            ApprenticeshipFlag::ReportSigned => record.report_signed = true,
            ApprenticeshipFlag::ReferralSigned => record.referral_signed = true,
        }
    }
}

impl fmt::Display for ApprenticeshipFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Named placement category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprenticeshipType {
    pub id: ApprenticeshipTypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Curator,
    Administrator,
}

impl UserRole {
    pub const fn label(self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Curator => "curator",
            UserRole::Administrator => "administrator",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(UserRole::Student),
            "curator" => Some(UserRole::Curator),
            "admin" | "administrator" => Some(UserRole::Administrator),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub channel_id: ChannelId,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curator {
    pub id: CuratorId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratorGroup {
    pub id: CuratorGroupId,
    pub name: String,
}

/// Apprenticeship joined with its related entities for staff views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprenticeshipDetails {
    #[serde(flatten)]
    pub apprenticeship: Apprenticeship,
    pub user: Option<User>,
    pub curator: Option<Curator>,
    pub curator_group: Option<CuratorGroup>,
    pub apprenticeship_type: Option<ApprenticeshipType>,
}

/// Equality filter over foreign keys. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApprenticeshipFilter {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub apprenticeship_type_id: Option<ApprenticeshipTypeId>,
    #[serde(default)]
    pub curator_id: Option<CuratorId>,
    #[serde(default)]
    pub curator_group_id: Option<CuratorGroupId>,
}

impl ApprenticeshipFilter {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &Apprenticeship) -> bool {
        self.user_id
            .as_ref()
            .map_or(true, |id| *id == record.user_id)
            && self
                .apprenticeship_type_id
                .as_ref()
                .map_or(true, |id| *id == record.apprenticeship_type_id)
            && self
                .curator_id
                .as_ref()
                .map_or(true, |id| record.curator_id.as_ref() == Some(id))
            && self
                .curator_group_id
                .as_ref()
                .map_or(true, |id| record.curator_group_id.as_ref() == Some(id))
    }
}

/// Entity that a lookup failed to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingEntity {
    Apprenticeship(ApprenticeshipId),
    ApprenticeshipType(ApprenticeshipTypeId),
    User(UserId),
    Curator(CuratorId),
    CuratorGroup(CuratorGroupId),
}

impl fmt::Display for MissingEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingEntity::Apprenticeship(id) => write!(f, "apprenticeship {id} does not exist"),
            MissingEntity::ApprenticeshipType(id) => {
                write!(f, "apprenticeship type {id} does not exist")
            }
            MissingEntity::User(id) => write!(f, "user {id} does not exist"),
            MissingEntity::Curator(id) => write!(f, "curator {id} does not exist"),
            MissingEntity::CuratorGroup(id) => write!(f, "curator group {id} does not exist"),
        }
    }
}
