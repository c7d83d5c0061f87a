// 👤 Member record
// The row as stored, the status enum, and the raw form payload

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// MEMBER STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl MemberStatus {
    pub const ALL: [MemberStatus; 3] = [
        MemberStatus::Active,
        MemberStatus::Inactive,
        MemberStatus::Suspended,
    ];

    /// Value stored in the `status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::Suspended => "suspended",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MemberStatus::Active => "Active",
            MemberStatus::Inactive => "Inactive",
            MemberStatus::Suspended => "Suspended",
        }
    }
}

impl std::fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown member status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for MemberStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MemberStatus::Active),
            "inactive" => Ok(MemberStatus::Inactive),
            "suspended" => Ok(MemberStatus::Suspended),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// MEMBER
// ============================================================================

/// A registered member as persisted in the `members` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub member_number: String,
    pub id_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cellphone: String,
    /// Derived from `id_number`, recomputed whenever it changes
    pub date_of_birth: NaiveDate,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// FORM INPUT
// ============================================================================

/// Unvalidated create/update payload, as typed into a form or read from CSV.
///
/// `status` stays a string so an unknown value becomes a field error rather
/// than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberInput {
    #[serde(default)]
    pub member_number: Option<String>,
    #[serde(default)]
    pub id_number: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub cellphone: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl From<&Member> for MemberInput {
    fn from(member: &Member) -> Self {
        MemberInput {
            member_number: Some(member.member_number.clone()),
            id_number: member.id_number.clone(),
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            email: member.email.clone(),
            cellphone: member.cellphone.clone(),
            status: Some(member.status.as_str().to_string()),
        }
    }
}
