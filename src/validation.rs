// 📐 Form validation - create/update rules for member records
// Collects every field error instead of stopping at the first one

use crate::cellphone::{self, MAX_CELLPHONE_LEN};
use crate::identity::{self, ID_NUMBER_LEN};
use crate::member::{MemberInput, MemberStatus};
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Upper bound for names and email, matching the column definitions
pub const MAX_TEXT_LEN: usize = 255;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z\s'-]+$").expect("name pattern is a valid regex"));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is a valid regex")
});

// ============================================================================
// FIELD ERROR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    /// Rule that failed (required, size, max, format, id_number, cellphone, in)
    pub rule: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, rule: &'static str, message: impl Into<String>) -> Self {
        FieldError {
            field: field.to_string(),
            rule,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

// ============================================================================
// VALIDATED MEMBER
// ============================================================================

/// Normalized values ready for storage (birth date is derived separately)
#[derive(Debug, Clone, PartialEq)]
pub struct ValidMember {
    pub member_number: Option<String>,
    pub id_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cellphone: String,
    pub status: MemberStatus,
}

/// Apply the member form rules.
///
/// `today` anchors the century window used by the ID number check.
pub fn validate_member(input: &MemberInput, today: NaiveDate) -> Result<ValidMember, Vec<FieldError>> {
    let mut errors = Vec::new();

    let id_number = input.id_number.trim();
    if id_number.is_empty() {
        errors.push(FieldError::new("id_number", "required", "The ID number is required."));
    } else if id_number.chars().count() != ID_NUMBER_LEN {
        errors.push(FieldError::new(
            "id_number",
            "size",
            "The ID number must be exactly 13 digits.",
        ));
    } else if !identity::is_valid_sa_id(id_number, today) {
        errors.push(FieldError::new(
            "id_number",
            "id_number",
            "The ID number must be a valid South African ID number.",
        ));
    }

    let first_name = input.first_name.trim();
    check_name(&mut errors, "first_name", "first name", first_name);
    let last_name = input.last_name.trim();
    check_name(&mut errors, "last_name", "last name", last_name);

    let email = input.email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("email", "required", "The email field is required."));
    } else if email.chars().count() > MAX_TEXT_LEN {
        errors.push(FieldError::new(
            "email",
            "max",
            "The email may not be greater than 255 characters.",
        ));
    } else if !EMAIL_PATTERN.is_match(email) {
        errors.push(FieldError::new("email", "format", "Please enter a valid email address."));
    }

    let cellphone = cellphone::normalize(&input.cellphone);
    if input.cellphone.trim().is_empty() {
        errors.push(FieldError::new("cellphone", "required", "The cellphone field is required."));
    } else if cellphone.len() > MAX_CELLPHONE_LEN || !cellphone::is_valid_sa_cellphone(&cellphone) {
        errors.push(FieldError::new(
            "cellphone",
            "cellphone",
            "The cellphone must be a valid South African cellphone number.",
        ));
    }

    let status = match input.status.as_deref().map(str::trim) {
        None | Some("") => MemberStatus::default(),
        Some(raw) => match raw.parse::<MemberStatus>() {
            Ok(status) => status,
            Err(_) => {
                errors.push(FieldError::new(
                    "status",
                    "in",
                    "The status must be one of: active, inactive, suspended.",
                ));
                MemberStatus::default()
            }
        },
    };

    let member_number = input
        .member_number
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidMember {
        member_number,
        id_number: identity::normalize(id_number),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        cellphone,
        status,
    })
}

fn check_name(errors: &mut Vec<FieldError>, field: &str, label: &str, value: &str) {
    if value.is_empty() {
        errors.push(FieldError::new(field, "required", format!("The {} field is required.", label)));
    } else if value.chars().count() > MAX_TEXT_LEN {
        errors.push(FieldError::new(
            field,
            "max",
            format!("The {} may not be greater than 255 characters.", label),
        ));
    } else if !NAME_PATTERN.is_match(value) {
        errors.push(FieldError::new(
            field,
            "format",
            format!(
                "The {} may only contain letters, spaces, hyphens and apostrophes.",
                label
            ),
        ));
    }
}

// ============================================================================
// TESTS
// ============================================================================
