// 🪪 South African Identity Numbers
// Structural + checksum validation and date-of-birth decoding
//
// Layout (13 digits):
//   YYMMDD G SSS C A Z
//   │      │ │   │ │ └─ check digit (Luhn variant over the first 12)
//   │      │ │   │ └─── race / legacy digit
//   │      │ │   └───── citizenship (0 citizen, 1 permanent resident)
//   │      │ └───────── sequence
//   │      └─────────── gender (0-4 female, 5-9 male)
//   └────────────────── birth date, two-digit year
//
// "Now" is always passed in explicitly so century resolution is deterministic.

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

/// Number of digits in a normalized identity number
pub const ID_NUMBER_LEN: usize = 13;

/// Earliest birth year accepted when decoding a birth date
pub const MIN_BIRTH_YEAR: i32 = 1900;

// ============================================================================
// ERRORS
// ============================================================================

/// Why an identity number was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdNumberError {
    #[error("expected 13 digits, got {0}")]
    WrongLength(usize),

    #[error("month {0} is out of range")]
    MonthOutOfRange(u32),

    #[error("day {0} is out of range")]
    DayOutOfRange(u32),

    #[error("{year:04}-{month:02}-{day:02} is not a calendar date")]
    NotACalendarDate { year: i32, month: u32, day: u32 },

    #[error("check digit mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: u8, found: u8 },
}

/// Birth date could not be built for a number that already passed validation.
///
/// This is an internal inconsistency, never an ordinary "invalid input".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to build birth date {year:04}-{month:02}-{day:02} from ID number {id_number}")]
pub struct BirthDateError {
    pub id_number: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

// ============================================================================
// DECODED FIELDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Citizenship {
    Citizen,
    PermanentResident,
    Unknown,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }
}

impl Citizenship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Citizenship::Citizen => "SA Citizen",
            Citizenship::PermanentResident => "Permanent Resident",
            Citizenship::Unknown => "Unknown",
        }
    }
}

// ============================================================================
// IDENTITY NUMBER
// ============================================================================

/// A structurally valid identity number with its checksum verified.
///
/// Only constructed through [`IdentityNumber::parse`], so holding one means
/// every field decodes. The birth date is resolved against the `today` used
/// at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityNumber {
    digits: String,
    birth_date: NaiveDate,
}

impl IdentityNumber {
    /// Parse raw input, discarding every non-digit character first
    pub fn parse(raw: &str, today: NaiveDate) -> Result<Self, IdNumberError> {
        let digits = normalize(raw);
        if digits.len() != ID_NUMBER_LEN {
            return Err(IdNumberError::WrongLength(digits.len()));
        }

        let bytes = digit_values(&digits);
        let yy = two_digit(&bytes[0..2]);
        let month = two_digit(&bytes[2..4]);
        let day = two_digit(&bytes[4..6]);

        if !(1..=12).contains(&month) {
            return Err(IdNumberError::MonthOutOfRange(month));
        }
        if !(1..=31).contains(&day) {
            return Err(IdNumberError::DayOutOfRange(day));
        }

        let year = resolve_year(yy, today);
        let birth_date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(IdNumberError::NotACalendarDate { year, month, day })?;

        let expected = check_digit(&bytes[..12]);
        let found = bytes[12];
        if expected != found {
            return Err(IdNumberError::ChecksumMismatch { expected, found });
        }

        Ok(IdentityNumber { digits, birth_date })
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn birth_date(&self) -> NaiveDate {
        self.birth_date
    }

    pub fn gender(&self) -> Gender {
        if self.digit(6) < 5 {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    pub fn citizenship(&self) -> Citizenship {
        match self.digit(10) {
            0 => Citizenship::Citizen,
            1 => Citizenship::PermanentResident,
            _ => Citizenship::Unknown,
        }
    }

    fn digit(&self, index: usize) -> u8 {
        self.digits.as_bytes()[index] - b'0'
    }
}

impl std::fmt::Display for IdentityNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.digits)
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Keep only ASCII decimal digits
pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Resolve a two-digit year against a rolling window anchored on `today`.
///
/// `yy` up to the current two-digit year lands in the current century,
/// anything greater in the previous one.
pub fn resolve_year(yy: u32, today: NaiveDate) -> i32 {
    let current_year = today.year();
    let current_yy = current_year.rem_euclid(100);
    let current_century = current_year - current_yy;
    let previous_century = current_century - 100;

    let yy = yy as i32;
    if yy > current_yy {
        previous_century + yy
    } else {
        current_century + yy
    }
}

/// Luhn-variant check digit over the first 12 digit values.
///
/// Even positions are added as-is; odd positions are doubled, folded back
/// below 10 by subtracting 9, then added.
pub fn check_digit(digits: &[u8]) -> u8 {
    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, &d)| {
            let d = d as u32;
            if i % 2 == 0 {
                d
            } else {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            }
        })
        .sum();

    ((10 - (sum % 10)) % 10) as u8
}

/// Structural + calendar + checksum validity. Never fails, only answers.
pub fn is_valid_sa_id(raw: &str, today: NaiveDate) -> bool {
    IdentityNumber::parse(raw, today).is_ok()
}

/// Decode the birth date encoded in an identity number.
///
/// `Ok(None)` for any invalid input or a resolved year outside
/// `MIN_BIRTH_YEAR..=today.year()`. `Err` only when a date that passed
/// validation still cannot be built.
pub fn extract_date_of_birth(
    raw: &str,
    today: NaiveDate,
) -> Result<Option<NaiveDate>, BirthDateError> {
    let digits = normalize(raw);
    if !is_valid_sa_id(&digits, today) {
        return Ok(None);
    }

    let bytes = digit_values(&digits);
    let year = resolve_year(two_digit(&bytes[0..2]), today);
    let month = two_digit(&bytes[2..4]);
    let day = two_digit(&bytes[4..6]);

    if year < MIN_BIRTH_YEAR || year > today.year() {
        return Ok(None);
    }

    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => Ok(Some(date)),
        None => {
            tracing::error!(id_number = %digits, year, month, day, "failed to create date from ID");
            Err(BirthDateError {
                id_number: digits,
                year,
                month,
                day,
            })
        }
    }
}

fn digit_values(digits: &str) -> Vec<u8> {
    digits.bytes().map(|b| b - b'0').collect()
}

fn two_digit(pair: &[u8]) -> u32 {
    pair[0] as u32 * 10 + pair[1] as u32
}

// ============================================================================
// TESTS
// ============================================================================
