// 🏭 Member factory - realistic fake members for seeding and tests
//
// Identity numbers are built field by field with a correct check digit;
// cellphones use real South African mobile prefixes.

use crate::identity::check_digit;
use crate::member::{MemberInput, MemberStatus};
use chrono::{Datelike, Duration, NaiveDate};
use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;

/// Valid South African mobile prefixes
pub const MOBILE_PREFIXES: [&str; 22] = [
    "060", "061", "062", "063", "064", "065", "066", "067", "068", "069", "070", "071", "072",
    "073", "074", "076", "078", "079", "081", "082", "083", "084",
];

const FIRST_NAMES: [&str; 16] = [
    "Thabo", "Lerato", "Sipho", "Naledi", "Johan", "Anika", "Pieter", "Zanele", "Michael",
    "Ayesha", "Kagiso", "Palesa", "Ruan", "Nomsa", "David", "Chloe",
];

const LAST_NAMES: [&str; 16] = [
    "Nkosi", "Dlamini", "Botha", "Naidoo", "Mokoena", "van der Merwe", "Pillay", "Khumalo",
    "Smith", "Mahlangu", "Pretorius", "Ndlovu", "Jacobs", "Mthembu", "Fourie", "Adams",
];

pub struct MemberFactory<R: Rng = ThreadRng> {
    rng: R,
    earliest_birth: NaiveDate,
    latest_birth: NaiveDate,
}

impl MemberFactory<ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl Default for MemberFactory<ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> MemberFactory<R> {
    /// Birth dates default to 1950-01-01 ..= 2005-12-31
    pub fn with_rng(rng: R) -> Self {
        MemberFactory {
            rng,
            earliest_birth: NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or_default(),
            latest_birth: NaiveDate::from_ymd_opt(2005, 12, 31).unwrap_or_default(),
        }
    }

    /// Random member with a random status
    pub fn make(&mut self) -> MemberInput {
        let status = *MemberStatus::ALL
            .choose(&mut self.rng)
            .unwrap_or(&MemberStatus::Active);
        self.make_with_status(status)
    }

    pub fn make_with_status(&mut self, status: MemberStatus) -> MemberInput {
        let first_name = self.pick(&FIRST_NAMES).to_string();
        let last_name = self.pick(&LAST_NAMES).to_string();
        let email = self.email(&first_name, &last_name);

        MemberInput {
            member_number: None,
            id_number: self.id_number().0,
            first_name,
            last_name,
            email,
            cellphone: self.cellphone(),
            status: Some(status.as_str().to_string()),
        }
    }

    pub fn active(&mut self) -> MemberInput {
        self.make_with_status(MemberStatus::Active)
    }

    pub fn inactive(&mut self) -> MemberInput {
        self.make_with_status(MemberStatus::Inactive)
    }

    pub fn suspended(&mut self) -> MemberInput {
        self.make_with_status(MemberStatus::Suspended)
    }

    /// Valid identity number and the birth date it encodes
    pub fn id_number(&mut self) -> (String, NaiveDate) {
        let span = (self.latest_birth - self.earliest_birth).num_days();
        let born = self.earliest_birth + Duration::days(self.rng.gen_range(0..=span));

        let gender = self.rng.gen_range(0..=9u8);
        let sequence = self.rng.gen_range(0..=999u16);
        let citizenship = if self.rng.gen_bool(0.5) { 0u8 } else { 1u8 };
        let race = self.rng.gen_range(0..=9u8);

        let prefix = format!(
            "{:02}{:02}{:02}{}{:03}{}{}",
            born.year().rem_euclid(100),
            born.month(),
            born.day(),
            gender,
            sequence,
            citizenship,
            race
        );
        let digits: Vec<u8> = prefix.bytes().map(|b| b - b'0').collect();

        (format!("{}{}", prefix, check_digit(&digits)), born)
    }

    /// Ten-digit local mobile number
    pub fn cellphone(&mut self) -> String {
        let prefix = self.pick(&MOBILE_PREFIXES);
        let number = self.rng.gen_range(1_000_000..=9_999_999u32);
        format!("{}{:07}", prefix, number)
    }

    fn email(&mut self, first_name: &str, last_name: &str) -> String {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}.{}.{}@example.com",
            slug(first_name),
            slug(last_name),
            &tag[..8]
        )
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options.choose(&mut self.rng).copied().unwrap_or("Member")
    }
}

fn slug(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
