// 📱 South African mobile numbers
// Format check only: dial prefix + mobile range + 8 subscriber digits

use regex::Regex;
use std::sync::LazyLock;

/// Longest cleaned cellphone the members table accepts
pub const MAX_CELLPHONE_LEN: usize = 15;

static CELLPHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\+27|0)[6-8][0-9]{8}$").expect("cellphone pattern is a valid regex")
});

/// Drop everything except digits and `+`
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// `0` or `+27`, then 6/7/8, then eight more digits
pub fn is_valid_sa_cellphone(raw: &str) -> bool {
    CELLPHONE_PATTERN.is_match(&normalize(raw))
}
