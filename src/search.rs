// 🔍 Search & filter predicates for the member list
//
// Each predicate renders to a SQL fragment with bound parameters for the
// storage layer, and evaluates in memory for already-loaded rows.
// Substring matching is case-sensitive (instr), and a blank term matches
// nothing.

use crate::member::{Member, MemberStatus};
use rusqlite::types::Value;

// ============================================================================
// PREDICATES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberFilter {
    /// ID number OR member number contains the term
    IdOrMemberNumber(String),
    /// Cellphone contains the term
    Cellphone(String),
    Status(MemberStatus),
}

impl MemberFilter {
    pub fn search_by_id_or_member(term: impl Into<String>) -> Self {
        MemberFilter::IdOrMemberNumber(term.into())
    }

    pub fn filter_by_cellphone(term: impl Into<String>) -> Self {
        MemberFilter::Cellphone(term.into())
    }

    pub fn status(status: MemberStatus) -> Self {
        MemberFilter::Status(status)
    }

    pub fn matches(&self, member: &Member) -> bool {
        match self {
            MemberFilter::IdOrMemberNumber(term) => {
                !is_blank(term)
                    && (member.id_number.contains(term.as_str())
                        || member.member_number.contains(term.as_str()))
            }
            MemberFilter::Cellphone(term) => {
                !is_blank(term) && member.cellphone.contains(term.as_str())
            }
            MemberFilter::Status(status) => member.status == *status,
        }
    }

    /// WHERE fragment with `?` placeholders, plus values in order
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        match self {
            MemberFilter::IdOrMemberNumber(term) if is_blank(term) => ("0".to_string(), vec![]),
            MemberFilter::IdOrMemberNumber(term) => (
                "(instr(id_number, ?) > 0 OR instr(member_number, ?) > 0)".to_string(),
                vec![Value::Text(term.clone()), Value::Text(term.clone())],
            ),
            MemberFilter::Cellphone(term) if is_blank(term) => ("0".to_string(), vec![]),
            MemberFilter::Cellphone(term) => (
                "instr(cellphone, ?) > 0".to_string(),
                vec![Value::Text(term.clone())],
            ),
            MemberFilter::Status(status) => (
                "status = ?".to_string(),
                vec![Value::Text(status.as_str().to_string())],
            ),
        }
    }
}

fn is_blank(term: &str) -> bool {
    term.trim().is_empty()
}

// ============================================================================
// QUERY
// ============================================================================

/// Filters from the list screen, ANDed together, newest first.
///
/// Blank form inputs mean "filter not set" and are skipped here; a
/// `MemberFilter` built directly from a blank term still matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberQuery {
    filters: Vec<MemberFilter>,
}

impl MemberQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: Option<&str>) -> Self {
        if let Some(term) = term.filter(|t| !is_blank(t)) {
            self.filters.push(MemberFilter::search_by_id_or_member(term));
        }
        self
    }

    pub fn cellphone(mut self, term: Option<&str>) -> Self {
        if let Some(term) = term.filter(|t| !is_blank(t)) {
            self.filters.push(MemberFilter::filter_by_cellphone(term));
        }
        self
    }

    pub fn status(mut self, status: Option<MemberStatus>) -> Self {
        if let Some(status) = status {
            self.filters.push(MemberFilter::status(status));
        }
        self
    }

    /// Add a predicate as-is, blank terms included
    pub fn filter(mut self, filter: MemberFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(&self) -> &[MemberFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn matches(&self, member: &Member) -> bool {
        self.filters.iter().all(|f| f.matches(member))
    }

    /// `WHERE ...` clause (empty when unfiltered) and its parameters
    pub fn where_clause(&self) -> (String, Vec<Value>) {
        if self.filters.is_empty() {
            return (String::new(), vec![]);
        }

        let mut clauses = Vec::with_capacity(self.filters.len());
        let mut values = Vec::new();
        for filter in &self.filters {
            let (sql, mut params) = filter.to_sql();
            clauses.push(sql);
            values.append(&mut params);
        }

        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}
