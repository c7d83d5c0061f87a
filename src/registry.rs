// 🗂️ Member registry - record lifecycle on top of the storage layer
//
// register → validate, derive birth date, assign member number, insert
// update   → validate, re-derive birth date when the ID number changes
// remove   → delete and keep the audit trail
//
// Every successful mutation writes its audit event in the same transaction.

use crate::config::Config;
use crate::db::{self, Event, NewMember};
use crate::error::{RegistryError, Result};
use crate::identity::extract_date_of_birth;
use crate::member::{Member, MemberInput};
use crate::member_number::MemberNumberGenerator;
use crate::search::MemberQuery;
use crate::validation::{validate_member, FieldError, ValidMember};
use chrono::NaiveDate;
use rand::rngs::ThreadRng;
use rand::Rng;
use rusqlite::Connection;

pub const ENTITY_TYPE: &str = "member";

/// Actor recorded on events when none is given
pub const DEFAULT_ACTOR: &str = "registry";

pub struct MemberRegistry<'c, R: Rng = ThreadRng> {
    conn: &'c Connection,
    generator: MemberNumberGenerator<R>,
    actor: String,
}

impl<'c> MemberRegistry<'c, ThreadRng> {
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_generator(conn, MemberNumberGenerator::new())
    }

    pub fn from_config(conn: &'c Connection, config: &Config) -> Self {
        Self::with_generator(
            conn,
            MemberNumberGenerator::with_rng(rand::thread_rng(), config.max_generation_attempts),
        )
    }
}

impl<'c, R: Rng> MemberRegistry<'c, R> {
    pub fn with_generator(conn: &'c Connection, generator: MemberNumberGenerator<R>) -> Self {
        MemberRegistry {
            conn,
            generator,
            actor: DEFAULT_ACTOR.to_string(),
        }
    }

    /// Name recorded as the actor of audit events
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    // ========================================================================
    // REGISTER
    // ========================================================================

    /// Create a member from form input.
    ///
    /// A supplied member number is inserted once and a clash is reported as
    /// a duplicate. A generated one is redrawn when the insert loses a race
    /// on the member number, up to the generator's attempt ceiling.
    pub fn register(&mut self, input: &MemberInput, today: NaiveDate) -> Result<Member> {
        let valid = validate_member(input, today).map_err(RegistryError::Validation)?;
        let date_of_birth = derive_birth_date(&valid.id_number, today)?;
        let supplied = valid.member_number.clone();
        let mut record = new_member(valid, date_of_birth);

        let conn = self.conn;
        let tx = conn.unchecked_transaction()?;
        let member = match supplied {
            Some(number) => {
                record.member_number = number;
                db::insert_member(&tx, &record)?
            }
            None => self.insert_with_generated_number(&tx, &mut record)?,
        };

        let event = Event::new(
            "member_created",
            ENTITY_TYPE,
            &member.id.to_string(),
            serde_json::json!({
                "member_number": member.member_number,
                "id_number": member.id_number,
                "status": member.status,
            }),
            &self.actor,
        );
        db::insert_event(&tx, &event)?;
        tx.commit()?;

        tracing::info!(
            id = member.id,
            member_number = %member.member_number,
            "member registered"
        );
        Ok(member)
    }

    fn insert_with_generated_number(
        &mut self,
        conn: &Connection,
        record: &mut NewMember,
    ) -> Result<Member> {
        let attempts = self.generator.max_attempts();

        // Taken numbers and insert-time clashes share one attempt budget
        for attempt in 1..=attempts {
            let candidate = self.generator.candidate();
            if db::member_number_exists(conn, &candidate)? {
                tracing::debug!(%candidate, attempt, "member number already assigned");
                continue;
            }
            record.member_number = candidate;

            match db::insert_member(conn, record) {
                Err(RegistryError::Duplicate { ref field, .. }) if field == "member_number" => {
                    tracing::debug!(
                        member_number = %record.member_number,
                        attempt,
                        "member number taken at insert, drawing again"
                    );
                }
                result => return result,
            }
        }

        tracing::warn!(attempts, "gave up assigning a member number");
        Err(RegistryError::GenerationExhausted { attempts })
    }

    // ========================================================================
    // UPDATE / REMOVE
    // ========================================================================

    /// Replace the editable fields of a member.
    ///
    /// The member number and creation time never change; any member number
    /// in the input is ignored.
    pub fn update(&mut self, id: i64, input: &MemberInput, today: NaiveDate) -> Result<Member> {
        let existing = db::get_member(self.conn, id)?.ok_or(RegistryError::NotFound(id))?;
        let valid = validate_member(input, today).map_err(RegistryError::Validation)?;

        let date_of_birth = if valid.id_number == existing.id_number {
            existing.date_of_birth
        } else {
            derive_birth_date(&valid.id_number, today)?
        };

        let mut record = new_member(valid, date_of_birth);
        record.member_number = existing.member_number.clone();
        let changes = changed_fields(&existing, &record);

        let tx = self.conn.unchecked_transaction()?;
        if !db::update_member_row(&tx, id, &record)? {
            return Err(RegistryError::NotFound(id));
        }

        let event = Event::new(
            "member_updated",
            ENTITY_TYPE,
            &id.to_string(),
            serde_json::json!({
                "member_number": existing.member_number,
                "changes": changes,
            }),
            &self.actor,
        );
        db::insert_event(&tx, &event)?;
        tx.commit()?;

        tracing::info!(id, member_number = %existing.member_number, ?changes, "member updated");
        db::get_member(self.conn, id)?.ok_or(RegistryError::NotFound(id))
    }

    /// Delete a member, returning the record as it was
    pub fn remove(&mut self, id: i64) -> Result<Member> {
        let existing = db::get_member(self.conn, id)?.ok_or(RegistryError::NotFound(id))?;

        let tx = self.conn.unchecked_transaction()?;
        if !db::delete_member(&tx, id)? {
            return Err(RegistryError::NotFound(id));
        }

        let event = Event::new(
            "member_deleted",
            ENTITY_TYPE,
            &id.to_string(),
            serde_json::json!({
                "member_number": existing.member_number,
                "id_number": existing.id_number,
            }),
            &self.actor,
        );
        db::insert_event(&tx, &event)?;
        tx.commit()?;

        tracing::info!(id, member_number = %existing.member_number, "member removed");
        Ok(existing)
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn find(&self, id: i64) -> Result<Member> {
        db::get_member(self.conn, id)?.ok_or(RegistryError::NotFound(id))
    }

    pub fn search(&self, query: &MemberQuery) -> Result<Vec<Member>> {
        db::list_members(self.conn, query)
    }

    /// Audit events for a member, newest first (kept after removal)
    pub fn history(&self, id: i64) -> Result<Vec<Event>> {
        db::get_events_for_entity(self.conn, ENTITY_TYPE, &id.to_string())
    }
}

// ============================================================================
// FREE-FUNCTION ENTRY POINTS
// ============================================================================

pub fn register_member(
    conn: &Connection,
    input: &MemberInput,
    today: NaiveDate,
    config: &Config,
) -> Result<Member> {
    MemberRegistry::from_config(conn, config).register(input, today)
}

pub fn update_member(
    conn: &Connection,
    id: i64,
    input: &MemberInput,
    today: NaiveDate,
) -> Result<Member> {
    MemberRegistry::new(conn).update(id, input, today)
}

pub fn remove_member(conn: &Connection, id: i64) -> Result<Member> {
    MemberRegistry::new(conn).remove(id)
}

pub fn find_member(conn: &Connection, id: i64) -> Result<Member> {
    MemberRegistry::new(conn).find(id)
}

pub fn search_members(conn: &Connection, query: &MemberQuery) -> Result<Vec<Member>> {
    MemberRegistry::new(conn).search(query)
}

// ============================================================================
// HELPERS
// ============================================================================

fn derive_birth_date(id_number: &str, today: NaiveDate) -> Result<NaiveDate> {
    match extract_date_of_birth(id_number, today)? {
        Some(date) => Ok(date),
        None => Err(RegistryError::Validation(vec![FieldError::new(
            "id_number",
            "id_number",
            "The ID number must be a valid South African ID number.",
        )])),
    }
}

fn new_member(valid: ValidMember, date_of_birth: NaiveDate) -> NewMember {
    NewMember {
        member_number: valid.member_number.unwrap_or_default(),
        id_number: valid.id_number,
        first_name: valid.first_name,
        last_name: valid.last_name,
        email: valid.email,
        cellphone: valid.cellphone,
        date_of_birth,
        status: valid.status,
    }
}

fn changed_fields(before: &Member, after: &NewMember) -> Vec<&'static str> {
    let mut changes = Vec::new();
    if before.id_number != after.id_number {
        changes.push("id_number");
    }
    if before.first_name != after.first_name {
        changes.push("first_name");
    }
    if before.last_name != after.last_name {
        changes.push("last_name");
    }
    if before.email != after.email {
        changes.push("email");
    }
    if before.cellphone != after.cellphone {
        changes.push("cellphone");
    }
    if before.status != after.status {
        changes.push("status");
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::MemberFactory;
    use crate::member::MemberStatus;
    use crate::member_number::DEFAULT_MAX_ATTEMPTS;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn seeded_generator(max_attempts: usize) -> MemberNumberGenerator<StdRng> {
        MemberNumberGenerator::with_rng(StdRng::seed_from_u64(7), max_attempts)
    }

    fn registry(conn: &Connection) -> MemberRegistry<'_, StdRng> {
        MemberRegistry::with_generator(conn, seeded_generator(DEFAULT_MAX_ATTEMPTS))
    }

    fn john() -> MemberInput {
        MemberInput {
            member_number: None,
            id_number: "9001015009086".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            cellphone: "0821234567".to_string(),
            status: Some("active".to_string()),
        }
    }

    fn factory() -> MemberFactory<StdRng> {
        MemberFactory::with_rng(StdRng::seed_from_u64(99))
    }

    #[test]
    fn test_register_assigns_number_and_birth_date() {
        let conn = setup();
        let member = registry(&conn).register(&john(), today()).unwrap();

        assert!(Regex::new(r"^MBR\d{4}$").unwrap().is_match(&member.member_number));
        assert_eq!(member.date_of_birth, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        assert_eq!(member.status, MemberStatus::Active);
        assert_eq!(member.full_name(), "John Doe");

        let stored = db::get_member(&conn, member.id).unwrap().unwrap();
        assert_eq!(stored, member);
    }

    #[test]
    fn test_register_normalizes_fields() {
        let conn = setup();
        let mut input = john();
        input.cellphone = "+27 82 123 4567".to_string();
        input.email = "  john.doe@example.com ".to_string();

        let member = registry(&conn).register(&input, today()).unwrap();
        assert_eq!(member.cellphone, "+27821234567");
        assert_eq!(member.email, "john.doe@example.com");
    }

    #[test]
    fn test_register_keeps_supplied_member_number() {
        let conn = setup();
        let mut input = john();
        input.member_number = Some("MBR0042".to_string());

        let member = registry(&conn).register(&input, today()).unwrap();
        assert_eq!(member.member_number, "MBR0042");
    }

    #[test]
    fn test_supplied_member_number_clash_is_duplicate() {
        let conn = setup();
        let mut registry = registry(&conn);
        let mut first = john();
        first.member_number = Some("MBR0042".to_string());
        registry.register(&first, today()).unwrap();

        let mut second = factory().active();
        second.member_number = Some("MBR0042".to_string());
        let err = registry.register(&second, today()).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { ref field, .. } if field == "member_number"));
    }

    #[test]
    fn test_validation_errors_are_returned_together() {
        let conn = setup();
        let mut input = john();
        input.id_number = "1234567890123".to_string();
        input.cellphone = "123".to_string();

        let err = registry(&conn).register(&input, today()).unwrap_err();
        let fields: Vec<_> = err
            .field_errors()
            .unwrap()
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, vec!["id_number", "cellphone"]);
        assert!(err.is_user_error());
        assert_eq!(db::count_members(&conn).unwrap(), 0);
    }

    #[test]
    fn test_unique_fields_are_enforced() {
        let conn = setup();
        let mut registry = registry(&conn);
        registry.register(&john(), today()).unwrap();

        let mut other = factory().active();
        other.email = "john.doe@example.com".to_string();
        match registry.register(&other, today()) {
            Err(RegistryError::Duplicate { field, message }) => {
                assert_eq!(field, "email");
                assert_eq!(message, "This email address is already registered.");
            }
            other => panic!("expected duplicate email, got {:?}", other),
        }

        let mut other = factory().active();
        other.id_number = "9001015009086".to_string();
        assert!(matches!(
            registry.register(&other, today()),
            Err(RegistryError::Duplicate { ref field, .. }) if field == "id_number"
        ));

        let mut other = factory().active();
        other.cellphone = "082 123 4567".to_string();
        assert!(matches!(
            registry.register(&other, today()),
            Err(RegistryError::Duplicate { ref field, .. }) if field == "cellphone"
        ));

        assert_eq!(db::count_members(&conn).unwrap(), 1);
    }

    #[test]
    fn test_failed_register_leaves_no_event() {
        let conn = setup();
        let mut registry = registry(&conn);
        let member = registry.register(&john(), today()).unwrap();
        let _ = registry.register(&john(), today());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(registry.history(member.id).unwrap()[0].event_type, "member_created");
    }

    #[test]
    fn test_generation_skips_taken_numbers() {
        let conn = setup();
        let taken = seeded_generator(1).candidate();

        let mut input = factory().active();
        input.member_number = Some(taken.clone());
        registry(&conn).register(&input, today()).unwrap();

        let member = registry(&conn).register(&john(), today()).unwrap();
        assert_ne!(member.member_number, taken);
    }

    /// Claims `member_number` inside the insert itself, after the
    /// existence check has already passed
    fn claim_on_insert(conn: &Connection, member_number: &str) {
        conn.execute_batch(&format!(
            "CREATE TRIGGER claim_member_number BEFORE INSERT ON members
             WHEN NEW.member_number = '{number}'
             BEGIN
                 INSERT INTO members (
                     member_number, id_number, first_name, last_name, email,
                     cellphone, date_of_birth, status, created_at, updated_at
                 ) VALUES (
                     '{number}', '0000000000000', 'Other', 'Writer', 'other@example.com',
                     '0600000000', '1990-01-01', 'active',
                     '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z'
                 );
             END;",
            number = member_number
        ))
        .unwrap();
    }

    #[test]
    fn test_insert_race_draws_another_number() {
        let conn = setup();
        let first = seeded_generator(1).candidate();
        claim_on_insert(&conn, &first);

        let member = registry(&conn).register(&john(), today()).unwrap();
        assert_ne!(member.member_number, first);
        assert_eq!(db::count_members(&conn).unwrap(), 1);

        let events: i64 = conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
            .unwrap();
        assert_eq!(events, 1);
        assert_eq!(registry(&conn).history(member.id).unwrap().len(), 1);
    }

    #[test]
    fn test_taken_numbers_and_insert_races_share_attempts() {
        let conn = setup();
        let mut draws = seeded_generator(1);
        let taken = draws.candidate();
        let raced = draws.candidate();
        assert_ne!(taken, raced);

        let mut input = factory().active();
        input.member_number = Some(taken);
        registry(&conn).register(&input, today()).unwrap();
        claim_on_insert(&conn, &raced);

        let mut registry = MemberRegistry::with_generator(&conn, seeded_generator(2));
        let err = registry.register(&john(), today()).unwrap_err();
        assert!(matches!(err, RegistryError::GenerationExhausted { attempts: 2 }));
        assert_eq!(db::count_members(&conn).unwrap(), 1);
    }

    #[test]
    fn test_generation_exhaustion() {
        let conn = setup();
        let mut draws = seeded_generator(1);
        let mut factory = factory();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..3 {
            let number = draws.candidate();
            if seen.insert(number.clone()) {
                let mut input = factory.active();
                input.member_number = Some(number);
                registry(&conn).register(&input, today()).unwrap();
            }
        }

        let mut registry = MemberRegistry::with_generator(&conn, seeded_generator(3));
        let err = registry.register(&john(), today()).unwrap_err();
        assert!(matches!(err, RegistryError::GenerationExhausted { attempts: 3 }));
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_update_keeps_member_number_and_rederives_birth_date() {
        let conn = setup();
        let mut registry = registry(&conn).actor("admin@test.com");
        let member = registry.register(&john(), today()).unwrap();

        let mut input = john();
        input.member_number = Some("MBR9999".to_string());
        input.id_number = "8506115009084".to_string();
        input.status = Some("suspended".to_string());

        let updated = registry.update(member.id, &input, today()).unwrap();
        assert_eq!(updated.member_number, member.member_number);
        assert_eq!(updated.date_of_birth, NaiveDate::from_ymd_opt(1985, 6, 11).unwrap());
        assert_eq!(updated.status, MemberStatus::Suspended);
        assert_eq!(updated.created_at, member.created_at);
        assert!(updated.updated_at >= member.updated_at);

        let history = registry.history(member.id).unwrap();
        assert_eq!(history.len(), 2);
        let update_event = history
            .iter()
            .find(|e| e.event_type == "member_updated")
            .unwrap();
        assert_eq!(update_event.actor, "admin@test.com");
        assert_eq!(
            update_event.data["changes"],
            serde_json::json!(["id_number", "status"])
        );
    }

    #[test]
    fn test_update_unknown_member() {
        let conn = setup();
        let err = registry(&conn).update(42, &john(), today()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(42)));
    }

    #[test]
    fn test_update_into_another_members_email() {
        let conn = setup();
        let mut registry = registry(&conn);
        registry.register(&john(), today()).unwrap();
        let other = registry.register(&factory().active(), today()).unwrap();

        let mut input = MemberInput::from(&other);
        input.email = "john.doe@example.com".to_string();
        assert!(matches!(
            registry.update(other.id, &input, today()),
            Err(RegistryError::Duplicate { ref field, .. }) if field == "email"
        ));
    }

    #[test]
    fn test_remove_member() {
        let conn = setup();
        let mut registry = registry(&conn);
        let member = registry.register(&john(), today()).unwrap();

        let removed = registry.remove(member.id).unwrap();
        assert_eq!(removed.member_number, member.member_number);
        assert!(matches!(registry.find(member.id), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.remove(member.id), Err(RegistryError::NotFound(_))));

        let history = registry.history(member.id).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|e| e.event_type == "member_deleted"));
    }

    #[test]
    fn test_search_by_member_number_and_status() {
        let conn = setup();
        let mut registry = registry(&conn);
        let mut factory = factory();

        let mut input = john();
        input.member_number = Some("MBR0001".to_string());
        registry.register(&input, today()).unwrap();
        let mut suspended = factory.suspended();
        suspended.member_number = Some("MBR0002".to_string());
        registry.register(&suspended, today()).unwrap();

        let found = registry
            .search(&MemberQuery::new().search(Some("MBR0001")))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].first_name, "John");

        let found = registry
            .search(&MemberQuery::new().status(Some(MemberStatus::Suspended)))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].member_number, "MBR0002");

        assert_eq!(registry.search(&MemberQuery::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_free_functions() {
        let conn = setup();
        let member = register_member(&conn, &john(), today(), &Config::default()).unwrap();
        assert_eq!(find_member(&conn, member.id).unwrap().id_number, "9001015009086");

        let mut input = john();
        input.last_name = "Smith".to_string();
        assert_eq!(update_member(&conn, member.id, &input, today()).unwrap().last_name, "Smith");
        assert_eq!(search_members(&conn, &MemberQuery::new()).unwrap().len(), 1);

        remove_member(&conn, member.id).unwrap();
        assert!(search_members(&conn, &MemberQuery::new()).unwrap().is_empty());
    }
}
