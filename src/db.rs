use crate::error::{RegistryError, Result};
use crate::member::{Member, MemberStatus};
use crate::search::MemberQuery;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";

const MEMBER_COLUMNS: &str = "id, member_number, id_number, first_name, last_name, email,
                cellphone, date_of_birth, status, created_at, updated_at";

/// Member row about to be written (id and timestamps are assigned here)
#[derive(Debug, Clone, PartialEq)]
pub struct NewMember {
    pub member_number: String,
    pub id_number: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub cellphone: String,
    pub date_of_birth: NaiveDate,
    pub status: MemberStatus,
}

/// Event for audit trail: every create/update/delete of a member
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Admin account allowed into the registry screens
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

    // ==========================================================================
    // Members Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            member_number TEXT NOT NULL UNIQUE,
            id_number TEXT NOT NULL UNIQUE CHECK (length(id_number) <= 13),
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            cellphone TEXT NOT NULL UNIQUE CHECK (length(cellphone) <= 15),
            date_of_birth TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'inactive', 'suspended')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Users Table (admin accounts)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            email_verified_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes (substring search over member/ID number, cellphone, email)
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_number_id ON members(member_number, id_number)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_cellphone ON members(cellphone)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_members_email ON members(email)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// MEMBERS
// ============================================================================

pub fn insert_member(conn: &Connection, member: &NewMember) -> Result<Member> {
    let (now, now_str) = now_timestamp();

    conn.execute(
        "INSERT INTO members (
            member_number, id_number, first_name, last_name, email,
            cellphone, date_of_birth, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            member.member_number,
            member.id_number,
            member.first_name,
            member.last_name,
            member.email,
            member.cellphone,
            member.date_of_birth.format(DATE_FORMAT).to_string(),
            member.status.as_str(),
            now_str,
        ],
    )
    .map_err(map_constraint_error)?;

    Ok(Member {
        id: conn.last_insert_rowid(),
        member_number: member.member_number.clone(),
        id_number: member.id_number.clone(),
        first_name: member.first_name.clone(),
        last_name: member.last_name.clone(),
        email: member.email.clone(),
        cellphone: member.cellphone.clone(),
        date_of_birth: member.date_of_birth,
        status: member.status,
        created_at: now,
        updated_at: now,
    })
}

/// Overwrite every mutable column; member number and created_at are kept.
/// Returns false when no row has this id.
pub fn update_member_row(conn: &Connection, id: i64, member: &NewMember) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE members
             SET id_number = ?1,
                 first_name = ?2,
                 last_name = ?3,
                 email = ?4,
                 cellphone = ?5,
                 date_of_birth = ?6,
                 status = ?7,
                 updated_at = ?8
             WHERE id = ?9",
            params![
                member.id_number,
                member.first_name,
                member.last_name,
                member.email,
                member.cellphone,
                member.date_of_birth.format(DATE_FORMAT).to_string(),
                member.status.as_str(),
                now_timestamp().1,
                id,
            ],
        )
        .map_err(map_constraint_error)?;

    Ok(changed > 0)
}

pub fn delete_member(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM members WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

pub fn get_member(conn: &Connection, id: i64) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS),
            params![id],
            member_from_row,
        )
        .optional()?;

    Ok(member)
}

pub fn get_member_by_number(conn: &Connection, member_number: &str) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            &format!("SELECT {} FROM members WHERE member_number = ?1", MEMBER_COLUMNS),
            params![member_number],
            member_from_row,
        )
        .optional()?;

    Ok(member)
}

/// Existence probe used by member number generation
pub fn member_number_exists(conn: &Connection, member_number: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM members WHERE member_number = ?1)",
        params![member_number],
        |row| row.get(0),
    )?;

    Ok(exists)
}

/// Members matching the query, newest first
pub fn list_members(conn: &Connection, query: &MemberQuery) -> Result<Vec<Member>> {
    let (where_clause, values) = query.where_clause();
    let sql = format!(
        "SELECT {} FROM members {} ORDER BY created_at DESC, id DESC",
        MEMBER_COLUMNS, where_clause
    );

    let mut stmt = conn.prepare(&sql)?;
    let members = stmt
        .query_map(params_from_iter(values), member_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(members)
}

pub fn count_members(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?;

    Ok(count)
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    let date_of_birth: String = row.get(7)?;
    let status: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Member {
        id: row.get(0)?,
        member_number: row.get(1)?,
        id_number: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        email: row.get(5)?,
        cellphone: row.get(6)?,
        date_of_birth: NaiveDate::parse_from_str(&date_of_birth, DATE_FORMAT)
            .map_err(|e| conversion_error(7, e))?,
        status: status.parse().map_err(|e| conversion_error(8, e))?,
        created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(9, e))?,
        updated_at: parse_timestamp(&updated_at).map_err(|e| conversion_error(10, e))?,
    })
}

/// Microsecond precision keeps the text form sortable
fn now_timestamp() -> (DateTime<Utc>, String) {
    let now = Utc::now().trunc_subsecs(6);
    (now, now.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

/// Turn "UNIQUE constraint failed: members.<column>" into a Duplicate error
/// carrying the message shown next to the offending field.
pub fn map_constraint_error(err: rusqlite::Error) -> RegistryError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref message)) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            if let Some(column) = message
                .strip_prefix("UNIQUE constraint failed: members.")
                .map(|rest| rest.split(',').next().unwrap_or(rest).trim())
            {
                return RegistryError::Duplicate {
                    field: column.to_string(),
                    message: duplicate_message(column),
                };
            }
        }
    }

    RegistryError::Database(err)
}

fn duplicate_message(column: &str) -> String {
    match column {
        "id_number" => "This ID number is already registered.".to_string(),
        "email" => "This email address is already registered.".to_string(),
        "cellphone" => "This cellphone number is already registered.".to_string(),
        "member_number" => "This member number is already assigned.".to_string(),
        other => format!("The {} has already been taken.", other),
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp_str).map_err(|e| conversion_error(1, e))?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| conversion_error(5, e))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

// ============================================================================
// USERS
// ============================================================================

/// Insert or refresh an account keyed by email. Returns true when created.
pub fn upsert_user(conn: &Connection, name: &str, email: &str, password_hash: &str) -> Result<bool> {
    let now = now_timestamp().1;
    let existed = get_user_by_email(conn, email)?.is_some();

    conn.execute(
        "INSERT INTO users (name, email, password_hash, email_verified_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4, ?4)
         ON CONFLICT(email) DO UPDATE SET
             name = excluded.name,
             password_hash = excluded.password_hash,
             email_verified_at = COALESCE(users.email_verified_at, excluded.email_verified_at),
             updated_at = excluded.updated_at",
        params![name, email, password_hash, now],
    )?;

    Ok(!existed)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, password_hash, email_verified_at FROM users WHERE email = ?1",
            params![email],
            |row| {
                let verified: Option<String> = row.get(4)?;
                Ok(User {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    password_hash: row.get(3)?,
                    email_verified_at: verified
                        .map(|s| parse_timestamp(&s))
                        .transpose()
                        .map_err(|e| conversion_error(4, e))?,
                })
            },
        )
        .optional()?;

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MemberFilter;

    fn new_member(member_number: &str, id_number: &str, email: &str, cellphone: &str) -> NewMember {
        NewMember {
            member_number: member_number.to_string(),
            id_number: id_number.to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            email: email.to_string(),
            cellphone: cellphone.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            status: MemberStatus::Active,
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = setup();
        setup_database(&conn).unwrap();
        assert_eq!(count_members(&conn).unwrap(), 0);
    }

    #[test]
    fn test_insert_and_read_back() {
        let conn = setup();
        let inserted = insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "john@example.com", "0821234567"),
        )
        .unwrap();

        let found = get_member(&conn, inserted.id).unwrap().unwrap();
        assert_eq!(found.member_number, "MBR0001");
        assert_eq!(found.date_of_birth, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        assert_eq!(found.status, MemberStatus::Active);
        assert_eq!(found.created_at, found.updated_at);

        let by_number = get_member_by_number(&conn, "MBR0001").unwrap().unwrap();
        assert_eq!(by_number.id, inserted.id);
        assert!(get_member(&conn, inserted.id + 1).unwrap().is_none());
    }

    #[test]
    fn test_unique_columns_map_to_duplicate() {
        let conn = setup();
        insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "john@example.com", "0821234567"),
        )
        .unwrap();

        let cases = [
            (new_member("MBR0002", "8506115009084", "john@example.com", "0827654321"), "email"),
            (new_member("MBR0002", "8506115009084", "jane@example.com", "0821234567"), "cellphone"),
            (new_member("MBR0002", "9001015009086", "jane@example.com", "0827654321"), "id_number"),
            (new_member("MBR0001", "8506115009084", "jane@example.com", "0827654321"), "member_number"),
        ];

        for (member, column) in cases {
            match insert_member(&conn, &member) {
                Err(RegistryError::Duplicate { field, .. }) => assert_eq!(field, column),
                other => panic!("expected duplicate {}, got {:?}", column, other),
            }
        }
        assert_eq!(count_members(&conn).unwrap(), 1);
    }

    #[test]
    fn test_status_check_constraint() {
        let conn = setup();
        let result = conn.execute(
            "INSERT INTO members (member_number, id_number, first_name, last_name, email,
                cellphone, date_of_birth, status, created_at, updated_at)
             VALUES ('MBR0001', '9001015009086', 'a', 'b', 'c@d.com', '0821234567',
                '1990-01-01', 'deleted', 'x', 'x')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_update_and_delete() {
        let conn = setup();
        let member = insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "john@example.com", "0821234567"),
        )
        .unwrap();

        let mut changed = new_member("IGNORED", "9001015009086", "updated@example.com", "0821234567");
        changed.status = MemberStatus::Inactive;
        assert!(update_member_row(&conn, member.id, &changed).unwrap());

        let fresh = get_member(&conn, member.id).unwrap().unwrap();
        assert_eq!(fresh.email, "updated@example.com");
        assert_eq!(fresh.status, MemberStatus::Inactive);
        assert_eq!(fresh.member_number, "MBR0001");

        assert!(delete_member(&conn, member.id).unwrap());
        assert!(!delete_member(&conn, member.id).unwrap());
        assert!(get_member(&conn, member.id).unwrap().is_none());
        assert!(!update_member_row(&conn, member.id, &changed).unwrap());
    }

    #[test]
    fn test_member_number_exists() {
        let conn = setup();
        assert!(!member_number_exists(&conn, "MBR0001").unwrap());
        insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "john@example.com", "0821234567"),
        )
        .unwrap();
        assert!(member_number_exists(&conn, "MBR0001").unwrap());
    }

    #[test]
    fn test_list_members_with_filters() {
        let conn = setup();
        insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "a@example.com", "0821234567"),
        )
        .unwrap();
        let mut second = new_member("MBR0002", "8506115009084", "b@example.com", "0839876543");
        second.status = MemberStatus::Suspended;
        insert_member(&conn, &second).unwrap();

        assert_eq!(list_members(&conn, &MemberQuery::new()).unwrap().len(), 2);

        let by_id = MemberQuery::new().search(Some("85061"));
        let found = list_members(&conn, &by_id).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].member_number, "MBR0002");

        let by_phone = MemberQuery::new().cellphone(Some("082"));
        assert_eq!(list_members(&conn, &by_phone).unwrap()[0].member_number, "MBR0001");

        let by_status = MemberQuery::new().status(Some(MemberStatus::Suspended));
        assert_eq!(list_members(&conn, &by_status).unwrap().len(), 1);

        let none = MemberQuery::new().search(Some("NONEXISTENT"));
        assert!(list_members(&conn, &none).unwrap().is_empty());
    }

    #[test]
    fn test_blank_predicates_return_no_rows() {
        let conn = setup();
        insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "a@example.com", "0821234567"),
        )
        .unwrap();

        let query = MemberQuery::new().filter(MemberFilter::filter_by_cellphone(""));
        assert!(list_members(&conn, &query).unwrap().is_empty());

        let query = MemberQuery::new().filter(MemberFilter::search_by_id_or_member(""));
        assert!(list_members(&conn, &query).unwrap().is_empty());
    }

    #[test]
    fn test_sql_search_is_case_sensitive() {
        let conn = setup();
        insert_member(
            &conn,
            &new_member("MBR0001", "9001015009086", "a@example.com", "0821234567"),
        )
        .unwrap();

        let lower = MemberQuery::new().search(Some("mbr"));
        assert!(list_members(&conn, &lower).unwrap().is_empty());
    }

    #[test]
    fn test_event_log() {
        let conn = setup();

        let event = Event::new(
            "member_created",
            "member",
            "1",
            serde_json::json!({"member_number": "MBR0001"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "member", "1").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "member_created");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["member_number"], "MBR0001");
    }

    #[test]
    fn test_upsert_user_is_idempotent() {
        let conn = setup();

        assert!(upsert_user(&conn, "Admin User", "admin@test.com", "hash-1").unwrap());
        assert!(!upsert_user(&conn, "Admin User", "admin@test.com", "hash-2").unwrap());

        let user = get_user_by_email(&conn, "admin@test.com").unwrap().unwrap();
        assert_eq!(user.password_hash, "hash-2");
        assert!(user.email_verified_at.is_some());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_list_is_newest_first_with_id_tie_break() {
        let conn = setup();
        let ids: Vec<i64> = [
            ("MBR0001", "9001015009086", "a@example.com", "0821234561"),
            ("MBR0002", "8506115009084", "b@example.com", "0821234562"),
            ("MBR0003", "0001014009185", "c@example.com", "0821234563"),
            ("MBR0004", "9501015009082", "d@example.com", "0821234564"),
        ]
        .iter()
        .map(|(number, id_number, email, cellphone)| {
            insert_member(&conn, &new_member(number, id_number, email, cellphone))
                .unwrap()
                .id
        })
        .collect();

        let listed = |conn: &Connection| -> Vec<i64> {
            list_members(conn, &MemberQuery::new())
                .unwrap()
                .iter()
                .map(|m| m.id)
                .collect()
        };
        assert_eq!(listed(&conn), ids.iter().rev().copied().collect::<Vec<_>>());

        conn.execute(
            "UPDATE members SET created_at = '2024-01-01T00:00:00.000000Z'",
            [],
        )
        .unwrap();
        assert_eq!(listed(&conn), vec![ids[3], ids[2], ids[1], ids[0]]);

        conn.execute(
            "UPDATE members SET created_at = '2024-03-01T00:00:00.000000Z' WHERE id = ?1",
            params![ids[0]],
        )
        .unwrap();
        assert_eq!(listed(&conn), vec![ids[0], ids[3], ids[2], ids[1]]);
    }
}
