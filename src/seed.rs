// 🌱 Seeding - sample members and the admin account
//
// Both entry points can run repeatedly: samples are keyed by member number,
// the admin account by email.

use crate::config::Config;
use crate::db;
use crate::error::RegistryError;
use crate::factory::MemberFactory;
use crate::member::MemberStatus;
use crate::member_number::MemberNumberGenerator;
use crate::registry::MemberRegistry;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::Rng;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

pub const SEED_ACTOR: &str = "seeder";

pub const ADMIN_NAME: &str = "Admin User";

struct SampleMember {
    member_number: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    cellphone: &'static str,
    status: MemberStatus,
}

const SAMPLE_MEMBERS: [SampleMember; 10] = [
    SampleMember {
        member_number: "MBR0001",
        first_name: "Sophia",
        last_name: "Clark",
        email: "sophia.clark@email.com",
        cellphone: "0821234567",
        status: MemberStatus::Active,
    },
    SampleMember {
        member_number: "MBR0002",
        first_name: "Liam",
        last_name: "Walker",
        email: "liam.walker@email.com",
        cellphone: "0827654321",
        status: MemberStatus::Active,
    },
    SampleMember {
        member_number: "MBR0003",
        first_name: "Olivia",
        last_name: "Green",
        email: "olivia.green@email.com",
        cellphone: "0829876543",
        status: MemberStatus::Inactive,
    },
    SampleMember {
        member_number: "MBR0004",
        first_name: "Noah",
        last_name: "Hill",
        email: "noah.hill@email.com",
        cellphone: "0831112233",
        status: MemberStatus::Active,
    },
    SampleMember {
        member_number: "MBR0005",
        first_name: "Ava",
        last_name: "Baker",
        email: "ava.baker@email.com",
        cellphone: "0844455566",
        status: MemberStatus::Suspended,
    },
    SampleMember {
        member_number: "MBR0006",
        first_name: "Ethan",
        last_name: "Cook",
        email: "ethan.cook@email.com",
        cellphone: "0765556677",
        status: MemberStatus::Active,
    },
    SampleMember {
        member_number: "MBR0007",
        first_name: "Isabella",
        last_name: "Murphy",
        email: "isabella.murphy@email.com",
        cellphone: "0788990011",
        status: MemberStatus::Active,
    },
    SampleMember {
        member_number: "MBR0008",
        first_name: "Mason",
        last_name: "Rivera",
        email: "mason.rivera@email.com",
        cellphone: "0712345678",
        status: MemberStatus::Inactive,
    },
    SampleMember {
        member_number: "MBR0009",
        first_name: "Mia",
        last_name: "Cooper",
        email: "mia.cooper@email.com",
        cellphone: "0734567890",
        status: MemberStatus::Active,
    },
    SampleMember {
        member_number: "MBR0010",
        first_name: "Alexander",
        last_name: "Reed",
        email: "alexander.reed@email.com",
        cellphone: "0756789012",
        status: MemberStatus::Active,
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub samples_inserted: usize,
    pub samples_skipped: usize,
    pub random_inserted: usize,
    /// Random members dropped because a unique field clashed
    pub random_rejected: usize,
}

/// Seed the ten sample members plus `config.seed_random_members` random ones
pub fn seed_members<R: Rng>(
    conn: &Connection,
    config: &Config,
    today: NaiveDate,
    factory: &mut MemberFactory<R>,
) -> Result<SeedSummary> {
    let mut registry = MemberRegistry::with_generator(
        conn,
        MemberNumberGenerator::with_rng(rand::thread_rng(), config.max_generation_attempts),
    )
    .actor(SEED_ACTOR);
    let mut summary = SeedSummary::default();

    for sample in &SAMPLE_MEMBERS {
        if db::member_number_exists(conn, sample.member_number)? {
            summary.samples_skipped += 1;
            continue;
        }

        let mut input = factory.make_with_status(sample.status);
        input.member_number = Some(sample.member_number.to_string());
        input.first_name = sample.first_name.to_string();
        input.last_name = sample.last_name.to_string();
        input.email = sample.email.to_string();
        input.cellphone = sample.cellphone.to_string();

        registry
            .register(&input, today)
            .with_context(|| format!("Failed to seed sample member {}", sample.member_number))?;
        summary.samples_inserted += 1;
    }

    for _ in 0..config.seed_random_members {
        let input = factory.make();
        match registry.register(&input, today) {
            Ok(_) => summary.random_inserted += 1,
            Err(err @ RegistryError::Duplicate { .. }) => {
                tracing::warn!(error = %err, "skipping random member");
                summary.random_rejected += 1;
            }
            Err(err) => return Err(err).context("Failed to seed random member"),
        }
    }

    tracing::info!(?summary, "member seeding finished");
    Ok(summary)
}

/// Create or refresh the admin account. Returns true when it was created.
pub fn seed_admin_user(conn: &Connection, config: &Config) -> Result<bool> {
    let hash = hash_password(&config.admin_password);
    let created = db::upsert_user(conn, ADMIN_NAME, &config.admin_email, &hash)
        .with_context(|| format!("Failed to upsert admin user {}", config.admin_email))?;

    tracing::info!(email = %config.admin_email, created, "admin user ready");
    Ok(created)
}

// ============================================================================
// PASSWORDS
// ============================================================================

/// `sha256$<salt>$<hex digest of salt + password>`
pub fn hash_password(password: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("sha256${}${}", salt, digest(&salt, password))
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MemberQuery;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn verify_password(password: &str, stored: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("sha256"), Some(salt), Some(expected)) => digest(salt, password) == expected,
            _ => false,
        }
    }

    fn config(random: usize) -> Config {
        Config {
            seed_random_members: random,
            ..Config::default()
        }
    }

    #[test]
    fn test_seeds_samples_and_random_members() {
        let conn = setup();
        let mut factory = MemberFactory::with_rng(StdRng::seed_from_u64(1));

        let summary = seed_members(&conn, &config(5), today(), &mut factory).unwrap();
        assert_eq!(summary.samples_inserted, 10);
        assert_eq!(summary.random_inserted + summary.random_rejected, 5);
        assert_eq!(db::count_members(&conn).unwrap() as usize, 10 + summary.random_inserted);

        let sophia = db::get_member_by_number(&conn, "MBR0001").unwrap().unwrap();
        assert_eq!(sophia.full_name(), "Sophia Clark");
        assert_eq!(sophia.cellphone, "0821234567");

        let ava = db::get_member_by_number(&conn, "MBR0005").unwrap().unwrap();
        assert_eq!(ava.status, MemberStatus::Suspended);
    }

    #[test]
    fn test_samples_are_not_duplicated() {
        let conn = setup();
        let mut factory = MemberFactory::with_rng(StdRng::seed_from_u64(1));

        seed_members(&conn, &config(0), today(), &mut factory).unwrap();
        let again = seed_members(&conn, &config(0), today(), &mut factory).unwrap();

        assert_eq!(again.samples_inserted, 0);
        assert_eq!(again.samples_skipped, 10);
        assert_eq!(db::list_members(&conn, &MemberQuery::new()).unwrap().len(), 10);
    }

    #[test]
    fn test_seeded_events_name_the_seeder() {
        let conn = setup();
        let mut factory = MemberFactory::with_rng(StdRng::seed_from_u64(1));
        seed_members(&conn, &config(0), today(), &mut factory).unwrap();

        let member = db::get_member_by_number(&conn, "MBR0010").unwrap().unwrap();
        let events = db::get_events_for_entity(&conn, "member", &member.id.to_string()).unwrap();
        assert_eq!(events[0].actor, SEED_ACTOR);
    }

    #[test]
    fn test_admin_user_upsert() {
        let conn = setup();
        let config = Config::default();

        assert!(seed_admin_user(&conn, &config).unwrap());
        assert!(!seed_admin_user(&conn, &config).unwrap());

        let user = db::get_user_by_email(&conn, "admin@test.com").unwrap().unwrap();
        assert_eq!(user.name, ADMIN_NAME);
        assert!(verify_password("password", &user.password_hash));
        assert!(!verify_password("wrong", &user.password_hash));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let first = hash_password("password");
        let second = hash_password("password");
        assert_ne!(first, second);
        assert!(first.starts_with("sha256$"));
        assert!(verify_password("password", &first));
        assert!(!verify_password("password", "plain-text"));
    }
}
