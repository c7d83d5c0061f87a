// Member Registry - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod cellphone;
pub mod config;
pub mod db;
pub mod error;
pub mod factory;
pub mod identity;
pub mod import;
pub mod member;
pub mod member_number;
pub mod registry;
pub mod search;
pub mod seed;
pub mod validation;

// Re-export commonly used types
pub use cellphone::is_valid_sa_cellphone;
pub use config::Config;
pub use db::{
    Event, NewMember, User,
    setup_database, insert_member, update_member_row, delete_member,
    get_member, get_member_by_number, member_number_exists, list_members,
    count_members, insert_event, get_events_for_entity,
};
pub use error::{RegistryError, Result};
pub use factory::MemberFactory;
pub use identity::{
    extract_date_of_birth, is_valid_sa_id,
    BirthDateError, Citizenship, Gender, IdNumberError, IdentityNumber,
};
pub use import::{import_members, import_members_from_reader, ImportSummary, RejectedRow};
pub use member::{Member, MemberInput, MemberStatus};
pub use member_number::{format_member_number, MemberNumberGenerator};
pub use registry::{
    MemberRegistry,
    register_member, update_member, remove_member, find_member, search_members,
};
pub use search::{MemberFilter, MemberQuery};
pub use seed::{seed_admin_user, seed_members, SeedSummary};
pub use validation::{validate_member, FieldError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
