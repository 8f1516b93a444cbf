//! Table naming and DDL.
//!
//! Every event gets its own table. Names are derived from the event name:
//! a readable slug plus a hash prefix, so distinct events never share a
//! table even when their slugs collide.

use registration_core::EventName;
use sha2::{Digest, Sha256};

/// Catalog mapping event names to their tables.
pub const CATALOG_TABLE: &str = "registration_collections";

const SLUG_LEN: usize = 24;
const HASH_HEX_LEN: usize = 12;

/// Table holding `event_name`'s registrations: `reg_<slug>_<hash>`.
///
/// ```
/// use registration_core::EventName;
/// use registration_postgres::schema::table_name;
///
/// let name = table_name(&EventName::parse("Tech Hunt").unwrap());
/// assert!(name.starts_with("reg_tech_hunt_"));
/// assert_eq!(name.len(), "reg_tech_hunt_".len() + 12);
/// ```
#[must_use]
pub fn table_name(event_name: &EventName) -> String {
    let digest = Sha256::digest(event_name.as_str().as_bytes());
    let hash: String = digest
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .take(HASH_HEX_LEN)
        .map(|nibble| char::from_digit(u32::from(nibble), 16).unwrap_or('0'))
        .collect();
    format!("reg_{}_{hash}", slug(event_name.as_str()))
}

/// Lowercase ASCII alphanumerics with single underscores between runs.
fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(SLUG_LEN);
    let mut pending_separator = false;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
        if out.len() >= SLUG_LEN {
            break;
        }
    }
    out.truncate(SLUG_LEN);
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "event".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Name of the unique constraint on `registration_number`.
#[must_use]
pub fn number_constraint(table: &str) -> String {
    format!("{table}_number_key")
}

/// Catalog DDL.
pub(crate) fn catalog_ddl() -> String {
    format!(
        r"
        CREATE TABLE IF NOT EXISTS {CATALOG_TABLE} (
            event_name TEXT PRIMARY KEY,
            table_name TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "
    )
}

/// Statements creating one event table and its indexes, in order.
pub(crate) fn event_table_ddl(table: &str) -> Vec<String> {
    let number_key = number_constraint(table);
    vec![
        format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
                id UUID PRIMARY KEY,
                registration_number TEXT NOT NULL,
                event_name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                team_name TEXT,
                registration_status TEXT NOT NULL,
                payment_status TEXT NOT NULL,
                checked_in BOOLEAN NOT NULL DEFAULT FALSE,
                submitted_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL,
                revision BIGINT NOT NULL,
                document JSONB NOT NULL,
                CONSTRAINT {number_key} UNIQUE (registration_number)
            )
            "
        ),
        format!("CREATE INDEX IF NOT EXISTS {table}_email_phone_idx ON {table} (email, phone)"),
        format!(
            "CREATE INDEX IF NOT EXISTS {table}_status_submitted_idx ON {table} (registration_status, submitted_at DESC)"
        ),
        format!("CREATE INDEX IF NOT EXISTS {table}_event_submitted_idx ON {table} (event_name, submitted_at DESC)"),
        format!("CREATE INDEX IF NOT EXISTS {table}_team_name_idx ON {table} (team_name)"),
        format!("CREATE INDEX IF NOT EXISTS {table}_payment_status_idx ON {table} (payment_status)"),
        format!("CREATE INDEX IF NOT EXISTS {table}_checked_in_idx ON {table} (checked_in)"),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn name(raw: &str) -> String {
        table_name(&EventName::parse(raw).unwrap())
    }

    #[test]
    fn slugs_are_lowercase_and_collapsed() {
        assert_eq!(slug("Tech Hunt"), "tech_hunt");
        assert_eq!(slug("  BGMI -- Squad!! "), "bgmi_squad");
        assert_eq!(slug("Ωmega"), "mega");
        assert_eq!(slug("!!!"), "event");
        assert_eq!(slug("a very long event name that keeps going").len(), SLUG_LEN);
    }

    #[test]
    fn names_are_stable_and_distinct() {
        assert_eq!(name("Tech Hunt"), name("Tech Hunt"));
        // Same slug, different events
        assert_ne!(name("Tech Hunt"), name("tech hunt"));
        assert_ne!(name("Tech-Hunt"), name("Tech Hunt"));
    }

    #[test]
    fn identifiers_fit_postgres_limit() {
        let table = name("An Extraordinarily Long Festival Event Title For Testing");
        for statement in event_table_ddl(&table) {
            for word in statement.split_whitespace() {
                if word.starts_with(&table) {
                    assert!(word.len() <= 63, "{word} is too long");
                }
            }
        }
    }

    #[test]
    fn hash_suffix_is_hex() {
        let table = name("Omegatrix");
        let hash = table.rsplit('_').next().unwrap();
        assert_eq!(hash.len(), HASH_HEX_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
