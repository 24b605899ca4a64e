//! Migration Source - File system operations for migrations
//!
//! Discovers and parses paired `<id>_<label>.up.sql` / `<id>_<label>.down.sql`
//! files from a migrations directory. Parsing never touches the database.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::definitions::Migration;
use crate::error::{MigrateError, MigrateResult};

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// Migration source backed by a directory of paired SQL files
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
}

impl MigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this source reads from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every migration pair, sorted ascending by id.
    ///
    /// A missing directory yields an empty set rather than an error, so a
    /// fresh project can run `status` before authoring anything.
    pub fn load(&self) -> MigrateResult<Vec<Migration>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        // stem -> (up path, down path)
        let mut pairs: BTreeMap<String, (Option<PathBuf>, Option<PathBuf>)> = BTreeMap::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_owned)
            else {
                continue;
            };
            if let Some(stem) = name.strip_suffix(UP_SUFFIX) {
                pairs.entry(stem.to_string()).or_default().0 = Some(path);
            } else if let Some(stem) = name.strip_suffix(DOWN_SUFFIX) {
                pairs.entry(stem.to_string()).or_default().1 = Some(path);
            }
            // anything else (README, editor droppings) is ignored
        }

        let mut migrations = Vec::with_capacity(pairs.len());
        let mut seen_ids: BTreeMap<String, String> = BTreeMap::new();

        for (stem, (up, down)) in pairs {
            let up_path = match (up, down.as_ref()) {
                (Some(up_path), _) => up_path,
                (None, Some(down_path)) => {
                    return Err(MigrateError::MalformedMigration {
                        file: down_path.clone(),
                        reason: format!("down script has no matching {}{}", stem, UP_SUFFIX),
                    });
                }
                (None, None) => continue,
            };

            let (id, label) = parse_stem(&stem, &up_path)?;

            if let Some(other) = seen_ids.insert(id.clone(), stem.clone()) {
                tracing::error!(id = %id, first = %other, second = %stem, "duplicate migration identity");
                return Err(MigrateError::DuplicateIdentity { id, file: up_path });
            }

            let up_statements = split_sql_statements(&fs::read_to_string(&up_path)?);
            let down_statements = match &down {
                Some(down_path) => split_sql_statements(&fs::read_to_string(down_path)?),
                None => Vec::new(),
            };

            let created_at = parse_id_timestamp(&id).unwrap_or_else(Utc::now);

            migrations.push(Migration {
                id,
                label,
                up_statements,
                down_statements,
                created_at,
            });
        }

        // BTreeMap iteration already sorted by stem, but the order that
        // matters is id order; make it explicit.
        migrations.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(migrations)
    }

    /// Scaffold a new migration pair and return the two filenames created.
    pub fn create(&self, name: &str) -> MigrateResult<(String, String)> {
        fs::create_dir_all(&self.dir)?;

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let slug = name.trim().replace(char::is_whitespace, "_").to_lowercase();
        let stem = format!("{}_{}", timestamp, slug);

        let up_name = format!("{}{}", stem, UP_SUFFIX);
        let down_name = format!("{}{}", stem, DOWN_SUFFIX);

        fs::write(
            self.dir.join(&up_name),
            format!("-- {}: forward statements\n", name),
        )?;
        fs::write(
            self.dir.join(&down_name),
            format!("-- {}: reverse statements\n", name),
        )?;

        Ok((up_name, down_name))
    }
}

/// Split a filename stem into (id, label).
///
/// Supported forms: `YYYYMMDD_HHMMSS_label` and `<digits>_label`. The label
/// must be present; an id alone says nothing about what the migration does.
fn parse_stem(stem: &str, file: &Path) -> MigrateResult<(String, String)> {
    let malformed = |reason: String| MigrateError::MalformedMigration {
        file: file.to_path_buf(),
        reason,
    };

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 2 {
        return Err(malformed(format!(
            "expected <id>_<label>{}, got '{}'",
            UP_SUFFIX, stem
        )));
    }

    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if parts.len() >= 3 && parts[0].len() == 8 && parts[1].len() == 6 && is_digits(parts[0]) && is_digits(parts[1]) {
        // YYYYMMDD_HHMMSS_label
        Ok((
            format!("{}_{}", parts[0], parts[1]),
            parts[2..].join("_"),
        ))
    } else if is_digits(parts[0]) {
        // <digits>_label
        Ok((parts[0].to_string(), parts[1..].join("_")))
    } else {
        Err(malformed(format!(
            "identity '{}' must be numeric so migrations sort deterministically",
            parts[0]
        )))
    }
}

/// Best-effort creation time from a `YYYYMMDD_HHMMSS` or `YYYYMMDD` id.
fn parse_id_timestamp(id: &str) -> Option<DateTime<Utc>> {
    let compact: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    if compact.len() < 8 {
        return None;
    }
    let padded = format!("{:0<14}", &compact[..compact.len().min(14)]);
    let naive = chrono::NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S").ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Split SQL text into individual statements using proper SQL parsing.
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.into_iter().map(|stmt| format!("{};", stmt)).collect(),
        Err(e) => {
            // Engine-specific syntax (e.g. CREATE INDEX CONCURRENTLY) can
            // defeat the generic dialect; fall back to semicolon splitting.
            tracing::warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.lines().all(|l| l.trim().is_empty() || l.trim_start().starts_with("--")))
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn loads_pairs_sorted_by_id() {
        let dir = TempDir::new().unwrap();
        write(&dir, "0002_carts.up.sql", "CREATE TABLE carts (id INT);");
        write(&dir, "0002_carts.down.sql", "DROP TABLE carts;");
        write(&dir, "0001_users.up.sql", "CREATE TABLE users (id INT);");
        write(&dir, "0001_users.down.sql", "DROP TABLE users;");

        let migrations = MigrationSource::new(dir.path()).load().unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].id, "0001");
        assert_eq!(migrations[0].label, "users");
        assert_eq!(migrations[1].id, "0002");
        assert!(migrations[0].up_statements[0].contains("CREATE TABLE users"));
        assert!(migrations[0].down_statements[0].contains("DROP TABLE users"));
    }

    #[test]
    fn timestamp_ids_parse_label_and_created_at() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "20240101_120000_add_email_unique.up.sql",
            "ALTER TABLE users ADD CONSTRAINT users_email_unique UNIQUE (email);",
        );

        let migrations = MigrationSource::new(dir.path()).load().unwrap();
        assert_eq!(migrations[0].id, "20240101_120000");
        assert_eq!(migrations[0].label, "add_email_unique");
        assert_eq!(
            migrations[0].created_at.format("%Y-%m-%d").to_string(),
            "2024-01-01"
        );
    }

    #[test]
    fn missing_down_means_irreversible_not_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "0001_seed.up.sql", "INSERT INTO t VALUES (1);");

        let migrations = MigrationSource::new(dir.path()).load().unwrap();
        assert_eq!(migrations.len(), 1);
        assert!(!migrations[0].is_reversible());
    }

    #[test]
    fn orphan_down_is_malformed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "0001_users.down.sql", "DROP TABLE users;");

        let err = MigrationSource::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::MalformedMigration { .. }));
    }

    #[test]
    fn duplicate_identity_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "0001_users.up.sql", "CREATE TABLE users (id INT);");
        write(&dir, "0001_accounts.up.sql", "CREATE TABLE accounts (id INT);");

        let err = MigrationSource::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateIdentity { ref id, .. } if id == "0001"));
    }

    #[test]
    fn non_numeric_identity_is_malformed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "initial_users.up.sql", "CREATE TABLE users (id INT);");

        let err = MigrationSource::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, MigrateError::MalformedMigration { .. }));
    }

    #[test]
    fn missing_directory_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let source = MigrationSource::new(dir.path().join("does_not_exist"));
        assert!(source.load().unwrap().is_empty());
    }

    #[test]
    fn splits_multi_statement_bodies() {
        let statements = split_sql_statements(
            "CREATE TABLE a (id INT);\nCREATE TABLE b (id INT);\nCREATE TABLE c (id INT);",
        );
        assert_eq!(statements.len(), 3);
        assert!(statements[2].contains("c"));
    }

    #[test]
    fn scaffold_creates_both_files() {
        let dir = TempDir::new().unwrap();
        let source = MigrationSource::new(dir.path());
        let (up, down) = source.create("add email unique").unwrap();

        assert!(up.ends_with("_add_email_unique.up.sql"));
        assert!(down.ends_with("_add_email_unique.down.sql"));
        assert!(dir.path().join(&up).exists());
        assert!(dir.path().join(&down).exists());

        // the scaffolded pair must load back
        let migrations = source.load().unwrap();
        assert_eq!(migrations.len(), 1);
    }
}
