//! Medbook Migrations Module
//! Embedded, ordered schema migrations with a checksum journal

use crate::engine::database::DatabaseError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};

const JOURNAL_DDL: &str = "CREATE TABLE IF NOT EXISTS _medbook_migrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    applied_at TEXT NOT NULL,
    checksum TEXT NOT NULL
)";

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_create_users",
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            username TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password TEXT NOT NULL,
            full_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'patient' CHECK (role IN ('patient', 'doctor', 'admin')),
            phone TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_users_role ON users(role);",
    ),
    (
        "0002_create_appointments",
        "CREATE TABLE appointments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            patient_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            doctor_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            appointment_date TEXT NOT NULL,
            reason TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'confirmed', 'cancelled', 'completed')),
            created_at TEXT NOT NULL
        );
        CREATE INDEX idx_appointments_patient ON appointments(patient_id);
        CREATE INDEX idx_appointments_doctor ON appointments(doctor_id);",
    ),
];

#[derive(Debug, Clone)]
pub struct Migration {
    pub name: String,
    pub sql: String,
    pub checksum: String,
}

impl Migration {
    fn new(name: &str, sql: &str) -> Self {
        Self {
            name: name.to_string(),
            sql: sql.to_string(),
            checksum: compute_checksum(sql),
        }
    }
}

pub struct MigrationRunner {
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    /// Runner over the schema compiled into the binary.
    pub fn embedded() -> Self {
        Self::with_migrations(MIGRATIONS)
    }

    pub fn with_migrations(migrations: &[(&str, &str)]) -> Self {
        Self {
            migrations: migrations
                .iter()
                .map(|(name, sql)| Migration::new(name, sql))
                .collect(),
        }
    }

    pub fn list_pending(&self, conn: &Connection) -> Result<Vec<Migration>, DatabaseError> {
        conn.execute(JOURNAL_DDL, [])?;
        let mut pending = Vec::new();

        for migration in &self.migrations {
            let recorded: Option<String> = conn
                .query_row(
                    "SELECT checksum FROM _medbook_migrations WHERE name = ?1",
                    params![migration.name],
                    |row| row.get(0),
                )
                .optional()?;

            match recorded {
                None => pending.push(migration.clone()),
                Some(checksum) if checksum != migration.checksum => {
                    return Err(DatabaseError::SchemaDrift(migration.name.clone()));
                }
                Some(_) => {}
            }
        }

        Ok(pending)
    }

    pub fn apply(&self, conn: &mut Connection, migration: &Migration) -> Result<(), DatabaseError> {
        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql)?;
        tx.execute(
            "INSERT INTO _medbook_migrations (name, applied_at, checksum) VALUES (?1, ?2, ?3)",
            params![migration.name, Utc::now().to_rfc3339(), migration.checksum],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn push(&self, conn: &mut Connection) -> Result<Vec<String>, DatabaseError> {
        let pending = self.list_pending(conn)?;
        let mut applied = Vec::new();

        for migration in pending {
            self.apply(conn, &migration)?;
            applied.push(migration.name);
        }

        Ok(applied)
    }

    pub fn check(&self, conn: &Connection) -> Result<MigrationStatus, DatabaseError> {
        let pending = self.list_pending(conn)?;
        let applied_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM _medbook_migrations", [], |row| row.get(0))?;

        Ok(MigrationStatus {
            applied_count: applied_count as usize,
            pending_count: pending.len(),
            pending_migrations: pending.iter().map(|m| m.name.clone()).collect(),
        })
    }
}

fn compute_checksum(sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sql.as_bytes());
    let result = hasher.finalize();
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, result)
}

#[derive(Debug, Serialize)]
pub struct MigrationStatus {
    pub applied_count: usize,
    pub pending_count: usize,
    pub pending_migrations: Vec<String>,
}
