//! User record queries

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::engine::models::{DoctorSummary, User, UserId};
use crate::engine::rbac::Role;

/// Hard cap on admin search results
pub const SEARCH_LIMIT: i64 = 50;

/// Fields of a user about to be inserted
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub full_name: &'a str,
    pub role: Role,
    pub phone: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Partial update; `None` leaves a column untouched. `phone: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<Option<String>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.full_name.is_none() && self.role.is_none() && self.phone.is_none()
    }
}

pub fn find_by_id(conn: &Connection, id: UserId) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS),
        params![email],
        User::from_row,
    )
    .optional()
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )
}

pub fn username_exists(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<UserId> {
    conn.execute(
        "INSERT INTO users (email, username, password, full_name, role, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.email,
            user.username,
            user.password_hash,
            user.full_name,
            user.role,
            user.phone,
            user.created_at
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Apply `changes`, returning the number of rows touched.
pub fn update(conn: &Connection, id: UserId, changes: &UserChanges) -> rusqlite::Result<usize> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(email) = &changes.email {
        sets.push("email = ?");
        values.push(Box::new(email.clone()));
    }
    if let Some(name) = &changes.full_name {
        sets.push("full_name = ?");
        values.push(Box::new(name.clone()));
    }
    if let Some(role) = changes.role {
        sets.push("role = ?");
        values.push(Box::new(role));
    }
    if let Some(phone) = &changes.phone {
        sets.push("phone = ?");
        values.push(Box::new(phone.clone()));
    }
    if sets.is_empty() {
        return Ok(0);
    }
    values.push(Box::new(id));

    let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
}

pub fn update_password(conn: &Connection, id: UserId, password_hash: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE users SET password = ?1 WHERE id = ?2",
        params![password_hash, id],
    )
}

pub fn delete(conn: &Connection, id: UserId) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM users WHERE id = ?1", params![id])
}

pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        User::COLUMNS
    ))?;
    let users = stmt
        .query_map([], User::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn list_by_role(conn: &Connection, role: Role) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE role = ?1 ORDER BY created_at DESC, id DESC",
        User::COLUMNS
    ))?;
    let users = stmt
        .query_map(params![role], User::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn list_doctors(conn: &Connection) -> rusqlite::Result<Vec<DoctorSummary>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, full_name, email, phone FROM users
         WHERE role = 'doctor' ORDER BY full_name",
    )?;
    let doctors = stmt
        .query_map([], |row| {
            Ok(DoctorSummary {
                id: row.get(0)?,
                username: row.get(1)?,
                full_name: row.get(2)?,
                email: row.get(3)?,
                phone: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(doctors)
}

/// Case-insensitive substring search over name, e-mail and username,
/// optionally restricted to one role. Newest first, at most `SEARCH_LIMIT`.
pub fn search(conn: &Connection, query: Option<&str>, role: Option<Role>) -> rusqlite::Result<Vec<User>> {
    let pattern = query
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users
         WHERE (?1 IS NULL
                OR unicode_lower(full_name) LIKE ?1 ESCAPE '\\'
                OR unicode_lower(email) LIKE ?1 ESCAPE '\\'
                OR unicode_lower(username) LIKE ?1 ESCAPE '\\')
           AND (?2 IS NULL OR role = ?2)
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
        User::COLUMNS
    ))?;
    let users = stmt
        .query_map(params![pattern, role, SEARCH_LIMIT], User::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn count_by_role(conn: &Connection) -> rusqlite::Result<Vec<(Role, i64)>> {
    let mut stmt = conn.prepare("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")?;
    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(counts)
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
