use cradle_types::validation::{Patch, ValidProfile};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{User, UserRef};
use crate::{Database, format_ts, now, opt_parsed_at, ts_at, uuid_at};

const USER_COLUMNS: &str = "id, email, name, password, image, phone, location, is_admin, \
                            payment_account_id, payment_onboarded, created_at";

impl Database {
    /// Insert a new user. Fails with `Conflict` if the email is taken.
    pub fn create_user(&self, email: &str, name: Option<&str>, password_hash: &str) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
            password_hash: password_hash.to_string(),
            image: None,
            phone: None,
            location: None,
            is_admin: false,
            payment_account_id: None,
            payment_onboarded: false,
            created_at: now(),
        };

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id.to_string(),
                    user.email,
                    user.name,
                    user.password_hash,
                    format_ts(&user.created_at),
                ],
            )
            .map_err(|e| {
                if StoreError::is_unique_violation(&e) {
                    StoreError::Conflict(format!("email '{}' is already registered", email))
                } else {
                    StoreError::Sqlite(e)
                }
            })?;
            Ok(())
        })?;

        Ok(user)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                    [email],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Apply a profile patch and return the updated user.
    pub fn update_profile(&self, id: Uuid, profile: &ValidProfile) -> Result<User> {
        let mut assignments = Vec::new();
        let mut values = Vec::new();

        push_patch(&mut assignments, &mut values, "name", &profile.name, |v| Value::Text(v.clone()));
        push_patch(&mut assignments, &mut values, "phone", &profile.phone, |v| Value::Text(v.clone()));
        push_patch(&mut assignments, &mut values, "location", &profile.location, |v| {
            Value::Text(v.as_str().to_string())
        });
        push_patch(&mut assignments, &mut values, "image", &profile.image, |v| Value::Text(v.clone()));

        self.with_conn_mut(|conn| {
            if !assignments.is_empty() {
                values.push(Value::Text(id.to_string()));
                let sql = format!(
                    "UPDATE users SET {} WHERE id = ?{}",
                    assignments.join(", "),
                    values.len()
                );
                let affected = conn.execute(&sql, params_from_iter(values))?;
                if affected == 0 {
                    return Err(StoreError::NotFound);
                }
            }
            query_user(conn, id)?.ok_or(StoreError::NotFound)
        })
    }

    /// Grant or revoke admin rights by email. Returns false if no such user.
    pub fn set_admin(&self, email: &str, is_admin: bool) -> Result<bool> {
        let affected = self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE users SET is_admin = ?1 WHERE email = ?2",
                params![is_admin, email],
            )?)
        })?;
        if affected > 0 {
            info!("Admin flag for {} set to {}", email, is_admin);
        }
        Ok(affected > 0)
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(count as u64)
        })
    }
}

fn push_patch<T>(
    assignments: &mut Vec<String>,
    values: &mut Vec<Value>,
    column: &str,
    patch: &Patch<T>,
    to_value: impl Fn(&T) -> Value,
) {
    let value = match patch {
        Patch::Keep => return,
        Patch::Clear => Value::Null,
        Patch::Set(v) => to_value(v),
    };
    values.push(value);
    assignments.push(format!("{} = ?{}", column, values.len()));
}

fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id.to_string()],
            row_to_user,
        )
        .optional()?;
    Ok(user)
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        phone: row.get(5)?,
        location: opt_parsed_at(row, 6)?,
        is_admin: row.get(7)?,
        payment_account_id: row.get(8)?,
        payment_onboarded: row.get(9)?,
        created_at: ts_at(row, 10)?,
    })
}

/// Read the five `UserRef` columns (id, name, email, image, location)
/// starting at `start`.
pub(crate) fn user_ref_at(row: &Row<'_>, start: usize) -> rusqlite::Result<UserRef> {
    Ok(UserRef {
        id: uuid_at(row, start)?,
        name: row.get(start + 1)?,
        email: row.get(start + 2)?,
        image: row.get(start + 3)?,
        location: opt_parsed_at(row, start + 4)?,
    })
}

#[cfg(test)]
mod tests {
    use cradle_types::Location;

    use super::*;
    use crate::testing::open_temp;

    #[test]
    fn duplicate_email_is_a_conflict() {
        let (_dir, db) = open_temp();
        db.create_user("alice@example.com", Some("Alice"), "hash").unwrap();
        let err = db.create_user("alice@example.com", None, "hash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn lookup_by_email_and_id() {
        let (_dir, db) = open_temp();
        let created = db.create_user("bob@example.com", Some("Bob"), "hash").unwrap();

        let by_email = db.get_user_by_email("bob@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.created_at, created.created_at);

        let by_id = db.get_user_by_id(created.id).unwrap().unwrap();
        assert_eq!(by_id.email, "bob@example.com");
        assert!(db.get_user_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn profile_patch_sets_clears_and_keeps() {
        let (_dir, db) = open_temp();
        let user = db.create_user("carol@example.com", Some("Carol"), "hash").unwrap();

        let first = ValidProfile {
            name: Patch::Keep,
            phone: Patch::Set("079 123 45 67".into()),
            location: Patch::Set(Location::Nyon),
            image: Patch::Keep,
        };
        let updated = db.update_profile(user.id, &first).unwrap();
        assert_eq!(updated.name.as_deref(), Some("Carol"));
        assert_eq!(updated.phone.as_deref(), Some("079 123 45 67"));
        assert_eq!(updated.location, Some(Location::Nyon));

        let second = ValidProfile {
            name: Patch::Set("Carol Davis".into()),
            phone: Patch::Clear,
            location: Patch::Keep,
            image: Patch::Keep,
        };
        let updated = db.update_profile(user.id, &second).unwrap();
        assert_eq!(updated.name.as_deref(), Some("Carol Davis"));
        assert_eq!(updated.phone, None);
        assert_eq!(updated.location, Some(Location::Nyon));
    }

    #[test]
    fn profile_patch_on_missing_user() {
        let (_dir, db) = open_temp();
        let patch = ValidProfile {
            name: Patch::Set("Ghost".into()),
            phone: Patch::Keep,
            location: Patch::Keep,
            image: Patch::Keep,
        };
        assert!(matches!(db.update_profile(Uuid::new_v4(), &patch), Err(StoreError::NotFound)));
    }

    #[test]
    fn admin_flag_by_email() {
        let (_dir, db) = open_temp();
        let user = db.create_user("admin@example.com", None, "hash").unwrap();
        assert!(db.set_admin("admin@example.com", true).unwrap());
        assert!(!db.set_admin("nobody@example.com", true).unwrap());
        assert!(db.get_user_by_id(user.id).unwrap().unwrap().is_admin);
    }
}
