//! # User Repository
//!
//! Operator accounts (`usuarios`) and login.
//!
//! ## Stored Password Formats
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  senha column                     verified by          after login      │
//! │  ───────────────────────────────  ───────────────────  ──────────────── │
//! │  $argon2id$v=19$...               argon2               unchanged        │
//! │  64 hex digits (older releases)   SHA-256 hex compare  rehashed argon2  │
//! │  anything else (seeded 'admin')   plain compare        rehashed argon2  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::NaiveDateTime;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use pdv_core::types::local_now;
use pdv_core::validation::{validate_password, validate_username};
use pdv_core::{NewUser, User, UserRole, ValidationError};

/// Login created when the store has none.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_NAME: &str = "Administrador";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    username: String,
    role: String,
    created_at: Option<NaiveDateTime>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            username: row.username,
            role: UserRole::parse(&row.role),
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = r#"
    id,
    COALESCE(nome, '') AS name,
    usuario AS username,
    COALESCE(tipo, 'vendedor') AS role,
    created_at
"#;

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Outcome of checking a password against a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordCheck {
    Mismatch,
    Match,
    /// Matched a legacy format; the stored value should be rehashed.
    MatchLegacy,
}

fn check_password(password: &str, stored: &str) -> PasswordCheck {
    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(parsed) if Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok() =>
            {
                PasswordCheck::Match
            }
            _ => PasswordCheck::Mismatch,
        };
    }

    let is_sha256_hex = stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit());
    let matches = if is_sha256_hex {
        let digest = format!("{:x}", Sha256::digest(password.as_bytes()));
        digest.eq_ignore_ascii_case(stored)
    } else {
        !stored.is_empty() && stored == password
    };

    if matches {
        PasswordCheck::MatchLegacy
    } else {
        PasswordCheck::Mismatch
    }
}

/// Repository for operator accounts.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Lists every operator, sorted by name.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM usuarios ORDER BY nome", USER_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Finds an operator by login name.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {} FROM usuarios WHERE usuario = ?", USER_COLUMNS))
                .bind(username.trim())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(User::from))
    }

    /// Registers a new operator and returns its id.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Username taken
    /// * `Err(DbError::Validation)` - Name empty, username not alphanumeric
    ///   or too short, password too short
    pub async fn register(&self, user: &NewUser) -> DbResult<i64> {
        let username = user.username.trim();
        let name = user.name.trim();

        if self.find_by_username(username).await?.is_some() {
            return Err(DbError::duplicate("username", username));
        }
        if name.is_empty() {
            return Err(ValidationError::Required {
                field: "name".to_string(),
            }
            .into());
        }
        validate_username(username)?;
        validate_password(&user.password)?;

        let hash = hash_password(&user.password)?;

        let result = sqlx::query(
            "INSERT INTO usuarios (nome, usuario, senha, tipo, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(username)
        .bind(hash)
        .bind(user.role.as_str())
        .bind(local_now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(user_id = id, username = %username, role = user.role.as_str(), "User registered");
        Ok(id)
    }

    /// Checks credentials.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - Credentials valid
    /// * `Ok(None)` - Unknown user or wrong password
    pub async fn verify_login(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let username = username.trim();
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, COALESCE(senha, '') FROM usuarios WHERE usuario = ?")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, stored)) = row else {
            debug!(username = %username, "Login for unknown user");
            return Ok(None);
        };

        match check_password(password, &stored) {
            PasswordCheck::Mismatch => {
                debug!(user_id = id, "Login rejected");
                return Ok(None);
            }
            PasswordCheck::Match => {}
            PasswordCheck::MatchLegacy => {
                let hash = hash_password(password)?;
                sqlx::query("UPDATE usuarios SET senha = ? WHERE id = ?")
                    .bind(hash)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
                info!(user_id = id, "Legacy password upgraded to argon2");
            }
        }

        self.find_by_username(username).await
    }

    /// Deletes an operator.
    ///
    /// An operator with recorded sales cannot be deleted; the foreign key
    /// error is returned.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM usuarios WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id.to_string()));
        }

        info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Creates the `admin` login if it doesn't exist.
    ///
    /// Returns whether it was created.
    pub async fn ensure_default_admin(&self) -> DbResult<bool> {
        if self.find_by_username(DEFAULT_ADMIN_USERNAME).await?.is_some() {
            return Ok(false);
        }

        let hash = hash_password(DEFAULT_ADMIN_PASSWORD)?;
        sqlx::query(
            "INSERT INTO usuarios (nome, usuario, senha, tipo, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(DEFAULT_ADMIN_NAME)
        .bind(DEFAULT_ADMIN_USERNAME)
        .bind(hash)
        .bind(UserRole::Admin.as_str())
        .bind(local_now())
        .execute(&self.pool)
        .await?;

        warn!("Default admin login created, change its password");
        Ok(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn seller(username: &str, password: &str) -> NewUser {
        NewUser {
            name: "Maria Souza".to_string(),
            username: username.to_string(),
            password: password.to_string(),
            role: UserRole::Seller,
        }
    }

    async fn stored_password(db: &Database, username: &str) -> String {
        sqlx::query_scalar("SELECT senha FROM usuarios WHERE usuario = ?")
            .bind(username)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[test]
    fn test_check_password_formats() {
        let hash = hash_password("segredo").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_eq!(check_password("segredo", &hash), PasswordCheck::Match);
        assert_eq!(check_password("errada", &hash), PasswordCheck::Mismatch);

        let sha = format!("{:x}", Sha256::digest(b"1234"));
        assert_eq!(check_password("1234", &sha), PasswordCheck::MatchLegacy);
        assert_eq!(check_password("4321", &sha), PasswordCheck::Mismatch);

        assert_eq!(check_password("admin", "admin"), PasswordCheck::MatchLegacy);
        assert_eq!(check_password("", ""), PasswordCheck::Mismatch);
    }

    #[tokio::test]
    async fn test_default_admin_is_seeded() {
        let db = setup().await;
        let admin = db.users().find_by_username("admin").await.unwrap().unwrap();
        assert_eq!(admin.role, UserRole::Admin);
        assert!(!db.users().ensure_default_admin().await.unwrap());

        let logged = db.users().verify_login("admin", "admin").await.unwrap();
        assert_eq!(logged.map(|u| u.id), Some(admin.id));
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let db = setup().await;
        let users = db.users();

        let id = users.register(&seller("maria", "1234")).await.unwrap();
        assert!(stored_password(&db, "maria").await.starts_with("$argon2"));

        let user = users.verify_login("maria", "1234").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, UserRole::Seller);

        assert!(users.verify_login("maria", "0000").await.unwrap().is_none());
        assert!(users.verify_login("ghost", "1234").await.unwrap().is_none());

        let names: Vec<String> = users.list().await.unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["admin", "maria"]);
    }

    #[tokio::test]
    async fn test_register_rejections() {
        let db = setup().await;
        let users = db.users();

        users.register(&seller("maria", "1234")).await.unwrap();
        assert!(matches!(
            users.register(&seller("maria", "abcd")).await,
            Err(DbError::UniqueViolation { .. })
        ));
        assert!(matches!(
            users.register(&seller("jo", "1234")).await,
            Err(DbError::Validation(ValidationError::TooShort { .. }))
        ));
        assert!(matches!(
            users.register(&seller("jo.ao", "1234")).await,
            Err(DbError::Validation(_))
        ));
        assert!(matches!(
            users.register(&seller("joao", "123")).await,
            Err(DbError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_legacy_sha256_is_upgraded() {
        let db = setup().await;
        let legacy = format!("{:x}", Sha256::digest(b"caixa1"));
        sqlx::query("INSERT INTO usuarios (nome, usuario, senha, tipo) VALUES (?, ?, ?, ?)")
            .bind("Operador Antigo")
            .bind("antigo")
            .bind(&legacy)
            .bind("vendedor")
            .execute(db.pool())
            .await
            .unwrap();

        assert!(db.users().verify_login("antigo", "caixa1").await.unwrap().is_some());
        let upgraded = stored_password(&db, "antigo").await;
        assert!(upgraded.starts_with("$argon2"));

        assert!(db.users().verify_login("antigo", "caixa1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = setup().await;
        let id = db.users().register(&seller("maria", "1234")).await.unwrap();

        db.users().delete(id).await.unwrap();
        assert!(db.users().find_by_username("maria").await.unwrap().is_none());
        assert!(matches!(db.users().delete(id).await, Err(DbError::NotFound { .. })));
    }
}
