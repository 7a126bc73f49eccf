//! Admin login gate.
//!
//! A shared password unlocks the console and a flag in the key-value file
//! remembers it. This only gates the admin UI; the API enforces its own
//! pre-shared key.

use crate::auth::constant_time_compare;
use crate::errors::AppError;
use crate::store::KvFile;

/// Key holding the authorization flag.
pub const AUTH_KEY: &str = "blog_admin.authenticated";

#[derive(Debug, Clone)]
pub struct SessionGate {
    kv: KvFile,
    password: String,
}

impl SessionGate {
    pub fn new(kv: KvFile, password: impl Into<String>) -> Self {
        Self {
            kv,
            password: password.into(),
        }
    }

    pub fn login(&self, password: &str) -> Result<(), AppError> {
        if !constant_time_compare(password, &self.password) {
            tracing::warn!("Admin login rejected");
            return Err(AppError::Unauthorized(
                "Invalid password. Please try again.".to_string(),
            ));
        }

        self.kv.set(AUTH_KEY, "true")?;
        tracing::info!("Admin logged in");
        Ok(())
    }

    pub fn is_authenticated(&self) -> Result<bool, AppError> {
        Ok(self.kv.get(AUTH_KEY)?.as_deref() == Some("true"))
    }

    /// Fail with `Unauthorized` unless a login is recorded.
    pub fn require(&self) -> Result<(), AppError> {
        if self.is_authenticated()? {
            Ok(())
        } else {
            Err(AppError::Unauthorized(
                "Log in to use the admin console".to_string(),
            ))
        }
    }

    pub fn logout(&self) -> Result<(), AppError> {
        self.kv.remove(AUTH_KEY)?;
        tracing::info!("Admin logged out");
        Ok(())
    }
}
