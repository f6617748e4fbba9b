use rand::RngCore;
use std::sync::Arc;

use crate::{records::RecordClient, store::ContentStore};

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthConfig>,
    pub store: ContentStore,
    pub records: RecordClient,
    /// When false, only an authenticated admin may create posts.
    pub open_posting: bool,
}

/// Admin credentials, fixed for the lifetime of the process.
pub struct AuthConfig {
    /// Shared admin password. `None` disables login entirely.
    pub password: Option<String>,
    /// Key for signing session tokens.
    pub secret: Vec<u8>,
    /// Append `Secure` to the session cookie.
    pub cookie_secure: bool,
}

impl AuthConfig {
    /// Build the config, generating a random secret when none is supplied.
    /// A generated secret invalidates every issued token on restart.
    pub fn new(password: Option<String>, secret: Option<String>, cookie_secure: bool) -> Self {
        let secret = match secret.filter(|s| !s.is_empty()) {
            Some(s) => s.into_bytes(),
            None => {
                let mut bytes = vec![0u8; 32];
                rand::rng().fill_bytes(&mut bytes);
                bytes
            }
        };
        Self {
            password: password.filter(|p| !p.is_empty()),
            secret,
            cookie_secure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_secret_is_used_verbatim() {
        let cfg = AuthConfig::new(Some("pw".into()), Some("s3cret".into()), false);
        assert_eq!(cfg.secret, b"s3cret");
        assert_eq!(cfg.password.as_deref(), Some("pw"));
    }

    #[test]
    fn missing_secret_is_generated_per_instance() {
        let a = AuthConfig::new(None, None, false);
        let b = AuthConfig::new(None, Some(String::new()), false);
        assert_eq!(a.secret.len(), 32);
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn empty_password_disables_login() {
        let cfg = AuthConfig::new(Some(String::new()), None, false);
        assert!(cfg.password.is_none());
    }
}
