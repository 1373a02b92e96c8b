//! Session bootstrapping.
//!
//! The application treats a user as logged in when `localStorage` holds a
//! serialized profile, the subject id and a token. Seeding those three keys
//! before the first meaningful render skips the real login gate.

use crate::driver::PageDriver;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Storage key holding the serialized profile
pub const USER_KEY: &str = "user";
/// Storage key holding the subject id
pub const USER_ID_KEY: &str = "userId";
/// Storage key holding the opaque session token
pub const TOKEN_KEY: &str = "authToken";

/// Pre-authenticated identity injected into the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionIdentity {
    /// Subject id (`sub` claim)
    pub subject_id: String,
    /// Display name
    pub display_name: String,
    /// Email address
    pub email: String,
    /// Avatar URL, may be empty
    pub avatar_ref: String,
    /// Opaque session token
    pub session_token: String,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self {
            subject_id: "test-user-id".to_string(),
            display_name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            avatar_ref: String::new(),
            session_token: "mock-token".to_string(),
        }
    }
}

impl SessionIdentity {
    /// Create an identity with the given subject and token
    #[must_use]
    pub fn new(subject_id: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            session_token: session_token.into(),
            ..Self::default()
        }
    }

    /// Set display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set email
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    /// Set avatar reference
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar_ref = avatar.into();
        self
    }

    /// Profile in the shape the login flow persists
    #[must_use]
    pub fn profile_json(&self) -> String {
        serde_json::json!({
            "sub": self.subject_id,
            "name": self.display_name,
            "email": self.email,
            "picture": self.avatar_ref,
        })
        .to_string()
    }

    /// The three keyed values written to persistent storage
    #[must_use]
    pub fn storage_entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (USER_KEY, self.profile_json()),
            (USER_ID_KEY, self.subject_id.clone()),
            (TOKEN_KEY, self.session_token.clone()),
        ]
    }

    /// Script writing the storage entries; values are JSON-encoded so quotes
    /// in names or tokens cannot break out of the literal
    #[must_use]
    pub fn seed_script(&self) -> String {
        let entries: serde_json::Map<String, serde_json::Value> = self
            .storage_entries()
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v)))
            .collect();
        let entries = serde_json::Value::Object(entries);
        format!(
            "(() => {{ const entries = {entries}; \
             for (const [key, value] of Object.entries(entries)) {{ localStorage.setItem(key, value); }} \
             return true; }})()"
        )
    }
}

/// How the identity reaches persistent storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedStrategy {
    /// Register the seed as a script that runs before any page script
    #[default]
    InitScript,
    /// Load the page, write storage directly, then reload
    #[serde(rename = "storage-reload")]
    StorageThenReload,
}

impl std::fmt::Display for SeedStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitScript => write!(f, "init-script"),
            Self::StorageThenReload => write!(f, "storage-reload"),
        }
    }
}

impl std::str::FromStr for SeedStrategy {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init-script" => Ok(Self::InitScript),
            "storage-reload" => Ok(Self::StorageThenReload),
            other => Err(ProbeError::config(format!("unknown seed strategy {other:?}"))),
        }
    }
}

/// Injects a [`SessionIdentity`] so the application's first render sees it
#[derive(Debug, Clone, Copy)]
pub struct Bootstrapper {
    strategy: SeedStrategy,
}

impl Bootstrapper {
    /// Create a bootstrapper using the given strategy
    #[must_use]
    pub const fn new(strategy: SeedStrategy) -> Self {
        Self { strategy }
    }

    /// Strategy in use
    #[must_use]
    pub const fn strategy(&self) -> SeedStrategy {
        self.strategy
    }

    /// Seed storage and open `url`. Navigation failures are fatal and not
    /// retried.
    pub async fn seed<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        identity: &SessionIdentity,
        url: &str,
    ) -> ProbeResult<()> {
        let script = identity.seed_script();
        info!(strategy = %self.strategy, subject = %identity.subject_id, "seeding session identity");
        match self.strategy {
            SeedStrategy::InitScript => {
                driver.add_init_script(&script).await?;
                driver.navigate(url).await?;
            }
            SeedStrategy::StorageThenReload => {
                driver.navigate(url).await?;
                driver.evaluate(&script).await?;
                debug!("storage written, reloading to apply login");
                driver.reload().await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::mock::MockDriver;

    mod identity_tests {
        use super::*;

        #[test]
        fn test_default_identity() {
            let id = SessionIdentity::default();
            assert_eq!(id.subject_id, "test-user-id");
            assert_eq!(id.session_token, "mock-token");
        }

        #[test]
        fn test_profile_json_shape() {
            let id = SessionIdentity::default().with_avatar("https://img.test/a.png");
            let profile: serde_json::Value = serde_json::from_str(&id.profile_json()).unwrap();
            assert_eq!(profile["sub"], "test-user-id");
            assert_eq!(profile["name"], "Test User");
            assert_eq!(profile["email"], "test@example.com");
            assert_eq!(profile["picture"], "https://img.test/a.png");
        }

        #[test]
        fn test_storage_entries_keys() {
            let keys: Vec<_> = SessionIdentity::default()
                .storage_entries()
                .into_iter()
                .map(|(k, _)| k)
                .collect();
            assert_eq!(keys, vec!["user", "userId", "authToken"]);
        }

        #[test]
        fn test_seed_script_escapes_quotes() {
            let id = SessionIdentity::default().with_display_name("O'Brien \"Ops\"");
            let script = id.seed_script();
            assert!(script.contains("localStorage.setItem"));
            assert!(!script.contains("'O'Brien"));
            assert!(script.contains("O'Brien"));
        }
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_strategy_parse_and_display() {
            for s in ["init-script", "storage-reload"] {
                let parsed: SeedStrategy = s.parse().unwrap();
                assert_eq!(parsed.to_string(), s);
            }
            assert!("cookie".parse::<SeedStrategy>().is_err());
        }
    }

    mod bootstrapper_tests {
        use super::*;

        #[tokio::test]
        async fn test_init_script_registered_before_navigation() {
            let mut driver = MockDriver::new();
            Bootstrapper::new(SeedStrategy::InitScript)
                .seed(&mut driver, &SessionIdentity::default(), "http://localhost:3000")
                .await
                .unwrap();
            let history = driver.history();
            let init = history.iter().position(|c| c.starts_with("add_init_script")).unwrap();
            let nav = history.iter().position(|c| c.starts_with("navigate:")).unwrap();
            assert!(init < nav);
            assert!(!driver.was_called("reload"));
        }

        #[tokio::test]
        async fn test_storage_reload_sequence() {
            let mut driver = MockDriver::new();
            Bootstrapper::new(SeedStrategy::StorageThenReload)
                .seed(&mut driver, &SessionIdentity::default(), "http://localhost:3000")
                .await
                .unwrap();
            let history = driver.history();
            let nav = history.iter().position(|c| c.starts_with("navigate:")).unwrap();
            let eval = history.iter().position(|c| c.starts_with("evaluate")).unwrap();
            let reload = history.iter().position(|c| c == "reload").unwrap();
            assert!(nav < eval && eval < reload);
        }

        #[tokio::test]
        async fn test_unreachable_origin_is_navigation_failure() {
            let mut driver = MockDriver::new().unreachable();
            let err = Bootstrapper::new(SeedStrategy::InitScript)
                .seed(&mut driver, &SessionIdentity::default(), "http://localhost:3999")
                .await
                .unwrap_err();
            assert!(matches!(err, ProbeError::NavigationFailure { .. }));
            assert!(err.is_fatal());
        }
    }
}
