//! In-memory account and token cache.
//!
//! Tokens live only as long as the process. Nothing here touches the disk.

use crate::token::{IdTokenClaims, Token};
use tokio::sync::RwLock;

/// Scopes the identity platform grants implicitly and never echoes back.
const RESERVED_SCOPES: &[&str] = &["openid", "profile", "offline_access", "email"];

/// A signed-in account known to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Stable identifier (`oid.tid` when the ID token has both).
    pub home_account_id: String,
    /// Sign-in name, usually an email address.
    pub username: String,
    /// Directory (tenant) id.
    pub tenant_id: Option<String>,
}

impl Account {
    /// Derives the account from a token's ID token claims.
    ///
    /// Falls back to an anonymous account when no ID token was issued, so a
    /// provider that skips `openid` still gets one cache slot.
    #[must_use]
    pub fn from_token(token: &Token) -> Self {
        let claims = match token.id_token_claims() {
            Ok(claims) => claims.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("ignoring unreadable id_token: {e}");
                IdTokenClaims::default()
            }
        };
        Self::from_claims(&claims)
    }

    /// Builds the account from decoded claims.
    #[must_use]
    pub fn from_claims(claims: &IdTokenClaims) -> Self {
        let object_id = claims.oid.as_deref().or(claims.sub.as_deref());
        let home_account_id = match (object_id, claims.tid.as_deref()) {
            (Some(oid), Some(tid)) => format!("{oid}.{tid}"),
            (Some(oid), None) => oid.to_string(),
            (None, _) => "anonymous".to_string(),
        };

        Self {
            home_account_id,
            username: claims
                .preferred_username
                .clone()
                .or_else(|| claims.name.clone())
                .unwrap_or_default(),
            tenant_id: claims.tid.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    account: Account,
    token: Token,
    scopes: Vec<String>,
}

impl CacheEntry {
    fn covers(&self, requested: &[String]) -> bool {
        let granted: Vec<String> = self
            .scopes
            .iter()
            .cloned()
            .chain(
                self.token
                    .scope
                    .iter()
                    .flat_map(|s| s.split_whitespace().map(str::to_string)),
            )
            .map(|s| normalize_scope(&s))
            .collect();

        requested
            .iter()
            .map(|s| normalize_scope(s))
            .filter(|s| !RESERVED_SCOPES.contains(&s.as_str()))
            .all(|s| granted.contains(&s))
    }
}

/// Lowercases a scope and strips the Graph resource prefix the token
/// endpoint adds (`https://graph.microsoft.com/User.Read`).
fn normalize_scope(scope: &str) -> String {
    scope
        .trim_start_matches("https://graph.microsoft.com/")
        .to_ascii_lowercase()
}

/// Accounts and their latest tokens, in sign-in order.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: RwLock<Vec<CacheEntry>>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists known accounts, oldest first.
    pub async fn accounts(&self) -> Vec<Account> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| e.account.clone())
            .collect()
    }

    /// Returns the cached token for `account`, whether or not it is expired
    /// or covers the scopes. Used to reach the refresh token.
    pub async fn token(&self, account: &Account) -> Option<Token> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.account.home_account_id == account.home_account_id)
            .map(|e| e.token.clone())
    }

    /// Returns a non-expired token for `account` that covers `scopes`.
    pub async fn valid_token(&self, account: &Account, scopes: &[String]) -> Option<Token> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.account.home_account_id == account.home_account_id)
            .filter(|e| e.token.is_valid() && e.covers(scopes))
            .map(|e| e.token.clone())
    }

    /// Stores the latest token for `account`, replacing any previous one.
    pub async fn store(&self, account: Account, token: Token, scopes: &[String]) {
        let mut entries = self.entries.write().await;
        let entry = CacheEntry {
            account,
            token,
            scopes: scopes.to_vec(),
        };

        if let Some(existing) = entries
            .iter_mut()
            .find(|e| e.account.home_account_id == entry.account.home_account_id)
        {
            *existing = entry;
        } else {
            entries.push(entry);
        }
    }

    /// Forgets an account and its tokens. Returns false if it was unknown.
    pub async fn remove(&self, account: &Account) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.account.home_account_id != account.home_account_id);
        entries.len() != before
    }
}
