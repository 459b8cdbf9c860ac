//! Proof Key for Code Exchange (RFC 7636), `S256` only.
//!
//! The verifier stays in memory for the lifetime of one sign-in; only its
//! hash goes into the browser URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Bytes of entropy behind a verifier; encodes to 43 characters.
const VERIFIER_ENTROPY: usize = 32;

/// A verifier and the challenge derived from it.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    verifier: String,
    challenge: String,
}

impl PkceChallenge {
    /// `code_challenge_method` sent with every challenge.
    pub const METHOD: &'static str = "S256";

    /// Fresh random pair for one authorization request.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_verifier(random_urlsafe(VERIFIER_ENTROPY))
    }

    /// Derives the challenge for a known verifier.
    #[must_use]
    pub fn from_verifier(verifier: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }

    /// Sent with the code exchange.
    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// Sent in the authorization URL.
    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// `len` random bytes as unpadded base64url; also used for `state`.
pub(crate) fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill(bytes.as_mut_slice());
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7636_appendix_b() {
        let pkce = PkceChallenge::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(pkce.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_generated_verifier_is_valid() {
        let pkce = PkceChallenge::generate();
        // RFC 7636 section 4.1: 43 to 128 unreserved characters.
        assert_eq!(pkce.verifier().len(), 43);
        assert!(
            pkce.verifier()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
        assert_eq!(
            pkce.challenge(),
            PkceChallenge::from_verifier(pkce.verifier()).challenge()
        );
    }

    #[test]
    fn test_generated_pairs_differ() {
        let a = PkceChallenge::generate();
        let b = PkceChallenge::generate();
        assert_ne!(a.verifier(), b.verifier());
        assert_ne!(a.challenge(), b.challenge());
    }

    #[test]
    fn test_random_urlsafe_length() {
        assert_eq!(random_urlsafe(16).len(), 22);
    }
}
