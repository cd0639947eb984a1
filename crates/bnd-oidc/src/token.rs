//! Identity tokens
//!
//! Claims are decoded without verifying the token signature. The CA does
//! that; the signer only needs the subject for the proof of possession.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

/// A short-lived OIDC identity token.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken {
    raw: String,
    claims: TokenClaims,
}

impl std::fmt::Debug for IdentityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityToken")
            .field("claims", &self.claims)
            .finish_non_exhaustive()
    }
}

impl IdentityToken {
    /// Decode the claims of a compact JWT.
    pub fn from_jwt(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut parts = raw.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::Token("expected three dot-separated parts".to_string()));
        };

        let payload = payload.trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .map_err(|e| Error::Token(format!("payload is not base64: {e}")))?;
        let claims: TokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Token(format!("payload is not a claim set: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            claims,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    pub fn email(&self) -> Option<&str> {
        self.claims.email.as_deref()
    }

    /// The value the CA proves possession against: the email when the
    /// issuer provides one, the subject otherwise.
    pub fn proof_subject(&self) -> &str {
        self.email().unwrap_or(self.subject())
    }

    pub fn is_expired_at(&self, unix_seconds: i64) -> bool {
        self.claims.exp.is_some_and(|exp| exp <= unix_seconds)
    }
}

#[cfg(test)]
pub(crate) fn test_jwt(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.sig",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}
