// Copyright (C) 2025-2026 Michael Herstine <sp1ff@pobox.com>
//
// This file is part of marketmeet.
//
// marketmeet is free software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// marketmeet is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with marketmeet.  If not,
// see <http://www.gnu.org/licenses/>.

//! # marketmeet Authentication Tokens
//!
//! marketmeet access tokens are plain [JWT]s, signed with HMAC-SHA-256 under a
//! [versioned key](crate::signing_keys). There is no server-side session: every request presents
//! its token & every token is independently verified. A token names its account twice-- the
//! username in `sub` (for humans reading logs) & the numeric account id in `uid` (for everything
//! else).
//!
//! [JWT]: https://www.rfc-editor.org/rfc/rfc7519.html

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::{Header, SignWithKey, Token, VerifyWithKey};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use snafu::{prelude::*, Backtrace};

use crate::{
    entities::{UserId, Username},
    origin::Host,
    signing_keys::{self, KeyId, SigningKey, SigningKeys},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Token expired at {expires}"))]
    Expired {
        expires: DateTime<Utc>,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to create an HMAC: {source}"))]
    Hmac {
        source: crypto_common::InvalidLength,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to refine a string to a KeyId: {source}"))]
    KeyId {
        source: signing_keys::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("The Key ID was missing from the JWT"))]
    MissingKeyId { backtrace: Backtrace },
    #[snafu(display("No signing key matching {keyid}: {source}"))]
    NoKey {
        keyid: KeyId,
        source: signing_keys::Error,
    },
    #[snafu(display("Invalid token: not before {not_before}"))]
    NotBefore {
        not_before: DateTime<Utc>,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to parse JWT: {source}"))]
    Parse {
        source: jwt::error::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to sign JWT claims: {source}"))]
    Signature {
        source: jwt::error::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Unknown token audience {audience}"))]
    UnknownAudience {
        audience: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Unknown token issuer {issuer}"))]
    UnknownIssuer { issuer: Host, backtrace: Backtrace },
    #[snafu(display("Verification failure: {source}"))]
    Verification {
        source: jwt::error::Error,
        backtrace: Backtrace,
    },
}

type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                  the marketmeet Access Token                                   //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// marketmeet access [JWT] claims
///
/// [JWT]: https://www.rfc-editor.org/rfc/rfc7519.html
#[derive(Clone, Debug, Deserialize, Serialize)]
struct AccessClaims {
    #[serde(rename = "iat")]
    issued_at: DateTime<Utc>,
    #[serde(rename = "iss")]
    issuer: Host,
    #[serde(rename = "aud")]
    audience: String,
    #[serde(rename = "nbf")]
    not_before: DateTime<Utc>,
    #[serde(rename = "exp")]
    expires: DateTime<Utc>,
    #[serde(rename = "sub")]
    subject: Username,
    #[serde(rename = "uid")]
    userid: UserId,
}

/// Mint a new JWT
///
/// Mint a new token naming the account `(userid, username)`, signed using `signing_key`
/// (identified by `keyid`). The token will be valid for duration `lifetime`.
///
/// The fully serialized JWT will be returned.
pub fn mint_token(
    userid: UserId,
    username: &Username,
    keyid: &KeyId,
    signing_key: &SigningKey,
    issuer: &Host,
    lifetime: &Duration,
) -> Result<String> {
    let key: Hmac<Sha256> =
        Hmac::new_from_slice(signing_key.as_ref().expose_secret()).context(HmacSnafu)?;
    let header = Header {
        key_id: Some(keyid.to_string()),
        ..Default::default()
    };
    let now = Utc::now();
    let claims = AccessClaims {
        issued_at: now,
        issuer: issuer.clone(),
        audience: format!("api.{}", issuer),
        not_before: now,
        expires: now + *lifetime,
        subject: username.clone(),
        userid,
    };
    Ok(Token::new(header, claims)
        .sign_with_key(&key)
        .context(SignatureSnafu)?
        .as_str()
        .to_owned())
}

/// Verify a serialized JWT; on success, return the account it names
pub fn verify_token(
    token_string: &str,
    keys: &SigningKeys,
    issuer: &Host,
) -> Result<(UserId, Username)> {
    let token: Token<Header, AccessClaims, _ /* Unverified<'_> */> =
        Token::parse_unverified(token_string).context(ParseSnafu)?;
    let keyid = token
        .header()
        .key_id
        .clone()
        .ok_or(MissingKeyIdSnafu.build())?;
    let keyid = KeyId::new(&keyid).context(KeyIdSnafu)?;
    let signing_key = keys.find_by_version(&keyid).context(NoKeySnafu { keyid })?;
    let key: Hmac<Sha256> =
        Hmac::new_from_slice(signing_key.as_ref().expose_secret()).context(HmacSnafu)?;
    let token: Token<Header, AccessClaims, _> = token_string
        .verify_with_key(&key)
        .context(VerificationSnafu)?;
    let claims = token.claims();

    let now = Utc::now();

    if now < claims.not_before {
        return NotBeforeSnafu {
            not_before: claims.not_before,
        }
        .fail();
    }
    if now > claims.expires {
        return ExpiredSnafu {
            expires: claims.expires,
        }
        .fail();
    }
    if *issuer != claims.issuer {
        return UnknownIssuerSnafu {
            issuer: claims.issuer.clone(),
        }
        .fail();
    }
    if format!("api.{}", issuer) != claims.audience {
        return UnknownAudienceSnafu {
            audience: claims.audience.clone(),
        }
        .fail();
    }

    Ok((claims.userid, claims.subject.clone()))
}

#[cfg(test)]
mod access_token_tests {
    use super::*;

    #[test]
    fn verify_minted_token() {
        let username = Username::new("johndoe").unwrap(/* known good */);
        let key_id = KeyId::new("keyid:20250817").unwrap(/* known good */);
        // With apologies to J.R.R. Tolkein, but I needed 64 bytes exactly.
        let signing_key = SigningKey::new(b"All that is gold does not glitter-- Not all who wander are lost.".to_vec()).unwrap(/* known good */);
        let issuer = Host::new("marketmeet.example.com").unwrap(/* known good */);

        let token_result = mint_token(
            UserId::new(42),
            &username,
            &key_id,
            &signing_key,
            &issuer,
            &Duration::seconds(300),
        );
        assert!(token_result.is_ok());

        let token = token_result.unwrap(/* known good */);

        let keys = SigningKeys::from([(key_id, signing_key)]);

        let verify_result = verify_token(&token, &keys, &issuer);
        assert!(verify_result.is_ok());

        let (userid, verified) = verify_result.unwrap(/* known good */);
        assert_eq!(UserId::new(42), userid);
        assert_eq!(username, verified);
    }

    #[test]
    fn expired_tokens_fail() {
        let username = Username::new("johndoe").unwrap(/* known good */);
        let key_id = KeyId::new("keyid:20250817").unwrap(/* known good */);
        let signing_key = SigningKey::new(b"All that is gold does not glitter-- Not all who wander are lost.".to_vec()).unwrap(/* known good */);
        let issuer = Host::new("marketmeet.example.com").unwrap(/* known good */);

        // A token whose lifetime ended an hour ago
        let token = mint_token(
            UserId::new(42),
            &username,
            &key_id,
            &signing_key,
            &issuer,
            &Duration::hours(-1),
        )
        .unwrap(/* known good */);

        let keys = SigningKeys::from([(key_id, signing_key)]);
        assert!(matches!(
            verify_token(&token, &keys, &issuer),
            Err(Error::Expired { .. })
        ));
    }

    #[test]
    fn wrong_issuer_fails() {
        let username = Username::new("johndoe").unwrap(/* known good */);
        let key_id = KeyId::new("keyid:20250817").unwrap(/* known good */);
        let signing_key = SigningKey::new(b"All that is gold does not glitter-- Not all who wander are lost.".to_vec()).unwrap(/* known good */);
        let issuer = Host::new("marketmeet.example.com").unwrap(/* known good */);

        let token = mint_token(
            UserId::new(42),
            &username,
            &key_id,
            &signing_key,
            &issuer,
            &Duration::seconds(300),
        )
        .unwrap(/* known good */);

        let keys = SigningKeys::from([(key_id, signing_key)]);
        let other = Host::new("imposter.example.com").unwrap(/* known good */);
        assert!(matches!(
            verify_token(&token, &keys, &other),
            Err(Error::UnknownIssuer { .. })
        ));
    }
}
