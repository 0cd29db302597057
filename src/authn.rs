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

//! # marketmeet authentication support
//!
//! The auth gate: given a bearer credential, validate it & resolve it to a live account *before*
//! any store mutation happens. Both API routers share the [authenticate] middleware below (it
//! started life copied into each of them; the third copy was the sign to hoist it here).
//!
//! Two deliberate behaviors:
//!
//! - a *missing* credential lets the request through un-annotated rather than failing it, because
//!   the routers mount unauthenticated endpoints (signup, login, a handful of public reads) on the
//!   same [Router](axum::Router); handlers that require a caller look for the [User] extension &
//!   401 when it's absent.
//!
//! - a *present but invalid* credential fails the request immediately, and the response doesn't
//!   distinguish expired from forged from unknown-- all the caller learns is "Unauthorized".

use std::sync::Arc;

use axum::{extract::State, http::HeaderValue, response::IntoResponse};
use itertools::Itertools;
use secrecy::SecretString;
use snafu::{prelude::*, Backtrace};
use tracing::{debug, error};

use crate::{
    counter_add,
    entities::{User, UserEmail, Username},
    http::ErrorResponseBody,
    marketmeet::MarketMeet,
    metrics::{self, Sort},
    origin::Host,
    signing_keys::SigningKeys,
    storage::{self, Backend as StorageBackend},
    token::{self, verify_token},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("An Authorization header had a value that couldn't be parsed."))]
    BadAuthHeaderParse {
        value: HeaderValue,
        backtrace: Backtrace,
    },
    #[snafu(display("Incorrect password for {username}"))]
    BadPassword {
        username: Username,
        source: crate::entities::Error,
    },
    #[snafu(display("Invalid token: {source}"))]
    BadToken {
        #[snafu(source(from(token::Error, Box::new)))]
        source: Box<token::Error>,
    },
    #[snafu(display("Multiple Authorization headers were supplied; only one is accepted."))]
    MultipleAuthnHeaders,
    #[snafu(display("No authorization token found"))]
    #[snafu(visibility(pub(crate)))]
    NoAuthToken { backtrace: Backtrace },
    #[snafu(display("No account with e-mail {email}"))]
    UnknownEmail { email: UserEmail },
    #[snafu(display("Token names account {username}, which no longer exists"))]
    UnknownUser { username: Username },
    #[snafu(display("Authorization scheme {scheme} not supported"))]
    UnsupportedAuthScheme {
        scheme: String,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to lookup account: {source}"))]
    UserLookup { source: storage::Error },
}

impl Error {
    pub fn as_status_and_msg(&self) -> (axum::http::StatusCode, String) {
        use axum::http::StatusCode;
        match self {
            ////////////////////////////////////////////////////////////////////////////////////////
            // Broken requests-- tell the caller how to fix it
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::BadAuthHeaderParse { value, .. } => (
                StatusCode::BAD_REQUEST,
                format!("Bad Authorization header: {:?}", value),
            ),
            Error::MultipleAuthnHeaders => (
                StatusCode::BAD_REQUEST,
                "Multiple authorization headers".to_string(),
            ),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Authentication failure-- don't tell a potential attacker the way in which they failed
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::BadPassword { .. }
            | Error::BadToken { .. }
            | Error::NoAuthToken { .. }
            | Error::UnknownEmail { .. }
            | Error::UnknownUser { .. }
            | Error::UnsupportedAuthScheme { .. } => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            ////////////////////////////////////////////////////////////////////////////////////////
            // Internal failure-- own up to it
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::UserLookup {
                source: storage::Error::Unavailable { .. },
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The datastore is unavailable; try again shortly".to_string(),
            ),
            Error::UserLookup { source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error looking-up account: {source}"),
            ),
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (code, msg) = self.as_status_and_msg();
        (code, ErrorResponseBody { error: msg }).into_response()
    }
}

type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          AuthnScheme                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The credential a request proferred
///
/// Only the "Bearer" scheme (carrying a marketmeet JWT) is supported; this is an enum all the
/// same so the parse is in one place should that change.
#[derive(Clone, Debug)]
pub enum AuthnScheme {
    BearerToken(String),
}

impl TryFrom<&HeaderValue> for AuthnScheme {
    type Error = Error;

    fn try_from(value: &HeaderValue) -> Result<AuthnScheme> {
        let text = value
            .to_str()
            .map_err(|_| {
                BadAuthHeaderParseSnafu {
                    value: value.clone(),
                }
                .build()
            })?
            .trim();
        match text.split_once(' ') {
            Some(("Bearer", token)) => Ok(AuthnScheme::BearerToken(token.trim().to_owned())),
            Some((scheme, _)) => UnsupportedAuthSchemeSnafu {
                scheme: scheme.to_owned(),
            }
            .fail(),
            None => BadAuthHeaderParseSnafu {
                value: value.clone(),
            }
            .fail(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        credential checks                                       //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Verify a bearer token & resolve it to a live account
///
/// Signature, expiry, issuer & audience are all checked; then the named account is looked-up, so a
/// token naming a deleted account doesn't authenticate.
pub async fn check_token(
    storage: &(dyn StorageBackend + Send + Sync),
    token_string: &str,
    keys: &SigningKeys,
    issuer: &Host,
) -> Result<User> {
    let (userid, username) = verify_token(token_string, keys, issuer).context(BadTokenSnafu)?;
    storage
        .user_for_id(userid)
        .await
        .context(UserLookupSnafu)?
        .context(UnknownUserSnafu { username })
}

/// Validate an e-mail/password pair (the login path); resolve it to the account on success
pub async fn check_password(
    storage: &(dyn StorageBackend + Send + Sync),
    email: &UserEmail,
    password: &SecretString,
) -> Result<User> {
    let user = storage
        .user_for_email(email)
        .await
        .context(UserLookupSnafu)?
        .context(UnknownEmailSnafu {
            email: email.clone(),
        })?;
    user.check_password(password).context(BadPasswordSnafu {
        username: user.username().clone(),
    })?;
    Ok(user)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         Authentication                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("authn.successes", Sort::IntegralCounter) }
inventory::submit! { metrics::Registration::new("authn.failures", Sort::IntegralCounter) }

/// Authenticate a request
///
/// Insert the authenticated [User] into the request's extensions on success. On a *missing*
/// credential, we let the request go through un-annotated (public endpoints share these routers),
/// so we can't use the [Extension](axum::Extension) extractor directly in handlers that require
/// auth-- they check for the extension & 401 themselves.
///
/// This function leverages axum's support for function-based [middleware].
///
/// [middleware]: https://docs.rs/axum/latest/axum/middleware/index.html
pub async fn authenticate(
    State(state): State<Arc<MarketMeet>>,
    headers: axum::http::HeaderMap,
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    async fn authenticate1(
        headers: axum::http::HeaderMap,
        storage: &(dyn StorageBackend + Send + Sync),
        keys: &SigningKeys,
        issuer: &Host,
    ) -> Result<User> {
        // There's nothing stopping a client from including *multiple* Authorization headers;
        // reject that outright (smells too much like someone trying something fishy).
        let scheme = match headers
            .get_all("authorization")
            .into_iter()
            .at_most_one()
            .map_err(|_| Error::MultipleAuthnHeaders)?
        {
            Some(header_val) => AuthnScheme::try_from(header_val)?,
            None => {
                return NoAuthTokenSnafu.fail();
            }
        };

        match scheme {
            AuthnScheme::BearerToken(token_string) => {
                check_token(storage, &token_string, keys, issuer).await
            }
        }
    }

    match authenticate1(
        headers,
        state.storage.as_ref(),
        &state.signing_keys,
        &state.host,
    )
    .await
    {
        Ok(user) => {
            debug!("marketmeet authorized account {}", user.id());
            request.extensions_mut().insert(user);
            counter_add!(state.instruments, "authn.successes", 1, &[]);
            next.run(request).await
        }
        Err(Error::NoAuthToken { .. }) => {
            debug!("un-authenticated request; letting it through for the public endpoints");
            next.run(request).await
        }
        // I want to be careful about what sort of information we reveal to our caller...
        Err(err) => {
            error!("marketmeet failed to authenticate this request");
            counter_add!(state.instruments, "authn.failures", 1, &[]);
            err.into_response()
        }
    }
}
