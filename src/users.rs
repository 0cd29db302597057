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

//! # User API
//!
//! Account registration, login, profiles, username changes & the follow graph.
//!
//! Request bodies arrive as plain strings & are refined *in the handlers*, so a malformed field is
//! a 400 with a message naming the field, rather than whatever the JSON extractor would have said.

use std::sync::Arc;

use axum::{
    extract::{rejection::ExtensionRejection, Path, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

use crate::{
    authn::{self, authenticate, check_password},
    counter_add,
    entities::{BirthDate, Follower, NewUser, User, UserEmail, UserId, Username},
    http::ErrorResponseBody,
    marketmeet::MarketMeet,
    metrics::{self, Sort},
    signing_keys,
    storage::{self, Backend as StorageBackend},
    token::{self, mint_token},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to create account: {source}"))]
    AddUser { source: storage::Error },
    #[snafu(display("{text} is not a valid birth date"))]
    BadBirthDate {
        text: String,
        source: crate::entities::Error,
    },
    #[snafu(display("Invalid credentials: {source}"))]
    BadCredentials { source: authn::Error },
    #[snafu(display("{email} is not a valid e-mail address"))]
    BadEmail {
        email: String,
        source: crate::entities::Error,
    },
    #[snafu(display("Invalid password: {source}"))]
    BadSignupPassword { source: crate::entities::Error },
    #[snafu(display("{username} is not a valid username"))]
    BadUsername {
        username: String,
        source: crate::entities::Error,
    },
    #[snafu(display("Failed to record the follow: {source}"))]
    Follow { source: storage::Error },
    #[snafu(display("Failed to list followers: {source}"))]
    Followers { source: storage::Error },
    #[snafu(display("{field} is required"))]
    MissingField { field: &'static str },
    #[snafu(display("No signing keys available: {source}"))]
    NoKeys {
        source: signing_keys::Error,
    },
    #[snafu(display("You can't follow yourself"))]
    SelfFollow,
    #[snafu(display("Failed to mint a token for account {username}: {source}"))]
    Token {
        username: Username,
        #[snafu(source(from(token::Error, Box::new)))]
        source: Box<token::Error>,
    },
    #[snafu(display("No account with id {id}"))]
    UnknownUser { id: UserId },
    #[snafu(display("Failed to remove the follow: {source}"))]
    Unfollow { source: storage::Error },
    #[snafu(display("Failed to update username: {source}"))]
    UpdateName { source: storage::Error },
    #[snafu(display("Failed to lookup account: {source}"))]
    UserLookup { source: storage::Error },
}

impl Error {
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            ////////////////////////////////////////////////////////////////////////////////////////
            // Broken requests-- tell the caller how to fix it
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::BadBirthDate { text, .. } => (
                StatusCode::BAD_REQUEST,
                format!("{text} is not a valid birth date; use DD/MM/YYYY"),
            ),
            Error::BadEmail { email, .. } => (
                StatusCode::BAD_REQUEST,
                format!("{email} is not a valid e-mail address"),
            ),
            Error::BadSignupPassword { source } => {
                (StatusCode::BAD_REQUEST, format!("{source}"))
            }
            Error::BadUsername { username, .. } => (
                StatusCode::BAD_REQUEST,
                format!("{username} is not a valid username"),
            ),
            Error::MissingField { field } => {
                (StatusCode::BAD_REQUEST, format!("{field} is required"))
            }
            Error::SelfFollow => (
                StatusCode::BAD_REQUEST,
                "You can't follow yourself".to_string(),
            ),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Authentication failure-- don't tell a potential attacker the way in which they failed
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::BadCredentials { .. } => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            ////////////////////////////////////////////////////////////////////////////////////////
            // Conflicts & lookups
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::AddUser {
                source: storage::Error::Conflict { what, .. },
            } => (
                StatusCode::BAD_REQUEST,
                format!("That {what} is already in use"),
            ),
            Error::UpdateName {
                source: storage::Error::Conflict { what, .. },
            } => (
                StatusCode::CONFLICT,
                format!("That {what} is already in use"),
            ),
            Error::Follow {
                source: storage::Error::Conflict { .. },
            } => (
                StatusCode::CONFLICT,
                "You already follow that account".to_string(),
            ),
            Error::Follow {
                source: storage::Error::NotFound { .. },
            }
            | Error::Unfollow {
                source: storage::Error::NotFound { .. },
            }
            | Error::UpdateName {
                source: storage::Error::NotFound { .. },
            }
            | Error::UnknownUser { .. } => {
                (StatusCode::NOT_FOUND, "Account not found".to_string())
            }
            ////////////////////////////////////////////////////////////////////////////////////////
            // Internal failure-- own up to it
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::AddUser {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Follow {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Followers {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Unfollow {
                source: storage::Error::Unavailable { .. },
            }
            | Error::UpdateName {
                source: storage::Error::Unavailable { .. },
            }
            | Error::UserLookup {
                source: storage::Error::Unavailable { .. },
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The datastore is unavailable; try again shortly".to_string(),
            ),
            err => (StatusCode::INTERNAL_SERVER_ERROR, format!("{err}")),
        }
    }
}

impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (code, msg) = self.as_status_and_msg();
        (code, Json(ErrorResponseBody { error: msg })).into_response()
    }
}

type Result<T> = std::result::Result<T, Error>;

type StdResult<T, E> = std::result::Result<T, E>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      User API utilities                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An account, as presented on the wire (no password hash, naturally)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UserRsp {
    pub id_user: UserId,
    pub username: Username,
    pub email: UserEmail,
    pub birth_date: BirthDate,
}

impl From<&User> for UserRsp {
    fn from(user: &User) -> Self {
        UserRsp {
            id_user: user.id(),
            username: user.username().clone(),
            email: user.email().clone(),
            birth_date: *user.birth_date(),
        }
    }
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|s| !s.is_empty())
        .context(MissingFieldSnafu { field })
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       `/users/create`                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("users.signups.successful", Sort::IntegralCounter) }
inventory::submit! { metrics::Registration::new("users.signups.failures", Sort::IntegralCounter) }

#[derive(Clone, Debug, Deserialize)]
struct CreateReq {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    birth_date: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateRsp {
    pub success: bool,
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

/// Register a new account
///
/// Parameters (all required):
///
/// - username: three to sixty-four characters, ASCII, starting with a letter; must be unique
///
/// - email: a contact e-mail; must be unique
///
/// - password: at least six characters; marketmeet stores only a salted Argon2id hash
///
/// - birth_date: DD/MM/YYYY
///
/// Unlike most other endpoints in this API, there is no authentication on this method.
async fn create(
    State(state): State<Arc<MarketMeet>>,
    Json(create_req): Json<CreateReq>,
) -> axum::response::Response {
    async fn create1(
        req: &CreateReq,
        storage: &(dyn StorageBackend + Send + Sync),
    ) -> Result<CreateRsp> {
        let username = required("username", &req.username)?;
        let username = Username::new(username).context(BadUsernameSnafu { username })?;
        let email = required("email", &req.email)?;
        let email = UserEmail::new(email).context(BadEmailSnafu { email })?;
        let birth_date = required("birth_date", &req.birth_date)?;
        let birth_date = BirthDate::new(birth_date).context(BadBirthDateSnafu { text: birth_date })?;
        let password = SecretString::from(required("password", &req.password)?.to_owned());

        let user = NewUser::new(&username, &password, &email, &birth_date)
            .context(BadSignupPasswordSnafu)?;
        let user_id = storage.add_user(&user).await.context(AddUserSnafu)?;
        Ok(CreateRsp {
            success: true,
            user_id,
        })
    }

    match create1(&create_req, state.storage.as_ref()).await {
        Ok(rsp) => {
            info!("Created account {}", rsp.user_id);
            counter_add!(state.instruments, "users.signups.successful", 1, &[]);
            (StatusCode::CREATED, Json(rsp)).into_response()
        }
        Err(err) => {
            if matches!(
                err,
                Error::AddUser {
                    source: storage::Error::Conflict { .. }
                }
            ) {
                info!("signup rejected: {}", err);
            } else {
                error!("{:#?}", err);
            }
            counter_add!(state.instruments, "users.signups.failures", 1, &[]);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        `/users/login`                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("users.logins.successful", Sort::IntegralCounter) }
inventory::submit! { metrics::Registration::new("users.logins.failures", Sort::IntegralCounter) }

#[derive(Clone, Debug, Deserialize)]
struct LoginReq {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginRsp {
    pub success: bool,
    pub token: String,
    pub user: UserRsp,
}

/// Login as an existing account holder
///
/// This endpoint will vend a time-limited JWT that can be supplied in the Authorization header
/// (with the bearer scheme) in subsequent requests.
async fn login(
    State(state): State<Arc<MarketMeet>>,
    Json(login_req): Json<LoginReq>,
) -> axum::response::Response {
    async fn login1(req: &LoginReq, state: &MarketMeet) -> Result<LoginRsp> {
        let email = required("email", &req.email)?;
        let email = UserEmail::new(email).context(BadEmailSnafu { email })?;
        let password = SecretString::from(required("password", &req.password)?.to_owned());

        let user = check_password(state.storage.as_ref(), &email, &password)
            .await
            .context(BadCredentialsSnafu)?;

        let (keyid, signing_key) = state.signing_keys.current().context(NoKeysSnafu)?;
        let token = mint_token(
            user.id(),
            user.username(),
            &keyid,
            &signing_key,
            &state.host,
            &state.token_lifetime,
        )
        .context(TokenSnafu {
            username: user.username().clone(),
        })?;
        Ok(LoginRsp {
            success: true,
            token,
            user: UserRsp::from(&user),
        })
    }

    match login1(&login_req, &state).await {
        Ok(rsp) => {
            info!("Logged-in account {}", rsp.user.username);
            counter_add!(state.instruments, "users.logins.successful", 1, &[]);
            (StatusCode::OK, Json(rsp)).into_response()
        }
        Err(err) => {
            if matches!(err, Error::BadCredentials { .. }) {
                info!("login rejected");
            } else {
                error!("{:#?}", err);
            }
            counter_add!(state.instruments, "users.logins.failures", 1, &[]);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                      `/users/{user_id}`                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProfileRsp {
    pub success: bool,
    pub user: UserRsp,
}

/// Fetch an account's public profile
async fn profile(
    State(state): State<Arc<MarketMeet>>,
    Path(user_id): Path<UserId>,
) -> axum::response::Response {
    async fn profile1(
        user_id: UserId,
        storage: &(dyn StorageBackend + Send + Sync),
    ) -> Result<ProfileRsp> {
        let user = storage
            .user_for_id(user_id)
            .await
            .context(UserLookupSnafu)?
            .context(UnknownUserSnafu { id: user_id })?;
        Ok(ProfileRsp {
            success: true,
            user: UserRsp::from(&user),
        })
    }

    match profile1(user_id, state.storage.as_ref()).await {
        Ok(rsp) => (StatusCode::OK, Json(rsp)).into_response(),
        Err(err) => {
            if !matches!(err, Error::UnknownUser { .. }) {
                error!("{:#?}", err);
            }
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     `/users/update-name`                                       //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("users.renames", Sort::IntegralCounter) }

#[derive(Clone, Debug, Deserialize)]
struct UpdateNameReq {
    new_username: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UpdateNameRsp {
    pub success: bool,
    pub username: Username,
}

/// Change the calling account's username
async fn update_name(
    State(state): State<Arc<MarketMeet>>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Json(req): Json<UpdateNameReq>,
) -> axum::response::Response {
    async fn update_name1(
        req: &UpdateNameReq,
        caller: &User,
        storage: &(dyn StorageBackend + Send + Sync),
    ) -> Result<UpdateNameRsp> {
        let username = required("new_username", &req.new_username)?;
        let username = Username::new(username.trim()).context(BadUsernameSnafu { username })?;
        storage
            .update_username(caller.id(), &username)
            .await
            .context(UpdateNameSnafu)?;
        Ok(UpdateNameRsp {
            success: true,
            username,
        })
    }

    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match update_name1(&req, user, state.storage.as_ref()).await {
        Ok(rsp) => {
            info!("account {} is now known as {}", user.id(), rsp.username);
            counter_add!(state.instruments, "users.renames", 1, &[]);
            (StatusCode::OK, Json(rsp)).into_response()
        }
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                  `/users/{user_id}/follow`                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("users.follows.successful", Sort::IntegralCounter) }
inventory::submit! { metrics::Registration::new("users.follows.failures", Sort::IntegralCounter) }

/// Follow another account
///
/// A follow is a directed edge, unique per ordered pair; following yourself is a validation
/// error, and following someone twice is a conflict (not a toggle-- see the like engine for
/// toggle semantics; follows aren't that).
async fn follow(
    State(state): State<Arc<MarketMeet>>,
    Path(user_id): Path<UserId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    async fn follow1(
        caller: &User,
        target: UserId,
        storage: &(dyn StorageBackend + Send + Sync),
    ) -> Result<()> {
        ensure!(caller.id() != target, SelfFollowSnafu);
        storage
            .add_follow(caller.id(), target)
            .await
            .context(FollowSnafu)
    }

    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match follow1(user, user_id, state.storage.as_ref()).await {
        Ok(_) => {
            counter_add!(state.instruments, "users.follows.successful", 1, &[]);
            StatusCode::CREATED.into_response()
        }
        Err(err) => {
            counter_add!(state.instruments, "users.follows.failures", 1, &[]);
            err.into_response()
        }
    }
}

/// Un-follow an account
async fn unfollow(
    State(state): State<Arc<MarketMeet>>,
    Path(user_id): Path<UserId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match state
        .storage
        .delete_follow(user.id(), user_id)
        .await
        .context(UnfollowSnafu)
    {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FollowersRsp {
    pub success: bool,
    pub followers: Vec<Follower>,
}

/// List the accounts following `user_id`
async fn followers(
    State(state): State<Arc<MarketMeet>>,
    Path(user_id): Path<UserId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    async fn followers1(
        target: UserId,
        storage: &(dyn StorageBackend + Send + Sync),
    ) -> Result<FollowersRsp> {
        // 404 for an account that isn't there, rather than an empty list
        storage
            .user_for_id(target)
            .await
            .context(UserLookupSnafu)?
            .context(UnknownUserSnafu { id: target })?;
        let followers = storage
            .followers_for_user(target)
            .await
            .context(FollowersSnafu)?;
        Ok(FollowersRsp {
            success: true,
            followers,
        })
    }

    if user.is_err() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match followers1(user_id, state.storage.as_ref()).await {
        Ok(rsp) => (StatusCode::OK, Json(rsp)).into_response(),
        Err(err) => {
            if !matches!(err, Error::UnknownUser { .. }) {
                error!("{:#?}", err);
            }
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           Public API                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Return a router for the User API
///
/// The returned [Router] will presumably be merged with other routers.
pub fn make_router(state: Arc<MarketMeet>) -> Router<Arc<MarketMeet>> {
    Router::new()
        .route("/users/create", post(create))
        .route("/users/login", post(login))
        .route("/users/update-name", put(update_name))
        .route("/users/{user_id}", get(profile))
        .route("/users/{user_id}/follow", post(follow).delete(unfollow))
        .route("/users/{user_id}/followers", get(followers))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ))
        // All responses are JSON; add the appropriate Content-Type header (but leave the existing
        // Content-Type header should a handler set it specially).
        .layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        ))
        .with_state(state)
}
