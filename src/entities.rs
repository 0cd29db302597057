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

//! # marketmeet models
//!
//! ## Introduction
//!
//! "models"-style catch-all modules are usually a smell, but these types genuinely are the
//! foundation everything else stands on: accounts, reviews, likes, comments, follows, and the
//! refined newtypes out of which they're built.

use std::{fmt::Display, ops::Deref, str::FromStr};

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use password_hash::{rand_core::OsRng, PasswordHashString, SaltString};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use snafu::{prelude::*, Backtrace};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{text} is not a valid birth date; use DD/MM/YYYY"))]
    BadBirthDate {
        text: String,
        source: chrono::ParseError,
        backtrace: Backtrace,
    },
    #[snafu(display("{text} is not a valid category"))]
    BadCategory { text: String, backtrace: Backtrace },
    #[snafu(display("{email} is not a valid e-mail address"))]
    BadEmail { email: String, backtrace: Backtrace },
    #[snafu(display("Incorrect password"))]
    BadPassword { backtrace: Backtrace },
    #[snafu(display("{rating} is not a valid rating; ratings run from 1 to 5"))]
    BadRating { rating: i64, backtrace: Backtrace },
    #[snafu(display("{name} is not a valid marketmeet username"))]
    BadUsername { name: String },
    #[snafu(display("Failed to verify a password: {source}"))]
    CheckPassword {
        source: password_hash::errors::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to hash password: {source}"))]
    HashPassword {
        source: password_hash::errors::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Bad hash string: {source}"))]
    HashString {
        source: password_hash::errors::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Passwords must be at least {MIN_PASSWORD_LENGTH} characters"))]
    PasswordLength { backtrace: Backtrace },
    #[snafu(display("Passwords may not begin or end in whitespace"))]
    PasswordWhitespace { backtrace: Backtrace },
}

type Result<T> = std::result::Result<T, Error>;

type StdResult<T, E> = std::result::Result<T, E>;

fn mk_serde_de_err<'de, D: serde::Deserializer<'de>>(err: impl std::error::Error) -> D::Error {
    <D::Error as serde::de::Error>::custom(format!("{:?}", err))
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          Identifiers                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// define_id!
///
/// Declare a newtype intended to be used as an opaque identifier for some other sort of entity.
///
/// The backing store hands-out the actual values (AUTO_INCREMENT in MySQL, a counter in the
/// in-memory backend), so unlike a UUID-keyed scheme there is no constructor that conjures a fresh
/// identifier out of thin air; you get one back from the store or you don't have one. A bare [i64]
/// everywhere would have worked, but then nothing stops an account id from being handed to a
/// function expecting a post id, and that's precisely the sort of bug that survives code review.
macro_rules! define_id {
    ($type_name:ident) => {
        #[derive(
            Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        #[serde(transparent)]
        pub struct $type_name(i64);

        impl $type_name {
            pub fn new(id: i64) -> $type_name {
                $type_name(id)
            }
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl Display for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $type_name {
            fn from(value: i64) -> Self {
                $type_name(value)
            }
        }

        impl FromStr for $type_name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> StdResult<Self, Self::Err> {
                Ok($type_name(s.parse::<i64>()?))
            }
        }
    };
}

define_id!(UserId);
define_id!(PostId);
define_id!(LikeId);
define_id!(CommentId);
define_id!(FollowId);

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            Username                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

lazy_static! {
    static ref USERNAME: Regex = Regex::new("^[a-zA-Z][-_.a-zA-Z0-9]{2,63}$").unwrap(/* known good */);
}

fn check_username(s: &str) -> bool {
    USERNAME.is_match(s)
}

/// A refined type representing a marketmeet username
// Refined types in Rust mean a pile of boilerplate per type; one of these days I should look into
// a crate that generates it.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Construct a [Username] from a `&str`
    ///
    /// marketmeet usernames must be ASCII, may be from three to sixty-four characters in length,
    /// and must match the regex "^[a-zA-Z][-_.a-zA-Z0-9]+$". Use this constructor to create a
    /// [Username] instance by copying from a reference to [str]. To *move* a [String] into a
    /// [Username] (with validity checking) use [TryFrom::try_from()].
    pub fn new(name: &str) -> Result<Username> {
        check_username(name)
            .then_some(Username(name.to_owned()))
            .ok_or(
                BadUsernameSnafu {
                    name: name.to_owned(),
                }
                .build(),
            )
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        self.deref()
    }
}

impl Deref for Username {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Implement `Deserialize` by hand to fail if the serialized value isn't a legit `Username`
impl<'de> Deserialize<'de> for Username {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Username::try_from(s).map_err(mk_serde_de_err::<'de, D>)
    }
}

impl Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Username {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Username::new(s)
    }
}

impl TryFrom<String> for Username {
    type Error = Error;

    fn try_from(name: String) -> std::result::Result<Self, Self::Error> {
        if check_username(&name) {
            Ok(Username(name))
        } else {
            BadUsernameSnafu { name }.fail()
        }
    }
}

#[cfg(test)]
mod username_tests {
    use super::*;

    #[test]
    fn smoke() {
        assert!(Username::new("alice").is_ok());
        assert!(Username::new("alice.b-chalmers_3").is_ok());
        assert!(Username::new("al").is_err()); // too short
        assert!(Username::new("3alice").is_err()); // must start with a letter
        assert!(Username::new("alice chalmers").is_err()); // no whitespace
        assert!(Username::new(&"a".repeat(65)).is_err()); // too long
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           UserEmail                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A refined type representing an e-mail address
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct UserEmail(String);

impl UserEmail {
    pub fn new(email: &str) -> Result<UserEmail> {
        email_address::EmailAddress::is_valid(email)
            .then_some(UserEmail(email.to_string()))
            .context(BadEmailSnafu {
                email: email.to_string(),
            })
    }
}

impl AsRef<str> for UserEmail {
    fn as_ref(&self) -> &str {
        self.deref()
    }
}

impl Deref for UserEmail {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for UserEmail {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        UserEmail::new(&s).map_err(mk_serde_de_err::<'de, D>)
    }
}

impl Display for UserEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserEmail {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        UserEmail::new(s)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           BirthDate                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An account holder's birth date
///
/// On the wire (both at signup & in anything we send back), birth dates are rendered in DD/MM/YYYY
/// format; internally & in the database they're just a [NaiveDate].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BirthDate(NaiveDate);

impl BirthDate {
    pub fn new(text: &str) -> Result<BirthDate> {
        NaiveDate::parse_from_str(text, "%d/%m/%Y")
            .context(BadBirthDateSnafu {
                text: text.to_owned(),
            })
            .map(BirthDate)
    }
    pub fn as_date(&self) -> &NaiveDate {
        &self.0
    }
}

impl From<NaiveDate> for BirthDate {
    fn from(value: NaiveDate) -> Self {
        BirthDate(value)
    }
}

impl Display for BirthDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%d/%m/%Y"))
    }
}

impl<'de> Deserialize<'de> for BirthDate {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        BirthDate::new(&s).map_err(mk_serde_de_err::<'de, D>)
    }
}

impl Serialize for BirthDate {
    fn serialize<S>(&self, serializer: S) -> StdResult<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("{}", self))
    }
}

#[cfg(test)]
mod birth_date_tests {
    use super::*;

    #[test]
    fn smoke() {
        let bd = BirthDate::new("28/02/1990").unwrap(/* known good */);
        assert_eq!("28/02/1990", format!("{}", bd));
        assert!(BirthDate::new("1990-02-28").is_err());
        assert!(BirthDate::new("31/02/1990").is_err()); // no such day
        assert!(BirthDate::new("02/28/1990").is_err()); // month & day transposed
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             Rating                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A refined type representing a review's rating: an integer from one to five, inclusive
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub fn new(rating: i64) -> Result<Rating> {
        ((1..=5).contains(&rating))
            .then_some(Rating(rating as u8))
            .context(BadRatingSnafu { rating })
    }
    pub fn get(&self) -> u8 {
        self.0
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = <i64 as serde::Deserialize>::deserialize(deserializer)?;
        Rating::new(n).map_err(mk_serde_de_err::<'de, D>)
    }
}

#[cfg(test)]
mod rating_tests {
    use super::*;

    #[test]
    fn smoke() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(1).is_ok());
        assert!(Rating::new(5).is_ok());
        assert!(Rating::new(6).is_err());
        assert!(Rating::new(-3).is_err());
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            Category                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

const MAX_CATEGORY_LENGTH: usize = 255;

fn check_category(s: &str) -> bool {
    !s.is_empty() && s.len() <= MAX_CATEGORY_LENGTH && s.trim() == s
}

/// A refined type representing a review category ("electronics", say)
///
/// Categories are free text: non-empty, no leading or trailing whitespace, at most 255 bytes.
/// There is no fixed taxonomy; `/api/categories` reports the distinct values actually in use.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(text: &str) -> Result<Category> {
        check_category(text)
            .then_some(Category(text.to_string()))
            .context(BadCategorySnafu {
                text: text.to_string(),
            })
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Category::new(s)
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Category::new(&s).map_err(mk_serde_de_err::<'de, D>)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         UserHashString                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A password hash, in PHC string format
///
/// I've chosen to wrap a [PasswordHashString], rather than a [PasswordHash], since the latter
/// borrows the textual representation & we need to own what comes back from the database.
#[derive(Clone, Debug)]
pub struct UserHashString(PasswordHashString);

impl UserHashString {
    pub fn new(s: &str) -> Result<UserHashString> {
        Ok(UserHashString(
            PasswordHashString::new(s).context(HashStringSnafu)?,
        ))
    }
    pub fn password_hash(&self) -> password_hash::PasswordHash<'_> {
        self.0.password_hash()
    }
}

impl AsRef<str> for UserHashString {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            Accounts                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

const MIN_PASSWORD_LENGTH: usize = 6;

/// Sanity-check a proferred password
///
/// marketmeet delegates serious password *policy* to the deployment; all we enforce here is a
/// minimum length & the no-leading-or-trailing-whitespace rule (a surprisingly common source of
/// "my password doesn't work" tickets thanks to copy-and-paste).
fn validate_password(password: &SecretString) -> Result<()> {
    let exposed = password.expose_secret();
    ensure!(exposed.trim() == exposed, PasswordWhitespaceSnafu);
    ensure!(exposed.len() >= MIN_PASSWORD_LENGTH, PasswordLengthSnafu);
    Ok(())
}

/// Hash a password
///
/// Salt the password, then hash it using Argon2id with the default version & parameters (which, at
/// the time of this writing, comport with the OWASP [recommendations]).
///
/// [recommendations]: https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html#password-hashing-algorithms
fn hash_password(password: &SecretString) -> Result<PasswordHashString> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .context(HashPasswordSnafu)?
        .serialize())
}

/// A new account, ready to be handed to the storage layer
///
/// The account id is assigned by the store, so a freshly validated signup is represented by this
/// type rather than by [User]; you get a [User] back when you read the account.
#[derive(Clone, Debug)]
pub struct NewUser {
    username: Username,
    email: UserEmail,
    birth_date: BirthDate,
    password_hash: UserHashString,
}

impl NewUser {
    /// Validate a signup & hash its password
    pub fn new(
        username: &Username,
        password: &SecretString,
        email: &UserEmail,
        birth_date: &BirthDate,
    ) -> Result<NewUser> {
        validate_password(password)?;
        Ok(NewUser {
            username: username.clone(),
            email: email.clone(),
            birth_date: *birth_date,
            password_hash: UserHashString(hash_password(password)?),
        })
    }
    pub fn birth_date(&self) -> &BirthDate {
        &self.birth_date
    }
    pub fn email(&self) -> &UserEmail {
        &self.email
    }
    pub fn password_hash(&self) -> &UserHashString {
        &self.password_hash
    }
    pub fn username(&self) -> &Username {
        &self.username
    }
}

/// A marketmeet account, as read back from the store
#[derive(Clone, Debug)]
pub struct User {
    id: UserId,
    username: Username,
    email: UserEmail,
    birth_date: BirthDate,
    password_hash: UserHashString,
    created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        username: Username,
        email: UserEmail,
        birth_date: BirthDate,
        password_hash: UserHashString,
        created_at: DateTime<Utc>,
    ) -> User {
        User {
            id,
            username,
            email,
            birth_date,
            password_hash,
            created_at,
        }
    }
    /// Validate a password against this account's stored hash
    pub fn check_password(&self, password: &SecretString) -> Result<()> {
        match Argon2::default().verify_password(
            password.expose_secret().as_bytes(),
            &self.password_hash.password_hash(),
        ) {
            Ok(_) => Ok(()),
            Err(password_hash::errors::Error::Password) => BadPasswordSnafu.fail(),
            Err(err) => Err(err).context(CheckPasswordSnafu),
        }
    }
    pub fn birth_date(&self) -> &BirthDate {
        &self.birth_date
    }
    pub fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }
    pub fn email(&self) -> &UserEmail {
        &self.email
    }
    pub fn id(&self) -> UserId {
        self.id
    }
    pub fn password_hash(&self) -> &UserHashString {
        &self.password_hash
    }
    pub fn username(&self) -> &Username {
        &self.username
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let username = Username::new("johndoe").unwrap(/* known good */);
        let email = UserEmail::new("jdoe@gmail.com").unwrap(/* known good */);
        let birth_date = BirthDate::new("17/08/1970").unwrap(/* known good */);
        let password = SecretString::from("f00 b@r sp1at");

        let new_user = NewUser::new(&username, &password, &email, &birth_date).unwrap(/* known good */);
        let user = User::new(
            UserId::new(1),
            username,
            email,
            birth_date,
            new_user.password_hash().clone(),
            Utc::now(),
        );
        assert!(user.check_password(&password).is_ok());
        assert!(user.check_password(&SecretString::from("not the password")).is_err());
    }

    #[test]
    fn rejects_weak_or_padded() {
        assert!(validate_password(&SecretString::from("abc")).is_err());
        assert!(validate_password(&SecretString::from(" padded out ")).is_err());
        assert!(validate_password(&SecretString::from("just fine")).is_ok());
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             Posts                                              //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A new review, ready to be handed to the storage layer
///
/// The optional fields are enumerated explicitly, here, at the type level. Which fields were
/// supplied is a property of the *request*, not something to be re-discovered downstream by
/// assembling SQL text at runtime.
#[derive(Clone, Debug, Deserialize)]
pub struct NewPost {
    pub caption: String,
    pub rating: Option<Rating>,
    pub category: Option<Category>,
    pub product_photo: Option<String>,
    pub product_url: Option<String>,
}

/// A partial update to a review
///
/// `None` means "leave that column alone"; there is no way to null-out a field once set, matching
/// the behavior of the service this replaces.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PostPatch {
    pub caption: Option<String>,
    pub rating: Option<Rating>,
    pub category: Option<Category>,
    pub product_photo: Option<String>,
    pub product_url: Option<String>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.caption.is_none()
            && self.rating.is_none()
            && self.category.is_none()
            && self.product_photo.is_none()
            && self.product_url.is_none()
    }
}

/// The denormalized view of a review: the post fields, the author's username, like & comment
/// counts, and whether the viewer has liked it
///
/// Never persisted; recomputed from the store on every read. `is_liked` is relative to a viewer;
/// in contexts with no viewer (realtime broadcast payloads, e.g.) it is uniformly `false`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PostAggregate {
    pub id_post: PostId,
    pub id_user: UserId,
    pub username: Username,
    pub rating: Option<Rating>,
    pub caption: String,
    pub category: Option<Category>,
    pub product_photo: Option<String>,
    pub product_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
    pub comments_count: i64,
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
}

/// Like & comment counts alone, for `/api/posts/{postId}/stats`
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct PostStats {
    pub likes_count: i64,
    pub comments_count: i64,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             Likes                                              //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The action a like toggle ended-up taking
///
/// A toggle *flips* the (post, account) like state; it doesn't set it. Two toggles in a row always
/// land you back where you started, and the caller finds out which way this one went from the
/// returned variant.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeAction {
    Liked,
    Unliked,
}

impl Display for LikeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LikeAction::Liked => write!(f, "liked"),
            LikeAction::Unliked => write!(f, "unliked"),
        }
    }
}

/// One account's like of one post, as presented by `/api/posts/{postId}/likes`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LikeEntry {
    pub id_user: UserId,
    pub username: Username,
    pub created_at: DateTime<Utc>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            Comments                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A comment, joined with its author's username
///
/// Comments are append-only: they're created & deleted, never edited, so there's no patch type to
/// go with this one.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Comment {
    pub id_comment: CommentId,
    pub id_post: PostId,
    pub id_user: UserId,
    pub username: Username,
    pub comment_text: String,
    pub created_at: DateTime<Utc>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                            Follows                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// One edge of the (directed) follow graph, as presented by `/api/users/{userId}/followers`
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Follower {
    pub id_user: UserId,
    pub username: Username,
    pub created_at: DateTime<Utc>,
}
