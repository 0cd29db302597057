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

//! # mysql
//!
//! [Backend] implementation for MySQL/MariaDB.
//!
//! [Backend]: crate::storage::Backend
//!
//! All access goes through a bounded [MySqlPool]; a handler's unit of work acquires a connection
//! from the pool for the duration of each statement & releases it on every exit path (the pool
//! guards this structurally-- there is no connection to leak on an early return). Pool exhaustion
//! and I/O failures are reported as [storage::Error::Unavailable], which the API layer maps to
//! 503; they are never conflated with "not found".
//!
//! The like-pair invariant ("at most one like per (post, account)") is enforced *here*, by the
//! UNIQUE KEY on `likes (id_post, id_user)`, and the toggle is a single conditional mutation
//! against that constraint-- see [toggle_like](Store::toggle_like).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::{ExposeSecret, SecretString};
use snafu::{prelude::*, Backtrace};
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions, MySqlRow},
    Row,
};
use tracing::debug;

use crate::{
    entities::{
        Category, Comment, CommentId, Follower, LikeAction, LikeEntry, NewPost, NewUser,
        PostAggregate, PostId, PostPatch, PostStats, Rating, User, UserEmail, UserHashString,
        UserId, Username,
    },
    storage,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to connect to MySQL: {source}"))]
    Connect {
        source: sqlx::Error,
        backtrace: Backtrace,
    },
    #[snafu(display("Failed to create the marketmeet schema: {source}"))]
    Schema {
        source: sqlx::Error,
        backtrace: Backtrace,
    },
}

type Result<T> = std::result::Result<T, Error>;

type StorResult<T> = std::result::Result<T, storage::Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                             schema                                             //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The marketmeet schema, one DDL statement per table
///
/// MySQL won't take multiple statements in one `execute`, so these are kept separate & applied in
/// order (the FOREIGN KEYs require it). The UNIQUE KEY on `likes (id_post, id_user)` is
/// load-bearing: it's what makes the like toggle safe under concurrent requests. The ON DELETE
/// CASCADEs make post deletion clean-up its dependent rows without application-level sequencing.
pub const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS account (
       id_user BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
       username VARCHAR(64) NOT NULL,
       email VARCHAR(255) NOT NULL,
       password VARCHAR(255) NOT NULL,
       birth_date DATE NOT NULL,
       created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
       UNIQUE KEY username (username),
       UNIQUE KEY email (email)
     )",
    "CREATE TABLE IF NOT EXISTS post (
       id_post BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
       id_user BIGINT NOT NULL,
       rating TINYINT NULL,
       caption TEXT NOT NULL,
       category VARCHAR(255) NULL,
       product_photo TEXT NULL,
       product_url TEXT NULL,
       created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
       KEY post_created (created_at, id_post),
       KEY post_category (category),
       CONSTRAINT post_author FOREIGN KEY (id_user) REFERENCES account (id_user)
     )",
    "CREATE TABLE IF NOT EXISTS likes (
       id_like BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
       id_post BIGINT NOT NULL,
       id_user BIGINT NOT NULL,
       created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
       UNIQUE KEY like_pair (id_post, id_user),
       CONSTRAINT like_post FOREIGN KEY (id_post) REFERENCES post (id_post) ON DELETE CASCADE,
       CONSTRAINT like_account FOREIGN KEY (id_user) REFERENCES account (id_user)
     )",
    "CREATE TABLE IF NOT EXISTS comments (
       id_comment BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
       id_post BIGINT NOT NULL,
       id_user BIGINT NOT NULL,
       comment_text TEXT NOT NULL,
       created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
       KEY comment_post (id_post, created_at),
       CONSTRAINT comment_post FOREIGN KEY (id_post) REFERENCES post (id_post) ON DELETE CASCADE,
       CONSTRAINT comment_account FOREIGN KEY (id_user) REFERENCES account (id_user)
     )",
    "CREATE TABLE IF NOT EXISTS follows (
       id_follow BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
       id_follower BIGINT NOT NULL,
       id_following BIGINT NOT NULL,
       created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
       UNIQUE KEY follow_pair (id_follower, id_following),
       CONSTRAINT follow_follower FOREIGN KEY (id_follower) REFERENCES account (id_user) ON DELETE CASCADE,
       CONSTRAINT follow_following FOREIGN KEY (id_following) REFERENCES account (id_user) ON DELETE CASCADE
     )",
];

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                    error translation helpers                                   //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Translate a driver error into the storage taxonomy
///
/// Pool exhaustion & connection trouble become [Unavailable]; everything else is an opaque
/// [Backend] failure. Constraint violations are operation-specific & handled at each call site
/// (a duplicate key means different things to `add_user` & `toggle_like`).
///
/// [Unavailable]: storage::Error::Unavailable
/// [Backend]: storage::Error::Backend
fn translate(err: sqlx::Error) -> storage::Error {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            storage::Error::unavailable(err)
        }
        _ => storage::Error::backend(err),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         row decoding                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

// sqlx hands back Strings & integers; refining them back into our newtypes can fail, which we
// report as an (opaque) backend error-- a row that won't refine means the database holds something
// this code never wrote.

fn user_from_row(row: &MySqlRow) -> StorResult<User> {
    let username = Username::new(&row.try_get::<String, _>("username").map_err(translate)?)
        .map_err(storage::Error::backend)?;
    let email = UserEmail::new(&row.try_get::<String, _>("email").map_err(translate)?)
        .map_err(storage::Error::backend)?;
    let hash = UserHashString::new(&row.try_get::<String, _>("password").map_err(translate)?)
        .map_err(storage::Error::backend)?;
    Ok(User::new(
        UserId::new(row.try_get::<i64, _>("id_user").map_err(translate)?),
        username,
        email,
        row.try_get::<NaiveDate, _>("birth_date")
            .map_err(translate)?
            .into(),
        hash,
        row.try_get::<DateTime<Utc>, _>("created_at")
            .map_err(translate)?,
    ))
}

fn aggregate_from_row(row: &MySqlRow) -> StorResult<PostAggregate> {
    let username = Username::new(&row.try_get::<String, _>("username").map_err(translate)?)
        .map_err(storage::Error::backend)?;
    let rating = row
        .try_get::<Option<i8>, _>("rating")
        .map_err(translate)?
        .map(|r| Rating::new(r as i64))
        .transpose()
        .map_err(storage::Error::backend)?;
    let category = row
        .try_get::<Option<String>, _>("category")
        .map_err(translate)?
        .as_deref()
        .map(Category::new)
        .transpose()
        .map_err(storage::Error::backend)?;
    Ok(PostAggregate {
        id_post: PostId::new(row.try_get::<i64, _>("id_post").map_err(translate)?),
        id_user: UserId::new(row.try_get::<i64, _>("id_user").map_err(translate)?),
        username,
        rating,
        caption: row.try_get::<String, _>("caption").map_err(translate)?,
        category,
        product_photo: row
            .try_get::<Option<String>, _>("product_photo")
            .map_err(translate)?,
        product_url: row
            .try_get::<Option<String>, _>("product_url")
            .map_err(translate)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(translate)?,
        likes_count: row.try_get::<i64, _>("likes_count").map_err(translate)?,
        comments_count: row.try_get::<i64, _>("comments_count").map_err(translate)?,
        is_liked: row.try_get::<i64, _>("is_liked").map_err(translate)? != 0,
    })
}

/// The SELECT head shared by every aggregate read
///
/// One query, parameterized by a WHERE clause chosen from the fixed set below-- the per-user,
/// per-category, per-rating & unfiltered listings are *not* separate queries. The first bind is
/// always the viewer (for `is_liked`); when there is no viewer we bind an id no account can have.
const AGGREGATE_HEAD: &str = "SELECT
       p.id_post, p.rating, p.caption, p.category, p.product_photo, p.product_url, p.created_at,
       a.username, a.id_user,
       COUNT(DISTINCT l.id_like) AS likes_count,
       COUNT(DISTINCT c.id_comment) AS comments_count,
       CAST(CASE WHEN EXISTS(SELECT 1 FROM likes WHERE id_post = p.id_post AND id_user = ?)
            THEN 1 ELSE 0 END AS SIGNED) AS is_liked
     FROM post p
     JOIN account a ON p.id_user = a.id_user
     LEFT JOIN likes l ON p.id_post = l.id_post
     LEFT JOIN comments c ON p.id_post = c.id_post";

const AGGREGATE_TAIL: &str = "GROUP BY p.id_post, a.id_user, a.username, p.rating, p.caption,
       p.category, p.product_photo, p.product_url, p.created_at";

/// The viewer id bound when no viewer is known; ids are AUTO_INCREMENT from 1, so this matches no
/// likes & `is_liked` comes back false across the board.
const NO_VIEWER: i64 = -1;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        the MySQL Store                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// MySQL-backed [storage::Backend]
pub struct Store {
    pool: MySqlPool,
}

impl Store {
    /// Connect to MySQL & build the connection pool
    ///
    /// `acquire_timeout` bounds how long a unit of work will wait for a free connection before the
    /// request fails with "store unavailable"; without it, a saturated pool turns into hung
    /// requests.
    pub async fn new(
        url: &SecretString,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Store> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url.expose_secret())
            .await
            .context(ConnectSnafu)?;
        Ok(Store { pool })
    }
    /// Create the marketmeet tables if they aren't already there
    pub async fn initialize_schema(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .context(SchemaSnafu)?;
        }
        Ok(())
    }
}

#[async_trait]
impl storage::Backend for Store {
    async fn add_user(&self, user: &NewUser) -> StorResult<UserId> {
        match sqlx::query(
            "INSERT INTO account (username, email, password, birth_date) VALUES (?, ?, ?, ?)",
        )
        .bind(user.username().as_ref())
        .bind(user.email().as_ref())
        .bind(user.password_hash().as_ref())
        .bind(user.birth_date().as_date())
        .execute(&self.pool)
        .await
        {
            Ok(done) => Ok(UserId::new(done.last_insert_id() as i64)),
            Err(err) if is_unique_violation(&err) => {
                // MySQL names the violated key in the message ("... for key 'account.username'");
                // that's the only way to tell *which* uniqueness constraint fired.
                let what = match &err {
                    sqlx::Error::Database(db) if db.message().contains("username") => "username",
                    _ => "email",
                };
                Err(storage::Error::conflict(what))
            }
            Err(err) => Err(translate(err)),
        }
    }

    async fn user_for_id(&self, id: UserId) -> StorResult<Option<User>> {
        sqlx::query("SELECT id_user, username, email, password, birth_date, created_at FROM account WHERE id_user = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(translate)?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn user_for_email(&self, email: &UserEmail) -> StorResult<Option<User>> {
        sqlx::query("SELECT id_user, username, email, password, birth_date, created_at FROM account WHERE email = ?")
            .bind(email.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(translate)?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn user_for_name(&self, name: &Username) -> StorResult<Option<User>> {
        sqlx::query("SELECT id_user, username, email, password, birth_date, created_at FROM account WHERE username = ?")
            .bind(name.as_ref())
            .fetch_optional(&self.pool)
            .await
            .map_err(translate)?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn update_username(&self, id: UserId, name: &Username) -> StorResult<()> {
        match sqlx::query("UPDATE account SET username = ? WHERE id_user = ?")
            .bind(name.as_ref())
            .bind(id.get())
            .execute(&self.pool)
            .await
        {
            Ok(done) if done.rows_affected() > 0 => Ok(()),
            Ok(_) => {
                // Zero rows affected is ambiguous in MySQL: no such account, or a no-op rename.
                if self.user_for_id(id).await?.is_some() {
                    Ok(())
                } else {
                    Err(storage::Error::not_found("account"))
                }
            }
            Err(err) if is_unique_violation(&err) => Err(storage::Error::conflict("username")),
            Err(err) => Err(translate(err)),
        }
    }

    async fn add_post(&self, author: UserId, post: &NewPost) -> StorResult<PostId> {
        match sqlx::query(
            "INSERT INTO post (id_user, rating, caption, category, product_photo, product_url)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(author.get())
        .bind(post.rating.map(|r| r.get() as i8))
        .bind(&post.caption)
        .bind(post.category.as_ref().map(|c| c.as_ref()))
        .bind(post.product_photo.as_deref())
        .bind(post.product_url.as_deref())
        .execute(&self.pool)
        .await
        {
            Ok(done) => Ok(PostId::new(done.last_insert_id() as i64)),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(storage::Error::not_found("account"))
            }
            Err(err) => Err(translate(err)),
        }
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> StorResult<()> {
        // The statement is static; which fields change is carried by the binds (COALESCE keeps a
        // column when its bind is NULL). No SQL is assembled at runtime.
        let done = sqlx::query(
            "UPDATE post SET
               caption = COALESCE(?, caption),
               rating = COALESCE(?, rating),
               category = COALESCE(?, category),
               product_photo = COALESCE(?, product_photo),
               product_url = COALESCE(?, product_url)
             WHERE id_post = ?",
        )
        .bind(patch.caption.as_deref())
        .bind(patch.rating.map(|r| r.get() as i8))
        .bind(patch.category.as_ref().map(|c| c.as_ref()))
        .bind(patch.product_photo.as_deref())
        .bind(patch.product_url.as_deref())
        .bind(id.get())
        .execute(&self.pool)
        .await
        .map_err(translate)?;
        if done.rows_affected() > 0 {
            return Ok(());
        }
        // MySQL reports rows *changed*, so a no-op patch of an extant post also lands here.
        if self.post_author(id).await?.is_some() {
            Ok(())
        } else {
            Err(storage::Error::not_found("post"))
        }
    }

    async fn delete_post(&self, id: PostId) -> StorResult<()> {
        // Likes & comments go with it, via the ON DELETE CASCADEs
        let done = sqlx::query("DELETE FROM post WHERE id_post = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        if done.rows_affected() > 0 {
            Ok(())
        } else {
            Err(storage::Error::not_found("post"))
        }
    }

    async fn post_author(&self, id: PostId) -> StorResult<Option<UserId>> {
        Ok(
            sqlx::query("SELECT id_user FROM post WHERE id_post = ?")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(translate)?
                .map(|row| row.try_get::<i64, _>("id_user").map(UserId::new))
                .transpose()
                .map_err(translate)?,
        )
    }

    async fn post_aggregate(
        &self,
        id: PostId,
        viewer: Option<UserId>,
    ) -> StorResult<Option<PostAggregate>> {
        let sql = format!("{AGGREGATE_HEAD} WHERE p.id_post = ? {AGGREGATE_TAIL}");
        sqlx::query(&sql)
            .bind(viewer.map(|v| v.get()).unwrap_or(NO_VIEWER))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(translate)?
            .map(|row| aggregate_from_row(&row))
            .transpose()
    }

    async fn posts_page(
        &self,
        filter: &storage::PostFilter,
        viewer: UserId,
        page: &storage::Page,
    ) -> StorResult<Vec<PostAggregate>> {
        use storage::PostFilter::*;
        let where_clause = match filter {
            Timeline => "",
            ByAuthor(_) => "WHERE p.id_user = ?",
            ByCategory(_) => "WHERE p.category = ?",
            ByRating(_) => "WHERE p.rating = ?",
        };
        let sql = format!(
            "{AGGREGATE_HEAD} {where_clause} {AGGREGATE_TAIL}
             ORDER BY p.created_at DESC, p.id_post ASC
             LIMIT ? OFFSET ?"
        );
        let query = sqlx::query(&sql).bind(viewer.get());
        let query = match filter {
            Timeline => query,
            ByAuthor(author) => query.bind(author.get()),
            ByCategory(category) => query.bind(category.as_ref()),
            ByRating(rating) => query.bind(rating.get() as i8),
        };
        debug!("listing posts: {:?}, page {}", filter, page.page());
        query
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(translate)?
            .iter()
            .map(aggregate_from_row)
            .collect()
    }

    async fn categories(&self) -> StorResult<Vec<Category>> {
        sqlx::query(
            "SELECT DISTINCT category FROM post
             WHERE category IS NOT NULL AND category != '' ORDER BY category ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?
        .iter()
        .map(|row| {
            Category::new(&row.try_get::<String, _>("category").map_err(translate)?)
                .map_err(storage::Error::backend)
        })
        .collect()
    }

    async fn post_stats(&self, id: PostId) -> StorResult<PostStats> {
        let row = sqlx::query(
            "SELECT
               (SELECT COUNT(*) FROM likes WHERE id_post = ?) AS likes_count,
               (SELECT COUNT(*) FROM comments WHERE id_post = ?) AS comments_count",
        )
        .bind(id.get())
        .bind(id.get())
        .fetch_one(&self.pool)
        .await
        .map_err(translate)?;
        Ok(PostStats {
            likes_count: row.try_get::<i64, _>("likes_count").map_err(translate)?,
            comments_count: row.try_get::<i64, _>("comments_count").map_err(translate)?,
        })
    }

    async fn toggle_like(&self, post: PostId, user: UserId) -> StorResult<LikeAction> {
        // The whole toggle in (at most) two statements, neither of which is a bare read: DELETE
        // the pair; if nothing was there, INSERT it. Two concurrent toggles can both reach the
        // INSERT, but the UNIQUE KEY on (id_post, id_user) lets only one through-- the loser's
        // duplicate-key failure just means the like it wanted now exists. There is no window in
        // which the pair invariant doesn't hold.
        let done = sqlx::query("DELETE FROM likes WHERE id_post = ? AND id_user = ?")
            .bind(post.get())
            .bind(user.get())
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        if done.rows_affected() > 0 {
            return Ok(LikeAction::Unliked);
        }
        match sqlx::query("INSERT INTO likes (id_post, id_user) VALUES (?, ?)")
            .bind(post.get())
            .bind(user.get())
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(LikeAction::Liked),
            Err(err) if is_unique_violation(&err) => Ok(LikeAction::Liked),
            // A toggle against a post that doesn't exist surfaces as the FOREIGN KEY firing
            Err(err) if is_foreign_key_violation(&err) => Err(storage::Error::not_found("post")),
            Err(err) => Err(translate(err)),
        }
    }

    async fn like_exists(&self, post: PostId, user: UserId) -> StorResult<bool> {
        Ok(
            sqlx::query("SELECT id_like FROM likes WHERE id_post = ? AND id_user = ?")
                .bind(post.get())
                .bind(user.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(translate)?
                .is_some(),
        )
    }

    async fn likes_for_post(&self, post: PostId) -> StorResult<Vec<LikeEntry>> {
        sqlx::query(
            "SELECT a.id_user, a.username, l.created_at
             FROM likes l
             JOIN account a ON l.id_user = a.id_user
             WHERE l.id_post = ?
             ORDER BY l.created_at DESC, l.id_like DESC",
        )
        .bind(post.get())
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?
        .iter()
        .map(|row| {
            Ok(LikeEntry {
                id_user: UserId::new(row.try_get::<i64, _>("id_user").map_err(translate)?),
                username: Username::new(
                    &row.try_get::<String, _>("username").map_err(translate)?,
                )
                .map_err(storage::Error::backend)?,
                created_at: row
                    .try_get::<DateTime<Utc>, _>("created_at")
                    .map_err(translate)?,
            })
        })
        .collect()
    }

    async fn add_comment(&self, post: PostId, author: UserId, text: &str) -> StorResult<CommentId> {
        match sqlx::query("INSERT INTO comments (id_post, id_user, comment_text) VALUES (?, ?, ?)")
            .bind(post.get())
            .bind(author.get())
            .bind(text)
            .execute(&self.pool)
            .await
        {
            Ok(done) => Ok(CommentId::new(done.last_insert_id() as i64)),
            Err(err) if is_foreign_key_violation(&err) => Err(storage::Error::not_found("post")),
            Err(err) => Err(translate(err)),
        }
    }

    async fn comment_author(&self, id: CommentId) -> StorResult<Option<UserId>> {
        Ok(
            sqlx::query("SELECT id_user FROM comments WHERE id_comment = ?")
                .bind(id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(translate)?
                .map(|row| row.try_get::<i64, _>("id_user").map(UserId::new))
                .transpose()
                .map_err(translate)?,
        )
    }

    async fn delete_comment(&self, id: CommentId) -> StorResult<()> {
        let done = sqlx::query("DELETE FROM comments WHERE id_comment = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        if done.rows_affected() > 0 {
            Ok(())
        } else {
            Err(storage::Error::not_found("comment"))
        }
    }

    async fn comments_for_post(&self, post: PostId) -> StorResult<Vec<Comment>> {
        sqlx::query(
            "SELECT c.id_comment, c.id_post, c.id_user, c.comment_text, c.created_at, a.username
             FROM comments c
             JOIN account a ON c.id_user = a.id_user
             WHERE c.id_post = ?
             ORDER BY c.created_at ASC, c.id_comment ASC",
        )
        .bind(post.get())
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?
        .iter()
        .map(|row| {
            Ok(Comment {
                id_comment: CommentId::new(row.try_get::<i64, _>("id_comment").map_err(translate)?),
                id_post: PostId::new(row.try_get::<i64, _>("id_post").map_err(translate)?),
                id_user: UserId::new(row.try_get::<i64, _>("id_user").map_err(translate)?),
                username: Username::new(
                    &row.try_get::<String, _>("username").map_err(translate)?,
                )
                .map_err(storage::Error::backend)?,
                comment_text: row.try_get::<String, _>("comment_text").map_err(translate)?,
                created_at: row
                    .try_get::<DateTime<Utc>, _>("created_at")
                    .map_err(translate)?,
            })
        })
        .collect()
    }

    async fn add_follow(&self, follower: UserId, following: UserId) -> StorResult<()> {
        match sqlx::query("INSERT INTO follows (id_follower, id_following) VALUES (?, ?)")
            .bind(follower.get())
            .bind(following.get())
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(storage::Error::conflict("follow")),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(storage::Error::not_found("account"))
            }
            Err(err) => Err(translate(err)),
        }
    }

    async fn delete_follow(&self, follower: UserId, following: UserId) -> StorResult<()> {
        let done = sqlx::query("DELETE FROM follows WHERE id_follower = ? AND id_following = ?")
            .bind(follower.get())
            .bind(following.get())
            .execute(&self.pool)
            .await
            .map_err(translate)?;
        if done.rows_affected() > 0 {
            Ok(())
        } else {
            Err(storage::Error::not_found("follow"))
        }
    }

    async fn followers_for_user(&self, user: UserId) -> StorResult<Vec<Follower>> {
        sqlx::query(
            "SELECT a.id_user, a.username, f.created_at
             FROM follows f
             JOIN account a ON f.id_follower = a.id_user
             WHERE f.id_following = ?
             ORDER BY f.created_at DESC, f.id_follow DESC",
        )
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(translate)?
        .iter()
        .map(|row| {
            Ok(Follower {
                id_user: UserId::new(row.try_get::<i64, _>("id_user").map_err(translate)?),
                username: Username::new(
                    &row.try_get::<String, _>("username").map_err(translate)?,
                )
                .map_err(storage::Error::backend)?,
                created_at: row
                    .try_get::<DateTime<Utc>, _>("created_at")
                    .map_err(translate)?,
            })
        })
        .collect()
    }

    async fn healthcheck(&self) -> StorResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(translate)
            .map(|_| ())
    }
}
