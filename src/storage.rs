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

//! # storage
//!
//! Abstractions for the marketmeet storage layer.
//!
//! Application code writes to [Backend]; at startup a particular *implementation* of that trait is
//! chosen according to configuration ([MySQL](crate::mysql) in production, an
//! [in-memory store](crate::memory) for tests & local hacking). Handlers never hold a connection,
//! never see driver errors, and never assemble query text.

use async_trait::async_trait;
use snafu::{prelude::*, Backtrace};

use crate::entities::{
    Category, Comment, CommentId, Follower, LikeAction, LikeEntry, NewPost, NewUser, PostAggregate,
    PostId, PostPatch, PostStats, User, UserEmail, UserId, Username,
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Storage failures, as seen by application code
///
/// Backends map their driver's failure modes into these four buckets at the call site; callers can
/// then translate them into an HTTP status without knowing (or caring) what's underneath:
/// [NotFound](Error::NotFound) → 404, [Conflict](Error::Conflict) → 409 (or 400, per endpoint
/// contract), [Unavailable](Error::Unavailable) → 503 & everything else → 500. Driver detail rides
/// along in `source` for the logs, never for the client.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{source}"))]
    Backend {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[snafu(display("{what} is already taken"))]
    Conflict { what: String, backtrace: Backtrace },
    #[snafu(display("No such {what}"))]
    NotFound {
        what: &'static str,
        backtrace: Backtrace,
    },
    #[snafu(display("The datastore is unavailable: {source}"))]
    Unavailable {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl Error {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Backend {
            source: Box::new(err),
        }
    }
    pub fn conflict(what: impl Into<String>) -> Error {
        ConflictSnafu { what: what.into() }.build()
    }
    pub fn not_found(what: &'static str) -> Error {
        NotFoundSnafu { what }.build()
    }
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Unavailable {
            source: Box::new(err),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       pagination & filters                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// One page's worth of a listing request
///
/// Page numbers are one-based; anything less than one is clamped up rather than rejected (the
/// service this replaces did the same via `parseInt(...) || 1`).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Page {
        Page {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1),
        }
    }
    pub fn limit(&self) -> u32 {
        self.limit
    }
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
    pub fn page(&self) -> u32 {
        self.page
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

/// The one parameterized filter behind every listing endpoint
///
/// The timeline, per-author, per-category & per-rating listings are all the same aggregate query
/// with a different predicate; this enum is that predicate. Adding a listing means adding a
/// variant, not copying a query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PostFilter {
    /// The unfiltered timeline
    Timeline,
    /// Reviews authored by the given account
    ByAuthor(UserId),
    /// Reviews in the given category
    ByCategory(Category),
    /// Reviews carrying the given rating
    ByRating(crate::entities::Rating),
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          the Backend                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[async_trait]
pub trait Backend {
    // accounts ////////////////////////////////////////////////////////////////////////////////////

    /// Create an account; fail with [Error::Conflict] if the username or e-mail is already claimed
    async fn add_user(&self, user: &NewUser) -> Result<UserId>;
    /// Retrieve a [User] by id. None means there is no such account.
    async fn user_for_id(&self, id: UserId) -> Result<Option<User>>;
    /// Retrieve a [User] by e-mail. None means there is no account with that address.
    async fn user_for_email(&self, email: &UserEmail) -> Result<Option<User>>;
    /// Retrieve a [User] given a textual username. None means there is no user by that name.
    async fn user_for_name(&self, name: &Username) -> Result<Option<User>>;
    /// Change an account's username; [Error::NotFound] if there's no such account,
    /// [Error::Conflict] if the new name is taken
    async fn update_username(&self, id: UserId, name: &Username) -> Result<()>;

    // posts ///////////////////////////////////////////////////////////////////////////////////////

    /// Create a review; the creation timestamp is server-assigned
    async fn add_post(&self, author: UserId, post: &NewPost) -> Result<PostId>;
    /// Apply a partial update; [Error::NotFound] if there's no such post
    async fn update_post(&self, id: PostId, patch: &PostPatch) -> Result<()>;
    /// Delete a review along with its likes & comments; [Error::NotFound] if there's no such post
    async fn delete_post(&self, id: PostId) -> Result<()>;
    /// Look-up a post's author (for owner checks). None means there is no such post.
    async fn post_author(&self, id: PostId) -> Result<Option<UserId>>;
    /// Compute a single post's [PostAggregate], `is_liked` relative to `viewer`. None means there
    /// is no such post.
    async fn post_aggregate(
        &self,
        id: PostId,
        viewer: Option<UserId>,
    ) -> Result<Option<PostAggregate>>;
    /// Compute a page of [PostAggregate]s matching `filter`, most recent first (ties broken by post
    /// id, ascending, so pagination is stable)
    async fn posts_page(
        &self,
        filter: &PostFilter,
        viewer: UserId,
        page: &Page,
    ) -> Result<Vec<PostAggregate>>;
    /// The distinct categories currently in use, sorted
    async fn categories(&self) -> Result<Vec<Category>>;
    /// Like & comment counts for one post (zeroes if the post doesn't exist, matching the
    /// sub-select semantics of the original queries)
    async fn post_stats(&self, id: PostId) -> Result<PostStats>;

    // likes ///////////////////////////////////////////////////////////////////////////////////////

    /// Atomically flip the (post, account) like state & report which way it went
    ///
    /// This is the *whole* toggle, in one trip: delete-if-exists-else-insert, executed under the
    /// store's uniqueness constraint on the pair. There is deliberately no
    /// check-then-act variant on this trait. [Error::NotFound] if the post doesn't exist.
    async fn toggle_like(&self, post: PostId, user: UserId) -> Result<LikeAction>;
    /// Does a like exist for (post, account)?
    async fn like_exists(&self, post: PostId, user: UserId) -> Result<bool>;
    /// Everyone who has liked the given post, most recent first
    async fn likes_for_post(&self, post: PostId) -> Result<Vec<LikeEntry>>;

    // comments ////////////////////////////////////////////////////////////////////////////////////

    /// Append a comment (empty text permitted); [Error::NotFound] if the post doesn't exist
    async fn add_comment(&self, post: PostId, author: UserId, text: &str) -> Result<CommentId>;
    /// Look-up a comment's author (for owner checks). None means there is no such comment.
    async fn comment_author(&self, id: CommentId) -> Result<Option<UserId>>;
    /// Delete a comment; [Error::NotFound] if there's no such comment
    async fn delete_comment(&self, id: CommentId) -> Result<()>;
    /// All comments on the given post, oldest first
    async fn comments_for_post(&self, post: PostId) -> Result<Vec<Comment>>;

    // follows /////////////////////////////////////////////////////////////////////////////////////

    /// Record `follower` following `following`; [Error::Conflict] if the edge already exists,
    /// [Error::NotFound] if either account doesn't
    async fn add_follow(&self, follower: UserId, following: UserId) -> Result<()>;
    /// Remove a follow edge; [Error::NotFound] if it isn't there
    async fn delete_follow(&self, follower: UserId, following: UserId) -> Result<()>;
    /// Accounts following `user`, most recent first
    async fn followers_for_user(&self, user: UserId) -> Result<Vec<Follower>>;

    // plumbing ////////////////////////////////////////////////////////////////////////////////////

    /// Cheap per-startup probe that the store is reachable
    async fn healthcheck(&self) -> Result<()>;
}
