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

//! # Comments
//!
//! Append-only: a comment is created & (by its author) deleted, never edited. Appending re-reads
//! the post aggregate afterward, same as the like toggle, so the caller & every connected viewer
//! see the new count without a second fetch.
//!
//! Empty comment text is accepted. That's a deliberate carry-over from the service this replaces;
//! if it ever tightens, the `append` signature is the one place to do it & the test below is the
//! one to flip.
//!
//! Deletion distinguishes its two failure modes: a comment that isn't there is *not found*, a
//! comment that's there but isn't yours is *forbidden*. Conflating them (as some ancestors of
//! this code did) makes the owner check untestable from the outside.

use axum::http::StatusCode;
use snafu::prelude::*;
use tracing::debug;

use crate::{
    entities::{CommentId, PostAggregate, PostId, UserId},
    notify::{EventKind, Hub},
    storage::{self, Backend as StorageBackend},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to re-read post {post} after a comment mutation: {source}"))]
    Aggregate {
        post: PostId,
        source: storage::Error,
    },
    #[snafu(display("Failed to append a comment to post {post}: {source}"))]
    Append {
        post: PostId,
        source: storage::Error,
    },
    #[snafu(display("Failed to look-up comment {comment}: {source}"))]
    Author {
        comment: CommentId,
        source: storage::Error,
    },
    #[snafu(display("Failed to delete comment {comment}: {source}"))]
    Delete {
        comment: CommentId,
        source: storage::Error,
    },
    #[snafu(display("Comment {comment} does not belong to account {account}"))]
    NotOwner {
        comment: CommentId,
        account: UserId,
    },
    #[snafu(display("No such comment: {comment}"))]
    NoSuchComment { comment: CommentId },
    #[snafu(display("Post {post} disappeared while a comment was being appended"))]
    Vanished { post: PostId },
}

impl Error {
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            Error::Append {
                source: storage::Error::NotFound { .. },
                ..
            }
            | Error::Vanished { .. } => (StatusCode::NOT_FOUND, "Post not found".to_string()),
            Error::NoSuchComment { .. } => {
                (StatusCode::NOT_FOUND, "Comment not found".to_string())
            }
            Error::NotOwner { .. } => (
                StatusCode::FORBIDDEN,
                "You may only delete your own comments".to_string(),
            ),
            Error::Aggregate {
                source: storage::Error::Unavailable { .. },
                ..
            }
            | Error::Append {
                source: storage::Error::Unavailable { .. },
                ..
            }
            | Error::Author {
                source: storage::Error::Unavailable { .. },
                ..
            }
            | Error::Delete {
                source: storage::Error::Unavailable { .. },
                ..
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The datastore is unavailable; try again shortly".to_string(),
            ),
            err => (StatusCode::INTERNAL_SERVER_ERROR, format!("{err}")),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          the engine                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// A freshly appended comment's id, plus the post as it now stands (viewed by the commenter)
#[derive(Clone, Debug)]
pub struct AppendOutcome {
    pub comment_id: CommentId,
    pub post: PostAggregate,
}

/// Append a comment to a post
///
/// `text` may be the empty string. The post must exist; the server assigns the timestamp. On
/// success the updated aggregate has already been offered to connected viewers.
pub async fn append(
    storage: &(dyn StorageBackend + Send + Sync),
    hub: &Hub,
    post: PostId,
    actor: UserId,
    text: &str,
) -> Result<AppendOutcome> {
    let comment_id = storage
        .add_comment(post, actor, text)
        .await
        .context(AppendSnafu { post })?;
    debug!("account {} commented on post {}", actor, post);

    let aggregate = storage
        .post_aggregate(post, Some(actor))
        .await
        .context(AggregateSnafu { post })?
        .context(VanishedSnafu { post })?;

    hub.publish(
        EventKind::CommentAdded,
        post,
        Some(PostAggregate {
            is_liked: false,
            ..aggregate.clone()
        }),
        None,
    );

    Ok(AppendOutcome {
        comment_id,
        post: aggregate,
    })
}

/// Delete a comment, owner-gated
///
/// The stored author id must match `actor`: a mismatch is a permission failure, a missing comment
/// is not-found, and the two are never conflated. Returns the post's updated aggregate (None when
/// the whole post went away concurrently).
pub async fn remove(
    storage: &(dyn StorageBackend + Send + Sync),
    hub: &Hub,
    post: PostId,
    comment: CommentId,
    actor: UserId,
) -> Result<Option<PostAggregate>> {
    let author = storage
        .comment_author(comment)
        .await
        .context(AuthorSnafu { comment })?
        .context(NoSuchCommentSnafu { comment })?;
    ensure!(
        author == actor,
        NotOwnerSnafu {
            comment,
            account: actor
        }
    );

    match storage.delete_comment(comment).await {
        Ok(_) => (),
        // Lost a race with another deletion of the same comment; the caller's intent is met
        Err(storage::Error::NotFound { .. }) => (),
        Err(err) => {
            return Err(err).context(DeleteSnafu { comment });
        }
    }
    debug!("account {} deleted comment {}", actor, comment);

    let aggregate = storage
        .post_aggregate(post, Some(actor))
        .await
        .context(AggregateSnafu { post })?;

    hub.publish(
        EventKind::CommentRemoved,
        post,
        aggregate.clone().map(|aggregate| PostAggregate {
            is_liked: false,
            ..aggregate
        }),
        None,
    );

    Ok(aggregate)
}

#[cfg(test)]
mod comment_tests {
    use super::*;
    use crate::{
        entities::{BirthDate, NewPost, NewUser, Rating, UserEmail, Username},
        memory,
        notify::Event,
        storage::Backend,
    };
    use secrecy::SecretString;

    async fn seed_user(storage: &memory::Store, name: &str) -> UserId {
        let username = Username::new(name).unwrap(/* known good */);
        let email = UserEmail::new(&format!("{name}@gmail.com")).unwrap(/* known good */);
        let birth_date = BirthDate::new("17/08/1970").unwrap(/* known good */);
        let user = NewUser::new(
            &username,
            &SecretString::from("f00 b@r sp1at"),
            &email,
            &birth_date,
        )
        .unwrap(/* known good */);
        storage.add_user(&user).await.unwrap(/* known good */)
    }

    async fn seed_post(storage: &memory::Store, author: UserId) -> PostId {
        storage
            .add_post(
                author,
                &NewPost {
                    caption: "Great".to_owned(),
                    rating: Some(Rating::new(5).unwrap(/* known good */)),
                    category: None,
                    product_photo: None,
                    product_url: None,
                },
            )
            .await
            .unwrap(/* known good */)
    }

    #[tokio::test]
    async fn append_updates_the_aggregate() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;
        let bob = seed_user(&storage, "bob").await;
        let post = seed_post(&storage, alice).await;

        let outcome = append(&storage, &hub, post, bob, "nice review")
            .await
            .unwrap(/* known good */);
        assert_eq!(1, outcome.post.comments_count);

        let comments = storage.comments_for_post(post).await.unwrap(/* known good */);
        assert_eq!(1, comments.len());
        assert_eq!(outcome.comment_id, comments[0].id_comment);
        assert_eq!("nice review", comments[0].comment_text);
        assert_eq!("bob", comments[0].username.as_ref());
    }

    #[tokio::test]
    async fn empty_text_is_accepted() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        let outcome = append(&storage, &hub, post, alice, "").await.unwrap(/* known good */);
        assert_eq!(1, outcome.post.comments_count);
    }

    #[tokio::test]
    async fn append_to_a_missing_post_is_not_found() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;

        let err = append(&storage, &hub, PostId::new(1000), alice, "hello")
            .await
            .unwrap_err();
        let (status, _) = err.as_status_and_msg();
        assert_eq!(StatusCode::NOT_FOUND, status);
    }

    #[tokio::test]
    async fn deletion_is_owner_gated() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;
        let bob = seed_user(&storage, "bob").await;
        let post = seed_post(&storage, alice).await;

        let outcome = append(&storage, &hub, post, alice, "my comment")
            .await
            .unwrap(/* known good */);

        // bob may not delete alice's comment, and the comment survives the attempt
        let err = remove(&storage, &hub, post, outcome.comment_id, bob)
            .await
            .unwrap_err();
        let (status, _) = err.as_status_and_msg();
        assert_eq!(StatusCode::FORBIDDEN, status);
        assert_eq!(1, storage.comments_for_post(post).await.unwrap(/* known good */).len());

        // a comment that was never there is a different failure
        let err = remove(&storage, &hub, post, CommentId::new(999), bob)
            .await
            .unwrap_err();
        let (status, _) = err.as_status_and_msg();
        assert_eq!(StatusCode::NOT_FOUND, status);

        // alice may
        let aggregate = remove(&storage, &hub, post, outcome.comment_id, alice)
            .await
            .unwrap(/* known good */)
            .unwrap(/* known good */);
        assert_eq!(0, aggregate.comments_count);
    }

    #[tokio::test]
    async fn mutations_are_broadcast() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let mut rx = hub.subscribe();
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        append(&storage, &hub, post, alice, "first!").await.unwrap(/* known good */);

        match rx.recv().await.unwrap(/* known good */) {
            Event::Timeline(event) => {
                assert_eq!(EventKind::CommentAdded, event.kind);
                assert_eq!(1, event.post.unwrap(/* known good */).comments_count);
            }
            other => panic!("expected a timeline event, got {:?}", other),
        }
    }
}
