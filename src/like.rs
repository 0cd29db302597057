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

//! # The Like Toggle
//!
//! ## Introduction
//!
//! For each (post, account) pair there are exactly two states: `Unliked` (the initial state; no
//! like row exists) & `Liked` (one exists). There is no separate "like" & "unlike" endpoint-- a
//! single toggle operation flips whichever state it finds. It follows that the operation is *not*
//! idempotent: two identical requests land you back where you started, and the tests below assert
//! exactly that.
//!
//! ## Concurrency
//!
//! The flip itself lives in the storage layer ([toggle_like]) as one atomic conditional mutation
//! under the uniqueness constraint on the pair; this module never does a separate existence check
//! followed by a write, because between those two steps another request could sneak in & you'd
//! mint a duplicate like or lose a toggle.
//!
//! [toggle_like]: crate::storage::Backend::toggle_like
//!
//! ## Aftermath
//!
//! After the flip we re-read the full [PostAggregate] (viewer = the toggling account) & hand it
//! back for the HTTP response, then push a viewer-agnostic copy through the [Hub] so every
//! connected timeline updates its counts.

use axum::http::StatusCode;
use snafu::prelude::*;
use tracing::debug;

use crate::{
    entities::{LikeAction, PostAggregate, PostId, UserId},
    notify::{EventKind, Hub},
    storage::{self, Backend as StorageBackend},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to re-read post {post} after a toggle: {source}"))]
    Aggregate {
        post: PostId,
        source: storage::Error,
    },
    #[snafu(display("Failed to toggle a like on post {post}: {source}"))]
    Toggle {
        post: PostId,
        source: storage::Error,
    },
    #[snafu(display("Post {post} disappeared while its like was being toggled"))]
    Vanished { post: PostId },
}

impl Error {
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            Error::Toggle {
                source: storage::Error::NotFound { .. },
                ..
            }
            | Error::Vanished { .. } => (StatusCode::NOT_FOUND, "Post not found".to_string()),
            Error::Toggle {
                source: storage::Error::Unavailable { .. },
                ..
            }
            | Error::Aggregate {
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

/// What a toggle did, plus the post as it now stands (viewed by the toggling account)
#[derive(Clone, Debug)]
pub struct ToggleOutcome {
    pub action: LikeAction,
    pub post: PostAggregate,
}

/// Flip the (post, actor) like state
///
/// Preconditions: the caller is authenticated (enforced upstream) & the post exists (a toggle
/// against a nonexistent post fails with not-found; it is never a silent no-op).
///
/// Post-condition: the returned aggregate reflects the store *after* the flip, and the same
/// aggregate (stripped of the viewer's `isLiked`) has been offered to every connected viewer via
/// `hub`. The offer is fire-and-forget: a broadcast problem never surfaces to the toggling caller.
pub async fn toggle(
    storage: &(dyn StorageBackend + Send + Sync),
    hub: &Hub,
    post: PostId,
    actor: UserId,
) -> Result<ToggleOutcome> {
    let action = storage
        .toggle_like(post, actor)
        .await
        .context(ToggleSnafu { post })?;
    debug!("account {} {} post {}", actor, action, post);

    let aggregate = storage
        .post_aggregate(post, Some(actor))
        .await
        .context(AggregateSnafu { post })?
        .context(VanishedSnafu { post })?;

    let kind = match action {
        LikeAction::Liked => EventKind::LikeAdded,
        LikeAction::Unliked => EventKind::LikeRemoved,
    };
    hub.publish(
        kind,
        post,
        Some(PostAggregate {
            is_liked: false,
            ..aggregate.clone()
        }),
        None,
    );

    Ok(ToggleOutcome {
        action,
        post: aggregate,
    })
}

#[cfg(test)]
mod toggle_tests {
    use super::*;
    use crate::{
        entities::{BirthDate, NewPost, NewUser, Rating, UserEmail, Username},
        memory,
        notify::Event,
        storage::Backend,
    };
    use secrecy::SecretString;
    use std::sync::Arc;

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
    async fn toggle_inversion() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        // Unliked → Liked
        let outcome = toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);
        assert_eq!(LikeAction::Liked, outcome.action);
        assert!(storage.like_exists(post, alice).await.unwrap(/* known good */));

        // Liked → Unliked: the row's existence exactly matches the last reported action
        let outcome = toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);
        assert_eq!(LikeAction::Unliked, outcome.action);
        assert!(!storage.like_exists(post, alice).await.unwrap(/* known good */));
    }

    #[tokio::test]
    async fn aggregate_reflects_the_flip() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        let outcome = toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);
        assert_eq!(1, outcome.post.likes_count);
        assert!(outcome.post.is_liked);

        let outcome = toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);
        assert_eq!(0, outcome.post.likes_count);
        assert!(!outcome.post.is_liked);
    }

    #[tokio::test]
    async fn nonexistent_post_is_not_found() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;

        let err = toggle(&storage, &hub, PostId::new(1000), alice)
            .await
            .unwrap_err();
        let (status, _) = err.as_status_and_msg();
        assert_eq!(StatusCode::NOT_FOUND, status);
    }

    #[tokio::test]
    async fn at_most_one_like_per_pair() {
        let storage = Arc::new(memory::Store::new());
        let hub = Arc::new(Hub::new(64));
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        // Hammer the same pair from several tasks; however the toggles interleave, at no point
        // may more than one like row exist
        let mut handles = Vec::new();
        for _ in 0..8 {
            let storage = storage.clone();
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                toggle(storage.as_ref(), &hub, post, alice).await
            }));
        }
        for handle in handles {
            handle.await.unwrap(/* task panicked */).unwrap(/* known good */);
        }

        let likes = storage.likes_for_post(post).await.unwrap(/* known good */);
        assert!(likes.len() <= 1);
        // And the stored state agrees with a fresh aggregate read
        let aggregate = storage
            .post_aggregate(post, Some(alice))
            .await
            .unwrap(/* known good */)
            .unwrap(/* known good */);
        assert_eq!(likes.len() as i64, aggregate.likes_count);
    }

    #[tokio::test]
    async fn toggles_are_broadcast() {
        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let mut rx = hub.subscribe();
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);

        match rx.recv().await.unwrap(/* known good */) {
            Event::Timeline(event) => {
                assert_eq!(EventKind::LikeAdded, event.kind);
                assert_eq!(post, event.post_id);
                let aggregate = event.post.unwrap(/* known good */);
                assert_eq!(1, aggregate.likes_count);
                // Broadcast payloads are viewer-agnostic
                assert!(!aggregate.is_liked);
            }
            other => panic!("expected a timeline event, got {:?}", other),
        }
    }

    /// The scenario from the original service's acceptance test: alice posts, likes, sees the
    /// like in her timeline, un-likes, sees that too
    #[tokio::test]
    async fn alice_round_trip() {
        use crate::{storage::{Page, PostFilter}, timeline};

        let storage = memory::Store::new();
        let hub = Hub::new(16);
        let alice = seed_user(&storage, "alice").await;
        let post = seed_post(&storage, alice).await;

        let outcome = toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);
        assert_eq!(LikeAction::Liked, outcome.action);

        let page = timeline::read_page(&storage, &PostFilter::Timeline, alice, &Page::default())
            .await
            .unwrap(/* known good */);
        assert_eq!(post, page.posts[0].id_post);
        assert!(page.posts[0].is_liked);
        assert_eq!(1, page.posts[0].likes_count);

        let outcome = toggle(&storage, &hub, post, alice).await.unwrap(/* known good */);
        assert_eq!(LikeAction::Unliked, outcome.action);

        let page = timeline::read_page(&storage, &PostFilter::Timeline, alice, &Page::default())
            .await
            .unwrap(/* known good */);
        assert!(!page.posts[0].is_liked);
        assert_eq!(0, page.posts[0].likes_count);
    }
}
