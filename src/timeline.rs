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

//! # The Timeline
//!
//! ## Introduction
//!
//! Every listing endpoint in marketmeet-- the home timeline, one account's reviews, a category, a
//! rating bucket-- is the same read: a page of [PostAggregate]s, most recent first, with the like &
//! comment counts computed *now* and `isLiked` computed for the viewer asking. The service this
//! replaces carried four copies of that query; here there is exactly one reader, parameterized by
//! [PostFilter].
//!
//! ## Staleness
//!
//! Aggregates are recomputed from the store on every read & never cached, so two viewers may
//! transiently observe different like-counts around a concurrent toggle. That's accepted: the next
//! read converges, and there's no cache to invalidate because there's no cache.
//!
//! ## Ordering
//!
//! Reverse-chronological by creation time, ties broken by post id ascending. The secondary key
//! matters: without it, two posts created in the same second could swap places between page N and
//! page N+1 & a paginating client would see one twice and the other never.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::{
    entities::{PostAggregate, UserId},
    storage::{self, Backend as StorageBackend, Page, PostFilter},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to read a page of posts: {source}"))]
    ReadPage { source: storage::Error },
}

impl Error {
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            Error::ReadPage {
                source: storage::Error::Unavailable { .. },
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "The datastore is unavailable; try again shortly".to_string(),
            ),
            Error::ReadPage { source } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to read posts: {source}"),
            ),
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                          the reader                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// The pagination parameters, echoed back to the caller
///
/// No total count: computing one would mean a second aggregate scan per page, and the original
/// API never promised a correct total anyway.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub offset: u64,
}

impl From<&Page> for Pagination {
    fn from(page: &Page) -> Self {
        Pagination {
            page: page.page(),
            limit: page.limit(),
            offset: page.offset(),
        }
    }
}

/// One page of the (filtered) timeline
#[derive(Clone, Debug, Serialize)]
pub struct TimelinePage {
    pub posts: Vec<PostAggregate>,
    pub pagination: Pagination,
}

/// Read a page of post aggregates
///
/// This is the Post Aggregate Reader: every listing endpoint funnels through here with a
/// different [PostFilter].
pub async fn read_page(
    storage: &(dyn StorageBackend + Send + Sync),
    filter: &PostFilter,
    viewer: UserId,
    page: &Page,
) -> Result<TimelinePage> {
    let posts = storage
        .posts_page(filter, viewer, page)
        .await
        .context(ReadPageSnafu)?;
    Ok(TimelinePage {
        posts,
        pagination: page.into(),
    })
}

#[cfg(test)]
mod timeline_tests {
    use super::*;
    use crate::{
        entities::{BirthDate, Category, NewPost, NewUser, PostId, Rating, UserEmail, Username},
        memory,
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

    fn review(caption: &str, rating: i64, category: Option<&str>) -> NewPost {
        NewPost {
            caption: caption.to_owned(),
            rating: Some(Rating::new(rating).unwrap(/* known good */)),
            category: category.map(|c| Category::new(c).unwrap(/* known good */)),
            product_photo: None,
            product_url: None,
        }
    }

    #[tokio::test]
    async fn most_recent_first() {
        let storage = memory::Store::new();
        let alice = seed_user(&storage, "alice").await;

        let mut ids = Vec::new();
        for n in 0..3 {
            ids.push(
                storage
                    .add_post(alice, &review(&format!("review {n}"), 4, None))
                    .await
                    .unwrap(/* known good */),
            );
        }

        let page = read_page(&storage, &PostFilter::Timeline, alice, &Page::default())
            .await
            .unwrap(/* known good */);
        assert_eq!(3, page.posts.len());
        // Newest (the last one created) leads
        assert_eq!(ids[2], page.posts[0].id_post);
        assert_eq!(ids[0], page.posts[2].id_post);
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_id() {
        let storage = memory::Store::new();
        let alice = seed_user(&storage, "alice").await;

        let mut ids = Vec::new();
        for n in 0..4 {
            ids.push(
                storage
                    .add_post(alice, &review(&format!("review {n}"), 3, None))
                    .await
                    .unwrap(/* known good */),
            );
        }
        // Force a four-way timestamp collision
        let at = chrono::Utc::now();
        for id in &ids {
            storage.set_post_created_at(*id, at).await;
        }

        let page = read_page(&storage, &PostFilter::Timeline, alice, &Page::default())
            .await
            .unwrap(/* known good */);
        let got = page.posts.iter().map(|p| p.id_post).collect::<Vec<PostId>>();
        assert_eq!(ids, got); // id ascending
    }

    #[tokio::test]
    async fn pagination_is_stable() {
        let storage = memory::Store::new();
        let alice = seed_user(&storage, "alice").await;
        for n in 0..7 {
            storage
                .add_post(alice, &review(&format!("review {n}"), 3, None))
                .await
                .unwrap(/* known good */);
        }

        // Walking pages of three must tile the full listing, no overlaps, no gaps
        let all = read_page(
            &storage,
            &PostFilter::Timeline,
            alice,
            &Page::new(Some(1), Some(10)),
        )
        .await
        .unwrap(/* known good */);
        let mut walked = Vec::new();
        for n in 1..=3 {
            let page = read_page(
                &storage,
                &PostFilter::Timeline,
                alice,
                &Page::new(Some(n), Some(3)),
            )
            .await
            .unwrap(/* known good */);
            assert_eq!(n, page.pagination.page);
            assert_eq!(3, page.pagination.limit);
            walked.extend(page.posts.into_iter().map(|p| p.id_post));
        }
        assert_eq!(
            all.posts.iter().map(|p| p.id_post).collect::<Vec<_>>(),
            walked
        );
    }

    #[tokio::test]
    async fn filters() {
        let storage = memory::Store::new();
        let alice = seed_user(&storage, "alice").await;
        let bob = seed_user(&storage, "bob").await;

        storage
            .add_post(alice, &review("the good stand mixer", 5, Some("kitchen")))
            .await
            .unwrap(/* known good */);
        storage
            .add_post(bob, &review("the bad stand mixer", 1, Some("kitchen")))
            .await
            .unwrap(/* known good */);
        storage
            .add_post(bob, &review("headphones", 4, Some("audio")))
            .await
            .unwrap(/* known good */);

        let by_bob = read_page(
            &storage,
            &PostFilter::ByAuthor(bob),
            alice,
            &Page::default(),
        )
        .await
        .unwrap(/* known good */);
        assert_eq!(2, by_bob.posts.len());

        let kitchen = read_page(
            &storage,
            &PostFilter::ByCategory(Category::new("kitchen").unwrap(/* known good */)),
            alice,
            &Page::default(),
        )
        .await
        .unwrap(/* known good */);
        assert_eq!(2, kitchen.posts.len());

        let five_star = read_page(
            &storage,
            &PostFilter::ByRating(Rating::new(5).unwrap(/* known good */)),
            alice,
            &Page::default(),
        )
        .await
        .unwrap(/* known good */);
        assert_eq!(1, five_star.posts.len());
        assert_eq!("the good stand mixer", five_star.posts[0].caption);
    }

    #[tokio::test]
    async fn is_liked_is_per_viewer() {
        let storage = memory::Store::new();
        let alice = seed_user(&storage, "alice").await;
        let bob = seed_user(&storage, "bob").await;
        let post = storage
            .add_post(alice, &review("a review", 4, None))
            .await
            .unwrap(/* known good */);
        storage.toggle_like(post, bob).await.unwrap(/* known good */);

        let for_bob = read_page(&storage, &PostFilter::Timeline, bob, &Page::default())
            .await
            .unwrap(/* known good */);
        assert!(for_bob.posts[0].is_liked);
        assert_eq!(1, for_bob.posts[0].likes_count);

        let for_alice = read_page(&storage, &PostFilter::Timeline, alice, &Page::default())
            .await
            .unwrap(/* known good */);
        assert!(!for_alice.posts[0].is_liked);
        assert_eq!(1, for_alice.posts[0].likes_count);
    }
}
