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

//! # memory
//!
//! In-memory [Backend] implementation.
//!
//! [Backend]: crate::storage::Backend
//!
//! This exists for two reasons: it's the storage double for the unit tests (no MySQL required),
//! and it's a convenient way to run the daemon locally ("storage-config = memory") when all you
//! want is to poke at the API. It deliberately mirrors the MySQL backend's observable behavior--
//! same uniqueness rules, same not-found semantics, same ordering-- because the engine tests that
//! run against this implementation are making claims about the production one.
//!
//! Everything lives under a single [Mutex], which makes every operation trivially atomic; in
//! particular the like toggle holds the lock across its test-and-flip, the moral equivalent of the
//! UNIQUE KEY the MySQL backend leans on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    entities::{
        Category, Comment, CommentId, Follower, LikeAction, LikeEntry, NewPost, NewUser,
        PostAggregate, PostId, PostPatch, PostStats, Rating, User, UserEmail, UserHashString,
        UserId, Username,
    },
    storage::{self, Backend, Page, PostFilter},
};

type Result<T> = std::result::Result<T, storage::Error>;

#[derive(Clone, Debug)]
struct UserRow {
    id: i64,
    username: Username,
    email: UserEmail,
    birth_date: crate::entities::BirthDate,
    password_hash: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct PostRow {
    id: i64,
    user: i64,
    rating: Option<Rating>,
    caption: String,
    category: Option<Category>,
    product_photo: Option<String>,
    product_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct LikeRow {
    id: i64,
    post: i64,
    user: i64,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct CommentRow {
    id: i64,
    post: i64,
    user: i64,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
struct FollowRow {
    follower: i64,
    following: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    users: Vec<UserRow>,
    posts: Vec<PostRow>,
    likes: Vec<LikeRow>,
    comments: Vec<CommentRow>,
    follows: Vec<FollowRow>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
    fn user(&self, id: i64) -> Option<&UserRow> {
        self.users.iter().find(|u| u.id == id)
    }
    fn aggregate(&self, post: &PostRow, viewer: Option<UserId>) -> Result<PostAggregate> {
        let author = self
            .user(post.user)
            .ok_or(storage::Error::not_found("account"))?;
        let likes_count = self.likes.iter().filter(|l| l.post == post.id).count() as i64;
        let comments_count = self.comments.iter().filter(|c| c.post == post.id).count() as i64;
        let is_liked = viewer
            .map(|v| {
                self.likes
                    .iter()
                    .any(|l| l.post == post.id && l.user == v.get())
            })
            .unwrap_or(false);
        Ok(PostAggregate {
            id_post: PostId::new(post.id),
            id_user: UserId::new(post.user),
            username: author.username.clone(),
            rating: post.rating,
            caption: post.caption.clone(),
            category: post.category.clone(),
            product_photo: post.product_photo.clone(),
            product_url: post.product_url.clone(),
            created_at: post.created_at,
            likes_count,
            comments_count,
            is_liked,
        })
    }
}

fn to_user(row: &UserRow) -> Result<User> {
    Ok(User::new(
        UserId::new(row.id),
        row.username.clone(),
        row.email.clone(),
        row.birth_date,
        UserHashString::new(&row.password_hash).map_err(storage::Error::backend)?,
        row.created_at,
    ))
}

/// In-memory [storage::Backend]
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }
}

#[cfg(test)]
impl Store {
    /// Test hook: back-date a post to force timestamp collisions
    pub(crate) async fn set_post_created_at(&self, id: PostId, at: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        if let Some(post) = inner.posts.iter_mut().find(|p| p.id == id.get()) {
            post.created_at = at;
        }
    }
}

#[async_trait]
impl Backend for Store {
    async fn add_user(&self, user: &NewUser) -> Result<UserId> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .iter()
            .any(|u| u.username.as_ref() == user.username().as_ref())
        {
            return Err(storage::Error::conflict("username"));
        }
        if inner
            .users
            .iter()
            .any(|u| u.email.as_ref() == user.email().as_ref())
        {
            return Err(storage::Error::conflict("email"));
        }
        let id = inner.next_id();
        inner.users.push(UserRow {
            id,
            username: user.username().clone(),
            email: user.email().clone(),
            birth_date: *user.birth_date(),
            password_hash: user.password_hash().as_ref().to_owned(),
            created_at: Utc::now(),
        });
        Ok(UserId::new(id))
    }

    async fn user_for_id(&self, id: UserId) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        inner.user(id.get()).map(to_user).transpose()
    }

    async fn user_for_email(&self, email: &UserEmail) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        inner
            .users
            .iter()
            .find(|u| u.email.as_ref() == email.as_ref())
            .map(to_user)
            .transpose()
    }

    async fn user_for_name(&self, name: &Username) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        inner
            .users
            .iter()
            .find(|u| u.username.as_ref() == name.as_ref())
            .map(to_user)
            .transpose()
    }

    async fn update_username(&self, id: UserId, name: &Username) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .iter()
            .any(|u| u.username.as_ref() == name.as_ref() && u.id != id.get())
        {
            return Err(storage::Error::conflict("username"));
        }
        inner
            .users
            .iter_mut()
            .find(|u| u.id == id.get())
            .map(|u| u.username = name.clone())
            .ok_or(storage::Error::not_found("account"))
    }

    async fn add_post(&self, author: UserId, post: &NewPost) -> Result<PostId> {
        let mut inner = self.inner.lock().await;
        if inner.user(author.get()).is_none() {
            return Err(storage::Error::not_found("account"));
        }
        let id = inner.next_id();
        inner.posts.push(PostRow {
            id,
            user: author.get(),
            rating: post.rating,
            caption: post.caption.clone(),
            category: post.category.clone(),
            product_photo: post.product_photo.clone(),
            product_url: post.product_url.clone(),
            created_at: Utc::now(),
        });
        Ok(PostId::new(id))
    }

    async fn update_post(&self, id: PostId, patch: &PostPatch) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let post = inner
            .posts
            .iter_mut()
            .find(|p| p.id == id.get())
            .ok_or(storage::Error::not_found("post"))?;
        if let Some(caption) = &patch.caption {
            post.caption = caption.clone();
        }
        if let Some(rating) = patch.rating {
            post.rating = Some(rating);
        }
        if let Some(category) = &patch.category {
            post.category = Some(category.clone());
        }
        if let Some(photo) = &patch.product_photo {
            post.product_photo = Some(photo.clone());
        }
        if let Some(url) = &patch.product_url {
            post.product_url = Some(url.clone());
        }
        Ok(())
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let before = inner.posts.len();
        inner.posts.retain(|p| p.id != id.get());
        if inner.posts.len() == before {
            return Err(storage::Error::not_found("post"));
        }
        // referential clean-up, the way the CASCADEs do it in MySQL
        inner.likes.retain(|l| l.post != id.get());
        inner.comments.retain(|c| c.post != id.get());
        Ok(())
    }

    async fn post_author(&self, id: PostId) -> Result<Option<UserId>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .posts
            .iter()
            .find(|p| p.id == id.get())
            .map(|p| UserId::new(p.user)))
    }

    async fn post_aggregate(
        &self,
        id: PostId,
        viewer: Option<UserId>,
    ) -> Result<Option<PostAggregate>> {
        let inner = self.inner.lock().await;
        inner
            .posts
            .iter()
            .find(|p| p.id == id.get())
            .map(|p| inner.aggregate(p, viewer))
            .transpose()
    }

    async fn posts_page(
        &self,
        filter: &PostFilter,
        viewer: UserId,
        page: &Page,
    ) -> Result<Vec<PostAggregate>> {
        let inner = self.inner.lock().await;
        let mut matching = inner
            .posts
            .iter()
            .filter(|p| match filter {
                PostFilter::Timeline => true,
                PostFilter::ByAuthor(author) => p.user == author.get(),
                PostFilter::ByCategory(category) => p.category.as_ref() == Some(category),
                PostFilter::ByRating(rating) => p.rating == Some(*rating),
            })
            .collect::<Vec<_>>();
        // most recent first; ties broken by post id ascending, so pagination is stable
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.id.cmp(&b.id))
        });
        matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .map(|p| inner.aggregate(p, Some(viewer)))
            .collect()
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let inner = self.inner.lock().await;
        let mut categories = inner
            .posts
            .iter()
            .filter_map(|p| p.category.clone())
            .collect::<Vec<_>>();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn post_stats(&self, id: PostId) -> Result<PostStats> {
        let inner = self.inner.lock().await;
        Ok(PostStats {
            likes_count: inner.likes.iter().filter(|l| l.post == id.get()).count() as i64,
            comments_count: inner.comments.iter().filter(|c| c.post == id.get()).count() as i64,
        })
    }

    async fn toggle_like(&self, post: PostId, user: UserId) -> Result<LikeAction> {
        // One lock acquisition covers the existence check & the flip; nothing can interleave
        let mut inner = self.inner.lock().await;
        if !inner.posts.iter().any(|p| p.id == post.get()) {
            return Err(storage::Error::not_found("post"));
        }
        let before = inner.likes.len();
        inner
            .likes
            .retain(|l| !(l.post == post.get() && l.user == user.get()));
        if inner.likes.len() < before {
            return Ok(LikeAction::Unliked);
        }
        let id = inner.next_id();
        inner.likes.push(LikeRow {
            id,
            post: post.get(),
            user: user.get(),
            created_at: Utc::now(),
        });
        Ok(LikeAction::Liked)
    }

    async fn like_exists(&self, post: PostId, user: UserId) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .likes
            .iter()
            .any(|l| l.post == post.get() && l.user == user.get()))
    }

    async fn likes_for_post(&self, post: PostId) -> Result<Vec<LikeEntry>> {
        let inner = self.inner.lock().await;
        let mut likes = inner
            .likes
            .iter()
            .filter(|l| l.post == post.get())
            .collect::<Vec<_>>();
        likes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        likes
            .into_iter()
            .map(|l| {
                let account = inner
                    .user(l.user)
                    .ok_or(storage::Error::not_found("account"))?;
                Ok(LikeEntry {
                    id_user: UserId::new(l.user),
                    username: account.username.clone(),
                    created_at: l.created_at,
                })
            })
            .collect()
    }

    async fn add_comment(&self, post: PostId, author: UserId, text: &str) -> Result<CommentId> {
        let mut inner = self.inner.lock().await;
        if !inner.posts.iter().any(|p| p.id == post.get()) {
            return Err(storage::Error::not_found("post"));
        }
        let id = inner.next_id();
        inner.comments.push(CommentRow {
            id,
            post: post.get(),
            user: author.get(),
            text: text.to_owned(),
            created_at: Utc::now(),
        });
        Ok(CommentId::new(id))
    }

    async fn comment_author(&self, id: CommentId) -> Result<Option<UserId>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .comments
            .iter()
            .find(|c| c.id == id.get())
            .map(|c| UserId::new(c.user)))
    }

    async fn delete_comment(&self, id: CommentId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let before = inner.comments.len();
        inner.comments.retain(|c| c.id != id.get());
        if inner.comments.len() == before {
            return Err(storage::Error::not_found("comment"));
        }
        Ok(())
    }

    async fn comments_for_post(&self, post: PostId) -> Result<Vec<Comment>> {
        let inner = self.inner.lock().await;
        let mut comments = inner
            .comments
            .iter()
            .filter(|c| c.post == post.get())
            .collect::<Vec<_>>();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        comments
            .into_iter()
            .map(|c| {
                let account = inner
                    .user(c.user)
                    .ok_or(storage::Error::not_found("account"))?;
                Ok(Comment {
                    id_comment: CommentId::new(c.id),
                    id_post: PostId::new(c.post),
                    id_user: UserId::new(c.user),
                    username: account.username.clone(),
                    comment_text: c.text.clone(),
                    created_at: c.created_at,
                })
            })
            .collect()
    }

    async fn add_follow(&self, follower: UserId, following: UserId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.user(follower.get()).is_none() || inner.user(following.get()).is_none() {
            return Err(storage::Error::not_found("account"));
        }
        if inner
            .follows
            .iter()
            .any(|f| f.follower == follower.get() && f.following == following.get())
        {
            return Err(storage::Error::conflict("follow"));
        }
        inner.follows.push(FollowRow {
            follower: follower.get(),
            following: following.get(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn delete_follow(&self, follower: UserId, following: UserId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let before = inner.follows.len();
        inner
            .follows
            .retain(|f| !(f.follower == follower.get() && f.following == following.get()));
        if inner.follows.len() == before {
            return Err(storage::Error::not_found("follow"));
        }
        Ok(())
    }

    async fn followers_for_user(&self, user: UserId) -> Result<Vec<Follower>> {
        let inner = self.inner.lock().await;
        let mut follows = inner
            .follows
            .iter()
            .filter(|f| f.following == user.get())
            .collect::<Vec<_>>();
        follows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        follows
            .into_iter()
            .map(|f| {
                let account = inner
                    .user(f.follower)
                    .ok_or(storage::Error::not_found("account"))?;
                Ok(Follower {
                    id_user: UserId::new(f.follower),
                    username: account.username.clone(),
                    created_at: f.created_at,
                })
            })
            .collect()
    }

    async fn healthcheck(&self) -> Result<()> {
        Ok(())
    }
}
