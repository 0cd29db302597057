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

//! # Posts API
//!
//! Reviews & everything hanging off them: the listings, the like toggle, comments, per-post reads
//! & the category index.
//!
//! Handlers follow one shape: an outer `fn` that owns the HTTP concerns (status codes, metrics,
//! logging) wrapping an inner `fn` returning a `Result` so the interesting logic can use `?`.
//! Mutations delegate to the [like](crate::like) & [comments](crate::comments) engines, which
//! re-read the post aggregate & feed the realtime hub; nothing in this module touches a like or
//! comment row directly.

use std::sync::Arc;

use axum::{
    extract::{rejection::ExtensionRejection, Path, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::Query;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info};

use crate::{
    authn::authenticate,
    comments, counter_add,
    entities::{
        Category, Comment, CommentId, LikeAction, LikeEntry, NewPost, PostAggregate, PostId,
        PostPatch, PostStats, Rating, User, UserId, Username,
    },
    http::ErrorResponseBody,
    like,
    marketmeet::MarketMeet,
    metrics::{self, Sort},
    notify::EventKind,
    storage::{self, Backend as StorageBackend, Page, PostFilter},
    timeline::{self, TimelinePage},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                       module Error type                                        //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Failed to create post: {source}"))]
    AddPost { source: storage::Error },
    #[snafu(display("Failed to re-read post {post}: {source}"))]
    Aggregate {
        post: PostId,
        source: storage::Error,
    },
    #[snafu(display("{text} is not a valid category"))]
    BadCategory {
        text: String,
        source: crate::entities::Error,
    },
    #[snafu(display("Rating must be between 1 and 5"))]
    BadRating { rating: i64 },
    #[snafu(display("Failed to list categories: {source}"))]
    Categories { source: storage::Error },
    #[snafu(display("{source}"))]
    Comment { source: comments::Error },
    #[snafu(display("Failed to list comments: {source}"))]
    Comments { source: storage::Error },
    #[snafu(display("Failed to delete post: {source}"))]
    DeletePost { source: storage::Error },
    #[snafu(display("Caption is required"))]
    EmptyCaption,
    #[snafu(display("Failed to check like status: {source}"))]
    LikeStatus { source: storage::Error },
    #[snafu(display("Failed to list likes: {source}"))]
    Likes { source: storage::Error },
    #[snafu(display("id_user is required"))]
    MissingIdUser,
    #[snafu(display("No fields supplied to update"))]
    NoFieldsToUpdate,
    #[snafu(display("No such post: {post}"))]
    NoSuchPost { post: PostId },
    #[snafu(display("Post {post} does not belong to account {account}"))]
    NotYourPost { post: PostId, account: UserId },
    #[snafu(display("Failed to lookup post: {source}"))]
    PostLookup { source: storage::Error },
    #[snafu(display("{source}"))]
    ReadPage { source: timeline::Error },
    #[snafu(display("Failed to read post stats: {source}"))]
    Stats { source: storage::Error },
    #[snafu(display("{source}"))]
    ToggleLike { source: like::Error },
    #[snafu(display("Failed to update post: {source}"))]
    UpdatePost { source: storage::Error },
    #[snafu(display("Post {post} disappeared mid-request"))]
    Vanished { post: PostId },
}

impl Error {
    pub fn as_status_and_msg(&self) -> (StatusCode, String) {
        match self {
            ////////////////////////////////////////////////////////////////////////////////////////
            // Engine failures know their own statuses
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::Comment { source } => source.as_status_and_msg(),
            Error::ReadPage { source } => source.as_status_and_msg(),
            Error::ToggleLike { source } => source.as_status_and_msg(),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Broken requests-- tell the caller how to fix it
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::BadCategory { text, .. } => (
                StatusCode::BAD_REQUEST,
                format!("{text} is not a valid category"),
            ),
            Error::BadRating { .. } => (
                StatusCode::BAD_REQUEST,
                "Rating must be between 1 and 5".to_string(),
            ),
            Error::EmptyCaption => (
                StatusCode::BAD_REQUEST,
                "Caption is required".to_string(),
            ),
            Error::MissingIdUser => (
                StatusCode::BAD_REQUEST,
                "id_user is required".to_string(),
            ),
            Error::NoFieldsToUpdate => (
                StatusCode::BAD_REQUEST,
                "No fields supplied to update".to_string(),
            ),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Ownership & existence
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::NoSuchPost { .. } | Error::Vanished { .. } => {
                (StatusCode::NOT_FOUND, "Post not found".to_string())
            }
            Error::NotYourPost { .. } => (
                StatusCode::FORBIDDEN,
                "You may only change your own posts".to_string(),
            ),
            ////////////////////////////////////////////////////////////////////////////////////////
            // Internal failure-- own up to it (modulo the store being down, which is 503)
            ////////////////////////////////////////////////////////////////////////////////////////
            Error::AddPost {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Aggregate {
                source: storage::Error::Unavailable { .. },
                ..
            }
            | Error::Categories {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Comments {
                source: storage::Error::Unavailable { .. },
            }
            | Error::DeletePost {
                source: storage::Error::Unavailable { .. },
            }
            | Error::LikeStatus {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Likes {
                source: storage::Error::Unavailable { .. },
            }
            | Error::PostLookup {
                source: storage::Error::Unavailable { .. },
            }
            | Error::Stats {
                source: storage::Error::Unavailable { .. },
            }
            | Error::UpdatePost {
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
//                                      Posts API utilities                                       //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Page & limit, as they arrive on the query string
#[derive(Clone, Copy, Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

impl PageQuery {
    fn to_page(self, default_limit: u32) -> Page {
        Page::new(self.page, self.limit.or(Some(default_limit)))
    }
}

/// Refine an optional, maybe-blank string field: `None`/empty/whitespace collapse to `None`
fn clean(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn refine_rating(rating: Option<i64>) -> Result<Option<Rating>> {
    rating
        .map(|r| Rating::new(r).map_err(|_| BadRatingSnafu { rating: r }.build()))
        .transpose()
}

fn refine_category(category: &Option<String>) -> Result<Option<Category>> {
    clean(category)
        .map(|text| Category::new(&text).context(BadCategorySnafu { text }))
        .transpose()
}

/// The owner gate shared by edit & delete: 404 when the post isn't there, 403 when it isn't yours
async fn check_owner(
    storage: &(dyn StorageBackend + Send + Sync),
    post: PostId,
    caller: UserId,
) -> Result<()> {
    let author = storage
        .post_author(post)
        .await
        .context(PostLookupSnafu)?
        .context(NoSuchPostSnafu { post })?;
    ensure!(
        author == caller,
        NotYourPostSnafu {
            post,
            account: caller
        }
    );
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        `/posts/create`                                         //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("posts.created.successful", Sort::IntegralCounter) }
inventory::submit! { metrics::Registration::new("posts.created.failures", Sort::IntegralCounter) }

#[derive(Clone, Debug, Deserialize)]
struct CreateReq {
    rating: Option<i64>,
    caption: Option<String>,
    category: Option<String>,
    product_photo: Option<String>,
    product_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateRsp {
    pub success: bool,
    #[serde(rename = "postId")]
    pub post_id: PostId,
    pub post: PostAggregate,
}

/// Create a review
///
/// The caption is the one required field; rating (1-5), category & the product photo/url are
/// optional. The author is the authenticated caller-- there is no `id_user` in the body & one
/// supplied there would be ignored.
async fn create(
    State(state): State<Arc<MarketMeet>>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Json(req): Json<CreateReq>,
) -> axum::response::Response {
    async fn create1(req: &CreateReq, author: &User, state: &MarketMeet) -> Result<CreateRsp> {
        let caption = clean(&req.caption).context(EmptyCaptionSnafu)?;
        let new_post = NewPost {
            caption,
            rating: refine_rating(req.rating)?,
            category: refine_category(&req.category)?,
            product_photo: clean(&req.product_photo),
            product_url: clean(&req.product_url),
        };

        let post_id = state
            .storage
            .add_post(author.id(), &new_post)
            .await
            .context(AddPostSnafu)?;

        let aggregate = state
            .storage
            .post_aggregate(post_id, Some(author.id()))
            .await
            .context(AggregateSnafu { post: post_id })?
            .context(VanishedSnafu { post: post_id })?;

        // Everybody gets `timeline:update`; viewers parked in the post's category room
        // additionally get `post:new`
        state.hub.publish(
            EventKind::NewPost,
            post_id,
            Some(PostAggregate {
                is_liked: false,
                ..aggregate.clone()
            }),
            new_post.category.clone(),
        );

        Ok(CreateRsp {
            success: true,
            post_id,
            post: aggregate,
        })
    }

    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match create1(&req, user, &state).await {
        Ok(rsp) => {
            info!("account {} created post {}", user.id(), rsp.post_id);
            counter_add!(state.instruments, "posts.created.successful", 1, &[]);
            (StatusCode::CREATED, Json(rsp)).into_response()
        }
        Err(err) => {
            error!("{:#?}", err);
            counter_add!(state.instruments, "posts.created.failures", 1, &[]);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                        the listings                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("posts.listings", Sort::IntegralCounter) }

/// The common trunk of the four listing endpoints: same reader, different [PostFilter]
async fn list(
    state: &MarketMeet,
    user: StdResult<Extension<User>, ExtensionRejection>,
    filter: PostFilter,
    page: PageQuery,
) -> axum::response::Response {
    let Ok(user) = user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match timeline::read_page(
        state.storage.as_ref(),
        &filter,
        user.id(),
        &page.to_page(state.page_size),
    )
    .await
    .context(ReadPageSnafu)
    {
        Ok(page) => {
            counter_add!(state.instruments, "posts.listings", 1, &[]);
            (StatusCode::OK, Json(ListRsp::from(page))).into_response()
        }
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ListRsp {
    pub success: bool,
    pub posts: Vec<PostAggregate>,
    pub pagination: timeline::Pagination,
}

impl From<TimelinePage> for ListRsp {
    fn from(page: TimelinePage) -> Self {
        ListRsp {
            success: true,
            posts: page.posts,
            pagination: page.pagination,
        }
    }
}

/// The home timeline: every review, most recent first
async fn get_timeline(
    State(state): State<Arc<MarketMeet>>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Query(page): Query<PageQuery>,
) -> axum::response::Response {
    list(&state, user, PostFilter::Timeline, page).await
}

/// One account's reviews
async fn by_user(
    State(state): State<Arc<MarketMeet>>,
    Path(user_id): Path<UserId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Query(page): Query<PageQuery>,
) -> axum::response::Response {
    list(&state, user, PostFilter::ByAuthor(user_id), page).await
}

/// Reviews in one category
async fn by_category(
    State(state): State<Arc<MarketMeet>>,
    Path(category): Path<String>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Query(page): Query<PageQuery>,
) -> axum::response::Response {
    let category = match Category::new(category.trim()) {
        Ok(category) => category,
        Err(err) => {
            return Error::BadCategory {
                text: category,
                source: err,
            }
            .into_response();
        }
    };
    list(&state, user, PostFilter::ByCategory(category), page).await
}

/// Reviews carrying one rating
async fn by_rating(
    State(state): State<Arc<MarketMeet>>,
    Path(rating): Path<i64>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Query(page): Query<PageQuery>,
) -> axum::response::Response {
    let rating = match Rating::new(rating) {
        Ok(rating) => rating,
        Err(_) => {
            return Error::BadRating { rating }.into_response();
        }
    };
    list(&state, user, PostFilter::ByRating(rating), page).await
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                  `/posts/{post_id}` (edit)                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("posts.edited", Sort::IntegralCounter) }

#[derive(Clone, Debug, Deserialize)]
struct EditReq {
    rating: Option<i64>,
    caption: Option<String>,
    category: Option<String>,
    product_photo: Option<String>,
    product_url: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EditRsp {
    pub success: bool,
    pub post: PostAggregate,
}

/// Edit a review, owner-only; fields not supplied are left alone
async fn edit(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Json(req): Json<EditReq>,
) -> axum::response::Response {
    async fn edit1(
        req: &EditReq,
        post_id: PostId,
        caller: &User,
        state: &MarketMeet,
    ) -> Result<EditRsp> {
        let patch = PostPatch {
            caption: clean(&req.caption),
            rating: refine_rating(req.rating)?,
            category: refine_category(&req.category)?,
            product_photo: clean(&req.product_photo),
            product_url: clean(&req.product_url),
        };
        ensure!(!patch.is_empty(), NoFieldsToUpdateSnafu);

        check_owner(state.storage.as_ref(), post_id, caller.id()).await?;

        state
            .storage
            .update_post(post_id, &patch)
            .await
            .context(UpdatePostSnafu)?;

        let aggregate = state
            .storage
            .post_aggregate(post_id, Some(caller.id()))
            .await
            .context(AggregateSnafu { post: post_id })?
            .context(VanishedSnafu { post: post_id })?;

        state.hub.publish(
            EventKind::PostEdited,
            post_id,
            Some(PostAggregate {
                is_liked: false,
                ..aggregate.clone()
            }),
            None,
        );

        Ok(EditRsp {
            success: true,
            post: aggregate,
        })
    }

    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match edit1(&req, post_id, user, &state).await {
        Ok(rsp) => {
            info!("account {} edited post {}", user.id(), post_id);
            counter_add!(state.instruments, "posts.edited", 1, &[]);
            (StatusCode::OK, Json(rsp)).into_response()
        }
        Err(err) => {
            if !matches!(err, Error::NoSuchPost { .. } | Error::NotYourPost { .. }) {
                error!("{:#?}", err);
            }
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                 `/posts/{post_id}` (delete)                                    //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("posts.deleted", Sort::IntegralCounter) }

#[derive(Clone, Debug, Serialize)]
pub struct DeleteRsp {
    pub success: bool,
    #[serde(rename = "postId")]
    pub post_id: PostId,
}

/// Delete a review, owner-only; its likes & comments go with it
async fn remove(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    async fn remove1(post_id: PostId, caller: &User, state: &MarketMeet) -> Result<DeleteRsp> {
        check_owner(state.storage.as_ref(), post_id, caller.id()).await?;
        match state.storage.delete_post(post_id).await {
            Ok(_) => (),
            // Lost a race with another deletion; the caller's intent is met
            Err(storage::Error::NotFound { .. }) => (),
            Err(err) => {
                return Err(err).context(DeletePostSnafu);
            }
        }
        state
            .hub
            .publish(EventKind::PostDeleted, post_id, None, None);
        Ok(DeleteRsp {
            success: true,
            post_id,
        })
    }

    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match remove1(post_id, user, &state).await {
        Ok(rsp) => {
            info!("account {} deleted post {}", user.id(), post_id);
            counter_add!(state.instruments, "posts.deleted", 1, &[]);
            (StatusCode::OK, Json(rsp)).into_response()
        }
        Err(err) => {
            if !matches!(err, Error::NoSuchPost { .. } | Error::NotYourPost { .. }) {
                error!("{:#?}", err);
            }
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                   `/posts/{post_id}/like`                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("posts.likes.toggled", Sort::IntegralCounter) }

#[derive(Clone, Debug, Serialize)]
pub struct ToggleLikeRsp {
    pub success: bool,
    pub action: LikeAction,
    pub post: PostAggregate,
}

/// Toggle the caller's like on a review
///
/// One endpoint, two directions: whichever state the (post, caller) pair is in, this flips it &
/// reports which way it went, along with the post as it now stands.
async fn toggle_like(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match like::toggle(state.storage.as_ref(), &state.hub, post_id, user.id())
        .await
        .context(ToggleLikeSnafu)
    {
        Ok(outcome) => {
            counter_add!(state.instruments, "posts.likes.toggled", 1, &[]);
            (
                StatusCode::OK,
                Json(ToggleLikeRsp {
                    success: true,
                    action: outcome.action,
                    post: outcome.post,
                }),
            )
                .into_response()
        }
        Err(err) => {
            if !matches!(
                err,
                Error::ToggleLike {
                    source: like::Error::Toggle {
                        source: storage::Error::NotFound { .. },
                        ..
                    }
                }
            ) {
                error!("{:#?}", err);
            }
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                `/posts/{post_id}/like-status`                                  //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Deserialize)]
struct LikeStatusQuery {
    id_user: Option<i64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LikeStatusRsp {
    pub success: bool,
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
}

/// Report whether the account named by `id_user` has liked the given post
///
/// Authentication is required (this went back & forth historically; it's settled now), but the
/// account being asked about is the one in the query string, which remains mandatory.
async fn like_status(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
    Query(query): Query<LikeStatusQuery>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    async fn like_status1(
        post_id: PostId,
        query: &LikeStatusQuery,
        state: &MarketMeet,
    ) -> Result<LikeStatusRsp> {
        let id_user = query.id_user.context(MissingIdUserSnafu)?;
        let is_liked = state
            .storage
            .like_exists(post_id, UserId::new(id_user))
            .await
            .context(LikeStatusSnafu)?;
        Ok(LikeStatusRsp {
            success: true,
            is_liked,
        })
    }

    if user.is_err() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match like_status1(post_id, &query, &state).await {
        Ok(rsp) => (StatusCode::OK, Json(rsp)).into_response(),
        Err(err) => err.into_response(),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                  `/posts/{post_id}/likes`                                      //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An abbreviated like entry: just who
#[derive(Clone, Debug, Serialize)]
pub struct LikedBy {
    pub id_user: UserId,
    pub username: Username,
}

#[derive(Clone, Debug, Serialize)]
pub struct LikesRsp {
    pub success: bool,
    pub likes: Vec<LikeEntry>,
    #[serde(rename = "likedBy")]
    pub liked_by: Vec<LikedBy>,
}

/// Everyone who has liked the given post
async fn likes(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
) -> axum::response::Response {
    match state
        .storage
        .likes_for_post(post_id)
        .await
        .context(LikesSnafu)
    {
        Ok(likes) => {
            let liked_by = likes
                .iter()
                .map(|like| LikedBy {
                    id_user: like.id_user,
                    username: like.username.clone(),
                })
                .collect();
            (
                StatusCode::OK,
                Json(LikesRsp {
                    success: true,
                    likes,
                    liked_by,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                 `/posts/{post_id}/comments`                                    //
////////////////////////////////////////////////////////////////////////////////////////////////////

inventory::submit! { metrics::Registration::new("posts.comments.added", Sort::IntegralCounter) }
inventory::submit! { metrics::Registration::new("posts.comments.deleted", Sort::IntegralCounter) }

#[derive(Clone, Debug, Deserialize)]
struct AddCommentReq {
    comment_text: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AddCommentRsp {
    pub success: bool,
    #[serde(rename = "commentId")]
    pub comment_id: CommentId,
    pub post: PostAggregate,
}

/// Comment on a review
///
/// An absent or empty `comment_text` is accepted as the empty comment.
async fn add_comment(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
    user: StdResult<Extension<User>, ExtensionRejection>,
    Json(req): Json<AddCommentReq>,
) -> axum::response::Response {
    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let text = req.comment_text.unwrap_or_default();
    match comments::append(
        state.storage.as_ref(),
        &state.hub,
        post_id,
        user.id(),
        &text,
    )
    .await
    .context(CommentSnafu)
    {
        Ok(outcome) => {
            counter_add!(state.instruments, "posts.comments.added", 1, &[]);
            (
                StatusCode::CREATED,
                Json(AddCommentRsp {
                    success: true,
                    comment_id: outcome.comment_id,
                    post: outcome.post,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CommentsRsp {
    pub success: bool,
    pub comments: Vec<Comment>,
}

/// All comments on the given post, oldest first
async fn get_comments(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
) -> axum::response::Response {
    match state
        .storage
        .comments_for_post(post_id)
        .await
        .context(CommentsSnafu)
    {
        Ok(comments) => (
            StatusCode::OK,
            Json(CommentsRsp {
                success: true,
                comments,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DeleteCommentRsp {
    pub success: bool,
    pub post: Option<PostAggregate>,
}

/// Delete a comment, author-only
async fn delete_comment(
    State(state): State<Arc<MarketMeet>>,
    Path((post_id, comment_id)): Path<(PostId, CommentId)>,
    user: StdResult<Extension<User>, ExtensionRejection>,
) -> axum::response::Response {
    let Ok(user) = &user else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    match comments::remove(
        state.storage.as_ref(),
        &state.hub,
        post_id,
        comment_id,
        user.id(),
    )
    .await
    .context(CommentSnafu)
    {
        Ok(post) => {
            counter_add!(state.instruments, "posts.comments.deleted", 1, &[]);
            (
                StatusCode::OK,
                Json(DeleteCommentRsp {
                    success: true,
                    post,
                }),
            )
                .into_response()
        }
        Err(err) => {
            if !matches!(
                err,
                Error::Comment {
                    source: comments::Error::NoSuchComment { .. }
                        | comments::Error::NotOwner { .. }
                }
            ) {
                error!("{:#?}", err);
            }
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                   `/posts/{post_id}/stats`                                     //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize)]
pub struct StatsRsp {
    pub success: bool,
    pub stats: PostStats,
}

/// Like & comment counts for one post
async fn stats(
    State(state): State<Arc<MarketMeet>>,
    Path(post_id): Path<PostId>,
) -> axum::response::Response {
    match state.storage.post_stats(post_id).await.context(StatsSnafu) {
        Ok(stats) => (
            StatusCode::OK,
            Json(StatsRsp {
                success: true,
                stats,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         `/categories`                                          //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize)]
pub struct CategoriesRsp {
    pub success: bool,
    pub categories: Vec<Category>,
}

/// The distinct categories currently in use
async fn categories(State(state): State<Arc<MarketMeet>>) -> axum::response::Response {
    match state.storage.categories().await.context(CategoriesSnafu) {
        Ok(categories) => (
            StatusCode::OK,
            Json(CategoriesRsp {
                success: true,
                categories,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("{:#?}", err);
            err.into_response()
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                           Public API                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Return a router for the Posts API
///
/// The returned [Router] will presumably be merged with other routers.
pub fn make_router(state: Arc<MarketMeet>) -> Router<Arc<MarketMeet>> {
    Router::new()
        .route("/posts/create", post(create))
        .route("/posts/timeline", get(get_timeline))
        .route("/posts/user/{user_id}", get(by_user))
        .route("/posts/category/{category}", get(by_category))
        .route("/posts/rating/{rating}", get(by_rating))
        .route("/posts/{post_id}", put(edit).delete(remove))
        .route("/posts/{post_id}/like", post(toggle_like))
        .route("/posts/{post_id}/like-status", get(like_status))
        .route("/posts/{post_id}/likes", get(likes))
        .route(
            "/posts/{post_id}/comments",
            post(add_comment).get(get_comments),
        )
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            axum::routing::delete(delete_comment),
        )
        .route("/posts/{post_id}/stats", get(stats))
        .route("/categories", get(categories))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authenticate,
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        ))
        .with_state(state)
}
