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

//! # notify
//!
//! The realtime notifier: after any mutation that changes the shape of a post aggregate, an event
//! goes out to every connected viewer (and, for new posts, to the subset subscribed to the post's
//! category).
//!
//! Delivery is best-effort & at-most-once per connected client: the hub is a
//! [broadcast](tokio::sync::broadcast) channel, full stop. No persistence, no replay, no
//! acknowledgments. A viewer that is disconnected (or whose receiver lags & gets dropped) simply
//! misses events and reconciles on its next full-page fetch. Publishing never blocks & never
//! fails the mutation that triggered it-- the one failure mode (no subscribers at all) isn't a
//! failure worth more than a debug line.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::entities::{Category, PostAggregate, PostId, UserId, Username};

/// What happened to the timeline
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    NewPost,
    LikeAdded,
    LikeRemoved,
    CommentAdded,
    CommentRemoved,
    PostEdited,
    PostDeleted,
}

/// One `timeline:update` payload
///
/// `post` carries the freshly recomputed aggregate (viewer-agnostic, so `isLiked` is always
/// false-- each client knows its own like state), or nothing when the post is gone
/// (`post-deleted`). `category` is set for new posts & scopes the additional `post:new` delivery
/// to that category's room.
#[derive(Clone, Debug, Serialize)]
pub struct TimelineEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub post: Option<PostAggregate>,
    #[serde(rename = "postId")]
    pub post_id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub timestamp: DateTime<Utc>,
}

/// A viewer came or went
#[derive(Clone, Debug, Serialize)]
pub struct PresenceEvent {
    pub online: bool,
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub username: Username,
    #[serde(rename = "totalOnline")]
    pub total_online: usize,
    pub timestamp: DateTime<Utc>,
}

/// Everything that can come out of the hub
#[derive(Clone, Debug)]
pub enum Event {
    Timeline(TimelineEvent),
    Presence(PresenceEvent),
}

/// The broadcast hub
///
/// One of these lives in the application state; every WebSocket connection subscribes, every
/// mutation handler publishes.
pub struct Hub {
    tx: broadcast::Sender<Event>,
    online: Mutex<HashMap<UserId, Username>>,
}

impl Hub {
    /// `capacity` bounds how far a slow receiver may fall behind before it starts losing events;
    /// per the at-most-once contract, losing events is acceptable
    pub fn new(capacity: usize) -> Hub {
        let (tx, _) = broadcast::channel(capacity);
        Hub {
            tx,
            online: Mutex::new(HashMap::new()),
        }
    }
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
    /// Publish-and-forget a timeline event
    pub fn publish(
        &self,
        kind: EventKind,
        post_id: PostId,
        post: Option<PostAggregate>,
        category: Option<Category>,
    ) {
        let event = Event::Timeline(TimelineEvent {
            kind,
            post,
            post_id,
            category,
            timestamp: Utc::now(),
        });
        if let Err(err) = self.tx.send(event) {
            // Nobody's listening; that's fine
            debug!("dropped a {:?} event: {}", kind, err);
        }
    }
    /// Record a viewer's arrival & tell everyone
    pub async fn connect(&self, user_id: UserId, username: &Username) {
        let total_online = {
            let mut online = self.online.lock().await;
            online.insert(user_id, username.clone());
            online.len()
        };
        if let Err(err) = self.tx.send(Event::Presence(PresenceEvent {
            online: true,
            user_id,
            username: username.clone(),
            total_online,
            timestamp: Utc::now(),
        })) {
            debug!("dropped a user:online event: {}", err);
        }
    }
    /// Record a viewer's departure & tell everyone
    pub async fn disconnect(&self, user_id: UserId, username: &Username) {
        let total_online = {
            let mut online = self.online.lock().await;
            online.remove(&user_id);
            online.len()
        };
        if let Err(err) = self.tx.send(Event::Presence(PresenceEvent {
            online: false,
            user_id,
            username: username.clone(),
            total_online,
            timestamp: Utc::now(),
        })) {
            debug!("dropped a user:offline event: {}", err);
        }
    }
    pub async fn online_count(&self) -> usize {
        self.online.lock().await.len()
    }
}

#[cfg(test)]
mod hub_tests {
    use super::*;
    use crate::entities::Username;

    #[tokio::test]
    async fn delivery() {
        let hub = Hub::new(16);
        let mut rx = hub.subscribe();

        hub.publish(EventKind::LikeAdded, PostId::new(42), None, None);

        match rx.recv().await.unwrap(/* known good */) {
            Event::Timeline(event) => {
                assert_eq!(EventKind::LikeAdded, event.kind);
                assert_eq!(PostId::new(42), event.post_id);
            }
            other => panic!("expected a timeline event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let hub = Hub::new(16);
        // No receiver; this must be a no-op, not a panic or an error the caller sees
        hub.publish(EventKind::PostDeleted, PostId::new(1), None, None);
    }

    #[tokio::test]
    async fn presence() {
        let hub = Hub::new(16);
        let mut rx = hub.subscribe();
        let alice = Username::new("alice").unwrap(/* known good */);
        let bob = Username::new("bob").unwrap(/* known good */);

        hub.connect(UserId::new(1), &alice).await;
        hub.connect(UserId::new(2), &bob).await;
        assert_eq!(2, hub.online_count().await);

        hub.disconnect(UserId::new(1), &alice).await;
        assert_eq!(1, hub.online_count().await);

        match rx.recv().await.unwrap(/* known good */) {
            Event::Presence(event) => {
                assert!(event.online);
                assert_eq!(1, event.total_online);
            }
            other => panic!("expected a presence event, got {:?}", other),
        }
    }
}
