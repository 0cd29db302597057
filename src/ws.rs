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

//! # ws
//!
//! The realtime surface: one WebSocket endpoint over which connected viewers receive
//! [Hub](crate::notify::Hub) events as they happen.
//!
//! ## Protocol
//!
//! Clients connect with their bearer token in the query string (`GET /api/ws?token=...`)-- the
//! browser WebSocket API can't set an Authorization header-- and the upgrade is refused outright
//! on a bad token. Frames in both directions are JSON with an `event` discriminator:
//!
//! - server → client: `user:online` & `user:offline` presence events, `timeline:update` on every
//!   mutation, and `post:new` for new posts in categories the client has joined.
//!
//! - client → server: `{"event": "category:join", "category": "..."}` &
//!   `{"event": "category:leave", "category": "..."}` to manage category-room membership.
//!   Anything unparseable is ignored rather than fatal-- a confused client is not a reason to
//!   tear down its timeline.
//!
//! A client that falls far enough behind the broadcast channel just loses the missed events (it's
//! told nothing-- the next full-page fetch reconciles). This is the notifier's at-most-once
//! contract, surfaced.

use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::{
    authn::{self, check_token},
    entities::{Category, User},
    marketmeet::MarketMeet,
    notify::{Event, EventKind, PresenceEvent, TimelineEvent},
};

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         wire format                                            //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Serialize)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

fn envelope<T: Serialize>(event: &str, data: &T) -> Option<String> {
    match serde_json::to_string(&Envelope { event, data }) {
        Ok(text) => Some(text),
        Err(err) => {
            // A payload we can't serialize is a bug, but not one worth killing the socket over
            error!("failed to serialize a {} frame: {}", event, err);
            None
        }
    }
}

fn presence_frames(event: &PresenceEvent) -> Vec<String> {
    let name = if event.online {
        "user:online"
    } else {
        "user:offline"
    };
    envelope(name, event).into_iter().collect()
}

fn timeline_frames(event: &TimelineEvent, joined: &HashSet<Category>) -> Vec<String> {
    let mut frames: Vec<String> = envelope("timeline:update", event).into_iter().collect();
    // New posts additionally go out under `post:new`, but only to sockets parked in the post's
    // category room
    if event.kind == EventKind::NewPost {
        if let Some(category) = &event.category {
            if joined.contains(category) {
                frames.extend(envelope("post:new", event));
            }
        }
    }
    frames
}

/// What clients send us
#[derive(Clone, Debug, Deserialize)]
struct ClientMessage {
    event: String,
    category: Option<String>,
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//                                         the endpoint                                           //
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// `GET /ws` -- authenticate the handshake, then upgrade
async fn ws_upgrade(
    State(state): State<Arc<MarketMeet>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> axum::response::Response {
    let Some(token) = query.token else {
        return authn::NoAuthTokenSnafu.build().into_response();
    };
    match check_token(
        state.storage.as_ref(),
        &token,
        &state.signing_keys,
        &state.host,
    )
    .await
    {
        Ok(user) => ws.on_upgrade(move |socket| serve_socket(socket, state, user)),
        Err(err) => {
            info!("refused a WebSocket handshake");
            err.into_response()
        }
    }
}

/// Pump one connected viewer's socket until it closes
async fn serve_socket(socket: WebSocket, state: Arc<MarketMeet>, user: User) {
    let mut rx = state.hub.subscribe();
    state.hub.connect(user.id(), user.username()).await;
    info!("{} connected over WebSocket", user.username());

    let (mut sender, mut receiver) = socket.split();
    let mut joined: HashSet<Category> = HashSet::new();

    'session: loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let frames = match &event {
                        Event::Presence(presence) => presence_frames(presence),
                        Event::Timeline(timeline) => timeline_frames(timeline, &joined),
                    };
                    for frame in frames {
                        if sender.send(Message::Text(frame.into())).await.is_err() {
                            break 'session;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // Behind by `missed` events; they're gone. At-most-once, as promised.
                    debug!("{} lagged; dropped {} events", user.username(), missed);
                }
                Err(broadcast::error::RecvError::Closed) => break 'session,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(msg) => handle_client_message(&msg, &mut joined, &user),
                        Err(err) => debug!("ignoring an unparseable client frame: {}", err),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break 'session,
                Some(Ok(_)) => (), // pings & pongs are handled under the hood
                Some(Err(err)) => {
                    debug!("{}'s socket failed: {}", user.username(), err);
                    break 'session;
                }
            },
        }
    }

    state.hub.disconnect(user.id(), user.username()).await;
    info!("{} disconnected", user.username());
}

fn handle_client_message(msg: &ClientMessage, joined: &mut HashSet<Category>, user: &User) {
    let category = msg
        .category
        .as_deref()
        .map(str::trim)
        .and_then(|text| Category::new(text).ok());
    match (msg.event.as_str(), category) {
        ("category:join", Some(category)) => {
            debug!("{} joined category {}", user.username(), category);
            joined.insert(category);
        }
        ("category:leave", Some(category)) => {
            debug!("{} left category {}", user.username(), category);
            joined.remove(&category);
        }
        (event, _) => {
            debug!("ignoring a {} frame from {}", event, user.username());
        }
    }
}

/// Return a router for the realtime surface
pub fn make_router(state: Arc<MarketMeet>) -> Router<Arc<MarketMeet>> {
    Router::new().route("/ws", get(ws_upgrade)).with_state(state)
}

#[cfg(test)]
mod frame_tests {
    use super::*;
    use crate::entities::PostId;
    use chrono::Utc;

    #[test]
    fn post_new_is_scoped_to_the_room() {
        let kitchen = Category::new("kitchen").unwrap(/* known good */);
        let event = TimelineEvent {
            kind: EventKind::NewPost,
            post: None,
            post_id: PostId::new(7),
            category: Some(kitchen.clone()),
            timestamp: Utc::now(),
        };

        // Not in the room: just the plain timeline update
        let frames = timeline_frames(&event, &HashSet::new());
        assert_eq!(1, frames.len());
        assert!(frames[0].contains("timeline:update"));

        // In the room: the update *and* the scoped post:new
        let mut joined = HashSet::new();
        joined.insert(kitchen);
        let frames = timeline_frames(&event, &joined);
        assert_eq!(2, frames.len());
        assert!(frames[1].contains("post:new"));
    }

    #[test]
    fn non_posts_never_fan_into_rooms() {
        let kitchen = Category::new("kitchen").unwrap(/* known good */);
        let event = TimelineEvent {
            kind: EventKind::LikeAdded,
            post: None,
            post_id: PostId::new(7),
            category: None,
            timestamp: Utc::now(),
        };
        let mut joined = HashSet::new();
        joined.insert(kitchen);
        assert_eq!(1, timeline_frames(&event, &joined).len());
    }
}
