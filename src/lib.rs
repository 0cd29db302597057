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

//! # marketmeet
//!
//! A social product-review service: accounts post reviews (rating, caption, photo), like &
//! comment on one another's reviews, follow one another, and watch the timeline update live over
//! a WebSocket.
//!
//! The library crate holds everything; the `marketmeetd` binary is a thin shell around
//! [users::make_router], [posts::make_router] & [ws::make_router].
pub mod authn;
pub mod comments;
pub mod entities;
pub mod http;
pub mod like;
pub mod marketmeet;
pub mod memory;
pub mod metrics;
pub mod mysql;
pub mod notify;
pub mod origin;
pub mod posts;
pub mod signing_keys;
pub mod storage;
pub mod timeline;
pub mod token;
pub mod users;
pub mod util;
pub mod ws;
