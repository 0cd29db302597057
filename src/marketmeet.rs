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

use std::sync::Arc;

use chrono::Duration;
use opentelemetry_prometheus_text_exporter::PrometheusExporter;
use uuid::Uuid;

use crate::{
    metrics, notify::Hub, origin::Host, signing_keys::SigningKeys,
    storage::Backend as StorageBackend,
};

/// Application state available to all handlers
///
/// The storage handle is constructed once at startup & passed-in here-- there is no module-level
/// connection, no "is the database up yet" flag, and nothing for a handler to reach around this
/// struct to get.
pub struct MarketMeet {
    /// The public host name of this deployment; doubles as the token issuer
    pub host: Host,
    pub instance_id: Uuid,
    pub storage: Arc<dyn StorageBackend + Send + Sync>,
    /// The realtime notifier; every WebSocket subscribes, every mutation publishes
    pub hub: Arc<Hub>,
    pub signing_keys: SigningKeys,
    pub token_lifetime: Duration,
    pub exporter: PrometheusExporter,
    pub instruments: metrics::Instruments,
    /// Default page size for the listing endpoints
    pub page_size: u32,
}
