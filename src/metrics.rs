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

//! # marketmeet metrics
//!
//! # Introduction
//!
//! marketmeet uses [OpenTelemetry] to collect & export metrics. From the perspective of an
//! [OpenTelemetry] user such as marketmeet, the API is not terribly convenient: the actual
//! counters & gauges are called "instruments", and we are advised to re-use them rather than
//! creating them repeatedly. Fine, but where to keep them? I'd prefer not to litter the state type
//! with dozens of fields of type `Counter<u64>`, and a stringly-keyed map brings the footgun of
//! two different call sites accidentally using the same metric name, barring an inconvenient
//! centralized list.
//!
//! [OpenTelemetry]: https://docs.rs/opentelemetry/latest/opentelemetry/index.html
//!
//! # metrics
//!
//! This module uses David Tolnay's [inventory] crate to work around the need for a centralized
//! list. Create an [Instruments] instance once & attach it to the application state object; at
//! each metric collection site:
//!
//! ```ignore
//! inventory::submit! { metrics::Registration::new("users.logins.successful", Sort::IntegralCounter) }
//! // ...
//! counter_add!(state.instruments, "users.logins.successful", 1, &[]);
//! ```
//!
//! The `submit!` invocation "registers" the metric name, the [Instruments] constructor checks for
//! name clashes & pre-builds all the instruments, and the `counter_add!` macro handles the lookup
//! at runtime. Lookup failure & mis-typed instruments panic-- these are logic errors that would be
//! compile-time errors with a richer type system.

use std::collections::{hash_map::Entry, HashMap, HashSet};

use opentelemetry::{
    global,
    metrics::{Counter, Gauge},
    KeyValue,
};

/// Instrument type
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Sort {
    /// Corresponds to `Counter<u64>`
    IntegralCounter,
    /// Corresponds to `Gauge<f64>`
    FloatGauge,
    /// `Gauge<u64>`
    IntegralGauge,
    // more later?
}

/// The type of thing being inventoried
///
/// Register a metric by name & type using
///
/// ```ignore
/// inventory::submit!{metrics::Registration::new("auth.success", Sort::IntegralCounter)}
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Registration {
    name: &'static str,
    sort: Sort,
}

impl Registration {
    pub const fn new(name: &'static str, sort: Sort) -> Registration {
        Registration { name, sort }
    }
    pub fn name(&self) -> String {
        self.name.to_string()
    }
    pub fn sort(&self) -> Sort {
        self.sort
    }
}

inventory::collect!(Registration);

pub fn check_metric_names() {
    let mut names: HashSet<String> = HashSet::new();
    IntoIterator::into_iter(inventory::iter::<Registration>).for_each(|reg| {
        if names.contains(&reg.name()) {
            panic!("The metric name {} was used twice", reg.name());
        }
        names.insert(reg.name());
    });
}

enum Instrument {
    CounterU64(Counter<u64>),
    GaugeF64(Gauge<f64>),
    GaugeU64(Gauge<u64>),
}

/// Container for OTel instruments
pub struct Instruments {
    meter: opentelemetry::metrics::Meter,
    map: HashMap<String, Instrument>,
}

impl Instruments {
    pub fn new(prefix: &'static str) -> Instruments {
        let mut m: HashMap<String, Instrument> = HashMap::new();
        let meter = global::meter(prefix);
        // "Pre-creating" all the registered instruments risks building things that may never be
        // used, but carries the benefit of making `add` and `record` *not* require a `&mut self`,
        // meaning that we can still hold an instance of this type in an Arc.
        IntoIterator::into_iter(inventory::iter::<Registration>).for_each(|reg| {
            let name = reg.name();
            match m.entry(reg.name()) {
                Entry::Occupied(_occupied_entry) => {
                    panic!("The metric name {} was used twice", name)
                }
                Entry::Vacant(vacant_entry) => {
                    vacant_entry.insert(match reg.sort() {
                        Sort::IntegralCounter => {
                            Instrument::CounterU64(meter.u64_counter(name).build())
                        }
                        Sort::FloatGauge => Instrument::GaugeF64(meter.f64_gauge(name).build()),
                        Sort::IntegralGauge => Instrument::GaugeU64(meter.u64_gauge(name).build()),
                    });
                }
            }
        });

        Instruments { meter, map: m }
    }
    pub fn meter(&self) -> &opentelemetry::metrics::Meter {
        &self.meter
    }
    // panics if `name` doesn't name a counter
    pub fn add(&self, name: &str, count: u64, attributes: &[KeyValue]) {
        if let Some(Instrument::CounterU64(c)) = self.map.get(name) {
            c.add(count, attributes);
        } else {
            panic!("{} does not name a counter", name);
        }
    }
    pub fn recordf(&self, name: &str, value: f64, attributes: &[KeyValue]) {
        if let Some(Instrument::GaugeF64(g)) = self.map.get(name) {
            g.record(value, attributes);
        } else {
            panic!("{} does not name a gauge", name);
        }
    }
    pub fn recordu(&self, name: &str, value: u64, attributes: &[KeyValue]) {
        if let Some(Instrument::GaugeU64(g)) = self.map.get(name) {
            g.record(value, attributes);
        } else {
            panic!("{} does not name a gauge", name);
        }
    }
}

#[macro_export]
macro_rules! counter_add {
    ($instr:expr, $name:expr, $count:expr, $attrs:expr) => {
        $instr.add($name, $count, $attrs);
    };
}

#[macro_export]
macro_rules! gauge_setu {
    ($instr:expr, $name:expr, $value:expr, $attrs:expr) => {
        $instr.recordu($name, $value, $attrs);
    };
}
