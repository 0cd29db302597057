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

//! # origin
//!
//! The service's public identity. [Host] names the deployment ("reviews.example.com", say); it's
//! the issuer baked into every token this instance mints & checked on every token it verifies, so
//! a token minted by one deployment won't pass at another.

use std::{fmt::Display, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use snafu::{prelude::*, Backtrace};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{text} is not a valid host name"))]
    BadHost { text: String, backtrace: Backtrace },
}

type Result<T> = std::result::Result<T, Error>;

lazy_static! {
    // RFC 1123 host names: dot-separated labels of alphanumerics & hyphens
    static ref HOST: Regex =
        Regex::new("^[a-zA-Z0-9]([-a-zA-Z0-9]{0,61}[a-zA-Z0-9])?(\\.[a-zA-Z0-9]([-a-zA-Z0-9]{0,61}[a-zA-Z0-9])?)*$").unwrap(/* known good */);
}

/// A refined type representing a host name
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(text: &str) -> Result<Host> {
        HOST.is_match(text)
            .then_some(Host(text.to_owned()))
            .context(BadHostSnafu {
                text: text.to_owned(),
            })
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Host {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Host::new(s)
    }
}

impl<'de> Deserialize<'de> for Host {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Host::new(&s).map_err(|err| <D::Error as serde::de::Error>::custom(format!("{:?}", err)))
    }
}

#[cfg(test)]
mod host_tests {
    use super::*;

    #[test]
    fn smoke() {
        assert!(Host::new("marketmeet.example.com").is_ok());
        assert!(Host::new("localhost").is_ok());
        assert!(Host::new("-nope.example.com").is_err());
        assert!(Host::new("two..dots").is_err());
    }
}
