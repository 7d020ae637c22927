// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Bitmask over the payload kinds an attribute may appear in.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DestinationSet(u8);

impl DestinationSet {
    pub const NONE: Self = Self(0);
    pub const TXN_EVENT: Self = Self(1 << 0);
    pub const ERROR: Self = Self(1 << 1);
    pub const TXN_TRACE: Self = Self(1 << 2);
    pub const BROWSER: Self = Self(1 << 3);
    pub const ALL: Self =
        Self(Self::TXN_EVENT.0 | Self::ERROR.0 | Self::TXN_TRACE.0 | Self::BROWSER.0);

    /// Every destination except browser monitoring.
    pub const USUAL: Self = Self::ALL.without(Self::BROWSER);
    pub const TRACES: Self = Self(Self::TXN_TRACE.0 | Self::ERROR.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Clears every bit of `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for DestinationSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DestinationSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for DestinationSet {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for DestinationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(DestinationSet, &str); 4] = [
            (DestinationSet::TXN_EVENT, "TXN_EVENT"),
            (DestinationSet::ERROR, "ERROR"),
            (DestinationSet::TXN_TRACE, "TXN_TRACE"),
            (DestinationSet::BROWSER, "BROWSER"),
        ];
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let mut first = true;
        for (dest, name) in NAMES {
            if self.intersects(dest) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}
