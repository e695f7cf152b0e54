use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use thiserror::Error;

/// Length of a generated pairing key token.
pub const PAIRING_KEY_LENGTH: usize = 32;

/// How many more enrollments a pairing key may authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemainingUses {
    Unlimited,
    Finite(u32),
}

impl RemainingUses {
    /// A finite key with no uses left. This is terminal: the key stays in the
    /// store but can never authorize another enrollment.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Finite(0))
    }

    pub(crate) fn to_column(self) -> Option<i64> {
        match self {
            Self::Unlimited => None,
            Self::Finite(n) => Some(i64::from(n)),
        }
    }

    pub(crate) fn from_column(value: Option<i64>) -> Self {
        match value {
            None => Self::Unlimited,
            // the schema forbids negative counts
            Some(n) => Self::Finite(u32::try_from(n).unwrap_or(0)),
        }
    }
}

impl fmt::Display for RemainingUses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Finite(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected a non-negative integer or \"unlimited\", got {0:?}")]
pub struct ParseRemainingUsesError(String);

impl FromStr for RemainingUses {
    type Err = ParseRemainingUsesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") {
            return Ok(Self::Unlimited);
        }

        s.parse::<u32>()
            .map(Self::Finite)
            .map_err(|_| ParseRemainingUsesError(s.to_string()))
    }
}

/// Why a pairing key can no longer authorize an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum KeyRejection {
    #[error("Pairing key has expired")]
    Expired,

    #[error("Pairing key has no uses left")]
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPairingKey {
    /// The token itself, also the primary key.
    pub key: String,

    /// Href of the network device workloads paired with this key get bound
    /// to, if any.
    pub target_switch_ref: Option<String>,

    /// When the key stops being accepted. `None` means it never expires.
    pub valid_until: Option<DateTime<Utc>>,

    pub remaining_uses: RemainingUses,

    pub created_at: DateTime<Utc>,
}

impl DbPairingKey {
    /// A key is expired from the second `valid_until` is reached, so a key
    /// created with a zero validity period is never accepted.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_some_and(|until| until <= now)
    }

    /// Expiry is checked before the use count.
    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), KeyRejection> {
        if self.is_expired(now) {
            return Err(KeyRejection::Expired);
        }

        if self.remaining_uses.is_exhausted() {
            return Err(KeyRejection::Exhausted);
        }

        Ok(())
    }
}

pub fn generate_pairing_key() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(PAIRING_KEY_LENGTH)
        .map(char::from)
        .collect()
}
