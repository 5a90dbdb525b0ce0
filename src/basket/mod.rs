pub mod aggregator;

use std::fmt;
use serde::Serialize;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BasketKind {
    Fiat,
    Crypto,
}

impl fmt::Display for BasketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BasketKind::Fiat => write!(f, "fiat"),
            BasketKind::Crypto => write!(f, "crypto"),
        }
    }
}

/// Per-member line of a basket inclusion report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberReport {
    pub code: String,
    pub name: String,
    pub provider_id: Option<String>,
    pub value: Option<f64>,
    pub market_cap: Option<f64>,
    pub weight: f64,
    pub included: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasketReport {
    pub kind: BasketKind,
    pub value: f64,
    pub included_weight: f64,
    pub configured_weight: f64,
    pub coverage: f64,
    pub members: Vec<MemberReport>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasketAggregate {
    pub wf_raw: f64,
    pub wc_raw: f64,
    pub fiat: BasketReport,
    pub crypto: BasketReport,
}

/// Basket composition published alongside the latest committed tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BasketBreakdown {
    pub as_of: Timestamp,
    pub fiat: Vec<MemberReport>,
    pub crypto: Vec<MemberReport>,
}

impl BasketBreakdown {
    pub fn from_aggregate(as_of: Timestamp, aggregate: BasketAggregate) -> Self {
        BasketBreakdown {
            as_of,
            fiat: aggregate.fiat.members,
            crypto: aggregate.crypto.members,
        }
    }
}
