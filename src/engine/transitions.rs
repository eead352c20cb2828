use std::fmt;
use std::str::FromStr;

use crate::error::AppError;
use crate::models::order::OrderStatus;

/// Whether status changes are checked against the fulfillment graph.
///
/// `Permissive` accepts any move, including out of `delivered` or
/// `cancelled`, which is how the storefront has always behaved. `Strict`
/// only allows the edges returned by [`allowed_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl TransitionPolicy {
    pub fn check(&self, from: OrderStatus, to: OrderStatus) -> Result<(), AppError> {
        match self {
            TransitionPolicy::Permissive => Ok(()),
            TransitionPolicy::Strict if allowed_next(from).contains(&to) => Ok(()),
            TransitionPolicy::Strict => Err(AppError::InvalidTransition { from, to }),
        }
    }
}

impl fmt::Display for TransitionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionPolicy::Permissive => f.write_str("permissive"),
            TransitionPolicy::Strict => f.write_str("strict"),
        }
    }
}

impl FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(format!(
                "unknown transition policy: {other}, expected permissive/strict"
            )),
        }
    }
}

pub fn allowed_next(from: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match from {
        Pending => &[Processing, Cancelled],
        Processing => &[Shipped, Cancelled],
        Shipped => &[OutForDelivery, Delivered],
        OutForDelivery => &[Delivered],
        Delivered | Cancelled => &[],
    }
}
