//! Serde types for the Grafana alerting and dashboard APIs.
//!
//! Only the fields page mods read are modelled; everything else in the
//! responses is ignored. Missing or `null` collections deserialize as empty.

mod dashboard;
mod rule;
mod ruler;

pub use dashboard::*;
pub use rule::*;
pub use ruler::*;

use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` the same as an absent field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests;
