//! Utility functions for serde serialization/deserialization.
//!
//! This module contains helper functions commonly used with serde's
//! `skip_serializing_if` and `deserialize_with` attributes.

use serde::{Deserialize, Deserializer};

// ============================================================================
// Boolean Helpers
// ============================================================================

/// Returns `true` if the boolean value is `false`.
///
/// Used with `#[serde(skip_serializing_if = "is_false")]` to omit false values.
#[inline]
pub fn is_false(b: &bool) -> bool {
    !*b
}

// ============================================================================
// Numeric Zero Helpers
// ============================================================================

/// Returns `true` if the u32 value is zero.
///
/// Used with `#[serde(skip_serializing_if = "is_zero_u32")]` to omit zero values.
#[inline]
pub fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ============================================================================
// Lenient Scalars
// ============================================================================

/// Deserializes a JSON string, number or null into a `String`.
///
/// Share-link generators disagree on whether numeric fields such as `port`
/// or `aid` are quoted, so both spellings are accepted. `null` becomes `""`.
pub fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        String(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::String(s)) => s,
        Some(Scalar::Unsigned(n)) => n.to_string(),
        Some(Scalar::Signed(n)) => n.to_string(),
        Some(Scalar::Float(n)) => n.to_string(),
        Some(Scalar::Bool(b)) => b.to_string(),
        None => String::new(),
    })
}
