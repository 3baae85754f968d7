use serde::de::Error;
use serde::{Deserialize, Deserializer};

/// Deserializes a string that must contain at least one non-whitespace
/// character. Used for values where an empty string would only surface as
/// a confusing failure much later, like the listener host.
pub fn non_empty<'de, D>(des: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(des)?;
    if s.trim().is_empty() {
        return Err(D::Error::custom("value must not be empty"));
    }
    Ok(s)
}
