mod application;
mod base;
mod ini;

pub use application::*;
pub use base::*;
pub use ini::IniFile;

/// Deserialize a number and map zero to [`None`].
///
/// This is used for optional settings where zero means "disabled",
/// since the layered configuration has no representation for [`None`].
pub fn deserialize_non_zero<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: num_traits::Zero + serde::Deserialize<'de>,
{
    let value = T::deserialize(deserializer)?;
    if value.is_zero() {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}
