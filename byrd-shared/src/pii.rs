use serde::{Serialize, Deserialize, Serializer};
use std::fmt;

/// Contact details (phone numbers, email addresses) that must never reach the logs.
///
/// `Debug`/`Display` print a short hint instead of the value; serialization passes the
/// real value through because delivery workers need it.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct Masked<T>(pub T);

impl<T: AsRef<str>> Masked<T> {
    /// Last four characters, e.g. `***4567` for a phone number.
    pub fn hint(&self) -> String {
        let raw = self.0.as_ref();
        let tail: String = raw.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        if raw.chars().count() <= 4 {
            "****".to_string()
        } else {
            format!("***{}", tail)
        }
    }
}

impl<T: AsRef<str>> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Masked({})", self.hint())
    }
}

impl<T: AsRef<str>> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hint())
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_phone_number() {
        let phone = Masked("+15551234567".to_string());
        assert_eq!(format!("{:?}", phone), "Masked(***4567)");
        assert_eq!(phone.to_string(), "***4567");
    }

    #[test]
    fn test_short_values_fully_masked() {
        let code = Masked("abc".to_string());
        assert_eq!(code.to_string(), "****");
    }

    #[test]
    fn test_serialization_keeps_value() {
        let email = Masked("owner@shop.test".to_string());
        assert_eq!(serde_json::to_string(&email).unwrap(), "\"owner@shop.test\"");
    }
}
