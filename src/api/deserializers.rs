use serde::de::{self, Visitor};
use serde::Deserializer;
use std::fmt;

/// Deserialize an identifier that may be stored as a JSON number or a numeric string
pub fn u64_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a positive integer or a string holding one")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(value).map_err(|_| E::invalid_value(de::Unexpected::Signed(value), &self))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json;

    #[derive(Debug, Deserialize)]
    struct Container {
        #[serde(deserialize_with = "u64_from_string_or_number")]
        id: u64,
    }

    #[test]
    fn test_number_and_string() {
        let a: Container = serde_json::from_str(r#"{"id": 140595}"#).unwrap();
        let b: Container = serde_json::from_str(r#"{"id": "140595"}"#).unwrap();
        assert_eq!(a.id, 140595);
        assert_eq!(b.id, 140595);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Container>(r#"{"id": "abc"}"#).is_err());
        assert!(serde_json::from_str::<Container>(r#"{"id": -3}"#).is_err());
    }
}
