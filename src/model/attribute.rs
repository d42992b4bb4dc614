use crate::error::VersionError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Value, json};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Dotted module version (`major.minor.micro.qualifier`).
///
/// Missing numeric parts default to zero and the qualifier defaults to the
/// empty string, so `1` and `1.0.0` compare equal.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl Version {
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u64; 3];
        for (idx, slot) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    *slot = part.parse().map_err(|_| VersionError::InvalidComponent {
                        input: input.to_string(),
                        component: part.to_string(),
                    })?;
                }
                None if idx == 0 => return Err(VersionError::Empty),
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(VersionError::InvalidQualifier {
                input: input.to_string(),
                qualifier: qualifier.to_string(),
            });
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.micro, &self.qualifier).cmp(&(
            other.major,
            other.minor,
            other.micro,
            &other.qualifier,
        ))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// Matchable attribute value carried by capabilities and requirements.
///
/// Plain JSON scalars map onto `String`, `Long`, `Double` and `Boolean`;
/// versions and explicitly typed values use the `{"type", "value"}` object
/// form found in repository indexes.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Version(Version),
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<&Version> {
        match self {
            AttributeValue::Version(value) => Some(value),
            _ => None,
        }
    }

    /// Convert an index-document JSON value into an attribute.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        match value {
            Value::String(s) => Ok(AttributeValue::String(s.clone())),
            Value::Bool(b) => Ok(AttributeValue::Boolean(*b)),
            Value::Number(n) => {
                if let Some(long) = n.as_i64() {
                    Ok(AttributeValue::Long(long))
                } else {
                    n.as_f64()
                        .map(AttributeValue::Double)
                        .ok_or_else(|| format!("unsupported number {n}"))
                }
            }
            Value::Array(items) => items
                .iter()
                .map(AttributeValue::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(AttributeValue::List),
            Value::Object(map) => {
                let kind = map
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "typed attribute is missing 'type'".to_string())?;
                let raw = map
                    .get("value")
                    .ok_or_else(|| "typed attribute is missing 'value'".to_string())?;
                typed_from_json(kind, raw)
            }
            Value::Null => Err("attribute values must not be null".to_string()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            AttributeValue::String(s) => Value::String(s.clone()),
            AttributeValue::Long(n) => json!(n),
            AttributeValue::Double(n) => json!(n),
            AttributeValue::Boolean(b) => Value::Bool(*b),
            AttributeValue::Version(v) => json!({"type": "Version", "value": v.to_string()}),
            AttributeValue::List(items) => {
                Value::Array(items.iter().map(AttributeValue::to_json).collect())
            }
        }
    }
}

fn typed_from_json(kind: &str, raw: &Value) -> Result<AttributeValue, String> {
    if let Some(element) = kind
        .strip_prefix("List<")
        .and_then(|rest| rest.strip_suffix('>'))
    {
        let items: Vec<Value> = match raw {
            Value::Array(items) => items.clone(),
            Value::String(joined) => joined
                .split(',')
                .map(|item| Value::String(item.trim().to_string()))
                .collect(),
            other => return Err(format!("{kind} expects an array or string, got {other}")),
        };
        return items
            .iter()
            .map(|item| typed_from_json(element, item))
            .collect::<Result<Vec<_>, _>>()
            .map(AttributeValue::List);
    }

    let text = match raw {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => return Err(format!("{kind} expects a scalar, got {other}")),
    };
    match kind {
        "String" => Ok(AttributeValue::String(text)),
        "Long" => text
            .trim()
            .parse()
            .map(AttributeValue::Long)
            .map_err(|_| format!("invalid Long '{text}'")),
        "Double" => text
            .trim()
            .parse()
            .map(AttributeValue::Double)
            .map_err(|_| format!("invalid Double '{text}'")),
        "Boolean" => text
            .trim()
            .parse()
            .map(AttributeValue::Boolean)
            .map_err(|_| format!("invalid Boolean '{text}'")),
        "Version" => text
            .parse()
            .map(AttributeValue::Version)
            .map_err(|err: VersionError| err.to_string()),
        other => Err(format!("unknown attribute type '{other}'")),
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Long(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<Version> for AttributeValue {
    fn from(value: Version) -> Self {
        AttributeValue::Version(value)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AttributeValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        AttributeValue::from_json(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parses_partial_forms() {
        let v: Version = "1.2".parse().unwrap();
        assert_eq!(v, Version::new(1, 2, 0));
        let q: Version = "1.2.3.beta-1".parse().unwrap();
        assert_eq!(q.qualifier, "beta-1");
        assert_eq!(q.to_string(), "1.2.3.beta-1");
        assert!("1.x".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
        assert!("1.0.0.bad!".parse::<Version>().is_err());
    }

    #[test]
    fn version_ordering_is_numeric_then_qualifier() {
        let a: Version = "1.10".parse().unwrap();
        let b: Version = "1.9.9".parse().unwrap();
        assert!(a > b);
        let plain: Version = "2.0.0".parse().unwrap();
        let qualified: Version = "2.0.0.rc1".parse().unwrap();
        assert!(qualified > plain);
    }

    #[test]
    fn attributes_accept_plain_and_typed_json() {
        let parsed: AttributeValue = serde_json::from_str("\"foo\"").unwrap();
        assert_eq!(parsed, AttributeValue::String("foo".into()));

        let parsed: AttributeValue = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, AttributeValue::Long(42));

        let parsed: AttributeValue =
            serde_json::from_str(r#"{"type": "Version", "value": "1.4"}"#).unwrap();
        assert_eq!(parsed.as_version(), Some(&Version::new(1, 4, 0)));

        let parsed: AttributeValue =
            serde_json::from_str(r#"{"type": "List<Long>", "value": "1, 2,3"}"#).unwrap();
        assert_eq!(
            parsed,
            AttributeValue::List(vec![
                AttributeValue::Long(1),
                AttributeValue::Long(2),
                AttributeValue::Long(3)
            ])
        );

        let err = serde_json::from_str::<AttributeValue>(r#"{"type": "Blob", "value": "x"}"#)
            .expect_err("unknown type should fail");
        assert!(err.to_string().contains("Blob"));
    }

    #[test]
    fn version_attribute_serializes_as_typed_object() {
        let attr = AttributeValue::Version(Version::new(3, 1, 0));
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json, json!({"type": "Version", "value": "3.1.0"}));
        let back: AttributeValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, attr);
    }
}
