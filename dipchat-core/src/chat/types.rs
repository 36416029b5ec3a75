//! Identifiers and value types shared by the chat store

use super::errors::{ChatError, ChatResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};

/// Identifier of a game. Zero is reserved and never names a real game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub i64);

impl GameId {
    pub fn new(id: i64) -> Self {
        GameId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An authenticated account, resolved by the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of a game, e.g. `England`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nation(pub String);

impl Nation {
    pub fn new(name: impl Into<String>) -> Self {
        Nation(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Nation {
    fn from(name: &str) -> Self {
        Nation(name.to_string())
    }
}

/// A participant set, kept sorted so that equal sets compare and print equal.
///
/// The comma-joined `Display` form is what channel keys and message rows use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Nation>", into = "Vec<Nation>")]
pub struct Nations(Vec<Nation>);

impl Nations {
    pub fn new(nations: impl IntoIterator<Item = Nation>) -> Self {
        let mut nations: Vec<Nation> = nations.into_iter().collect();
        nations.sort();
        Nations(nations)
    }

    pub fn includes(&self, nation: &Nation) -> bool {
        self.0.binary_search(nation).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Nation> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Nation] {
        &self.0
    }

    /// First nation listed more than once, if any
    pub fn duplicate(&self) -> Option<&Nation> {
        self.0.windows(2).find(|pair| pair[0] == pair[1]).map(|pair| &pair[0])
    }
}

impl From<Vec<Nation>> for Nations {
    fn from(nations: Vec<Nation>) -> Self {
        Nations::new(nations)
    }
}

impl From<Nations> for Vec<Nation> {
    fn from(nations: Nations) -> Self {
        nations.0
    }
}

impl FromIterator<Nation> for Nations {
    fn from_iter<I: IntoIterator<Item = Nation>>(iter: I) -> Self {
        Nations::new(iter)
    }
}

impl<'a> IntoIterator for &'a Nations {
    type Item = &'a Nation;
    type IntoIter = std::slice::Iter<'a, Nation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Nations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, nation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(nation.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for Nations {
    type Err = ChatError;

    /// Parses the comma-joined form, in any order
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    Err(ChatError::InvalidArgument(format!(
                        "empty nation in channel members '{}'",
                        s
                    )))
                } else {
                    Ok(Nation::new(part))
                }
            })
            .collect()
    }
}

static LAST_ISSUED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// UTC instant with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time, strictly increasing across calls within this process
    pub fn now() -> Self {
        let wall = Utc::now().timestamp_micros();
        let previous = match LAST_ISSUED_MICROS.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |last| Some(wall.max(last.saturating_add(1))),
        ) {
            Ok(previous) | Err(previous) => previous,
        };
        let issued = wall.max(previous.saturating_add(1));

        DateTime::from_timestamp_micros(issued)
            .map(Timestamp)
            .unwrap_or_else(|| Timestamp(Utc::now()))
    }

    pub fn from_micros(micros: i64) -> Option<Self> {
        DateTime::from_timestamp_micros(micros).map(Timestamp)
    }

    pub fn as_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    /// Parse an RFC 3339 cutoff such as `2024-03-01T12:00:00Z`.
    ///
    /// Sub-microsecond digits are truncated, which cannot change the result
    /// of a `created_at > since` comparison against stored timestamps.
    pub fn parse_rfc3339(s: &str) -> ChatResult<Self> {
        let parsed = DateTime::parse_from_rfc3339(s.trim()).map_err(|e| {
            ChatError::InvalidArgument(format!("malformed timestamp '{}': {}", s, e))
        })?;
        Timestamp::from_micros(parsed.with_timezone(&Utc).timestamp_micros())
            .ok_or_else(|| ChatError::InvalidArgument(format!("timestamp out of range '{}'", s)))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp(dt)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nations_are_sorted() {
        let nations = Nations::new(vec![Nation::from("France"), Nation::from("England")]);
        assert_eq!(nations.to_string(), "England,France");
        assert!(nations.includes(&Nation::from("France")));
        assert!(!nations.includes(&Nation::from("Germany")));
    }

    #[test]
    fn test_nations_equality_ignores_order() {
        let a: Nations = "Turkey,Austria,Russia".parse().unwrap();
        let b: Nations = "Russia,Turkey,Austria".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Austria,Russia,Turkey");
    }

    #[test]
    fn test_nations_parse_rejects_empty_parts() {
        assert!(matches!("England,,France".parse::<Nations>(), Err(ChatError::InvalidArgument(_))));
        assert!(matches!("".parse::<Nations>(), Err(ChatError::InvalidArgument(_))));
    }

    #[test]
    fn test_nations_duplicate() {
        let nations: Nations = "France,England,France".parse().unwrap();
        assert_eq!(nations.duplicate(), Some(&Nation::from("France")));

        let nations: Nations = "France,England".parse().unwrap();
        assert_eq!(nations.duplicate(), None);
    }

    #[test]
    fn test_nations_serde_sorts_on_input() {
        let nations: Nations = serde_json::from_str(r#"["Italy","Austria"]"#).unwrap();
        assert_eq!(nations.to_string(), "Austria,Italy");
        assert_eq!(serde_json::to_string(&nations).unwrap(), r#"["Austria","Italy"]"#);
    }

    #[test]
    fn test_timestamp_now_is_strictly_increasing() {
        let mut last = Timestamp::now();
        for _ in 0..1000 {
            let next = Timestamp::now();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn test_timestamp_rfc3339() {
        let ts = Timestamp::parse_rfc3339("2024-03-01T12:00:00.5+01:00").unwrap();
        assert_eq!(ts.to_string(), "2024-03-01T11:00:00.500000Z");
        assert_eq!(Timestamp::from_micros(ts.as_micros()), Some(ts));

        assert!(matches!(
            Timestamp::parse_rfc3339("yesterday"),
            Err(ChatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_game_id_validity() {
        assert!(GameId::new(42).is_valid());
        assert!(!GameId::new(0).is_valid());
    }
}
