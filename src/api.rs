//! Typed request and response bodies of the HTTP interface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::game::GameError;
use crate::{LeaderboardEntry, MatchResult};

/// Raw move body as received; coordinates are checked by [`MovePayload::parse`].
#[derive(Debug, Clone, Default)]
pub struct MovePayload {
    x: Option<Value>,
    y: Option<Value>,
}

/// Validated move coordinates; range is checked against the board later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
}

impl MovePayload {
    /// Builds a payload from explicit JSON values.
    pub fn new(x: Option<Value>, y: Option<Value>) -> Self {
        Self { x, y }
    }

    /// Decodes a request body. Bodies that are not a JSON object yield an empty payload,
    /// which [`MovePayload::parse`] rejects.
    #[instrument(skip(body), fields(len = body.len()))]
    pub fn from_slice(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(mut fields)) => Self::new(fields.remove("x"), fields.remove("y")),
            Ok(other) => {
                debug!(body = %other, "Move body is not an object");
                Self::default()
            }
            Err(e) => {
                debug!(error = %e, "Unparseable move body");
                Self::default()
            }
        }
    }

    /// Extracts integer coordinates. Integer strings such as `"3"` are accepted.
    ///
    /// Integers beyond `i64` saturate, so the board reports them as out of range.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidInput`] if a coordinate is missing or not an integer.
    pub fn parse(&self) -> Result<MoveRequest, GameError> {
        match (integer(self.x.as_ref()), integer(self.y.as_ref())) {
            (Some(x), Some(y)) => Ok(MoveRequest { x, y }),
            _ => Err(GameError::InvalidInput(
                "x or y is missing or not int".to_string(),
            )),
        }
    }
}

fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_u64().map(|_| i64::MAX)).or_else(|| {
            // `as` saturates
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => integer_text(s.trim()),
        _ => None,
    }
}

fn integer_text(text: &str) -> Option<i64> {
    if let Ok(v) = text.parse() {
        return Some(v);
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let all_digits = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    all_digits.then_some(if negative { i64::MIN } else { i64::MAX })
}

/// Response to a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyResponse {
    /// Credential to send in the `x-api-key` header.
    #[serde(rename = "x-api-key")]
    pub api_key: String,
}

/// Response to match creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCreated {
    /// Identifier of the new match.
    pub match_id: String,
}

/// One row of the public results listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerScore {
    /// Participant.
    pub user: String,
    /// Participant's score in the match.
    pub score: i64,
}

impl From<MatchResult> for PlayerScore {
    fn from(result: MatchResult) -> Self {
        Self {
            user: result.user_id().clone(),
            score: *result.score(),
        }
    }
}

/// Public results of one match, best score first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResults {
    /// Participants and their scores.
    pub players: Vec<PlayerScore>,
}

/// Public leaderboard, best average first.
pub type Leaderboard = Vec<LeaderboardEntry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_and_integer_strings_parse() {
        let payload = MovePayload::from_slice(br#"{"x": 2, "y": "3"}"#);
        assert_eq!(payload.parse(), Ok(MoveRequest { x: 2, y: 3 }));
    }

    #[test]
    fn missing_or_fractional_coordinates_fail() {
        for body in [
            json!({"x": 1}),
            json!({"x": 1.5, "y": 2}),
            json!({"x": "one", "y": 2}),
            json!({"x": null, "y": 2}),
            json!([3, 4]),
            json!(7),
        ] {
            let payload = MovePayload::from_slice(body.to_string().as_bytes());
            assert!(matches!(payload.parse(), Err(GameError::InvalidInput(_))));
        }
    }

    #[test]
    fn oversized_integers_saturate() {
        let payload =
            MovePayload::from_slice(br#"{"x": 9223372036854775808, "y": "-99999999999999999999"}"#);
        assert_eq!(
            payload.parse(),
            Ok(MoveRequest {
                x: i64::MAX,
                y: i64::MIN
            })
        );
        let payload = MovePayload::from_slice(br#"{"x": 1e30, "y": "99999999999999999999"}"#);
        assert_eq!(
            payload.parse(),
            Ok(MoveRequest {
                x: i64::MAX,
                y: i64::MAX
            })
        );
    }

    #[test]
    fn garbage_body_is_invalid_input() {
        let payload = MovePayload::from_slice(b"not json");
        assert!(payload.parse().is_err());
    }

    #[test]
    fn api_key_field_name() {
        let body = serde_json::to_value(ApiKeyResponse {
            api_key: "k".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"x-api-key": "k"}));
    }
}
