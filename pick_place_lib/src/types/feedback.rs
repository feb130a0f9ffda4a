use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// End-effector position reported by the arm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSnapshot {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub t: f64,
}

/// Result of a feedback query. Feedback is best-effort telemetry, so a
/// response that does not parse is a value the caller branches on, not an
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    Present(FeedbackSnapshot),
    /// The arm answered with a payload we could not interpret
    Malformed(String),
    /// The arm answered with an empty body
    Absent,
}

impl Feedback {
    /// Interpret the raw body of a feedback response.
    ///
    /// `x`, `y` and `z` must be finite numbers; `t` defaults to 0.0 when the
    /// firmware omits it.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return Feedback::Absent;
        }

        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => return Feedback::Malformed(format!("not JSON: {}", e)),
        };

        let Some(fields) = value.as_object() else {
            return Feedback::Malformed(format!("expected object, got {}", value));
        };

        match read_snapshot(fields) {
            Ok(s) => Feedback::Present(s),
            Err(reason) => Feedback::Malformed(reason),
        }
    }
}

fn read_axis(fields: &Map<String, Value>, name: &str) -> Result<f64, String> {
    match fields.get(name).and_then(Value::as_f64) {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(format!("field '{}' is not finite ({})", name, v)),
        None => Err(format!("missing numeric field '{}'", name)),
    }
}

fn read_snapshot(fields: &Map<String, Value>) -> Result<FeedbackSnapshot, String> {
    Ok(FeedbackSnapshot {
        x: read_axis(fields, "x")?,
        y: read_axis(fields, "y")?,
        z: read_axis(fields, "z")?,
        t: match fields.get("t") {
            None => 0.0,
            Some(_) => read_axis(fields, "t")?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_present() {
        let fb = Feedback::parse(r#"{"T":1051,"x":235.5,"y":-12.0,"z":80.25,"t":3.1,"b":0.1}"#);
        assert_eq!(
            fb,
            Feedback::Present(FeedbackSnapshot {
                x: 235.5,
                y: -12.0,
                z: 80.25,
                t: 3.1
            })
        );
    }

    #[test]
    fn test_parse_missing_orientation_defaults_to_zero() {
        let fb = Feedback::parse(r#"{"x":1,"y":2,"z":3}"#);
        assert!(matches!(fb, Feedback::Present(s) if s.t == 0.0));
    }

    #[test]
    fn test_parse_absent_and_malformed() {
        assert_eq!(Feedback::parse("   "), Feedback::Absent);
        assert!(matches!(Feedback::parse("OK"), Feedback::Malformed(_)));
        assert!(matches!(Feedback::parse("[1,2,3]"), Feedback::Malformed(_)));
        assert!(matches!(
            Feedback::parse(r#"{"x":1,"y":2}"#),
            Feedback::Malformed(_)
        ));
        assert!(matches!(
            Feedback::parse(r#"{"x":1,"y":"2","z":3}"#),
            Feedback::Malformed(_)
        ));
        assert!(matches!(
            Feedback::parse(r#"{"x":1,"y":2,"z":3,"t":null}"#),
            Feedback::Malformed(_)
        ));
    }
}
