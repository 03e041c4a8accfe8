//! Decodes the notification payloads a remote controller sends.
//!
//! A payload is UTF-8 text holding a bracketed, comma-separated list of
//! numbers, each a percentage of full deflection:
//!
//! ```text
//! [pitch_roll_x, pitch_roll_y, thrust_yaw_x, thrust_yaw_y]
//! ```
//!
//! Empty tokens are skipped, missing trailing values count as zero and
//! anything past the fourth value is ignored. Everything else (no brackets,
//! stray characters, `nan`) is a [`DecodeError`].

use nom::{
    character::complete::{char, multispace0},
    combinator::{all_consuming, opt},
    multi::separated_list0,
    number::complete::double,
    sequence::delimited,
    Finish, IResult,
};

use crate::knob::KnobValue;

use std::{fmt, str::FromStr};

/// Payload values are percentages; the knobs work in unit deflection.
pub const PAYLOAD_SCALE: f64 = 100.0;

/// The four axis values carried by one notification.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RemoteAxes {
    pub pitch_roll: KnobValue,
    pub thrust_yaw: KnobValue,
}

impl RemoteAxes {
    /// Builds the axes from payload order: pitch/roll x and y, then thrust/yaw
    /// x and y.
    pub fn from_array(values: [f64; 4]) -> Self {
        Self {
            pitch_roll: KnobValue::new(values[0], values[1]),
            thrust_yaw: KnobValue::new(values[2], values[3]),
        }
    }

    /// The axes in payload order.
    pub fn to_array(&self) -> [f64; 4] {
        [
            self.pitch_roll.x,
            self.pitch_roll.y,
            self.thrust_yaw.x,
            self.thrust_yaw.y,
        ]
    }

    /// Decodes raw notification bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(bytes).map_err(DecodeError::Utf8)?;
        text.parse()
    }
}

/// Why a payload was thrown away.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The bytes were not UTF-8.
    Utf8(std::str::Utf8Error),
    /// The text did not look like `[n, n, ...]`; holds the unparsed rest.
    Syntax(String),
    /// One of the values was `nan` or infinite.
    NonFinite,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Utf8(e) => write!(f, "payload is not utf-8: {}", e),
            DecodeError::Syntax(rest) => write!(f, "malformed payload near {:?}", rest),
            DecodeError::NonFinite => write!(f, "payload holds a non-finite value"),
        }
    }
}

impl std::error::Error for DecodeError {}

fn parse_token(s: &str) -> IResult<&str, Option<f64>> {
    delimited(multispace0, opt(double), multispace0)(s)
}

fn parse_payload(s: &str) -> IResult<&str, Vec<Option<f64>>> {
    all_consuming(delimited(
        char('['),
        separated_list0(char(','), parse_token),
        char(']'),
    ))(s)
}

impl FromStr for RemoteAxes {
    type Err = DecodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = match parse_payload(s.trim()).finish() {
            Ok((_remaining, tokens)) => tokens,
            Err(nom::error::Error { input, .. }) => {
                return Err(DecodeError::Syntax(input.to_string()))
            }
        };

        let mut values = [0.0; 4];
        for (slot, value) in values.iter_mut().zip(tokens.into_iter().flatten()) {
            if !value.is_finite() {
                return Err(DecodeError::NonFinite);
            }
            *slot = value / PAYLOAD_SCALE;
        }

        Ok(RemoteAxes::from_array(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_1() {
        let s = "[10, -20, 30, 40]";

        let res = RemoteAxes::from_str(s).unwrap();

        assert_eq!(
            res,
            RemoteAxes {
                pitch_roll: KnobValue::new(0.1, -0.2),
                thrust_yaw: KnobValue::new(0.3, 0.4),
            }
        );
    }

    #[test]
    fn test_2() {
        let s = "  [100,0,-100,  50.5]\r\n";

        let res = RemoteAxes::from_str(s).unwrap();

        assert_eq!(res.to_array(), [1.0, 0.0, -1.0, 0.505]);
    }

    #[test]
    fn missing_trailing_values_are_zero() {
        assert_eq!(
            RemoteAxes::from_str("[50]").unwrap().to_array(),
            [0.5, 0.0, 0.0, 0.0]
        );
        assert_eq!(RemoteAxes::from_str("[]").unwrap(), RemoteAxes::default());
    }

    #[test]
    fn empty_tokens_are_skipped() {
        assert_eq!(
            RemoteAxes::from_str("[1,,2]").unwrap().to_array(),
            [0.01, 0.02, 0.0, 0.0]
        );
    }

    #[test]
    fn extra_values_are_ignored() {
        assert_eq!(
            RemoteAxes::from_str("[1, 2, 3, 4, 5, 6]").unwrap().to_array(),
            [0.01, 0.02, 0.03, 0.04]
        );
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        for s in [
            "[1, 2, 3, 4",
            "1, 2, 3, 4]",
            "[1, two, 3]",
            "[1 2]",
            "[1e, 2]",
            "",
            "hello",
        ] {
            assert!(
                matches!(RemoteAxes::from_str(s), Err(DecodeError::Syntax(_))),
                "{:?} should not decode",
                s
            );
        }
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert_eq!(
            RemoteAxes::from_str("[nan, 0]"),
            Err(DecodeError::NonFinite)
        );
        assert_eq!(
            RemoteAxes::from_str("[0, 0, inf]"),
            Err(DecodeError::NonFinite)
        );
    }

    #[test]
    fn bytes_must_be_utf8() {
        assert!(matches!(
            RemoteAxes::from_bytes(&[b'[', 0xFF, b']']),
            Err(DecodeError::Utf8(_))
        ));
        assert_eq!(
            RemoteAxes::from_bytes(b"[25, 25, 0, 75]").unwrap().to_array(),
            [0.25, 0.25, 0.0, 0.75]
        );
    }
}
