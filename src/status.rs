//! Task status and its color encoding.
//!
//! A task's status lives in the text color of its line. Decoding is a
//! priority-ordered tolerance match against a handful of target colors;
//! encoding always emits the canonical color for a status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default per-channel tolerance for target color matches.
pub const DEFAULT_TOLERANCE: f64 = 0.15;

/// Completion state of one task line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    Pending,
    Complete,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Todo, Status::Pending, Status::Complete];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Pending => "pending",
            Status::Complete => "complete",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(Status::Todo),
            "pending" => Ok(Status::Pending),
            "complete" => Ok(Status::Complete),
            other => Err(Error::Validation(format!(
                "unknown status '{other}' (expected todo|pending|complete)"
            ))),
        }
    }
}

/// An RGB color with channels normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    #[serde(default)]
    pub red: f64,
    #[serde(default)]
    pub green: f64,
    #[serde(default)]
    pub blue: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(red: f64, green: f64, blue: f64) -> Self {
        Self { red, green, blue }
    }
}

/// Sheet green used for completed tasks.
pub const COMPLETE_COLOR: Rgb = Rgb::new(52.0 / 255.0, 168.0 / 255.0, 83.0 / 255.0);

/// Sheet orange used for pending tasks.
pub const PENDING_COLOR: Rgb = Rgb::new(231.0 / 255.0, 149.0 / 255.0, 63.0 / 255.0);

/// How a rule decides whether an observed color matches.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Matcher {
    /// Per-channel absolute difference below the codec tolerance.
    Target(Rgb),
    /// Older sheets used saturated pure green.
    LegacyGreen,
    /// Older sheets used saturated pure red.
    LegacyRed,
}

impl Matcher {
    fn matches(&self, color: &Rgb, tolerance: f64) -> bool {
        match self {
            Matcher::Target(target) => color.within(target, tolerance),
            Matcher::LegacyGreen => color.green > 0.8 && color.red < 0.3 && color.blue < 0.3,
            Matcher::LegacyRed => color.red > 0.8 && color.green < 0.3 && color.blue < 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColorRule {
    status: Status,
    matcher: Matcher,
}

/// Rule order is observable: tolerance windows can overlap, first match wins.
const RULES: [ColorRule; 4] = [
    ColorRule {
        status: Status::Complete,
        matcher: Matcher::Target(COMPLETE_COLOR),
    },
    ColorRule {
        status: Status::Pending,
        matcher: Matcher::Target(PENDING_COLOR),
    },
    ColorRule {
        status: Status::Complete,
        matcher: Matcher::LegacyGreen,
    },
    ColorRule {
        status: Status::Pending,
        matcher: Matcher::LegacyRed,
    },
];

/// Status/color classifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorCodec {
    tolerance: f64,
}

impl Default for ColorCodec {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ColorCodec {
    /// Create a codec with a custom tolerance in `(0, 1]`.
    pub fn new(tolerance: f64) -> Result<Self> {
        validate_tolerance(tolerance)?;
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Classify an observed text color. Absent or unrecognized colors are todo.
    pub fn classify(&self, color: Option<&Rgb>) -> Status {
        let Some(color) = color else {
            return Status::Todo;
        };
        RULES
            .iter()
            .find(|rule| rule.matcher.matches(color, self.tolerance))
            .map(|rule| rule.status)
            .unwrap_or(Status::Todo)
    }

    /// Canonical color written for a status.
    pub fn color_for(&self, status: Status) -> Rgb {
        match status {
            Status::Complete => COMPLETE_COLOR,
            Status::Pending => PENDING_COLOR,
            Status::Todo => Rgb::BLACK,
        }
    }
}

pub(crate) fn validate_tolerance(tolerance: f64) -> Result<()> {
    if !tolerance.is_finite() || tolerance <= 0.0 || tolerance > 1.0 {
        return Err(Error::InvalidConfig(format!(
            "codec.tolerance must be in (0, 1], got {tolerance}"
        )));
    }
    Ok(())
}
