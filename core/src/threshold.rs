//! Threshold evaluator — overtime minutes against a resolved ceiling.
//!
//! Pure, no I/O. Callers resolve the ceiling (department, else default)
//! before calling in; a ceiling of 0 is rejected by config validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest percentage-of-ceiling step reached. Ordered: None < P60 < … < P100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "60")]
    P60,
    #[serde(rename = "70")]
    P70,
    #[serde(rename = "80")]
    P80,
    #[serde(rename = "90")]
    P90,
    #[serde(rename = "100")]
    P100,
}

/// Notifiable steps, highest first.
const STEPS: [(f64, Severity); 5] = [
    (100.0, Severity::P100),
    (90.0,  Severity::P90),
    (80.0,  Severity::P80),
    (70.0,  Severity::P70),
    (60.0,  Severity::P60),
];

impl Severity {
    /// Map a percentage of ceiling to its step. Exact step values
    /// belong to that step (90.0 → P90). Anything ≥ 100 is P100.
    pub fn from_percent(percent: f64) -> Self {
        STEPS
            .iter()
            .find(|(step, _)| percent >= *step)
            .map(|(_, s)| *s)
            .unwrap_or(Severity::None)
    }

    pub fn percent(self) -> Option<u32> {
        match self {
            Severity::None => None,
            Severity::P60 => Some(60),
            Severity::P70 => Some(70),
            Severity::P80 => Some(80),
            Severity::P90 => Some(90),
            Severity::P100 => Some(100),
        }
    }

    pub fn from_step(percent: u32) -> Option<Self> {
        STEPS.iter().map(|(_, s)| *s).find(|s| s.percent() == Some(percent))
    }

    pub fn is_notifiable(self) -> bool {
        self != Severity::None
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percent() {
            Some(p) => write!(f, "{p}%"),
            None => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// minutes / ceiling × 100, unrounded.
    pub percent:  f64,
    pub severity: Severity,
}

/// Evaluate `minutes` of overtime against `ceiling_minutes`.
pub fn evaluate(minutes: u32, ceiling_minutes: u32) -> Evaluation {
    debug_assert!(ceiling_minutes > 0, "ceiling must be resolved and positive");
    // Multiply before dividing: 540 * 100 / 600 is exactly 90.0.
    let percent = f64::from(minutes) * 100.0 / f64::from(ceiling_minutes.max(1));
    Evaluation {
        percent,
        severity: Severity::from_percent(percent),
    }
}

/// Rounded integer percentage, 0 when the denominator is 0.
pub fn rounded_percent(numerator: u32, denominator: u32) -> u32 {
    if denominator == 0 {
        return 0;
    }
    (f64::from(numerator) * 100.0 / f64::from(denominator)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_step_takes_that_step() {
        assert_eq!(evaluate(540, 600).severity, Severity::P90);
        assert_eq!(evaluate(540, 600).percent, 90.0);
        assert_eq!(evaluate(360, 600).severity, Severity::P60);
        assert_eq!(evaluate(600, 600).severity, Severity::P100);
    }

    #[test]
    fn below_first_step_is_none() {
        assert_eq!(evaluate(0, 600).severity, Severity::None);
        assert_eq!(evaluate(359, 600).severity, Severity::None);
    }

    #[test]
    fn over_ceiling_caps_at_100() {
        let e = evaluate(1500, 600);
        assert_eq!(e.severity, Severity::P100);
        assert_eq!(e.percent, 250.0);
    }

    #[test]
    fn rounded_percent_handles_zero_denominator() {
        assert_eq!(rounded_percent(500, 0), 0);
        assert_eq!(rounded_percent(1, 3), 33);
        assert_eq!(rounded_percent(2, 3), 67);
    }

    #[test]
    fn step_lookup() {
        assert_eq!(Severity::from_step(80), Some(Severity::P80));
        assert_eq!(Severity::from_step(85), None);
        assert_eq!(Severity::P70.to_string(), "70%");
    }

    proptest! {
        #[test]
        fn severity_is_monotonic(a in 0u32..5000, b in 0u32..5000, ceiling in 1u32..3000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(evaluate(lo, ceiling).severity <= evaluate(hi, ceiling).severity);
        }

        #[test]
        fn severity_stays_in_step_set(p in -10.0f64..1000.0) {
            let s = Severity::from_percent(p);
            prop_assert!(s == Severity::None || s.percent().is_some());
            if p >= 100.0 {
                prop_assert_eq!(s, Severity::P100);
            }
        }
    }
}
