//! Decimal rounding for the `*round` converter.

use std::fmt;

/// Rounding applied by `*round`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundingMethod {
    /// Half away from the floor: fractions of .5 and above round up
    #[default]
    Middle,
    Up,
    Down,
}

impl RoundingMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "*middle" => Some(Self::Middle),
            "*up" => Some(Self::Up),
            "*down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Middle => "*middle",
            Self::Up => "*up",
            Self::Down => "*down",
        }
    }
}

impl fmt::Display for RoundingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractions smaller than 10^-7 (after scaling) are float noise and do not
/// trigger rounding up.
const MAX_PRECISION: i32 = 7;

/// Round `value` to `decimals` decimal places.
pub fn round(value: f64, decimals: i32, method: RoundingMethod) -> f64 {
    let max_precision = MAX_PRECISION.max(decimals);
    let pow = 10f64.powi(decimals);
    let scaled = value * pow;
    let fraction = scaled.fract();

    let rounded = match method {
        RoundingMethod::Up => {
            if fraction >= 10f64.powi(-max_precision) {
                scaled.ceil()
            } else {
                scaled.floor()
            }
        }
        RoundingMethod::Down => scaled.floor(),
        RoundingMethod::Middle => {
            if fraction >= 0.5 {
                scaled.ceil()
            } else {
                scaled.floor()
            }
        }
    };
    rounded / pow
}
