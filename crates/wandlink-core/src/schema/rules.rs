//! Per-parameter value rules.
//!
//! The JSON schema only says how many parameters a command takes.  The range
//! checks below are keyed by command name and parameter position and are
//! attached to the schema at load time:
//!
//! | Command        | Param | Rule                            |
//! |----------------|-------|---------------------------------|
//! | `brightness`   | 0     | integer in `0..=255`            |
//! | `spring_param` | 0     | exactly 6 hex characters        |
//! | `vibrate`      | 0     | non-negative integer (ms)       |
//!
//! Every other parameter accepts any text.

/// A check applied to one parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRule {
    /// No constraint beyond being present.
    Any,
    /// Decimal integer within `min..=max`.
    IntegerRange { min: i64, max: i64 },
    /// Exactly this many hex digits.
    HexDigits(usize),
    /// Decimal integer `>= 0`.
    NonNegativeInteger,
}

impl ParamRule {
    /// Returns `true` if `value` satisfies the rule.  Never panics.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ParamRule::Any => true,
            ParamRule::IntegerRange { min, max } => value
                .parse::<i64>()
                .map(|n| (*min..=*max).contains(&n))
                .unwrap_or(false),
            ParamRule::HexDigits(len) => {
                value.len() == *len && value.bytes().all(|b| b.is_ascii_hexdigit())
            }
            ParamRule::NonNegativeInteger => value.parse::<u64>().is_ok(),
        }
    }
}

/// Returns the range rule for parameter `index` of `command`.
pub fn rule_for(command: &str, index: usize) -> ParamRule {
    match (command, index) {
        ("brightness", 0) => ParamRule::IntegerRange { min: 0, max: 255 },
        ("spring_param", 0) => ParamRule::HexDigits(6),
        ("vibrate", 0) => ParamRule::NonNegativeInteger,
        _ => ParamRule::Any,
    }
}
