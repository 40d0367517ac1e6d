//! Deterministic value rules.
//!
//! Every simulated variable is driven by a pure function of the simulation
//! tick (and, for the two clock-derived variables, of the cycle's wall-clock
//! instant). The formulas are fixed: existing client test suites assert on
//! them.

use std::fmt;

use chrono::{NaiveDateTime, Timelike};

use crate::{Value, ValueType};

/// Status strings cycled through by [`Rule::Status`], indexed by `tick % 4`.
pub const STATUS_CYCLE: [&str; 4] = ["Running", "Active", "Ready", "Online"];

/// Format used for the Timestamp variable (ISO-8601, microseconds).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Timestamp format for instants on a whole second (no fraction).
pub const WHOLE_SECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Counter values wrap into the non-negative `Int32` range.
const COUNTER_MODULUS: u64 = 1 << 31;

/// Simulation tick: the simulator's monotonic logical clock.
///
/// Starts at 0 and advances by one per cycle; the first cycle computes values
/// for tick 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub u64);

impl Tick {
    /// Raw counter value.
    pub fn value(self) -> u64 {
        self.0
    }

    /// The following tick.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    #[allow(clippy::cast_precision_loss)]
    fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Update rule of one simulated variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// `tick` as `Int32`.
    Counter,
    /// `20 + 10 sin(0.1 t)`, two decimals.
    Temperature,
    /// `1013.25 + 50 sin(0.05 t) + 25 cos(0.07 t)`, two decimals.
    Pressure,
    /// [`STATUS_CYCLE`] indexed by `t mod 4`.
    Status,
    /// `(t / 3) mod 2 == 0`.
    Boolean,
    /// `Message #<t> - <HH:MM:SS>`.
    DynamicString,
    /// Wall-clock time of the cycle, ISO-8601.
    Timestamp,
}

impl Rule {
    /// Value type every output of this rule has.
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Counter => ValueType::Int32,
            Self::Temperature | Self::Pressure => ValueType::Float64,
            Self::Status | Self::DynamicString | Self::Timestamp => ValueType::String,
            Self::Boolean => ValueType::Boolean,
        }
    }

    /// Compute the value for `tick`, observed at wall-clock instant `now`.
    pub fn evaluate(self, tick: Tick, now: NaiveDateTime) -> Value {
        match self {
            Self::Counter => Value::Int32(counter(tick)),
            Self::Temperature => Value::Float64(temperature(tick)),
            Self::Pressure => Value::Float64(pressure(tick)),
            Self::Status => Value::String(status(tick).to_string()),
            Self::Boolean => Value::Boolean(boolean_phase(tick)),
            Self::DynamicString => Value::String(dynamic_message(tick, now)),
            Self::Timestamp => Value::String(iso_timestamp(now)),
        }
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Counter rule.
#[allow(clippy::cast_possible_truncation)]
pub fn counter(tick: Tick) -> i32 {
    (tick.0 % COUNTER_MODULUS) as i32
}

/// Temperature rule.
pub fn temperature(tick: Tick) -> f64 {
    round2(20.0 + 10.0 * (tick.as_f64() * 0.1).sin())
}

/// Pressure rule.
pub fn pressure(tick: Tick) -> f64 {
    let t = tick.as_f64();
    round2(1013.25 + 50.0 * (t * 0.05).sin() + 25.0 * (t * 0.07).cos())
}

/// Status rule.
#[allow(clippy::cast_possible_truncation)]
pub fn status(tick: Tick) -> &'static str {
    STATUS_CYCLE[(tick.0 % STATUS_CYCLE.len() as u64) as usize]
}

/// Boolean rule: three ticks true, three ticks false.
pub fn boolean_phase(tick: Tick) -> bool {
    (tick.0 / 3) % 2 == 0
}

/// DynamicString rule.
pub fn dynamic_message(tick: Tick, now: NaiveDateTime) -> String {
    format!("Message #{} - {}", tick, now.format("%H:%M:%S"))
}

/// Timestamp rule.
///
/// Microseconds are printed only when non-zero, so an instant on a whole
/// second renders as `2024-01-15T10:30:02`.
pub fn iso_timestamp(now: NaiveDateTime) -> String {
    if now.nanosecond() / 1_000 == 0 {
        now.format(WHOLE_SECOND_FORMAT).to_string()
    } else {
        now.format(TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_micro_opt(12, 30, 5, 250).unwrap()
    }

    #[test]
    fn tick_zero_values() {
        assert_eq!(counter(Tick(0)), 0);
        assert!((temperature(Tick(0)) - 20.0).abs() < f64::EPSILON);
        assert!((pressure(Tick(0)) - 1038.25).abs() < f64::EPSILON);
        assert_eq!(status(Tick(0)), "Running");
        assert!(boolean_phase(Tick(0)));
    }

    #[test]
    fn known_temperature_samples() {
        // 20 + 10 sin(1.0) = 28.4147...
        assert!((temperature(Tick(10)) - 28.41).abs() < 1e-9);
        // 20 + 10 sin(1.5) = 29.9749...
        assert!((temperature(Tick(15)) - 29.97).abs() < 1e-9);
    }

    #[test]
    fn boolean_flips_every_three_ticks() {
        let phases: Vec<bool> = (0..9).map(|t| boolean_phase(Tick(t))).collect();
        assert_eq!(phases, vec![true, true, true, false, false, false, true, true, true]);
    }

    #[test]
    fn clock_rules_format_the_instant() {
        assert_eq!(iso_timestamp(noon()), "2024-03-01T12:30:05.000250");
        assert_eq!(dynamic_message(Tick(7), noon()), "Message #7 - 12:30:05");
    }

    #[test]
    fn whole_second_timestamp_has_no_fraction() {
        let on_second = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(12, 30, 5).unwrap();
        assert_eq!(iso_timestamp(on_second), "2024-03-01T12:30:05");

        let sub_micro =
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_nano_opt(12, 30, 5, 999).unwrap();
        assert_eq!(iso_timestamp(sub_micro), "2024-03-01T12:30:05");
    }

    #[test]
    fn counter_wraps_into_int32_range() {
        assert_eq!(counter(Tick(COUNTER_MODULUS)), 0);
        assert_eq!(counter(Tick(COUNTER_MODULUS - 1)), i32::MAX);
    }

    #[test]
    fn rule_outputs_match_declared_types() {
        let rules = [
            Rule::Counter,
            Rule::Temperature,
            Rule::Pressure,
            Rule::Status,
            Rule::Boolean,
            Rule::DynamicString,
            Rule::Timestamp,
        ];
        for rule in rules {
            assert_eq!(rule.evaluate(Tick(42), noon()).value_type(), rule.value_type(), "{rule:?}");
        }
    }
}
