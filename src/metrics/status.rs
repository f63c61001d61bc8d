//! Two-state statuses exported as a gauge value plus a `status` label.

use strum::{AsRefStr, Display};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerStatus {
    Offline,
    Online,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RescueSystemStatus {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RebootRecommendation {
    NotRecommended,
    Recommended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DiskOptimization {
    No,
    Yes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum InterfaceThrottling {
    NotThrottled,
    Throttled,
}

/// Gauge value: the second variant of each status is `1`.
pub trait StatusValue: AsRef<str> + Copy {
    fn from_flag(set: bool) -> Self;
    fn value(self) -> f64;
}

macro_rules! status_value {
    ($ty:ident, $unset:ident, $set:ident) => {
        impl StatusValue for $ty {
            fn from_flag(set: bool) -> Self {
                if set {
                    Self::$set
                } else {
                    Self::$unset
                }
            }

            fn value(self) -> f64 {
                match self {
                    Self::$unset => 0.0,
                    Self::$set => 1.0,
                }
            }
        }
    };
}

status_value!(ServerStatus, Offline, Online);
status_value!(RescueSystemStatus, Inactive, Active);
status_value!(RebootRecommendation, NotRecommended, Recommended);
status_value!(DiskOptimization, No, Yes);
status_value!(InterfaceThrottling, NotThrottled, Throttled);
