//! The vehicle state namespace.
//!
//! These names are the public surface that triggers and actions operate over.

pub const EXAMPLE_STATE: &str = "example_state";
pub const EXAMPLE_VALUE: &str = "example_value";
pub const EXAMPLE_ARRAY: &str = "example_array";
pub const EC: &str = "EC";
pub const DO: &str = "DO";
pub const T: &str = "T";
pub const PH: &str = "PH";
pub const WATER_DEPTH: &str = "water_depth";
pub const CURRENT_POSE: &str = "current_pose";
pub const HOME_POSE: &str = "home_pose";
pub const FIRST_POSE: &str = "first_pose";
pub const ELAPSED_TIME: &str = "elapsed_time";
pub const TIME_SINCE_OPERATOR: &str = "time_since_operator";
pub const BATTERY_VOLTAGE: &str = "battery_voltage";
pub const IS_CONNECTED: &str = "is_connected";
pub const IS_AUTONOMOUS: &str = "is_autonomous";
pub const HAS_FIRST_AUTONOMY: &str = "has_first_autonomy";
pub const HAS_FIRST_GPS: &str = "has_first_gps";
pub const IS_RUNNING: &str = "is_running";
pub const IS_GOING_HOME: &str = "is_going_home";
pub const IS_TAKING_SAMPLE: &str = "is_taking_sample";
pub const PUMP_ON: &str = "pump_on";
pub const NEXT_JAR: &str = "next_jar";
pub const JARS_AVAILABLE: &str = "jars_available";
pub const ALWAYS_TRUE: &str = "always_true";
pub const ALWAYS_FALSE: &str = "always_false";
pub const RC_OVERRIDE: &str = "rc_override";

/// Every name the default vehicle store registers.
pub const ALL: &[&str] = &[
    EXAMPLE_STATE,
    EXAMPLE_VALUE,
    EXAMPLE_ARRAY,
    EC,
    DO,
    T,
    PH,
    WATER_DEPTH,
    CURRENT_POSE,
    HOME_POSE,
    FIRST_POSE,
    ELAPSED_TIME,
    TIME_SINCE_OPERATOR,
    BATTERY_VOLTAGE,
    IS_CONNECTED,
    IS_AUTONOMOUS,
    HAS_FIRST_AUTONOMY,
    HAS_FIRST_GPS,
    IS_RUNNING,
    IS_GOING_HOME,
    IS_TAKING_SAMPLE,
    PUMP_ON,
    NEXT_JAR,
    JARS_AVAILABLE,
    ALWAYS_TRUE,
    ALWAYS_FALSE,
    RC_OVERRIDE,
];
