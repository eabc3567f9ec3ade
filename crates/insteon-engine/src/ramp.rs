//! Ramp-rate encoding for the "on/off at ramp rate" commands.
//!
//! The 4-bit rate field selects every other entry of the device's 32-entry
//! ramp-rate table (full-table codes 0x01, 0x03, ... 0x1F).

/// Transition times in seconds for rate codes 0 (slowest) to 15 (fastest).
pub const RAMP_RATES: [f64; 16] = [
    480.0, 360.0, 270.0, 210.0, 150.0, 90.0, 47.0, 38.5, 32.0, 28.0, 23.5, 19.0, 6.5, 2.0, 0.3,
    0.1,
];

/// Transition used when ramp mode is requested without a time.
pub const DEFAULT_TRANSITION: f64 = 2.0;

/// Quantize a 0-255 level into the 4-bit level field: round(level * 15 / 255).
pub fn level_bucket(level: u8) -> u8 {
    (f64::from(level) * 15.0 / 255.0).round() as u8
}

/// Level a device reports after ramping to a bucket.
pub fn bucket_level(bucket: u8) -> u8 {
    (bucket.min(0x0F) << 4) | 0x0F
}

/// Rate code whose time is closest to `seconds`, clamped to the table.
pub fn rate_code(seconds: f64) -> u8 {
    let seconds = if seconds.is_nan() {
        DEFAULT_TRANSITION
    } else {
        seconds
    };
    let slowest = RAMP_RATES[0];
    let fastest = RAMP_RATES[RAMP_RATES.len() - 1];
    if seconds >= slowest {
        return 0;
    }
    if seconds <= fastest {
        return (RAMP_RATES.len() - 1) as u8;
    }

    let mut best = 0;
    let mut best_diff = f64::MAX;
    for (code, rate) in RAMP_RATES.iter().enumerate() {
        let diff = (rate - seconds).abs();
        if diff < best_diff {
            best = code;
            best_diff = diff;
        }
    }
    best as u8
}

/// cmd2 for "on at ramp rate": level bucket in the high nibble, rate in the low.
pub fn ramp_on_cmd2(level: u8, seconds: f64) -> u8 {
    (level_bucket(level) << 4) | rate_code(seconds)
}

/// cmd2 for "off at ramp rate": the level nibble is always zero.
pub fn ramp_off_cmd2(seconds: f64) -> u8 {
    rate_code(seconds)
}
