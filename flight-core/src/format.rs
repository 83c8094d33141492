//! Short display strings for flight fields, sized for a small text display.

const FEET_PER_METRE: f64 = 3.28084;
const KNOTS_PER_MPS: f64 = 1.94384;
const FPM_PER_MPS: f64 = 196.85;

/// Transition altitude above which flight levels are shown.
const FLIGHT_LEVEL_FT: f64 = 18000.0;

const UNKNOWN: &str = "---";

const CARDINALS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Metres → `FL350` at or above 18,000 ft, otherwise `4500ft`.
pub fn format_altitude(metres: Option<f64>) -> String {
    let Some(m) = metres else {
        return UNKNOWN.into();
    };
    let feet = m * FEET_PER_METRE;
    if feet >= FLIGHT_LEVEL_FT {
        format!("FL{:.0}", (feet / 100.0).round())
    } else {
        format!("{:.0}ft", feet.round())
    }
}

/// m/s → knots.
pub fn format_speed(mps: Option<f64>) -> String {
    match mps {
        Some(v) => format!("{:.0}kt", (v * KNOTS_PER_MPS).round()),
        None => UNKNOWN.into(),
    }
}

/// Degrees → 16-point cardinal plus three-digit heading, e.g. `NE045`.
pub fn format_heading(degrees: Option<f64>) -> String {
    let Some(deg) = degrees else {
        return UNKNOWN.into();
    };
    let idx = (((deg + 11.25) / 22.5) as i64).rem_euclid(16) as usize;
    format!("{}{:03}", CARDINALS[idx], deg as i64)
}

/// One decimal under 10 km, whole kilometres above.
pub fn format_distance(km: Option<f64>) -> String {
    match km {
        None => UNKNOWN.into(),
        Some(d) if d < 10.0 => format!("{d:.1}km"),
        Some(d) => format!("{:.0}km", d.round()),
    }
}

/// m/s → signed feet per minute; empty when level or unknown.
pub fn format_vertical_rate(mps: Option<f64>) -> String {
    match mps {
        Some(v) if v.abs() >= 0.5 => format!("{:+}fpm", (v * FPM_PER_MPS).round() as i64),
        _ => String::new(),
    }
}

/// `KJFK > EGLL`, with `?` for a missing end; empty if neither is known.
pub fn format_route(origin: Option<&str>, destination: Option<&str>) -> String {
    match (origin, destination) {
        (Some(o), Some(d)) => format!("{o} > {d}"),
        (Some(o), None) => format!("{o} > ?"),
        (None, Some(d)) => format!("? > {d}"),
        (None, None) => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
