//! Map-view helpers: engine state parsing, stop/park classification and
//! bounding boxes for a route.

use serde::{Deserialize, Serialize};

/// Interpret the provider's engine flag. Unknown spellings yield `None`.
pub fn parse_engine(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "ON" | "1" | "TRUE" => Some(true),
        "OFF" | "0" | "FALSE" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionKind {
    Moving,
    Stopped,
    Parked,
}

/// Parked means engine off and standing still; stopped means standing still
/// with the engine running or unknown.
pub fn classify_position(engine_on: Option<bool>, speed: Option<f64>) -> PositionKind {
    let standing = speed.map(|s| s <= 0.0).unwrap_or(true);
    match (standing, engine_on) {
        (true, Some(false)) => PositionKind::Parked,
        (true, _) => PositionKind::Stopped,
        (false, _) => PositionKind::Moving,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// Smallest box containing every `(lat, lon)` pair, `None` for no points.
pub fn bounds<I>(points: I) -> Option<Bounds>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    points.into_iter().fold(None, |acc, (lat, lon)| {
        Some(match acc {
            None => Bounds {
                min_lat: lat,
                min_lon: lon,
                max_lat: lat,
                max_lon: lon,
            },
            Some(b) => Bounds {
                min_lat: b.min_lat.min(lat),
                min_lon: b.min_lon.min(lon),
                max_lat: b.max_lat.max(lat),
                max_lon: b.max_lon.max(lon),
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_engine_accepts_provider_spellings() {
        assert_eq!(parse_engine("ON"), Some(true));
        assert_eq!(parse_engine("off"), Some(false));
        assert_eq!(parse_engine("1"), Some(true));
        assert_eq!(parse_engine("0"), Some(false));
        assert_eq!(parse_engine("idle"), None);
    }

    #[test]
    fn engine_off_and_zero_speed_is_parked() {
        assert_eq!(classify_position(Some(false), Some(0.0)), PositionKind::Parked);
    }

    #[test]
    fn engine_on_and_zero_speed_is_stopped() {
        assert_eq!(classify_position(Some(true), Some(0.0)), PositionKind::Stopped);
        assert_eq!(classify_position(None, None), PositionKind::Stopped);
    }

    #[test]
    fn any_positive_speed_is_moving() {
        assert_eq!(classify_position(Some(false), Some(12.0)), PositionKind::Moving);
        assert_eq!(classify_position(None, Some(0.5)), PositionKind::Moving);
    }

    #[test]
    fn bounds_cover_all_points() {
        let b = bounds(vec![(-6.2, 106.8), (-7.8, 110.4), (-6.9, 107.6)]).unwrap();
        assert_eq!(b.min_lat, -7.8);
        assert_eq!(b.max_lat, -6.2);
        assert_eq!(b.min_lon, 106.8);
        assert_eq!(b.max_lon, 110.4);
    }

    #[test]
    fn bounds_of_nothing_is_none() {
        assert!(bounds(Vec::new()).is_none());
    }
}
