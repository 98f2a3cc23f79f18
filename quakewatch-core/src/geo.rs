//! Felt-radius model.
//!
//! Decides whether a target location would perceive an earthquake:
//!
//! 1. Great-circle distance between epicenter and target (haversine, spherical earth).
//! 2. Peak horizontal acceleration from an empirical attenuation relation,
//!    with a fixed near-field value below 1 km.
//! 3. Conversion of the acceleration to an MMI-equivalent intensity.
//! 4. The target feels the event iff the intensity is at least [`FELT_INTENSITY`].
//!
//! All functions here are pure.

/// Mean earth radius used by the haversine distance, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Below this distance the attenuation relation is not evaluated.
pub const NEAR_FIELD_KM: f64 = 1.0;

/// Acceleration assumed inside the near field, in cm/s².
pub const NEAR_FIELD_ACCELERATION: f64 = 620.0;

/// Minimum intensity (inclusive) that counts as felt.
pub const FELT_INTENSITY: f64 = 3.0;

/// A point on the earth's surface in decimal degrees.
///
/// South and west are negative. Construction rejects non-finite and
/// out-of-range components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// Result of evaluating one (event, target) pair. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactAssessment {
    pub distance_km: f64,
    pub intensity: f64,
    pub felt: bool,
}

/// Surface distance between two coordinates in kilometres.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = lat2 - lat1;
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Peak horizontal acceleration in cm/s² at `distance_km` from a quake of `magnitude`.
///
/// `log10(A) = 0.41·M − log10(R + 0.032·10^(0.41·M)) − 0.0034·R + 1.30`
pub fn peak_acceleration(magnitude: f64, distance_km: f64) -> f64 {
    if distance_km < NEAR_FIELD_KM {
        return NEAR_FIELD_ACCELERATION;
    }
    let scaled = 0.41 * magnitude;
    let log_a = scaled - (distance_km + 0.032 * 10f64.powf(scaled)).log10() - 0.0034 * distance_km
        + 1.30;
    10f64.powf(log_a)
}

/// MMI-equivalent intensity: `I = 1 + 2·log10(A)`.
pub fn intensity_from_acceleration(acceleration: f64) -> f64 {
    1.0 + 2.0 * acceleration.log10()
}

/// Evaluate whether `target` would feel a quake of `magnitude` at `epicenter`.
pub fn evaluate(epicenter: Coordinate, target: Coordinate, magnitude: f64) -> ImpactAssessment {
    let distance_km = haversine_km(epicenter, target);
    let intensity = intensity_from_acceleration(peak_acceleration(magnitude, distance_km));
    ImpactAssessment {
        distance_km,
        intensity,
        felt: intensity >= FELT_INTENSITY,
    }
}

/// Keep only digits, decimal points and minus signs.
///
/// `"6.77 LS"` becomes `"6.77"`, `"-6.2 LU"` becomes `"-6.2"`.
pub fn extract_number(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect()
}

/// Parse a coordinate component stored as text, ignoring any unit suffix.
pub fn parse_coordinate_component(input: &str) -> Option<f64> {
    extract_number(input)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Like [`parse_coordinate_component`], but an unsigned value followed by a
/// southern (`LS`, `S`) or western (`BB`, `W`) hemisphere marker is negated.
pub fn parse_hemisphere_component(input: &str) -> Option<f64> {
    let value = parse_coordinate_component(input)?;
    let marker: String = input
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let negative_hemisphere = matches!(marker.as_str(), "LS" | "S" | "BB" | "W");
    if negative_hemisphere && value > 0.0 {
        Some(-value)
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_coordinate_rejects_invalid_components() {
        assert!(Coordinate::new(f64::NAN, 10.0).is_none());
        assert!(Coordinate::new(10.0, f64::INFINITY).is_none());
        assert!(Coordinate::new(90.5, 10.0).is_none());
        assert!(Coordinate::new(10.0, -180.5).is_none());
        assert!(Coordinate::new(-90.0, 180.0).is_some());
    }

    #[test]
    fn test_haversine_zero_and_known_distance() {
        let p = coord(-6.2, 106.8);
        assert_eq!(haversine_km(p, p), 0.0);

        // One degree of latitude along a meridian.
        let d = haversine_km(coord(0.0, 0.0), coord(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = coord(-5.42, 123.12);
        let b = coord(-5.36, 123.16);
        let ab = evaluate(a, b, 4.0).distance_km;
        let ba = evaluate(b, a, 4.0).distance_km;
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn test_near_field_uses_fixed_acceleration() {
        let p = coord(-5.42, 123.12);
        for magnitude in [0.0, 2.5, 5.0, 9.0] {
            let assessment = evaluate(p, p, magnitude);
            let expected = 1.0 + 2.0 * 620f64.log10();
            assert!((assessment.intensity - expected).abs() < 1e-12);
            assert!(assessment.felt);
        }
    }

    #[test]
    fn test_coincident_target_strong_quake_is_felt() {
        let p = coord(-2.5, 140.7);
        let assessment = evaluate(p, coord(-2.5, 140.7001), 5.5);
        assert!(assessment.distance_km < NEAR_FIELD_KM);
        assert!((assessment.intensity - 6.585).abs() < 0.01);
        assert!(assessment.felt);
    }

    #[test]
    fn test_buton_worked_example() {
        let epicenter = coord(-5.42, 123.12);
        let target = coord(-5.36, 123.16);
        let assessment = evaluate(epicenter, target, 3.2);

        assert!(
            (7.5..8.7).contains(&assessment.distance_km),
            "distance {}",
            assessment.distance_km
        );
        let r = assessment.distance_km;
        let log_a = 0.41 * 3.2 - (r + 0.032 * 10f64.powf(0.41 * 3.2)).log10() - 0.0034 * r + 1.30;
        let expected = 1.0 + 2.0 * log_a;
        assert!((assessment.intensity - expected).abs() < 1e-9);
        // The attenuation relation puts this site at roughly MMI 4.3.
        assert!((assessment.intensity - 4.29).abs() < 0.05);
        assert!(assessment.felt);
    }

    #[test]
    fn test_distant_target_not_felt() {
        let assessment = evaluate(coord(-5.42, 123.12), coord(-6.2, 106.8), 3.2);
        assert!(assessment.distance_km > 1000.0);
        assert!(assessment.intensity < FELT_INTENSITY);
        assert!(!assessment.felt);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // A = 10 gives exactly I = 3.
        assert_eq!(intensity_from_acceleration(10.0), 3.0);
        assert!(intensity_from_acceleration(10.0) >= FELT_INTENSITY);
    }

    #[test]
    fn test_non_positive_magnitude_is_never_felt_far_away() {
        let assessment = evaluate(coord(0.0, 0.0), coord(0.5, 0.5), 0.0);
        assert!(!assessment.felt);
    }

    #[test]
    fn test_nan_magnitude_propagates() {
        let assessment = evaluate(coord(0.0, 0.0), coord(1.0, 1.0), f64::NAN);
        assert!(assessment.intensity.is_nan());
        assert!(!assessment.felt);
    }

    #[test]
    fn test_extract_number() {
        assert_eq!(extract_number("6.77 LS"), "6.77");
        assert_eq!(extract_number("-6.2 LU"), "-6.2");
        assert_eq!(extract_number("105.513 BT"), "105.513");
        assert_eq!(extract_number("abc"), "");
    }

    #[test]
    fn test_parse_components() {
        assert_eq!(parse_coordinate_component("-6.2"), Some(-6.2));
        assert_eq!(parse_coordinate_component("6.77 LS"), Some(6.77));
        assert_eq!(parse_coordinate_component("north"), None);
        assert_eq!(parse_coordinate_component(""), None);
        assert_eq!(parse_coordinate_component("1.2.3"), None);

        assert_eq!(parse_hemisphere_component("6.77 LS"), Some(-6.77));
        assert_eq!(parse_hemisphere_component("2.10 LU"), Some(2.10));
        assert_eq!(parse_hemisphere_component("105.51 BT"), Some(105.51));
        assert_eq!(parse_hemisphere_component("70.5 BB"), Some(-70.5));
        assert_eq!(parse_hemisphere_component("-6.77 LS"), Some(-6.77));
    }
}
