//! Great-circle distance
//!
//!  Spherical law of cosines, scaled with the nautical-mile-per-minute
//!  approximation to statute miles.

/// Nautical miles per degree of latitude
const NM_PER_DEGREE: f64 = 60.0;
/// Statute miles per nautical mile
const MILES_PER_NM: f64 = 1.1515;

/// Distance in statute miles between two points given in radians.
///
/// May return NaN for numerical edge cases near antipodal points; every
/// caller compares with `<`/`<=`, which NaN never satisfies.
pub fn distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    // sin² + cos² is not exactly 1 in floating point
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }
    let cos_d = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos();
    // rounding can push nearby points just above 1.0
    let d = cos_d.clamp(-1.0, 1.0).acos();
    d.to_degrees() * NM_PER_DEGREE * MILES_PER_NM
}

/// Same as [`distance_miles`] with coordinates in degrees.
pub fn distance_miles_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_miles(
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTS: [(f64, f64); 5] = [
        (34.2098, -118.4898),
        (33.9425, -118.4081),
        (0.0, 0.0),
        (-45.5, 170.25),
        (89.9, -179.9),
    ];

    #[test]
    fn test_same_point_is_zero() {
        for (lat, lon) in POINTS {
            assert_eq!(distance_miles_deg(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_symmetric() {
        for a in POINTS {
            for b in POINTS {
                let ab = distance_miles_deg(a.0, a.1, b.0, b.1);
                let ba = distance_miles_deg(b.0, b.1, a.0, a.1);
                assert!((ab - ba).abs() < 1e-9, "{:?} {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_known_distance() {
        // Van Nuys to LAX
        let d = distance_miles_deg(34.2098, -118.4898, 33.9425, -118.4081);
        assert!((d - 19.05).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_radians_and_degrees_agree() {
        let d1 = distance_miles(0.5, -2.0, 0.51, -2.01);
        let d2 = distance_miles_deg(
            0.5_f64.to_degrees(),
            (-2.0_f64).to_degrees(),
            0.51_f64.to_degrees(),
            (-2.01_f64).to_degrees(),
        );
        assert!((d1 - d2).abs() < 1e-9);
    }
}
