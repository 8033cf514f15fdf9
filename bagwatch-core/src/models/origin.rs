//! Search origin.
//!
//! The origin is sent with every favourites request. It is jittered on every
//! successful token refresh so consecutive sessions do not share an exact
//! location fingerprint.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Relative spread applied by [`Origin::randomized`].
pub const DEFAULT_SPREAD: f64 = 0.1;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Origin {
    /// Latitude in degrees, within [-90, 90].
    pub latitude: f64,
    /// Longitude in degrees, within [-180, 180).
    pub longitude: f64,
}

impl Origin {
    /// Creates a normalized origin.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
        .normalized()
    }

    /// Scales both coordinates by `factor` and normalizes the result.
    pub fn jittered(&self, factor: f64) -> Self {
        Self {
            latitude: self.latitude * factor,
            longitude: self.longitude * factor,
        }
        .normalized()
    }

    /// Scales both coordinates by a random factor in `1 ± spread`.
    pub fn randomized<R: Rng + ?Sized>(&self, rng: &mut R, spread: f64) -> Self {
        let spread = spread.abs();
        let factor = if spread > 0.0 {
            1.0 + rng.gen_range(-spread..=spread)
        } else {
            1.0
        };
        self.jittered(factor)
    }

    /// Wraps longitude into [-180, 180) and reflects latitude across ±90.
    pub fn normalized(&self) -> Self {
        let longitude = (self.longitude + 180.0).rem_euclid(360.0) - 180.0;

        // Bring latitude into [-180, 180) first so a single reflection suffices.
        let mut latitude = (self.latitude + 180.0).rem_euclid(360.0) - 180.0;
        if latitude > 90.0 {
            latitude = 180.0 - latitude;
        } else if latitude < -90.0 {
            latitude = -180.0 - latitude;
        }

        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates are finite and inside their ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..180.0).contains(&self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_longitude_wraps() {
        let o = Origin::new(10.0, 190.0);
        assert!(approx(o.longitude, -170.0));

        let o = Origin::new(10.0, 180.0);
        assert!(approx(o.longitude, -180.0));

        let o = Origin::new(10.0, -540.0);
        assert!(approx(o.longitude, -180.0));
    }

    #[test]
    fn test_latitude_reflects() {
        let o = Origin::new(95.0, 0.0);
        assert!(approx(o.latitude, 85.0));

        let o = Origin::new(-99.0, 0.0);
        assert!(approx(o.latitude, -81.0));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let near_pole = Origin::new(89.0, 179.0);
        let moved = near_pole.jittered(1.1);
        assert!(moved.is_valid());
        assert!(moved.latitude < 90.0);
    }

    #[test]
    fn test_randomized_bounded_by_spread() {
        let base = Origin::new(50.0, 4.0);
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let o = base.randomized(&mut rng, DEFAULT_SPREAD);
            assert!(o.latitude >= 45.0 - 1e-9 && o.latitude <= 55.0 + 1e-9);
            assert!(o.longitude >= 3.6 - 1e-9 && o.longitude <= 4.4 + 1e-9);
        }
    }

    #[test]
    fn test_zero_spread_is_identity() {
        let base = Origin::new(50.0, 4.0);
        let mut rng = rand::thread_rng();
        assert_eq!(base.randomized(&mut rng, 0.0), base);
    }
}
