//! Per-node spatial noise.
//!
//! Every replay-backed node reads the same replay row each tick; independent
//! multiplicative Gaussian noise gives the cluster some spatial diversity.

use crate::config::NoiseScales;
use crate::model::{CloudEnvironment, SurfaceReading};
use rand::Rng;
use rand_distr::StandardNormal;

/// `value * (1 + N(0, scale))`. A zero scale leaves the value untouched.
pub fn perturb<R: Rng + ?Sized>(rng: &mut R, value: f64, scale: f64) -> f64 {
    if scale == 0.0 {
        return value;
    }
    let z: f64 = rng.sample(StandardNormal);
    value * (1.0 + z * scale)
}

/// Perturbs the replayed surface fields. Rainfall and wind never go negative.
pub fn perturb_surface<R: Rng + ?Sized>(
    rng: &mut R,
    surface: &SurfaceReading,
    scales: &NoiseScales,
) -> SurfaceReading {
    SurfaceReading {
        temperature: perturb(rng, surface.temperature, scales.temperature),
        pressure: perturb(rng, surface.pressure, scales.pressure),
        humidity: perturb(rng, surface.humidity, scales.humidity),
        rainfall_mm: perturb(rng, surface.rainfall_mm, scales.rainfall).max(0.0),
        wind_speed: perturb(rng, surface.wind_speed, scales.wind).max(0.0),
    }
}

/// Perturbs reflectivity and echo-top height; the other cloud fields are
/// shared by the whole cluster.
pub fn perturb_cloud<R: Rng + ?Sized>(
    rng: &mut R,
    cloud: &CloudEnvironment,
    scales: &NoiseScales,
) -> CloudEnvironment {
    CloudEnvironment {
        radar_dbz: perturb(rng, cloud.radar_dbz, scales.radar),
        echo_top: perturb(rng, cloud.echo_top, scales.radar),
        ..*cloud
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_perturb_spread_matches_scale() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| perturb(&mut rng, 100.0, 0.02)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 100.0).abs() < 0.1, "mean {} should be near 100", mean);
        assert!((var.sqrt() - 2.0).abs() < 0.1, "std {} should be near 2", var.sqrt());
    }

    #[test]
    fn test_zero_scale_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let surface = SurfaceReading::default();
        assert_eq!(perturb_surface(&mut rng, &surface, &NoiseScales::none()), surface);
    }

    #[test]
    fn test_rain_and_wind_are_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let scales = NoiseScales {
            rainfall: 5.0,
            wind: 5.0,
            ..NoiseScales::default()
        };
        let surface = SurfaceReading {
            rainfall_mm: 1.0,
            wind_speed: 1.0,
            ..SurfaceReading::default()
        };
        for _ in 0..500 {
            let out = perturb_surface(&mut rng, &surface, &scales);
            assert!(out.rainfall_mm >= 0.0);
            assert!(out.wind_speed >= 0.0);
        }
    }

    #[test]
    fn test_cloud_perturbation_touches_only_radar_fields() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let cloud = CloudEnvironment {
            pwv: 65.0,
            radar_dbz: 40.0,
            echo_top: 9.0,
            sat_bt: 220.0,
            ..CloudEnvironment::default()
        };
        let out = perturb_cloud(&mut rng, &cloud, &NoiseScales::default());
        assert_eq!(out.pwv, 65.0);
        assert_eq!(out.sat_bt, 220.0);
        assert_ne!(out.radar_dbz, 40.0);
        assert_ne!(out.echo_top, 9.0);
    }
}
