//! Sample kernels for screen-space ambient occlusion.
//!
//! Both tables are generated from a seeded PCG stream so a given
//! configuration always produces the same image.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::config::AmbientOcclusionSettings;

/// Kernel of `n` points inside the unit hemisphere around +Z.
///
/// Sample `i` is scaled by `lerp(0.1, 1.0, (i / n)^2)`, clustering samples
/// near the origin where occlusion matters most.
pub fn generate_kernel<R: Rng>(n: usize, rng: &mut R) -> Vec<Vec3> {
    (0..n)
        .map(|i| {
            let direction = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(0.0..1.0),
            )
            .normalize_or(Vec3::Z);
            let t = i as f32 / n as f32;
            direction * lerp(0.1, 1.0, t * t)
        })
        .collect()
}

/// `size * size` random rotation vectors in the tangent plane (`z = 0`).
pub fn generate_noise<R: Rng>(size: usize, rng: &mut R) -> Vec<Vec3> {
    (0..size * size)
        .map(|_| Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0))
        .collect()
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Kernel and noise tile for one settings snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct SsaoTables {
    pub kernel: Vec<Vec3>,
    pub noise: Vec<Vec3>,
    pub noise_size: u32,
}

impl SsaoTables {
    pub fn generate(settings: &AmbientOcclusionSettings) -> Self {
        let mut rng = Pcg32::seed_from_u64(settings.seed);
        let kernel = generate_kernel(settings.samples as usize, &mut rng);
        let noise = generate_noise(settings.noise_size as usize, &mut rng);
        Self {
            kernel,
            noise,
            noise_size: settings.noise_size,
        }
    }
}
