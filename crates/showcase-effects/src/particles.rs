use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Particle background settings. Speeds are in pixels per second.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub count: usize,
    pub max_speed: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Particles closer than this are joined by a line.
    pub link_distance: f32,
    /// Line opacity at zero distance; fades linearly to 0 at `link_distance`.
    pub link_opacity: f32,
}

const MAX_PARTICLES: usize = 2000;
const MAX_SPEED: f32 = 10_000.0;
const MAX_RADIUS: f32 = 1_000.0;

impl FieldConfig {
    /// Bring values read from a config section into a range the field can
    /// use: non-finite numbers fall back to the defaults, the rest are clamped.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let min_radius = finite_or(self.min_radius, defaults.min_radius).clamp(0.0, MAX_RADIUS);
        let max_radius = finite_or(self.max_radius, defaults.max_radius).clamp(0.0, MAX_RADIUS);
        Self {
            count: self.count.min(MAX_PARTICLES),
            max_speed: finite_or(self.max_speed, defaults.max_speed).abs().min(MAX_SPEED),
            min_radius: min_radius.min(max_radius),
            max_radius: min_radius.max(max_radius),
            link_distance: finite_or(self.link_distance, defaults.link_distance).max(0.0),
            link_opacity: finite_or(self.link_opacity, defaults.link_opacity).clamp(0.0, 1.0),
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            count: 80,
            max_speed: 30.0,
            min_radius: 1.0,
            max_radius: 3.0,
            link_distance: 120.0,
            link_opacity: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
}

/// A connecting line between particles `a` and `b` (indices).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub a: usize,
    pub b: usize,
    pub opacity: f32,
}

pub struct ParticleField {
    config: FieldConfig,
    width: f32,
    height: f32,
    particles: Vec<Particle>,
}

impl ParticleField {
    pub fn new(width: f32, height: f32, config: FieldConfig, rng: &mut impl Rng) -> Self {
        let config = config.sanitized();
        let width = dimension(width);
        let height = dimension(height);
        let particles = (0..config.count)
            .map(|_| spawn(&config, width, height, rng))
            .collect();
        Self {
            config,
            width,
            height,
            particles,
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Advance every particle by `elapsed`, wrapping at the edges.
    pub fn step(&mut self, elapsed: Duration) {
        let dt = elapsed.as_secs_f32();
        for p in &mut self.particles {
            p.x = wrap(p.x + p.vx * dt, self.width);
            p.y = wrap(p.y + p.vy * dt, self.height);
        }
    }

    /// New viewport size. Positions scale with the viewport so the field
    /// keeps its distribution.
    pub fn resize(&mut self, width: f32, height: f32) {
        let width = dimension(width);
        let height = dimension(height);
        let sx = if self.width > 0.0 { width / self.width } else { 0.0 };
        let sy = if self.height > 0.0 { height / self.height } else { 0.0 };
        for p in &mut self.particles {
            p.x = wrap(p.x * sx, width);
            p.y = wrap(p.y * sy, height);
        }
        self.width = width;
        self.height = height;
    }

    pub fn links(&self) -> Vec<Link> {
        let max = self.config.link_distance;
        if max <= 0.0 {
            return Vec::new();
        }
        let max_sq = max * max;

        let mut links = Vec::new();
        for (a, pa) in self.particles.iter().enumerate() {
            for (offset, pb) in self.particles[a + 1..].iter().enumerate() {
                let dx = pa.x - pb.x;
                let dy = pa.y - pb.y;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq < max_sq {
                    links.push(Link {
                        a,
                        b: a + 1 + offset,
                        opacity: self.config.link_opacity * (1.0 - dist_sq.sqrt() / max),
                    });
                }
            }
        }
        links
    }
}

/// `config` must already be sanitized.
fn spawn(config: &FieldConfig, width: f32, height: f32, rng: &mut impl Rng) -> Particle {
    let speed = config.max_speed;
    let (min_r, max_r) = (config.min_radius, config.max_radius);
    Particle {
        x: wrap(rng.random_range(0.0..=width), width),
        y: wrap(rng.random_range(0.0..=height), height),
        vx: rng.random_range(-speed..=speed),
        vy: rng.random_range(-speed..=speed),
        radius: rng.random_range(min_r..=max_r),
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() { value } else { fallback }
}

/// Viewport sizes: negative or non-finite become 0.
fn dimension(value: f32) -> f32 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Map `v` into `[0, bound)`; a zero bound pins everything to 0.
fn wrap(v: f32, bound: f32) -> f32 {
    if bound <= 0.0 || !v.is_finite() {
        return 0.0;
    }
    let wrapped = v.rem_euclid(bound);
    if wrapped >= bound { 0.0 } else { wrapped }
}
