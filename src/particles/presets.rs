//! 内置粒子效果预设

use super::collision::{CollisionResponse, PlaneCollisionAffector};
use super::emitter::{EmitterConfig, ValueRange};
use super::shape::{EmitFrom, EmitterShape};
use crate::config::ParticleSystemConfig;
use crate::core::ParticleError;
use glam::{Vec2, Vec3, Vec4};
use std::str::FromStr;

/// 粒子系统预设
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticlePreset {
    Fire,
    Smoke,
    Explosion,
    Rain,
    Snow,
    Magic,
}

impl ParticlePreset {
    pub const ALL: [ParticlePreset; 6] = [
        ParticlePreset::Fire,
        ParticlePreset::Smoke,
        ParticlePreset::Explosion,
        ParticlePreset::Rain,
        ParticlePreset::Snow,
        ParticlePreset::Magic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ParticlePreset::Fire => "Fire",
            ParticlePreset::Smoke => "Smoke",
            ParticlePreset::Explosion => "Explosion",
            ParticlePreset::Rain => "Rain",
            ParticlePreset::Snow => "Snow",
            ParticlePreset::Magic => "Magic",
        }
    }

    /// 按名称查找（忽略大小写）
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(name))
    }

    pub fn to_config(&self) -> ParticleSystemConfig {
        match self {
            ParticlePreset::Fire => {
                let mut config = system(
                    EmitterConfig::default()
                        .with_emission_rate(50.0)
                        .with_max_particles(500)
                        .with_shape(EmitterShape::Cone, Vec3::new(0.2, 0.0, 0.0))
                        .with_lifetime(0.7, 1.3)
                        .with_speed(1.5, 2.5)
                        .with_colors(Vec4::new(1.0, 0.5, 0.0, 1.0), Vec4::new(1.0, 0.0, 0.0, 0.0)),
                    true,
                );
                config.emitter.size = ValueRange::new(Vec2::splat(0.3), Vec2::splat(0.7));
                config.emitter.end_size = ValueRange::constant(Vec2::ZERO);
                config.forces.gravity.enabled = true;
                config.forces.gravity.gravity = Vec3::new(0.0, 1.0, 0.0);
                config.forces.noise.enabled = true;
                config.forces.noise.strength = 0.5;
                config
            }
            ParticlePreset::Smoke => {
                let mut config = system(
                    EmitterConfig::default()
                        .with_emission_rate(20.0)
                        .with_max_particles(300)
                        .with_shape(EmitterShape::Circle, Vec3::new(0.3, 0.0, 0.0))
                        .with_lifetime(2.5, 3.5)
                        .with_speed(0.7, 1.3)
                        .with_colors(
                            Vec4::new(0.5, 0.5, 0.5, 0.8),
                            Vec4::new(0.3, 0.3, 0.3, 0.0),
                        ),
                    true,
                );
                config.emitter.size = ValueRange::new(Vec2::splat(0.3), Vec2::splat(0.7));
                config.emitter.end_size = ValueRange::constant(Vec2::splat(2.0));
                config.emitter.angular_velocity = ValueRange::new(-0.5, 0.5);
                config.forces.gravity.enabled = true;
                config.forces.gravity.gravity = Vec3::new(0.0, 0.5, 0.0);
                config.forces.drag.enabled = true;
                config.forces.drag.damping = 0.99;
                config
            }
            ParticlePreset::Explosion => {
                let mut config = system(
                    EmitterConfig::default()
                        .with_emission_rate(0.0)
                        .with_max_particles(1000)
                        .with_shape(EmitterShape::Sphere, Vec3::splat(0.2))
                        .with_lifetime(0.3, 0.7)
                        .with_speed(3.0, 8.0)
                        .with_colors(Vec4::new(1.0, 0.8, 0.0, 1.0), Vec4::new(0.5, 0.0, 0.0, 0.0)),
                    false,
                );
                config.duration = 1.0;
                config.emitter.emit_from = EmitFrom::Shell;
                config.emitter.spherize_direction = 1.0;
                config.emitter.size = ValueRange::new(Vec2::splat(0.5), Vec2::splat(1.5));
                config.emitter.end_size = ValueRange::constant(Vec2::ZERO);
                config.forces.gravity.enabled = true;
                config.forces.gravity.gravity = Vec3::new(0.0, -5.0, 0.0);
                config.forces.drag.enabled = true;
                config.forces.drag.damping = 0.9;
                config
            }
            ParticlePreset::Rain => {
                let mut config = system(
                    EmitterConfig::default()
                        .with_emission_rate(100.0)
                        .with_max_particles(1000)
                        .with_shape(EmitterShape::Box, Vec3::new(20.0, 0.0, 0.0))
                        .with_lifetime(1.7, 2.3)
                        .with_speed(9.0, 11.0)
                        .with_colors(
                            Vec4::new(0.5, 0.5, 1.0, 0.8),
                            Vec4::new(0.5, 0.5, 1.0, 0.5),
                        ),
                    true,
                );
                config.emitter.direction = Vec3::NEG_Y;
                config.emitter.align_to_direction = true;
                config.emitter.size = ValueRange::new(Vec2::new(0.05, 0.3), Vec2::new(0.15, 0.5));
                config.emitter.end_size = config.emitter.size;
                config.forces.gravity.enabled = true;
                config.collision = PlaneCollisionAffector::new(
                    Vec3::new(0.0, -10.0, 0.0),
                    Vec3::Y,
                    CollisionResponse {
                        kill_on_hit: true,
                        ..Default::default()
                    },
                );
                config
            }
            ParticlePreset::Snow => {
                let mut config = system(
                    EmitterConfig::default()
                        .with_emission_rate(50.0)
                        .with_max_particles(500)
                        .with_shape(EmitterShape::Box, Vec3::new(20.0, 0.0, 0.0))
                        .with_lifetime(4.0, 6.0)
                        .with_speed(0.5, 1.5)
                        .with_colors(Vec4::ONE, Vec4::new(1.0, 1.0, 1.0, 0.8)),
                    true,
                );
                config.emitter.direction = Vec3::NEG_Y;
                config.emitter.direction_randomness = 0.3;
                config.emitter.size = ValueRange::new(Vec2::splat(0.1), Vec2::splat(0.3));
                config.emitter.end_size = config.emitter.size;
                config.emitter.angular_velocity = ValueRange::new(-1.0, 1.0);
                config.forces.gravity.enabled = true;
                config.forces.gravity.gravity = Vec3::new(0.0, -1.0, 0.0);
                config.forces.noise.enabled = true;
                config.forces.noise.strength = 0.3;
                config.prewarm = true;
                config.prewarm_time = 3.0;
                config
            }
            ParticlePreset::Magic => {
                let mut config = system(
                    EmitterConfig::default()
                        .with_emission_rate(30.0)
                        .with_max_particles(300)
                        .with_shape(EmitterShape::Sphere, Vec3::splat(0.5))
                        .with_lifetime(1.0, 2.0)
                        .with_speed(0.5, 2.0)
                        .with_colors(Vec4::new(0.5, 0.0, 1.0, 1.0), Vec4::new(0.0, 1.0, 1.0, 0.0)),
                    true,
                );
                config.emitter.spherize_direction = 0.5;
                config.emitter.size = ValueRange::new(Vec2::splat(0.2), Vec2::splat(0.4));
                config.emitter.end_size = ValueRange::constant(Vec2::ZERO);
                config.forces.vortex.enabled = true;
                config.forces.vortex.strength = 3.0;
                config.forces.vortex.radius = 2.0;
                config.forces.attractor.enabled = true;
                config.forces.attractor.strength = 2.0;
                config.forces.attractor.radius = 3.0;
                config
            }
        }
    }
}

fn system(emitter: EmitterConfig, looping: bool) -> ParticleSystemConfig {
    ParticleSystemConfig {
        looping,
        ..ParticleSystemConfig::new(emitter)
    }
}

impl FromStr for ParticlePreset {
    type Err = ParticleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            ParticleError::InvalidConfig(format!("unknown particle preset '{}'", s))
        })
    }
}
