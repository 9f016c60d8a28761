//! # Particle Engine
//!
//! CPU particle simulation core for a 2D/3D game engine.
//!
//! ## Features
//!
//! - **Particle Pool**: dense simulation records with an index-aligned GPU mirror
//! - **Emitters**: continuous and burst emission from procedural shapes
//! - **Affectors**: forces, lifetime interpolation and sprite-sheet animation
//! - **Collision**: infinite planes and approximate queries against a Rapier world
//! - **ECS**: bevy_ecs component and update system
//!
//! ### Example
//!
//! ```
//! use particle_engine::particles::{EmitterTransform, ParticlePreset, ParticleSystem};
//!
//! let mut system = ParticleSystem::new(ParticlePreset::Fire.to_config());
//! system.play();
//! system.update(1.0 / 60.0, &EmitterTransform::default(), None);
//! let bytes: &[u8] = bytemuck::cast_slice(system.gpu_data());
//! assert_eq!(bytes.len(), system.particle_count() * 64);
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Error types and shared macros
//! - [`config`]: Configuration loading and logging setup
//! - [`particles`]: Pool, emitter, affectors, collision and the controller
//! - [`physics`]: Rapier-backed collision world
//! - [`ecs`]: bevy_ecs host adapter

/// Error types and shared macros
pub mod core;
/// Configuration files, environment overrides and logging
pub mod config;
/// Particle simulation
pub mod particles;
/// Physics world used for particle collision queries
pub mod physics;
/// bevy_ecs integration
pub mod ecs;

pub use crate::config::{ParticleSystemConfig, RunnerConfig};
pub use crate::core::{ParticleError, ParticleResult};
pub use crate::particles::{
    EmitterConfig, EmitterTransform, ParticlePool, ParticlePreset, ParticleSystem,
};
