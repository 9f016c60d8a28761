//! CPU 粒子模拟
//!
//! - `particle` - 粒子记录与 GPU 镜像格式
//! - `pool` - 双数组粒子池
//! - `shape` - 发射形状采样
//! - `emitter` - 发射器与发射配置
//! - `affector` - 逐粒子影响器与影响器链
//! - `collision` - 平面碰撞与物理世界碰撞
//! - `system` - 播放控制器
//! - `presets` - 内置效果预设

pub mod affector;
pub mod collision;
pub mod emitter;
pub mod particle;
pub mod pool;
pub mod presets;
pub mod shape;
pub mod system;

pub use affector::{
    Affector, AffectorChain, AnimationMode, AttractorAffector, ColorOverLifetimeAffector,
    GravityAffector, LifetimeAffector, LinearDragAffector, NoiseAffector, RotationAffector,
    SequenceFrameAnimationAffector, SizeOverLifetimeAffector, VelocityAffector, VortexAffector,
};
pub use collision::{
    resolve_physics_collisions, CollisionResponse, CollisionWorld, PhysicsCollisionSettings,
    PhysicsUnits, PlaneCollisionAffector, QueryControl, ShapeHit,
};
pub use emitter::{
    Emitter, EmitterConfig, EmitterTransform, Interpolate, ValueRange, MAX_PARTICLES_LIMIT,
};
pub use particle::{AtlasLayout, GpuParticle, Particle};
pub use pool::ParticlePool;
pub use presets::ParticlePreset;
pub use shape::{EmitFrom, EmitterShape, ShapeParams};
pub use system::{ParticleSystem, ParticleSystemStats, PlayState};
