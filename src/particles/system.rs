//! 粒子系统控制器
//!
//! 每个实体一个 [`ParticleSystem`]：持有发射器、粒子池和影响器链，
//! 负责播放状态机、预热、循环/持续时间，以及每帧的更新顺序：
//!
//! 1. 发射 → 2. 影响器链 → 3. 平面碰撞 → 4. 物理世界碰撞
//! → 5. 移除死亡粒子 → 6. 同步 GPU 镜像

use super::affector::{
    Affector, AffectorChain, ColorOverLifetimeAffector, LifetimeAffector, RotationAffector,
    SizeOverLifetimeAffector, VelocityAffector,
};
use super::collision::{resolve_physics_collisions, CollisionWorld};
use super::emitter::{Emitter, EmitterTransform, MAX_PARTICLES_LIMIT};
use super::particle::GpuParticle;
use super::pool::ParticlePool;
use crate::config::{ParticleSystemConfig, SimulationSpace};
use crate::core::ParticleResult;
use glam::Vec3;
use std::fmt;
use std::sync::Arc;

/// 预热固定步长
const PREWARM_STEP: f32 = 1.0 / 60.0;

/// 预热最多模拟的时长（秒）
const MAX_PREWARM_TIME: f32 = 300.0;

/// 计算发射器速度时 dt 的下限
const MIN_VELOCITY_DT: f32 = 1e-4;

/// 播放状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// 最近一帧的统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleSystemStats {
    /// 存活粒子数
    pub alive_count: usize,
    /// 累计发射数
    pub total_emitted: u64,
    /// 本帧发射数
    pub frame_emitted: usize,
    /// 本帧移除数
    pub frame_removed: usize,
    /// 本帧碰撞数（平面 + 物理世界）
    pub collisions: usize,
}

/// 粒子系统
pub struct ParticleSystem {
    config: ParticleSystemConfig,
    pool: Option<ParticlePool>,
    emitter: Option<Emitter>,
    affectors: AffectorChain,
    custom_affectors: Vec<Arc<dyn Affector>>,
    state: PlayState,
    system_time: f32,
    config_dirty: bool,
    /// 最近一帧的发射器变换，预热和手动爆发沿用它
    last_transform: EmitterTransform,
    last_position: Option<Vec3>,
    stats: ParticleSystemStats,
}

impl fmt::Debug for ParticleSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("state", &self.state)
            .field("system_time", &self.system_time)
            .field("particles", &self.particle_count())
            .field("affectors", &self.affectors)
            .field("config_dirty", &self.config_dirty)
            .finish()
    }
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(ParticleSystemConfig::default())
    }
}

impl ParticleSystem {
    /// 创建粒子系统；粒子池和发射器在首次 `initialize` 时构建
    pub fn new(config: ParticleSystemConfig) -> Self {
        Self {
            config,
            pool: None,
            emitter: None,
            affectors: AffectorChain::new(),
            custom_affectors: Vec::new(),
            state: PlayState::Stopped,
            system_time: 0.0,
            config_dirty: true,
            last_transform: EmitterTransform::default(),
            last_position: None,
            stats: ParticleSystemStats::default(),
        }
    }

    /// 验证配置后创建
    pub fn try_new(config: ParticleSystemConfig) -> ParticleResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// 构建粒子池/发射器（已存在则刷新配置）并重建影响器链
    pub fn initialize(&mut self) {
        if let Err(e) = self.config.validate() {
            tracing::warn!(target: "particles", "Invalid particle config, values will be clamped: {}", e);
        }

        let capacity = self.config.emitter.max_particles.min(MAX_PARTICLES_LIMIT);
        let atlas = self.config.atlas;
        match self.pool.as_mut() {
            Some(pool) => {
                pool.set_atlas(atlas);
                pool.reserve(capacity);
            }
            None => self.pool = Some(ParticlePool::new(capacity).with_atlas(atlas)),
        }

        let emitter_config = self.config.emitter.clone();
        match self.emitter.as_mut() {
            Some(emitter) => emitter.set_config(emitter_config),
            None => {
                self.emitter = Some(match self.config.seed {
                    Some(seed) => Emitter::with_seed(emitter_config, seed),
                    None => Emitter::new(emitter_config),
                })
            }
        }

        self.affectors = self.build_affector_chain();
        self.config_dirty = false;
        tracing::trace!(
            target: "particles",
            "Rebuilt affector chain: {:?}",
            self.affectors.names()
        );
    }

    /// 按固定顺序从配置开关构建影响器链，自定义影响器追加在末尾
    fn build_affector_chain(&self) -> AffectorChain {
        let forces = &self.config.forces;
        let mut chain = AffectorChain::new().with(LifetimeAffector);
        if forces.gravity.enabled {
            chain.push(Arc::new(forces.gravity));
        }
        if forces.drag.enabled {
            chain.push(Arc::new(forces.drag));
        }
        if forces.vortex.enabled {
            chain.push(Arc::new(forces.vortex));
        }
        if forces.noise.enabled {
            chain.push(Arc::new(forces.noise));
        }
        if forces.attractor.enabled {
            chain.push(Arc::new(forces.attractor));
        }
        let mut chain = chain
            .with(VelocityAffector)
            .with(ColorOverLifetimeAffector)
            .with(SizeOverLifetimeAffector)
            .with(RotationAffector);
        if self.config.animation.enabled {
            let mut animation = self.config.animation;
            if animation.frame_count == 0 {
                animation.frame_count = self.config.atlas.frame_count();
            }
            chain.push(Arc::new(animation));
        }
        for affector in &self.custom_affectors {
            chain.push(Arc::clone(affector));
        }
        chain
    }

    fn ensure_initialized(&mut self) {
        if self.config_dirty || self.pool.is_none() || self.emitter.is_none() {
            self.initialize();
        }
    }

    // ========================================================================
    // 状态机
    // ========================================================================

    /// 开始播放；从暂停恢复时不清空粒子，已在播放时无操作
    pub fn play(&mut self) {
        match self.state {
            PlayState::Playing => return,
            PlayState::Paused => {
                self.state = PlayState::Playing;
                tracing::debug!(target: "particles", "Particle system resumed");
                return;
            }
            PlayState::Stopped => {}
        }

        self.ensure_initialized();
        if let Some(pool) = self.pool.as_mut() {
            pool.clear();
        }
        if let Some(emitter) = self.emitter.as_mut() {
            emitter.reset();
        }
        self.system_time = 0.0;
        self.last_position = None;
        self.stats = ParticleSystemStats {
            total_emitted: self.emitter.as_ref().map_or(0, |e| e.total_emitted()),
            ..Default::default()
        };

        if self.config.prewarm && self.config.prewarm_time > 0.0 {
            self.prewarm();
        }

        self.state = PlayState::Playing;
        tracing::debug!(target: "particles", "Particle system playing");
    }

    /// 以固定步长离线推进 `prewarm_time` 秒；不推进 `system_time`
    fn prewarm(&mut self) {
        let mut prewarm_time = self.config.prewarm_time;
        if prewarm_time > MAX_PREWARM_TIME {
            tracing::warn!(
                target: "particles",
                "Prewarm time {}s clamped to {}s",
                prewarm_time,
                MAX_PREWARM_TIME
            );
            prewarm_time = MAX_PREWARM_TIME;
        }
        let steps = (prewarm_time * 60.0).ceil() as u32;
        let transform = self.last_transform;
        let (Some(pool), Some(emitter)) = (self.pool.as_mut(), self.emitter.as_mut()) else {
            return;
        };

        for _ in 0..steps {
            emitter.update(pool, PREWARM_STEP, transform.position, Vec3::ZERO, transform.scale);
            self.affectors.update_batch(pool.particles_mut(), PREWARM_STEP);
            pool.remove_dead_particles();
        }
        pool.sync_to_gpu();

        self.stats.alive_count = pool.len();
        self.stats.total_emitted = emitter.total_emitted();
        tracing::debug!(
            target: "particles",
            "Prewarmed {} steps, {} particles alive",
            steps,
            pool.len()
        );
    }

    /// 直接放置发射器，不计入位移
    ///
    /// 在 `play` 之前调用时预热粒子生成在此处；播放中调用时
    /// 下一帧不会产生推算速度，局部空间粒子也不会被平移。
    pub fn set_transform(&mut self, transform: &EmitterTransform) {
        self.last_transform = *transform;
        self.last_position = Some(transform.position);
    }

    /// 暂停；仅在播放中有效
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            tracing::debug!(target: "particles", "Particle system paused");
        }
    }

    /// 停止播放，`clear_particles` 为真时同时清空粒子并重置发射器
    pub fn stop(&mut self, clear_particles: bool) {
        if self.state != PlayState::Stopped {
            self.state = PlayState::Stopped;
            self.system_time = 0.0;
            tracing::debug!(
                target: "particles",
                "Particle system stopped (clear_particles = {})",
                clear_particles
            );
        }
        if clear_particles {
            if let Some(pool) = self.pool.as_mut() {
                pool.clear();
            }
            if let Some(emitter) = self.emitter.as_mut() {
                emitter.reset();
            }
            self.stats.alive_count = 0;
        }
    }

    /// 停止并清空后重新播放
    pub fn restart(&mut self) {
        self.stop(true);
        self.play();
    }

    /// 手动爆发，返回实际发射数；GPU 镜像在下一次 `update` 时同步
    pub fn burst(&mut self, count: usize) -> usize {
        self.ensure_initialized();
        let (Some(pool), Some(emitter)) = (self.pool.as_mut(), self.emitter.as_mut()) else {
            return 0;
        };
        let emitted = emitter.burst(pool, count);
        if emitted < count {
            tracing::warn!(
                target: "particles",
                "Burst of {} clamped to {} by max_particles",
                count,
                emitted
            );
        }
        self.stats.alive_count = pool.len();
        self.stats.total_emitted = emitter.total_emitted();
        emitted
    }

    /// 推进一帧，仅在播放中生效
    ///
    /// `transform.velocity` 为零时，发射器速度由两帧位置差推算。
    /// `world` 为 None 时跳过物理世界碰撞。
    pub fn update(
        &mut self,
        dt: f32,
        transform: &EmitterTransform,
        world: Option<&dyn CollisionWorld>,
    ) {
        if self.state != PlayState::Playing {
            return;
        }
        self.ensure_initialized();

        let dt = dt * self.config.simulation_speed.max(0.0);
        if dt.is_nan() || dt <= 0.0 {
            return;
        }

        // 持续时间：循环时相位回绕，否则停止发射
        self.system_time += dt;
        let mut emitting = true;
        if self.system_time >= self.config.duration {
            if self.config.looping {
                self.system_time = if self.config.duration > 0.0 {
                    self.system_time % self.config.duration
                } else {
                    0.0
                };
            } else {
                emitting = false;
            }
        }

        let delta = self
            .last_position
            .replace(transform.position)
            .map_or(Vec3::ZERO, |previous| transform.position - previous);
        let velocity = if transform.velocity != Vec3::ZERO {
            transform.velocity
        } else {
            delta / dt.max(MIN_VELOCITY_DT)
        };
        self.last_transform = EmitterTransform {
            velocity,
            ..*transform
        };

        let (Some(pool), Some(emitter)) = (self.pool.as_mut(), self.emitter.as_mut()) else {
            return;
        };

        // 局部空间：先平移已有粒子再发射，本帧新粒子已在当前位置，不能再平移一次
        if self.config.simulation_space == SimulationSpace::Local && delta != Vec3::ZERO {
            for particle in pool.particles_mut() {
                particle.position += delta;
            }
        }

        // 停止发射时以 dt = 0 调用，只刷新发射器变换
        let emit_dt = if emitting { dt } else { 0.0 };
        let frame_emitted =
            emitter.update(pool, emit_dt, transform.position, velocity, transform.scale);

        self.affectors.update_batch(pool.particles_mut(), dt);

        let mut collisions = 0;
        if self.config.collision.enabled {
            collisions += self.config.collision.collide_all(pool.particles_mut());
        }
        if self.config.physics_collision.enabled {
            if let Some(world) = world {
                collisions += resolve_physics_collisions(
                    pool.particles_mut(),
                    world,
                    &self.config.physics_collision,
                );
            }
        }

        let frame_removed = pool.remove_dead_particles();
        pool.sync_to_gpu();

        self.stats = ParticleSystemStats {
            alive_count: pool.len(),
            total_emitted: emitter.total_emitted(),
            frame_emitted,
            frame_removed,
            collisions,
        };

        if !emitting && pool.is_empty() {
            self.state = PlayState::Stopped;
            tracing::debug!(
                target: "particles",
                "Particle system completed after {:.2}s",
                self.system_time
            );
        }
    }

    /// 非循环、已超过持续时间且没有存活粒子
    pub fn is_complete(&self) -> bool {
        !self.config.looping
            && self.system_time >= self.config.duration
            && self.particle_count() == 0
    }

    // ========================================================================
    // 访问器
    // ========================================================================

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn system_time(&self) -> f32 {
        self.system_time
    }

    pub fn config(&self) -> &ParticleSystemConfig {
        &self.config
    }

    /// 可变访问配置，下一次更新前会重新初始化
    pub fn config_mut(&mut self) -> &mut ParticleSystemConfig {
        self.config_dirty = true;
        &mut self.config
    }

    /// 替换配置；已有粒子不受影响
    pub fn set_config(&mut self, config: ParticleSystemConfig) {
        self.config = config;
        self.config_dirty = true;
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }

    /// 注册自定义影响器，追加在内置影响器之后
    pub fn add_custom_affector(&mut self, affector: Arc<dyn Affector>) {
        self.custom_affectors.push(affector);
        self.config_dirty = true;
    }

    pub fn affector_chain(&self) -> &AffectorChain {
        &self.affectors
    }

    pub fn stats(&self) -> &ParticleSystemStats {
        &self.stats
    }

    pub fn pool(&self) -> Option<&ParticlePool> {
        self.pool.as_ref()
    }

    pub fn emitter(&self) -> Option<&Emitter> {
        self.emitter.as_ref()
    }

    pub fn particle_count(&self) -> usize {
        self.pool.as_ref().map_or(0, ParticlePool::len)
    }

    /// 渲染数据；未初始化时为空
    pub fn gpu_data(&self) -> &[GpuParticle] {
        match &self.pool {
            Some(pool) => pool.gpu_data(),
            None => &[],
        }
    }
}
