//! 粒子发射器
//!
//! 把声明式的 [`EmitterConfig`] 与流逝时间转换为粒子池中的新粒子：
//! - 连续发射：按 `emission_rate * dt` 累积小数计数
//! - 周期爆发：独立计时器，到达 `burst_interval` 时一次性发射
//! - 形状采样：见 [`shape`](super::shape)

use super::particle::{safe_normalize, Particle, FALLBACK_DIRECTION};
use super::pool::ParticlePool;
use super::shape::{blend_direction, random_unit_vector, sample_shape, EmitFrom, EmitterShape, ShapeParams};
use crate::config::{ConfigError, ConfigResult};
use glam::{Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 单个发射器允许的最大粒子数
pub const MAX_PARTICLES_LIMIT: usize = 1_000_000;

// ============================================================================
// 取值范围
// ============================================================================

/// 可线性插值的通道值
pub trait Interpolate: Copy + PartialEq {
    fn interpolate(min: Self, max: Self, t: f32) -> Self;
    fn is_finite_value(&self) -> bool;
}

impl Interpolate for f32 {
    fn interpolate(min: Self, max: Self, t: f32) -> Self {
        min + (max - min) * t
    }
    fn is_finite_value(&self) -> bool {
        self.is_finite()
    }
}

macro_rules! impl_interpolate_vec {
    ($($ty:ty),*) => {
        $(
            impl Interpolate for $ty {
                fn interpolate(min: Self, max: Self, t: f32) -> Self {
                    min.lerp(max, t)
                }
                fn is_finite_value(&self) -> bool {
                    self.is_finite()
                }
            }
        )*
    };
}

impl_interpolate_vec!(Vec2, Vec3, Vec4);

/// 生成时采样的 `[min, max]` 范围
///
/// 向量通道使用同一个 `t` 在 `min → max` 线段上插值，`min > max` 时同样有效。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange<T> {
    pub min: T,
    pub max: T,
}

impl<T: Interpolate> ValueRange<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn constant(value: T) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        if self.min == self.max {
            return self.min;
        }
        T::interpolate(self.min, self.max, rng.gen::<f32>())
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite_value() && self.max.is_finite_value()
    }
}

// ============================================================================
// 发射器配置
// ============================================================================

/// 发射器配置，每帧内不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// 每秒发射数量
    pub emission_rate: f32,
    /// 最大粒子数
    pub max_particles: usize,
    /// 每次爆发的粒子数（0 = 关闭周期爆发）
    pub burst_count: u32,
    /// 爆发间隔（秒，<= 0 = 关闭周期爆发）
    pub burst_interval: f32,

    /// 发射形状
    pub shape: EmitterShape,
    /// 形状尺寸，含义见 [`EmitterShape`]
    pub shape_size: Vec3,
    /// 圆锥半角（度）
    pub cone_angle: f32,
    pub emit_from: EmitFrom,

    /// 基础方向
    pub direction: Vec3,
    /// 基础方向与外法线的混合系数 [0, 1]
    pub spherize_direction: f32,
    /// 向完全随机方向混合的系数 [0, 1]
    pub randomize_direction: f32,
    /// 旧版随机方向系数，与 `randomize_direction` 叠加
    pub direction_randomness: f32,
    /// 旋转对齐到发射方向
    pub align_to_direction: bool,
    /// 继承发射器速度的倍率
    pub inherit_velocity_multiplier: f32,

    pub lifetime: ValueRange<f32>,
    pub speed: ValueRange<f32>,
    pub rotation: ValueRange<f32>,
    pub angular_velocity: ValueRange<f32>,
    pub size: ValueRange<Vec2>,
    pub end_size: ValueRange<Vec2>,
    pub start_color: ValueRange<Vec4>,
    pub end_color: ValueRange<Vec4>,
    pub mass: ValueRange<f32>,
    pub drag: ValueRange<f32>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            emission_rate: 10.0,
            max_particles: 1000,
            burst_count: 0,
            burst_interval: 0.0,
            shape: EmitterShape::Point,
            shape_size: Vec3::ONE,
            cone_angle: 25.0,
            emit_from: EmitFrom::Volume,
            direction: Vec3::Y,
            spherize_direction: 0.0,
            randomize_direction: 0.0,
            direction_randomness: 0.0,
            align_to_direction: false,
            inherit_velocity_multiplier: 0.0,
            lifetime: ValueRange::new(1.0, 2.0),
            speed: ValueRange::new(1.0, 2.0),
            rotation: ValueRange::constant(0.0),
            angular_velocity: ValueRange::constant(0.0),
            size: ValueRange::constant(Vec2::ONE),
            end_size: ValueRange::constant(Vec2::ONE),
            start_color: ValueRange::constant(Vec4::ONE),
            end_color: ValueRange::constant(Vec4::new(1.0, 1.0, 1.0, 0.0)),
            mass: ValueRange::constant(1.0),
            drag: ValueRange::constant(0.0),
        }
    }
}

impl EmitterConfig {
    /// 设置发射速率
    pub fn with_emission_rate(mut self, rate: f32) -> Self {
        self.emission_rate = rate;
        self
    }

    pub fn with_max_particles(mut self, max_particles: usize) -> Self {
        self.max_particles = max_particles;
        self
    }

    /// 设置发射形状及尺寸
    pub fn with_shape(mut self, shape: EmitterShape, size: Vec3) -> Self {
        self.shape = shape;
        self.shape_size = size;
        self
    }

    /// 设置生命周期
    pub fn with_lifetime(mut self, min: f32, max: f32) -> Self {
        self.lifetime = ValueRange::new(min, max);
        self
    }

    pub fn with_speed(mut self, min: f32, max: f32) -> Self {
        self.speed = ValueRange::new(min, max);
        self
    }

    /// 设置颜色
    pub fn with_colors(mut self, start: Vec4, end: Vec4) -> Self {
        self.start_color = ValueRange::constant(start);
        self.end_color = ValueRange::constant(end);
        self
    }

    pub fn with_burst(mut self, count: u32, interval: f32) -> Self {
        self.burst_count = count;
        self.burst_interval = interval;
        self
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.emission_rate.is_finite() || self.emission_rate < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "emission_rate must be finite and >= 0, got {}",
                self.emission_rate
            )));
        }
        if self.max_particles > MAX_PARTICLES_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_particles {} exceeds limit {}",
                self.max_particles, MAX_PARTICLES_LIMIT
            )));
        }
        if !self.burst_interval.is_finite() || self.burst_interval < 0.0 {
            return Err(ConfigError::ValidationError(
                "burst_interval must be finite and >= 0".to_string(),
            ));
        }
        if !self.shape_size.is_finite() || !self.direction.is_finite() {
            return Err(ConfigError::ValidationError(
                "shape_size and direction must be finite".to_string(),
            ));
        }
        for (name, value) in [
            ("spherize_direction", self.spherize_direction),
            ("randomize_direction", self.randomize_direction),
            ("direction_randomness", self.direction_randomness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        let scalar_ranges = [
            ("lifetime", &self.lifetime),
            ("speed", &self.speed),
            ("rotation", &self.rotation),
            ("angular_velocity", &self.angular_velocity),
            ("mass", &self.mass),
            ("drag", &self.drag),
        ];
        for (name, range) in scalar_ranges {
            if !range.is_finite() {
                return Err(ConfigError::ValidationError(format!(
                    "{name} range must be finite"
                )));
            }
        }
        if !self.size.is_finite()
            || !self.end_size.is_finite()
            || !self.start_color.is_finite()
            || !self.end_color.is_finite()
        {
            return Err(ConfigError::ValidationError(
                "size and color ranges must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn shape_params(&self) -> ShapeParams {
        ShapeParams {
            shape: self.shape,
            size: self.shape_size,
            cone_angle: self.cone_angle,
            emit_from: self.emit_from,
            direction: self.direction,
            spherize: self.spherize_direction,
        }
    }
}

// ============================================================================
// 发射器
// ============================================================================

/// 发射器所在的世界变换，由宿主每帧提供
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmitterTransform {
    pub position: Vec3,
    pub velocity: Vec3,
    /// 仅 xy 参与缩放
    pub scale: Vec2,
}

impl Default for EmitterTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            scale: Vec2::ONE,
        }
    }
}

/// 粒子发射器
#[derive(Debug, Clone)]
pub struct Emitter {
    config: EmitterConfig,
    /// 连续发射的小数累积
    emission_accumulator: f32,
    /// 周期爆发计时
    burst_timer: f32,
    /// 最近一次 `update` 的变换，供手动爆发使用
    last_transform: EmitterTransform,
    rng: StdRng,
    total_emitted: u64,
}

impl Emitter {
    /// 使用熵源随机种子创建
    pub fn new(config: EmitterConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// 使用固定种子创建，序列可复现
    pub fn with_seed(config: EmitterConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: EmitterConfig, rng: StdRng) -> Self {
        Self {
            config,
            emission_accumulator: 0.0,
            burst_timer: 0.0,
            last_transform: EmitterTransform::default(),
            rng,
            total_emitted: 0,
        }
    }

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// 替换配置；已发射的粒子不受影响
    pub fn set_config(&mut self, config: EmitterConfig) {
        self.config = config;
    }

    pub fn emission_accumulator(&self) -> f32 {
        self.emission_accumulator
    }

    pub fn burst_timer(&self) -> f32 {
        self.burst_timer
    }

    pub fn total_emitted(&self) -> u64 {
        self.total_emitted
    }

    /// 推进发射器，返回本帧发射的粒子数
    pub fn update(
        &mut self,
        pool: &mut ParticlePool,
        dt: f32,
        world_position: Vec3,
        world_velocity: Vec3,
        world_scale: Vec2,
    ) -> usize {
        self.last_transform = EmitterTransform {
            position: world_position,
            velocity: world_velocity,
            scale: world_scale,
        };
        if dt.is_nan() || dt <= 0.0 {
            return 0;
        }

        let mut emitted = 0;
        let max = self.config.max_particles;

        self.emission_accumulator += self.config.emission_rate.max(0.0) * dt;
        while self.emission_accumulator >= 1.0 && pool.len() < max {
            self.spawn(pool);
            self.emission_accumulator -= 1.0;
            emitted += 1;
        }
        // 容量已满时丢弃整数部分，避免腾出空位后集中补发
        if self.emission_accumulator >= 1.0 {
            self.emission_accumulator = self.emission_accumulator.fract();
        }

        if self.config.burst_count > 0 && self.config.burst_interval > 0.0 {
            self.burst_timer += dt;
            if self.burst_timer >= self.config.burst_interval {
                emitted += self.burst(pool, self.config.burst_count as usize);
                self.burst_timer = 0.0;
            }
        }

        emitted
    }

    /// 立即发射 `count` 个粒子，受 `max_particles` 限制；返回实际发射数
    pub fn burst(&mut self, pool: &mut ParticlePool, count: usize) -> usize {
        let available = self.config.max_particles.saturating_sub(pool.len());
        let count = count.min(available);
        for _ in 0..count {
            self.spawn(pool);
        }
        count
    }

    /// 清零发射累积和爆发计时
    pub fn reset(&mut self) {
        self.emission_accumulator = 0.0;
        self.burst_timer = 0.0;
    }

    /// 采样局部空间的生成位置和方向
    pub fn spawn_position_and_direction(&mut self) -> (Vec3, Vec3) {
        let (position, mut direction) = sample_shape(&self.config.shape_params(), &mut self.rng);
        for factor in [self.config.randomize_direction, self.config.direction_randomness] {
            if factor > 0.0 {
                let random = random_unit_vector(&mut self.rng);
                direction = blend_direction(direction, random, factor);
            }
        }
        (position, safe_normalize(direction, FALLBACK_DIRECTION))
    }

    fn spawn(&mut self, pool: &mut ParticlePool) {
        let transform = self.last_transform;
        let (local_position, direction) = self.spawn_position_and_direction();
        let particle = self.sample_particle(&transform, local_position, direction);
        *pool.emit() = particle;
        self.total_emitted += 1;
    }

    fn sample_particle(
        &mut self,
        transform: &EmitterTransform,
        local_position: Vec3,
        direction: Vec3,
    ) -> Particle {
        let config = &self.config;
        let rng = &mut self.rng;
        let scale = transform.scale;

        let speed = config.speed.sample(rng);
        let rotation = if config.align_to_direction {
            direction.y.atan2(direction.x)
        } else {
            config.rotation.sample(rng)
        };
        let start_size = config.size.sample(rng) * scale;
        let end_size = config.end_size.sample(rng) * scale;
        let start_color = config.start_color.sample(rng);
        let end_color = config.end_color.sample(rng);

        Particle {
            position: transform.position
                + local_position * Vec3::new(scale.x, scale.y, 1.0),
            velocity: direction * speed
                + transform.velocity * config.inherit_velocity_multiplier,
            age: 0.0,
            lifetime: config.lifetime.sample(rng),
            rotation,
            angular_velocity: config.angular_velocity.sample(rng),
            color: start_color,
            start_color,
            end_color,
            size: start_size,
            start_size,
            end_size,
            texture_index: 0,
            mass: config.mass.sample(rng),
            drag: config.drag.sample(rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitter(config: EmitterConfig) -> Emitter {
        Emitter::with_seed(config, 42)
    }

    fn step(emitter: &mut Emitter, pool: &mut ParticlePool, dt: f32) -> usize {
        emitter.update(pool, dt, Vec3::ZERO, Vec3::ZERO, Vec2::ONE)
    }

    #[test]
    fn test_value_range_constant() {
        let mut rng = StdRng::seed_from_u64(0);
        let range = ValueRange::constant(3.0f32);
        assert_eq!(range.sample(&mut rng), 3.0);
    }

    #[test]
    fn test_value_range_reversed_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let range = ValueRange::new(5.0f32, 1.0);
        for _ in 0..100 {
            let v = range.sample(&mut rng);
            assert!((1.0..=5.0).contains(&v));
        }
    }

    #[test]
    fn test_continuous_emission_accumulates() {
        let mut e = emitter(EmitterConfig::default().with_emission_rate(4.0));
        let mut pool = ParticlePool::new(16);
        // 0.25 秒应该发射 1 个粒子
        assert_eq!(step(&mut e, &mut pool, 0.25), 1);
        // 0.125 秒只累积一半
        assert_eq!(step(&mut e, &mut pool, 0.125), 0);
        assert_eq!(step(&mut e, &mut pool, 0.125), 1);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_emission_respects_max_particles() {
        let config = EmitterConfig::default()
            .with_emission_rate(1000.0)
            .with_max_particles(5)
            .with_lifetime(100.0, 100.0);
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(5);
        step(&mut e, &mut pool, 1.0);
        assert_eq!(pool.len(), 5);
        assert!(e.emission_accumulator() < 1.0);
    }

    #[test]
    fn test_zero_max_particles_emits_nothing() {
        let config = EmitterConfig::default()
            .with_emission_rate(1000.0)
            .with_max_particles(0);
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(0);
        assert_eq!(step(&mut e, &mut pool, 1.0), 0);
        assert_eq!(e.burst(&mut pool, 10), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_periodic_burst() {
        let config = EmitterConfig::default()
            .with_emission_rate(0.0)
            .with_burst(8, 0.5);
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(16);
        step(&mut e, &mut pool, 0.25);
        assert_eq!(pool.len(), 0);
        step(&mut e, &mut pool, 0.25);
        assert_eq!(pool.len(), 8);
        assert_eq!(e.burst_timer(), 0.0);
    }

    #[test]
    fn test_manual_burst_clamped() {
        let config = EmitterConfig::default().with_max_particles(10);
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(10);
        assert_eq!(e.burst(&mut pool, 7), 7);
        assert_eq!(e.burst(&mut pool, 7), 3);
        assert_eq!(pool.len(), 10);
        assert_eq!(e.total_emitted(), 10);
    }

    #[test]
    fn test_reset_clears_accumulators() {
        let config = EmitterConfig::default()
            .with_emission_rate(1.5)
            .with_burst(1, 10.0);
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(4);
        step(&mut e, &mut pool, 0.5);
        assert!(e.emission_accumulator() > 0.0);
        assert!(e.burst_timer() > 0.0);
        e.reset();
        assert_eq!(e.emission_accumulator(), 0.0);
        assert_eq!(e.burst_timer(), 0.0);
    }

    #[test]
    fn test_spawn_applies_world_transform() {
        let mut config = EmitterConfig::default().with_speed(2.0, 2.0);
        config.size = ValueRange::constant(Vec2::new(1.0, 2.0));
        config.end_size = ValueRange::constant(Vec2::new(0.5, 0.5));
        config.inherit_velocity_multiplier = 0.5;
        config.direction = Vec3::X;
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(1);
        e.update(
            &mut pool,
            0.0,
            Vec3::new(10.0, 5.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
            Vec2::new(2.0, 3.0),
        );
        e.burst(&mut pool, 1);

        let p = pool.particles()[0];
        assert_eq!(p.position, Vec3::new(10.0, 5.0, 0.0));
        assert_eq!(p.velocity, Vec3::new(2.0, 2.0, 0.0));
        assert_eq!(p.start_size, Vec2::new(2.0, 6.0));
        assert_eq!(p.size, p.start_size);
        assert_eq!(p.end_size, Vec2::new(1.0, 1.5));
        assert_eq!(p.age, 0.0);
    }

    #[test]
    fn test_align_to_direction_overrides_rotation() {
        let mut config = EmitterConfig::default();
        config.direction = Vec3::Y;
        config.rotation = ValueRange::new(1.0, 2.0);
        config.align_to_direction = true;
        let mut e = emitter(config);
        let mut pool = ParticlePool::new(1);
        e.burst(&mut pool, 1);
        let rotation = pool.particles()[0].rotation;
        assert!((rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_randomize_direction_still_unit() {
        let mut config = EmitterConfig::default();
        config.randomize_direction = 0.7;
        config.direction_randomness = 0.3;
        let mut e = emitter(config);
        let mut seen_off_axis = false;
        for _ in 0..100 {
            let (_, dir) = e.spawn_position_and_direction();
            assert!((dir.length() - 1.0).abs() < 1e-4);
            if (dir - Vec3::Y).length() > 1e-3 {
                seen_off_axis = true;
            }
        }
        assert!(seen_off_axis);
    }

    #[test]
    fn test_validate() {
        assert!(EmitterConfig::default().validate().is_ok());

        let bad = EmitterConfig::default().with_emission_rate(-1.0);
        assert!(bad.validate().is_err());

        let mut bad = EmitterConfig::default();
        bad.spherize_direction = 2.0;
        assert!(bad.validate().is_err());

        let bad = EmitterConfig::default().with_lifetime(f32::NAN, 1.0);
        assert!(bad.validate().is_err());
    }
}
