//! 粒子影响器
//!
//! 影响器是对每个存活粒子独立执行的行为（力、插值、动画），
//! [`AffectorChain`] 按注册顺序每帧执行一次。
//!
//! 内置影响器同时也是配置结构：字段可序列化，`enabled`/`weight`
//! 在重建影响器链时读取。

use super::particle::{safe_normalize, Particle, NORMALIZE_EPSILON};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// 逐粒子影响器
pub trait Affector: Send + Sync {
    /// 影响器名称（用于日志与调试）
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool {
        true
    }

    fn weight(&self) -> f32 {
        1.0
    }

    /// 更新单个粒子
    fn update(&self, particle: &mut Particle, dt: f32);

    /// 批量更新，默认对每个存活粒子调用 `update`
    ///
    /// 链中前面的影响器（如生命周期）本帧杀死的粒子会被跳过。
    fn update_batch(&self, particles: &mut [Particle], dt: f32) {
        for particle in particles.iter_mut().filter(|p| !p.is_dead()) {
            self.update(particle, dt);
        }
    }
}

/// 为带 `enabled`/`weight` 字段的影响器生成访问方法
macro_rules! affector_toggles {
    () => {
        fn enabled(&self) -> bool {
            self.enabled
        }

        fn weight(&self) -> f32 {
            self.weight
        }
    };
}

// ============================================================================
// 生命周期 / 积分 / 旋转
// ============================================================================

/// `age += dt`
#[derive(Debug, Clone, Copy, Default)]
pub struct LifetimeAffector;

impl Affector for LifetimeAffector {
    fn name(&self) -> &'static str {
        "Lifetime"
    }

    fn update(&self, particle: &mut Particle, dt: f32) {
        particle.age += dt;
    }
}

/// `position += velocity * dt`，必须在所有施力影响器之后执行
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityAffector;

impl Affector for VelocityAffector {
    fn name(&self) -> &'static str {
        "Velocity"
    }

    fn update(&self, particle: &mut Particle, dt: f32) {
        particle.position += particle.velocity * dt;
    }
}

/// `rotation += angular_velocity * dt`
#[derive(Debug, Clone, Copy, Default)]
pub struct RotationAffector;

impl Affector for RotationAffector {
    fn name(&self) -> &'static str {
        "Rotation"
    }

    fn update(&self, particle: &mut Particle, dt: f32) {
        particle.rotation += particle.angular_velocity * dt;
    }
}

/// 按归一化年龄在起止颜色之间线性插值
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorOverLifetimeAffector;

impl Affector for ColorOverLifetimeAffector {
    fn name(&self) -> &'static str {
        "ColorOverLifetime"
    }

    fn update(&self, particle: &mut Particle, _dt: f32) {
        let t = particle.normalized_age();
        particle.color = particle.start_color.lerp(particle.end_color, t);
    }
}

/// 按归一化年龄在起止大小之间线性插值
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeOverLifetimeAffector;

impl Affector for SizeOverLifetimeAffector {
    fn name(&self) -> &'static str {
        "SizeOverLifetime"
    }

    fn update(&self, particle: &mut Particle, _dt: f32) {
        let t = particle.normalized_age();
        particle.size = particle.start_size.lerp(particle.end_size, t);
    }
}

// ============================================================================
// 力
// ============================================================================

/// 重力
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GravityAffector {
    pub enabled: bool,
    pub weight: f32,
    pub gravity: Vec3,
}

impl Default for GravityAffector {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

impl GravityAffector {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..Default::default()
        }
    }
}

impl Affector for GravityAffector {
    fn name(&self) -> &'static str {
        "Gravity"
    }

    affector_toggles!();

    fn update(&self, particle: &mut Particle, dt: f32) {
        particle.velocity += self.gravity * dt * self.weight;
    }
}

/// 线性阻尼，以 60 Hz 为参考的帧率无关指数衰减
///
/// 粒子自身的 `drag` 与 `damping` 叠加：`(1 - drag)` 作为额外的每帧保留率。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearDragAffector {
    pub enabled: bool,
    pub weight: f32,
    /// 每个 60 Hz 帧的速度保留率 [0, 1]
    pub damping: f32,
}

impl Default for LinearDragAffector {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            damping: 0.98,
        }
    }
}

impl LinearDragAffector {
    pub fn new(damping: f32) -> Self {
        Self {
            damping,
            ..Default::default()
        }
    }
}

impl Affector for LinearDragAffector {
    fn name(&self) -> &'static str {
        "LinearDrag"
    }

    affector_toggles!();

    fn update(&self, particle: &mut Particle, dt: f32) {
        let exponent = dt * 60.0 * self.weight;
        let mut factor = self.damping.clamp(0.0, 1.0).powf(exponent);
        if particle.drag > 0.0 {
            factor *= (1.0 - particle.drag).clamp(0.0, 1.0).powf(exponent);
        }
        particle.velocity *= factor;
    }
}

/// 漩涡：围绕轴的切向力，半径外为零，越靠近中心越强
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VortexAffector {
    pub enabled: bool,
    pub weight: f32,
    pub center: Vec3,
    pub axis: Vec3,
    pub strength: f32,
    pub radius: f32,
}

impl Default for VortexAffector {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            center: Vec3::ZERO,
            axis: Vec3::Z,
            strength: 5.0,
            radius: 5.0,
        }
    }
}

impl Affector for VortexAffector {
    fn name(&self) -> &'static str {
        "Vortex"
    }

    affector_toggles!();

    fn update(&self, particle: &mut Particle, dt: f32) {
        let to_particle = particle.position - self.center;
        let dist = to_particle.length();
        if dist >= self.radius || dist <= NORMALIZE_EPSILON {
            return;
        }
        let axis = safe_normalize(self.axis, Vec3::Z);
        let tangent = axis.cross(to_particle / dist);
        let force = tangent * self.strength * (1.0 - dist / self.radius);
        particle.velocity += force * particle.inverse_mass() * dt * self.weight;
    }
}

/// 噪声扰动
///
/// 使用三角函数组合出平滑且有界（[-1, 1]）的伪噪声场，不是真正的 Perlin 噪声。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseAffector {
    pub enabled: bool,
    pub weight: f32,
    pub strength: f32,
    pub frequency: f32,
    pub scroll_speed: f32,
}

impl Default for NoiseAffector {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            strength: 1.0,
            frequency: 1.0,
            scroll_speed: 0.5,
        }
    }
}

impl NoiseAffector {
    /// 采样噪声场，每个分量都在 [-1, 1]
    pub fn sample(&self, position: Vec3, age: f32) -> Vec3 {
        let p = position * self.frequency + Vec3::splat(age * self.scroll_speed);
        Vec3::new(
            (p.y * 1.7 + (p.z * 1.3).cos()).sin(),
            (p.z * 1.9 + (p.x * 1.1).cos()).sin(),
            (p.x * 1.5 + (p.y * 1.2).cos()).sin(),
        )
    }
}

impl Affector for NoiseAffector {
    fn name(&self) -> &'static str {
        "Noise"
    }

    affector_toggles!();

    fn update(&self, particle: &mut Particle, dt: f32) {
        let n = self.sample(particle.position, particle.age);
        particle.velocity += n * self.strength * dt * self.weight;
    }
}

/// 吸引点：强度为负时排斥
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttractorAffector {
    pub enabled: bool,
    pub weight: f32,
    pub position: Vec3,
    pub strength: f32,
    pub radius: f32,
    /// 衰减指数
    pub falloff: f32,
}

impl Default for AttractorAffector {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            position: Vec3::ZERO,
            strength: 10.0,
            radius: 10.0,
            falloff: 1.0,
        }
    }
}

impl Affector for AttractorAffector {
    fn name(&self) -> &'static str {
        "Attractor"
    }

    affector_toggles!();

    fn update(&self, particle: &mut Particle, dt: f32) {
        let to_target = self.position - particle.position;
        let dist = to_target.length();
        if dist >= self.radius || dist <= NORMALIZE_EPSILON {
            return;
        }
        let normalized = dist / self.radius;
        let magnitude = self.strength * (1.0 - normalized).powf(self.falloff.max(0.0));
        let force = (to_target / dist) * magnitude;
        particle.velocity += force * particle.inverse_mass() * dt * self.weight;
    }
}

// ============================================================================
// 序列帧动画
// ============================================================================

/// 序列帧播放模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnimationMode {
    /// 按归一化年龄播放 `cycles` 轮
    #[default]
    OverLifetime,
    /// 按固定帧率 `fps` 循环播放
    Fps,
}

/// 根据年龄计算 `texture_index`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceFrameAnimationAffector {
    pub enabled: bool,
    pub weight: f32,
    pub mode: AnimationMode,
    pub cycles: f32,
    pub fps: f32,
    /// 帧数，0 表示使用图集总帧数
    pub frame_count: u32,
    pub start_frame: u32,
}

impl Default for SequenceFrameAnimationAffector {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            mode: AnimationMode::OverLifetime,
            cycles: 1.0,
            fps: 12.0,
            frame_count: 0,
            start_frame: 0,
        }
    }
}

impl SequenceFrameAnimationAffector {
    /// 计算粒子当前帧（相对 `start_frame`）
    pub fn frame_for(&self, particle: &Particle) -> u32 {
        let frames = self.frame_count.max(1);
        let raw = match self.mode {
            AnimationMode::OverLifetime => {
                particle.normalized_age() * self.cycles.max(0.0) * frames as f32
            }
            AnimationMode::Fps => particle.age.max(0.0) * self.fps.max(0.0),
        };
        (raw.floor() as u32) % frames
    }
}

impl Affector for SequenceFrameAnimationAffector {
    fn name(&self) -> &'static str {
        "SequenceFrameAnimation"
    }

    affector_toggles!();

    fn update(&self, particle: &mut Particle, _dt: f32) {
        particle.texture_index = self.start_frame + self.frame_for(particle);
    }
}

// ============================================================================
// 影响器链
// ============================================================================

/// 按注册顺序执行的影响器序列
#[derive(Clone, Default)]
pub struct AffectorChain {
    affectors: Vec<Arc<dyn Affector>>,
}

impl fmt::Debug for AffectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffectorChain")
            .field("affectors", &self.names())
            .finish()
    }
}

impl AffectorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, affector: Arc<dyn Affector>) {
        self.affectors.push(affector);
    }

    /// 链式添加
    pub fn with<A: Affector + 'static>(mut self, affector: A) -> Self {
        self.affectors.push(Arc::new(affector));
        self
    }

    pub fn clear(&mut self) {
        self.affectors.clear();
    }

    pub fn len(&self) -> usize {
        self.affectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.affectors.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.affectors.iter().map(|a| a.name()).collect()
    }

    /// 对所有粒子依次执行每个启用的影响器
    pub fn update_batch(&self, particles: &mut [Particle], dt: f32) {
        for affector in self.affectors.iter().filter(|a| a.enabled()) {
            affector.update_batch(particles, dt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec4};

    fn particle() -> Particle {
        Particle {
            lifetime: 2.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_chain_skips_particles_expired_this_frame() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountVisits(AtomicUsize);
        impl Affector for CountVisits {
            fn name(&self) -> &'static str {
                "CountVisits"
            }
            fn update(&self, _particle: &mut Particle, _dt: f32) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let counter = Arc::new(CountVisits(AtomicUsize::new(0)));
        let mut chain = AffectorChain::new().with(LifetimeAffector);
        chain.push(counter.clone());

        let mut particles = vec![particle(), particle()];
        particles[1].age = 1.95;
        chain.update_batch(&mut particles, 0.1);

        assert!(particles[1].is_dead());
        assert_eq!(counter.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_lifetime_and_velocity() {
        let mut p = particle();
        p.velocity = Vec3::new(1.0, 2.0, 0.0);
        LifetimeAffector.update(&mut p, 0.5);
        VelocityAffector.update(&mut p, 0.5);
        assert_eq!(p.age, 0.5);
        assert_eq!(p.position, Vec3::new(0.5, 1.0, 0.0));
    }

    #[test]
    fn test_gravity_weighted() {
        let mut p = particle();
        let mut gravity = GravityAffector::new(Vec3::new(0.0, -10.0, 0.0));
        gravity.weight = 0.5;
        gravity.update(&mut p, 0.1);
        assert!((p.velocity.y + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_drag_is_frame_rate_independent() {
        let drag = LinearDragAffector::new(0.9);
        let mut a = particle();
        a.velocity = Vec3::X * 10.0;
        let mut b = a;

        drag.update(&mut a, 1.0 / 30.0);
        drag.update(&mut b, 1.0 / 60.0);
        drag.update(&mut b, 1.0 / 60.0);

        assert!((a.velocity.x - b.velocity.x).abs() < 1e-4);
        assert!((a.velocity.x - 10.0 * 0.81).abs() < 1e-3);
    }

    #[test]
    fn test_vortex_tangential_and_bounded() {
        let vortex = VortexAffector {
            strength: 2.0,
            radius: 4.0,
            ..Default::default()
        };
        let mut p = particle();
        p.position = Vec3::new(2.0, 0.0, 0.0);
        vortex.update(&mut p, 1.0);
        // cross(Z, X) = Y，强度 2 * (1 - 0.5)
        assert!((p.velocity - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-5);

        let mut outside = particle();
        outside.position = Vec3::new(5.0, 0.0, 0.0);
        vortex.update(&mut outside, 1.0);
        assert_eq!(outside.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_noise_is_bounded() {
        let noise = NoiseAffector::default();
        for i in 0..100 {
            let pos = Vec3::new(i as f32 * 0.37, i as f32 * -1.3, i as f32 * 2.1);
            let n = noise.sample(pos, i as f32 * 0.1);
            assert!(n.abs().max_element() <= 1.0);
        }
    }

    #[test]
    fn test_attractor_pulls_and_falls_off() {
        let attractor = AttractorAffector {
            position: Vec3::ZERO,
            strength: 4.0,
            radius: 4.0,
            falloff: 2.0,
            ..Default::default()
        };
        let mut p = particle();
        p.position = Vec3::new(2.0, 0.0, 0.0);
        attractor.update(&mut p, 1.0);
        // 4 * (1 - 0.5)^2 = 1，指向原点
        assert!((p.velocity - Vec3::new(-1.0, 0.0, 0.0)).length() < 1e-5);

        let mut far = particle();
        far.position = Vec3::new(10.0, 0.0, 0.0);
        attractor.update(&mut far, 1.0);
        assert_eq!(far.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_color_and_size_over_lifetime() {
        let mut p = particle();
        p.start_color = Vec4::ONE;
        p.end_color = Vec4::ZERO;
        p.start_size = Vec2::splat(2.0);
        p.end_size = Vec2::ZERO;
        p.age = 1.0;
        ColorOverLifetimeAffector.update(&mut p, 0.0);
        SizeOverLifetimeAffector.update(&mut p, 0.0);
        assert_eq!(p.color, Vec4::splat(0.5));
        assert_eq!(p.size, Vec2::ONE);
    }

    #[test]
    fn test_rotation() {
        let mut p = particle();
        p.angular_velocity = 2.0;
        RotationAffector.update(&mut p, 0.25);
        assert_eq!(p.rotation, 0.5);
    }

    #[test]
    fn test_sequence_over_lifetime() {
        let anim = SequenceFrameAnimationAffector {
            frame_count: 4,
            mode: AnimationMode::OverLifetime,
            cycles: 2.0,
            ..Default::default()
        };
        let mut p = particle();
        p.age = 0.5; // t = 0.25 → 0.25 * 2 * 4 = 2
        anim.update(&mut p, 0.0);
        assert_eq!(p.texture_index, 2);
        p.age = 1.5; // t = 0.75 → 6 % 4 = 2
        anim.update(&mut p, 0.0);
        assert_eq!(p.texture_index, 2);
    }

    #[test]
    fn test_sequence_fps_loops() {
        let anim = SequenceFrameAnimationAffector {
            frame_count: 3,
            start_frame: 10,
            mode: AnimationMode::Fps,
            fps: 10.0,
            ..Default::default()
        };
        let mut p = particle();
        p.age = 0.45; // 4 % 3 = 1
        anim.update(&mut p, 0.0);
        assert_eq!(p.texture_index, 11);
    }

    #[test]
    fn test_chain_skips_disabled_and_keeps_order() {
        let mut gravity = GravityAffector::new(Vec3::new(0.0, -1.0, 0.0));
        gravity.enabled = false;
        let chain = AffectorChain::new()
            .with(LifetimeAffector)
            .with(gravity)
            .with(VelocityAffector);
        assert_eq!(chain.names(), vec!["Lifetime", "Gravity", "Velocity"]);

        let mut particles = vec![particle(); 3];
        particles[0].velocity = Vec3::X;
        chain.update_batch(&mut particles, 1.0);
        assert!(particles.iter().all(|p| p.age == 1.0));
        assert_eq!(particles[0].velocity, Vec3::X);
        assert_eq!(particles[0].position, Vec3::X);
    }
}
