//! 粒子碰撞
//!
//! - 平面碰撞：对无限平面做反射 + 摩擦响应
//! - 物理世界碰撞：通过 [`CollisionWorld`] 查询外部刚体世界的 AABB 重叠，
//!   用 AABB 中心近似法线。只用于视觉效果，不追求精确接触流形。

use super::affector::Affector;
use super::particle::{safe_normalize, Particle, FALLBACK_DIRECTION};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// 碰撞响应参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionResponse {
    /// 法向反弹系数
    pub bounciness: f32,
    /// 切向摩擦 [0, 1]
    pub friction: f32,
    /// 碰撞即死亡
    pub kill_on_hit: bool,
}

impl Default for CollisionResponse {
    fn default() -> Self {
        Self {
            bounciness: 0.5,
            friction: 0.1,
            kill_on_hit: false,
        }
    }
}

impl CollisionResponse {
    /// 按法线修正速度：法向分量指向表面内部时，
    /// `v = 切向 * (1 - friction) - 法向 * bounciness`
    pub fn apply_velocity(&self, particle: &mut Particle, normal: Vec3) {
        let vn = particle.velocity.dot(normal);
        if vn < 0.0 {
            let normal_component = normal * vn;
            let tangential = particle.velocity - normal_component;
            particle.velocity =
                tangential * (1.0 - self.friction) - normal_component * self.bounciness;
        }
    }
}

// ============================================================================
// 平面碰撞
// ============================================================================

/// 无限平面碰撞，既可作为影响器也由粒子系统内联调用
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneCollisionAffector {
    pub enabled: bool,
    pub weight: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub response: CollisionResponse,
}

impl Default for PlaneCollisionAffector {
    fn default() -> Self {
        Self {
            enabled: false,
            weight: 1.0,
            point: Vec3::ZERO,
            normal: Vec3::Y,
            response: CollisionResponse::default(),
        }
    }
}

impl PlaneCollisionAffector {
    pub fn new(point: Vec3, normal: Vec3, response: CollisionResponse) -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            point,
            normal,
            response,
        }
    }

    /// 处理单个粒子，返回是否发生碰撞
    pub fn collide(&self, particle: &mut Particle) -> bool {
        let normal = safe_normalize(self.normal, FALLBACK_DIRECTION);
        let distance = (particle.position - self.point).dot(normal);
        if distance >= 0.0 {
            return false;
        }
        if self.response.kill_on_hit {
            particle.kill();
            return true;
        }
        // 投影回平面
        particle.position -= normal * distance;
        self.response.apply_velocity(particle, normal);
        true
    }

    /// 处理全部粒子，返回碰撞数量
    pub fn collide_all(&self, particles: &mut [Particle]) -> usize {
        particles
            .iter_mut()
            .filter(|p| !p.is_dead())
            .map(|p| self.collide(p))
            .filter(|&hit| hit)
            .count()
    }
}

impl Affector for PlaneCollisionAffector {
    fn name(&self) -> &'static str {
        "PlaneCollision"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn update(&self, particle: &mut Particle, _dt: f32) {
        self.collide(particle);
    }
}

// ============================================================================
// 物理世界碰撞
// ============================================================================

/// 查询回调的返回值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryControl {
    Continue,
    Stop,
}

/// 查询到的形状（物理世界坐标）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeHit {
    pub body_position: Vec2,
    pub aabb_min: Vec2,
    pub aabb_max: Vec2,
    pub is_sensor: bool,
}

impl ShapeHit {
    pub fn aabb_center(&self) -> Vec2 {
        (self.aabb_min + self.aabb_max) * 0.5
    }

    pub fn aabb_half_extents(&self) -> Vec2 {
        (self.aabb_max - self.aabb_min) * 0.5
    }
}

/// 外部物理世界的查询能力
///
/// 对与 `[min, max]` 相交的每个形状调用 `visitor`，返回
/// [`QueryControl::Stop`] 时提前结束查询。调用是同步的。
pub trait CollisionWorld {
    fn query_aabb(
        &self,
        min: Vec2,
        max: Vec2,
        visitor: &mut dyn FnMut(&ShapeHit) -> QueryControl,
    );
}

/// 粒子坐标到物理世界坐标的单位/轴换算
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsUnits {
    /// 每米对应的粒子空间单位数
    pub pixels_per_meter: f32,
    /// 物理世界 Y 轴方向相反
    pub flip_y: bool,
}

impl Default for PhysicsUnits {
    fn default() -> Self {
        Self {
            pixels_per_meter: 1.0,
            flip_y: false,
        }
    }
}

impl PhysicsUnits {
    fn scale(&self) -> f32 {
        if self.pixels_per_meter > 0.0 {
            self.pixels_per_meter
        } else {
            1.0
        }
    }

    fn axis(&self) -> Vec2 {
        Vec2::new(1.0, if self.flip_y { -1.0 } else { 1.0 })
    }

    pub fn to_physics(&self, position: Vec3) -> Vec2 {
        position.truncate() * self.axis() / self.scale()
    }

    pub fn from_physics(&self, position: Vec2) -> Vec2 {
        position * self.axis() * self.scale()
    }

    pub fn length_to_physics(&self, length: f32) -> f32 {
        length / self.scale()
    }

    /// 方向只做轴换算
    pub fn direction_from_physics(&self, direction: Vec2) -> Vec3 {
        (direction * self.axis()).extend(0.0)
    }
}

/// 物理世界碰撞设置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsCollisionSettings {
    pub enabled: bool,
    /// 粒子碰撞半径（粒子空间单位）
    pub particle_radius: f32,
    pub response: CollisionResponse,
    pub units: PhysicsUnits,
}

impl Default for PhysicsCollisionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            particle_radius: 0.1,
            response: CollisionResponse::default(),
            units: PhysicsUnits::default(),
        }
    }
}

/// 对全部存活粒子执行物理世界碰撞，返回碰撞数量
///
/// 每个粒子一次 AABB 查询，取第一个非传感器形状。
pub fn resolve_physics_collisions(
    particles: &mut [Particle],
    world: &dyn CollisionWorld,
    settings: &PhysicsCollisionSettings,
) -> usize {
    let units = settings.units;
    let radius = units.length_to_physics(settings.particle_radius.max(0.0));
    let extent = Vec2::splat(radius);
    let fallback = units.to_physics(FALLBACK_DIRECTION).normalize_or_zero();
    let mut collisions = 0;

    for particle in particles.iter_mut().filter(|p| !p.is_dead()) {
        let center = units.to_physics(particle.position);
        let mut first_hit = None;
        world.query_aabb(center - extent, center + extent, &mut |hit: &ShapeHit| {
            if hit.is_sensor {
                return QueryControl::Continue;
            }
            first_hit = Some(*hit);
            QueryControl::Stop
        });

        let Some(hit) = first_hit else {
            continue;
        };
        collisions += 1;

        if settings.response.kill_on_hit {
            particle.kill();
            continue;
        }

        // 以命中形状 AABB 中心到粒子的偏移近似法线
        let offset = center - hit.aabb_center();
        let normal = offset.try_normalize().unwrap_or(fallback);

        // 沿法线推出到 AABB 支撑距离之外
        let half = hit.aabb_half_extents();
        let support = normal.x.abs() * half.x + normal.y.abs() * half.y + radius;
        let along = offset.dot(normal);
        if along < support {
            let pushed = center + normal * (support - along);
            let world_xy = units.from_physics(pushed);
            particle.position.x = world_xy.x;
            particle.position.y = world_xy.y;
        }

        let world_normal = units.direction_from_physics(normal);
        settings.response.apply_velocity(particle, world_normal);
    }

    collisions
}
