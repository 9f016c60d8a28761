//! 粒子记录与 GPU 镜像结构
//!
//! [`Particle`] 是模拟用的值类型，[`GpuParticle`] 是渲染端读取的派生数据，
//! 两者在 [`ParticlePool`](super::ParticlePool) 中按索引一一对应。

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// 零长度向量归一化时使用的后备方向（向下）
pub const FALLBACK_DIRECTION: Vec3 = Vec3::NEG_Y;

/// 归一化长度低于该值时视为零向量
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// 安全归一化：长度过小或非有限时返回 `fallback`
#[inline]
pub fn safe_normalize(v: Vec3, fallback: Vec3) -> Vec3 {
    let len = v.length();
    if len > NORMALIZE_EPSILON && len.is_finite() {
        v / len
    } else {
        fallback
    }
}

// ============================================================================
// 模拟粒子
// ============================================================================

/// 单个粒子的运动学与外观状态
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// 已存活时间（秒）
    pub age: f32,
    /// 总寿命（秒）
    pub lifetime: f32,
    /// 旋转（弧度）
    pub rotation: f32,
    /// 角速度（弧度/秒）
    pub angular_velocity: f32,
    pub color: Vec4,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub size: Vec2,
    pub start_size: Vec2,
    pub end_size: Vec2,
    /// 图集帧索引
    pub texture_index: u32,
    pub mass: f32,
    pub drag: f32,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            age: 0.0,
            lifetime: 1.0,
            rotation: 0.0,
            angular_velocity: 0.0,
            color: Vec4::ONE,
            start_color: Vec4::ONE,
            end_color: Vec4::ONE,
            size: Vec2::ONE,
            start_size: Vec2::ONE,
            end_size: Vec2::ONE,
            texture_index: 0,
            mass: 1.0,
            drag: 0.0,
        }
    }
}

impl Particle {
    /// `age >= lifetime` 即死亡；寿命非正的粒子在生成当帧即死亡
    #[inline]
    pub fn is_dead(&self) -> bool {
        self.age >= self.lifetime
    }

    /// 归一化年龄，范围 [0, 1]
    #[inline]
    pub fn normalized_age(&self) -> f32 {
        if self.lifetime <= 0.0 {
            return 1.0;
        }
        (self.age / self.lifetime).clamp(0.0, 1.0)
    }

    /// 立即标记为死亡，下一次 `remove_dead_particles` 时移除
    #[inline]
    pub fn kill(&mut self) {
        self.age = self.age.max(self.lifetime);
    }

    /// 质量的倒数，质量过小时按 1 处理
    #[inline]
    pub(crate) fn inverse_mass(&self) -> f32 {
        if self.mass > NORMALIZE_EPSILON {
            1.0 / self.mass
        } else {
            1.0
        }
    }
}

// ============================================================================
// 纹理图集
// ============================================================================

/// 序列帧图集布局（列 × 行）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasLayout {
    pub columns: u32,
    pub rows: u32,
}

impl Default for AtlasLayout {
    fn default() -> Self {
        Self { columns: 1, rows: 1 }
    }
}

impl AtlasLayout {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// 图集总帧数，至少为 1
    pub fn frame_count(&self) -> u32 {
        self.columns.max(1).saturating_mul(self.rows.max(1))
    }

    /// 计算帧的 UV 偏移和缩放，索引按总帧数取模
    pub fn frame_uv(&self, index: u32) -> (Vec2, Vec2) {
        let columns = self.columns.max(1);
        let rows = self.rows.max(1);
        let frame = index % self.frame_count();
        let scale = Vec2::new(1.0 / columns as f32, 1.0 / rows as f32);
        let offset = Vec2::new((frame % columns) as f32, (frame / columns) as f32) * scale;
        (offset, scale)
    }
}

// ============================================================================
// GPU 镜像
// ============================================================================

/// 渲染端消费的粒子实例数据（对应 WGSL struct）
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuParticle {
    /// xyz = 位置, w = 旋转
    pub position_rotation: [f32; 4],
    pub color: [f32; 4],
    /// xy = 大小, zw = UV 偏移
    pub size_uv_offset: [f32; 4],
    /// xy = UV 缩放, z = 图集索引, w = 填充
    pub uv_scale_index: [f32; 4],
}

impl GpuParticle {
    pub fn from_particle(particle: &Particle, atlas: &AtlasLayout) -> Self {
        let (uv_offset, uv_scale) = atlas.frame_uv(particle.texture_index);
        let p = particle.position;
        Self {
            position_rotation: [p.x, p.y, p.z, particle.rotation],
            color: particle.color.to_array(),
            size_uv_offset: [particle.size.x, particle.size.y, uv_offset.x, uv_offset.y],
            uv_scale_index: [
                uv_scale.x,
                uv_scale.y,
                (particle.texture_index % atlas.frame_count()) as f32,
                0.0,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_when_age_reaches_lifetime() {
        let mut p = Particle {
            lifetime: 1.0,
            ..Default::default()
        };
        assert!(!p.is_dead());
        p.age = 1.0;
        assert!(p.is_dead());
    }

    #[test]
    fn test_non_positive_lifetime_is_dead() {
        let p = Particle {
            lifetime: 0.0,
            ..Default::default()
        };
        assert!(p.is_dead());
        assert_eq!(p.normalized_age(), 1.0);

        let p = Particle {
            lifetime: -2.0,
            ..Default::default()
        };
        assert!(p.is_dead());
    }

    #[test]
    fn test_kill() {
        let mut p = Particle {
            lifetime: 5.0,
            age: 1.0,
            ..Default::default()
        };
        p.kill();
        assert!(p.is_dead());
        assert_eq!(p.age, 5.0);
    }

    #[test]
    fn test_safe_normalize_fallback() {
        assert_eq!(safe_normalize(Vec3::ZERO, FALLBACK_DIRECTION), Vec3::NEG_Y);
        let n = safe_normalize(Vec3::new(3.0, 0.0, 4.0), FALLBACK_DIRECTION);
        assert!((n.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_atlas_frame_uv() {
        let atlas = AtlasLayout::new(4, 2);
        assert_eq!(atlas.frame_count(), 8);

        let (offset, scale) = atlas.frame_uv(5);
        assert_eq!(scale, Vec2::new(0.25, 0.5));
        assert_eq!(offset, Vec2::new(0.25, 0.5));

        // 取模回绕
        let (offset, _) = atlas.frame_uv(8);
        assert_eq!(offset, Vec2::ZERO);
    }

    #[test]
    fn test_gpu_particle_layout() {
        assert_eq!(std::mem::size_of::<GpuParticle>(), 64);

        let p = Particle {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: 0.5,
            size: Vec2::new(4.0, 5.0),
            texture_index: 1,
            ..Default::default()
        };
        let gpu = GpuParticle::from_particle(&p, &AtlasLayout::new(2, 1));
        assert_eq!(gpu.position_rotation, [1.0, 2.0, 3.0, 0.5]);
        assert_eq!(gpu.size_uv_offset, [4.0, 5.0, 0.5, 0.0]);
        assert_eq!(gpu.uv_scale_index, [0.5, 1.0, 1.0, 0.0]);
    }
}
