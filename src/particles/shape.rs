//! 发射形状采样
//!
//! 每种形状在局部空间内生成 `(位置, 方向)`，方向再根据
//! `spherize_direction` 在基础方向与形状外法线之间混合。

use super::particle::{safe_normalize, FALLBACK_DIRECTION};
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// 发射形状
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmitterShape {
    /// 点发射
    #[default]
    Point,
    /// 圆形，半径 = `shape_size.x`
    Circle,
    /// 球形，半径 = `shape_size.x`
    Sphere,
    /// 盒子，完整尺寸 = `shape_size`；`z <= 0` 时视为平面盒子
    Box,
    /// 圆锥，底面半径 = `shape_size.x`，半角 = `cone_angle`
    Cone,
    /// 线段，长度 = `shape_size.x`
    Edge,
    /// 上半球（+Y），半径 = `shape_size.x`
    Hemisphere,
    /// 矩形面，尺寸 = `shape_size.xy`，法线固定向下
    Rectangle,
}

impl EmitterShape {
    pub const ALL: [EmitterShape; 8] = [
        EmitterShape::Point,
        EmitterShape::Circle,
        EmitterShape::Sphere,
        EmitterShape::Box,
        EmitterShape::Cone,
        EmitterShape::Edge,
        EmitterShape::Hemisphere,
        EmitterShape::Rectangle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EmitterShape::Point => "Point",
            EmitterShape::Circle => "Circle",
            EmitterShape::Sphere => "Sphere",
            EmitterShape::Box => "Box",
            EmitterShape::Cone => "Cone",
            EmitterShape::Edge => "Edge",
            EmitterShape::Hemisphere => "Hemisphere",
            EmitterShape::Rectangle => "Rectangle",
        }
    }
}

/// 从形状的哪一部分发射
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmitFrom {
    /// 内部体积
    #[default]
    Volume,
    /// 外壳表面
    Shell,
    /// 边缘
    Edge,
}

impl EmitFrom {
    #[inline]
    fn is_volume(self) -> bool {
        matches!(self, EmitFrom::Volume)
    }
}

/// 形状采样所需的参数
#[derive(Debug, Clone, Copy)]
pub struct ShapeParams {
    pub shape: EmitterShape,
    pub size: Vec3,
    /// 圆锥半角（度）
    pub cone_angle: f32,
    pub emit_from: EmitFrom,
    /// 已归一化的基础方向
    pub direction: Vec3,
    pub spherize: f32,
}

/// 在 `base` 与 `outward` 之间按 `t` 混合方向
#[inline]
pub fn blend_direction(base: Vec3, outward: Vec3, t: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0);
    safe_normalize(base.lerp(outward, t), base)
}

/// 球面均匀分布的单位向量
pub fn random_unit_vector<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let theta = rng.gen::<f32>() * TAU;
    let z = 1.0 - 2.0 * rng.gen::<f32>();
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z)
}

/// 按形状采样局部空间的 `(位置, 方向)`
pub fn sample_shape<R: Rng + ?Sized>(params: &ShapeParams, rng: &mut R) -> (Vec3, Vec3) {
    let base = safe_normalize(params.direction, FALLBACK_DIRECTION);
    match params.shape {
        EmitterShape::Point => (Vec3::ZERO, base),
        EmitterShape::Circle => sample_circle(params, base, rng),
        EmitterShape::Sphere => sample_sphere(params, base, false, rng),
        EmitterShape::Hemisphere => sample_sphere(params, base, true, rng),
        EmitterShape::Box => sample_box(params, base, rng),
        EmitterShape::Rectangle => sample_rectangle(params, base, rng),
        EmitterShape::Cone => sample_cone(params, base, rng),
        EmitterShape::Edge => {
            let length = params.size.x;
            let x = (rng.gen::<f32>() - 0.5) * length;
            (Vec3::new(x, 0.0, 0.0), base)
        }
    }
}

fn sample_circle<R: Rng + ?Sized>(params: &ShapeParams, base: Vec3, rng: &mut R) -> (Vec3, Vec3) {
    let radius = params.size.x.abs();
    let angle = rng.gen::<f32>() * TAU;
    // 面积均匀分布
    let r = if params.emit_from.is_volume() {
        rng.gen::<f32>().sqrt() * radius
    } else {
        radius
    };
    let outward = Vec3::new(angle.cos(), angle.sin(), 0.0);
    (outward * r, blend_direction(base, outward, params.spherize))
}

fn sample_sphere<R: Rng + ?Sized>(
    params: &ShapeParams,
    base: Vec3,
    hemisphere: bool,
    rng: &mut R,
) -> (Vec3, Vec3) {
    let radius = params.size.x.abs();
    let u = rng.gen::<f32>();
    let v = rng.gen::<f32>();
    let theta = u * TAU;
    // 上半球时 cos(phi) ∈ [0, 1]
    let cos_phi = if hemisphere { 1.0 - v } else { 1.0 - 2.0 * v };
    let phi = cos_phi.clamp(-1.0, 1.0).acos();
    let normal = Vec3::new(phi.sin() * theta.cos(), cos_phi, phi.sin() * theta.sin());
    let r = if params.emit_from.is_volume() {
        rng.gen::<f32>().cbrt() * radius
    } else {
        radius
    };
    (normal * r, blend_direction(base, normal, params.spherize))
}

fn sample_box<R: Rng + ?Sized>(params: &ShapeParams, base: Vec3, rng: &mut R) -> (Vec3, Vec3) {
    let half = params.size.abs() * 0.5;
    let flattened = params.size.z <= 0.0;

    if flattened {
        return if params.emit_from.is_volume() {
            let pos = Vec3::new(
                (rng.gen::<f32>() * 2.0 - 1.0) * half.x,
                (rng.gen::<f32>() * 2.0 - 1.0) * half.y,
                0.0,
            );
            let outward = safe_normalize(pos, base);
            (pos, blend_direction(base, outward, params.spherize))
        } else {
            sample_rect_perimeter(half.x, half.y, base, params.spherize, rng)
        };
    }

    if params.emit_from.is_volume() {
        let pos = Vec3::new(
            (rng.gen::<f32>() * 2.0 - 1.0) * half.x,
            (rng.gen::<f32>() * 2.0 - 1.0) * half.y,
            (rng.gen::<f32>() * 2.0 - 1.0) * half.z,
        );
        let outward = safe_normalize(pos, base);
        return (pos, blend_direction(base, outward, params.spherize));
    }

    // 均匀选择六个面之一，再在面内均匀偏移
    let face = rng.gen_range(0..6usize);
    let axis = face / 2;
    let sign = if face % 2 == 0 { 1.0 } else { -1.0 };
    let mut pos = Vec3::new(
        (rng.gen::<f32>() * 2.0 - 1.0) * half.x,
        (rng.gen::<f32>() * 2.0 - 1.0) * half.y,
        (rng.gen::<f32>() * 2.0 - 1.0) * half.z,
    );
    pos[axis] = sign * half[axis];
    let mut normal = Vec3::ZERO;
    normal[axis] = sign;
    (pos, blend_direction(base, normal, params.spherize))
}

fn sample_rect_perimeter<R: Rng + ?Sized>(
    half_x: f32,
    half_y: f32,
    base: Vec3,
    spherize: f32,
    rng: &mut R,
) -> (Vec3, Vec3) {
    let width = half_x * 2.0;
    let height = half_y * 2.0;
    let perimeter = 2.0 * (width + height);
    if perimeter <= 0.0 {
        return (Vec3::ZERO, base);
    }
    let d = rng.gen::<f32>() * perimeter;
    let (pos, normal) = if d < width {
        (Vec3::new(-half_x + d, half_y, 0.0), Vec3::Y)
    } else if d < width + height {
        (Vec3::new(half_x, half_y - (d - width), 0.0), Vec3::X)
    } else if d < 2.0 * width + height {
        (Vec3::new(half_x - (d - width - height), -half_y, 0.0), Vec3::NEG_Y)
    } else {
        (Vec3::new(-half_x, -half_y + (d - 2.0 * width - height), 0.0), Vec3::NEG_X)
    };
    (pos, blend_direction(base, normal, spherize))
}

fn sample_rectangle<R: Rng + ?Sized>(params: &ShapeParams, base: Vec3, rng: &mut R) -> (Vec3, Vec3) {
    let half = params.size.abs() * 0.5;
    let pos = Vec3::new(
        (rng.gen::<f32>() * 2.0 - 1.0) * half.x,
        (rng.gen::<f32>() * 2.0 - 1.0) * half.y,
        0.0,
    );
    (pos, blend_direction(base, Vec3::NEG_Y, params.spherize))
}

fn sample_cone<R: Rng + ?Sized>(params: &ShapeParams, base: Vec3, rng: &mut R) -> (Vec3, Vec3) {
    let radius = params.size.x.abs();
    let half_angle = params.cone_angle.to_radians().clamp(0.0, PI * 0.5);
    let forward = base;
    let (right, up) = forward.any_orthonormal_pair();

    let theta = rng.gen::<f32>() * TAU;
    let t = if params.emit_from.is_volume() {
        rng.gen::<f32>()
    } else {
        1.0
    };
    let outward = right * theta.cos() + up * theta.sin();
    let position = outward * (radius * t);
    let angle = half_angle * t;
    let direction = safe_normalize(forward * angle.cos() + outward * angle.sin(), forward);
    (position, direction)
}
