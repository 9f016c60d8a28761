#![cfg(feature = "physics_2d")]

//! rapier2d 刚体世界
//!
//! 粒子不会成为刚体；这里只把世界的 AABB 查询接到
//! [`CollisionWorld`]，供粒子系统做近似碰撞。

use crate::core::{PhysicsError, PhysicsResult};
use crate::impl_default;
use crate::particles::{CollisionWorld, QueryControl, ShapeHit};
use bevy_ecs::prelude::*;
use glam::Vec2;
use rapier2d::prelude::DefaultBroadPhase;
use rapier2d::prelude::*;

// --- Resources ---

#[derive(Resource)]
pub struct PhysicsWorld {
    pub gravity: Vector<Real>,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: Box<dyn BroadPhase>,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub query_pipeline: QueryPipeline,
}

impl_default!(PhysicsWorld {
    gravity: vector![0.0, -9.81],
    integration_parameters: IntegrationParameters::default(),
    physics_pipeline: PhysicsPipeline::new(),
    island_manager: IslandManager::new(),
    broad_phase: Box::new(DefaultBroadPhase::new()),
    narrow_phase: NarrowPhase::new(),
    impulse_joint_set: ImpulseJointSet::new(),
    multibody_joint_set: MultibodyJointSet::new(),
    ccd_solver: CCDSolver::new(),
    rigid_body_set: RigidBodySet::new(),
    collider_set: ColliderSet::new(),
    query_pipeline: QueryPipeline::new(),
});

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进一步，同时刷新查询管线
    pub fn step(&mut self) {
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut *self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// 以指定步长推进
    pub fn step_with_dt(&mut self, dt: f32) {
        self.integration_parameters.dt = dt.max(0.001);
        self.step();
    }

    /// 不推进模拟，只让查询管线反映当前碰撞体
    pub fn update_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    fn insert_body(&mut self, body: RigidBody, collider: Collider) -> (RigidBodyHandle, ColliderHandle) {
        let body_handle = self.rigid_body_set.insert(body);
        let collider_handle =
            self.collider_set
                .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);
        (body_handle, collider_handle)
    }

    /// 添加静态矩形
    pub fn add_static_box(&mut self, center: Vec2, half_extents: Vec2) -> ColliderHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y).build();
        self.insert_body(body, collider).1
    }

    /// 添加静态圆
    pub fn add_static_ball(&mut self, center: Vec2, radius: f32) -> ColliderHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build();
        self.insert_body(body, ColliderBuilder::ball(radius).build()).1
    }

    /// 添加传感器矩形（粒子会穿过）
    pub fn add_sensor_box(&mut self, center: Vec2, half_extents: Vec2) -> ColliderHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build();
        let collider = ColliderBuilder::cuboid(half_extents.x, half_extents.y)
            .sensor(true)
            .build();
        self.insert_body(body, collider).1
    }

    /// 添加动态圆
    pub fn add_dynamic_ball(&mut self, center: Vec2, radius: f32) -> RigidBodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![center.x, center.y])
            .build();
        self.insert_body(body, ColliderBuilder::ball(radius).build()).0
    }

    pub fn body_translation(&self, handle: RigidBodyHandle) -> PhysicsResult<Vec2> {
        let body = self
            .rigid_body_set
            .get(handle)
            .ok_or(PhysicsError::InvalidRigidBody)?;
        let t = body.translation();
        Ok(Vec2::new(t.x, t.y))
    }

    /// 移动刚体，下一次 `step`/`update_queries` 后对查询可见
    pub fn set_body_translation(&mut self, handle: RigidBodyHandle, position: Vec2) -> PhysicsResult<()> {
        let body = self
            .rigid_body_set
            .get_mut(handle)
            .ok_or(PhysicsError::InvalidRigidBody)?;
        body.set_translation(vector![position.x, position.y], true);
        Ok(())
    }

    /// 移除刚体及其碰撞体
    pub fn remove_body(&mut self, handle: RigidBodyHandle) -> PhysicsResult<()> {
        self.rigid_body_set
            .remove(
                handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .map(|_| ())
            .ok_or(PhysicsError::InvalidRigidBody)
    }

    /// 碰撞体的 AABB 与所属刚体位置
    pub fn collider_hit(&self, handle: ColliderHandle) -> PhysicsResult<ShapeHit> {
        let collider = self
            .collider_set
            .get(handle)
            .ok_or(PhysicsError::InvalidCollider)?;
        let aabb = collider.compute_aabb();
        let position = collider
            .parent()
            .and_then(|parent| self.rigid_body_set.get(parent))
            .map(|body| *body.translation())
            .unwrap_or_else(|| *collider.translation());
        Ok(ShapeHit {
            body_position: Vec2::new(position.x, position.y),
            aabb_min: Vec2::new(aabb.mins.x, aabb.mins.y),
            aabb_max: Vec2::new(aabb.maxs.x, aabb.maxs.y),
            is_sensor: collider.is_sensor(),
        })
    }
}

impl CollisionWorld for PhysicsWorld {
    fn query_aabb(
        &self,
        min: Vec2,
        max: Vec2,
        visitor: &mut dyn FnMut(&ShapeHit) -> QueryControl,
    ) {
        let aabb = Aabb::new(point![min.x, min.y], point![max.x, max.y]);
        self.query_pipeline
            .colliders_with_aabb_intersecting_aabb(&aabb, |handle| {
                match self.collider_hit(*handle) {
                    Ok(hit) => visitor(&hit) == QueryControl::Continue,
                    Err(_) => true,
                }
            });
    }
}

// --- Systems ---

/// 用帧时间推进物理世界
pub fn physics_step_system(mut physics: ResMut<PhysicsWorld>, time: Res<crate::ecs::Time>) {
    if time.delta_seconds <= 0.0 {
        return;
    }
    physics.step_with_dt(time.delta_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_body_falls() {
        let mut world = PhysicsWorld::new();
        let ball = world.add_dynamic_ball(Vec2::new(0.0, 10.0), 0.5);
        for _ in 0..10 {
            world.step();
        }
        assert!(world.body_translation(ball).unwrap().y < 10.0);
    }

    #[test]
    fn test_query_aabb_reports_overlaps() {
        let mut world = PhysicsWorld::new();
        world.add_static_box(Vec2::ZERO, Vec2::new(5.0, 0.5));
        world.add_sensor_box(Vec2::new(0.0, 3.0), Vec2::splat(1.0));
        world.update_queries();

        let mut hits = Vec::new();
        world.query_aabb(Vec2::new(-0.1, -0.1), Vec2::new(0.1, 0.1), &mut |hit: &ShapeHit| {
            hits.push(*hit);
            QueryControl::Continue
        });
        assert_eq!(hits.len(), 1);
        assert!(!hits[0].is_sensor);
        assert!((hits[0].aabb_max - Vec2::new(5.0, 0.5)).length() < 1e-4);

        let mut sensor_hits = Vec::new();
        world.query_aabb(Vec2::new(-0.1, 2.9), Vec2::new(0.1, 3.1), &mut |hit: &ShapeHit| {
            sensor_hits.push(*hit);
            QueryControl::Continue
        });
        assert_eq!(sensor_hits.len(), 1);
        assert!(sensor_hits[0].is_sensor);
    }

    #[test]
    fn test_query_stops_early() {
        let mut world = PhysicsWorld::new();
        world.add_static_ball(Vec2::ZERO, 1.0);
        world.add_static_ball(Vec2::new(0.5, 0.0), 1.0);
        world.update_queries();

        let mut visits = 0;
        world.query_aabb(Vec2::splat(-0.2), Vec2::splat(0.2), &mut |_: &ShapeHit| {
            visits += 1;
            QueryControl::Stop
        });
        assert_eq!(visits, 1);
    }

    #[test]
    fn test_remove_body_invalidates_handle() {
        let mut world = PhysicsWorld::new();
        let ball = world.add_dynamic_ball(Vec2::ZERO, 0.5);
        assert_eq!(world.collider_count(), 1);
        world.remove_body(ball).unwrap();
        assert_eq!(world.collider_count(), 0);
        assert_eq!(world.remove_body(ball), Err(PhysicsError::InvalidRigidBody));
        assert!(world.set_body_translation(ball, Vec2::ONE).is_err());
    }

    #[test]
    fn test_collider_hit_after_removal() {
        let mut world = PhysicsWorld::new();
        let ground = world.add_static_box(Vec2::new(1.0, 2.0), Vec2::new(3.0, 0.5));
        let hit = world.collider_hit(ground).unwrap();
        assert_eq!(hit.body_position, Vec2::new(1.0, 2.0));
        assert!((hit.aabb_min - Vec2::new(-2.0, 1.5)).length() < 1e-4);

        let parent = world.collider_set[ground].parent().unwrap();
        world.remove_body(parent).unwrap();
        assert_eq!(world.collider_hit(ground), Err(PhysicsError::InvalidCollider));
    }
}
