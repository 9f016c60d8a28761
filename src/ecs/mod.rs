//! bevy_ecs 宿主适配
//!
//! 每个实体一个 [`ParticleSystemComponent`]，由
//! [`particle_system_update_system`] 用实体变换和帧时间驱动。

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

use crate::config::ParticleSystemConfig;
use crate::particles::{CollisionWorld, EmitterTransform, ParticleSystem};
#[cfg(feature = "physics_2d")]
use crate::physics::{physics_step_system, PhysicsWorld};

#[derive(Component, Clone, Copy, Debug)]
pub struct Transform {
    pub pos: Vec3,
    pub rot: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos: Vec3::ZERO,
            rot: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(pos: Vec3) -> Self {
        Self {
            pos,
            ..Default::default()
        }
    }
}

/// 宿主提供的线速度；缺省时由位置差推算
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct Velocity {
    pub lin: Vec3,
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct Time {
    pub delta_seconds: f32,
    pub elapsed_seconds: f64,
}

impl Default for Time {
    fn default() -> Self {
        Self {
            delta_seconds: 0.0,
            elapsed_seconds: 0.0,
        }
    }
}

impl Time {
    pub fn advance(&mut self, dt: f32) {
        self.delta_seconds = dt;
        self.elapsed_seconds += dt as f64;
    }
}

/// 粒子系统组件
#[derive(Component, Debug)]
pub struct ParticleSystemComponent {
    pub system: ParticleSystem,
    /// 首次更新时自动播放
    pub auto_play: bool,
    /// 完成后销毁实体
    pub despawn_on_complete: bool,
    started: bool,
}

impl ParticleSystemComponent {
    pub fn new(system: ParticleSystem) -> Self {
        Self {
            system,
            auto_play: true,
            despawn_on_complete: false,
            started: false,
        }
    }

    pub fn from_config(config: ParticleSystemConfig) -> Self {
        Self::new(ParticleSystem::new(config))
    }

    pub fn with_auto_play(mut self, auto_play: bool) -> Self {
        self.auto_play = auto_play;
        self
    }

    pub fn with_despawn_on_complete(mut self, despawn: bool) -> Self {
        self.despawn_on_complete = despawn;
        self
    }
}

type ParticleQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static Transform,
        Option<&'static Velocity>,
        &'static mut ParticleSystemComponent,
    ),
>;

fn update_particle_systems(
    dt: f32,
    world: Option<&dyn CollisionWorld>,
    query: &mut ParticleQuery,
) {
    for (transform, velocity, mut component) in query.iter_mut() {
        let component = &mut *component;
        let emitter_transform = EmitterTransform {
            position: transform.pos,
            velocity: velocity.map_or(Vec3::ZERO, |v| v.lin),
            scale: transform.scale.truncate(),
        };
        if component.auto_play && !component.started {
            // 预热粒子需要生成在实体位置
            component.system.set_transform(&emitter_transform);
            component.system.play();
            component.started = true;
        }
        component.system.update(dt, &emitter_transform, world);
    }
}

/// 粒子系统更新；存在 `PhysicsWorld` 资源时启用物理世界碰撞
#[cfg(feature = "physics_2d")]
pub fn particle_system_update_system(
    time: Res<Time>,
    physics: Option<Res<PhysicsWorld>>,
    mut query: ParticleQuery,
) {
    let world = physics.as_deref().map(|w| w as &dyn CollisionWorld);
    update_particle_systems(time.delta_seconds, world, &mut query);
}

/// 粒子系统更新
#[cfg(not(feature = "physics_2d"))]
pub fn particle_system_update_system(time: Res<Time>, mut query: ParticleQuery) {
    update_particle_systems(time.delta_seconds, None, &mut query);
}

/// 销毁已完成且标记了 `despawn_on_complete` 的实体
pub fn despawn_completed_particle_systems_system(
    mut commands: Commands,
    query: Query<(Entity, &ParticleSystemComponent)>,
) {
    for (entity, component) in query.iter() {
        if component.despawn_on_complete && component.started && component.system.is_complete() {
            tracing::debug!(target: "particles", "Despawning completed particle system {:?}", entity);
            commands.entity(entity).despawn();
        }
    }
}

/// 最小宿主：World + 调度
pub struct ParticleApp {
    pub world: World,
    pub schedule: Schedule,
}

impl Default for ParticleApp {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleApp {
    pub fn new() -> Self {
        let mut world = World::new();
        world.insert_resource(Time::default());
        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                particle_system_update_system,
                despawn_completed_particle_systems_system,
            )
                .chain(),
        );
        Self { world, schedule }
    }

    /// 插入物理世界并在粒子更新前推进它
    #[cfg(feature = "physics_2d")]
    pub fn with_physics(mut self, physics: PhysicsWorld) -> Self {
        self.world.insert_resource(physics);
        self.schedule
            .add_systems(physics_step_system.before(particle_system_update_system));
        self
    }

    pub fn spawn(&mut self, transform: Transform, component: ParticleSystemComponent) -> Entity {
        self.world.spawn((transform, component)).id()
    }

    pub fn update(&mut self, dt: f32) {
        self.world.resource_mut::<Time>().advance(dt);
        self.schedule.run(&mut self.world);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::{EmitterConfig, ValueRange};

    fn config() -> ParticleSystemConfig {
        let mut config = ParticleSystemConfig::new(
            EmitterConfig::default()
                .with_emission_rate(10.0)
                .with_lifetime(5.0, 5.0),
        );
        config.seed = Some(3);
        config
    }

    #[test]
    fn test_auto_play_and_update() {
        let mut app = ParticleApp::new();
        let entity = app.spawn(
            Transform::from_position(Vec3::new(2.0, 0.0, 0.0)),
            ParticleSystemComponent::from_config(config()),
        );
        for _ in 0..10 {
            app.update(0.1);
        }

        let component = app.world.get::<ParticleSystemComponent>(entity).unwrap();
        assert!(component.system.is_playing());
        assert!((9..=10).contains(&component.system.particle_count()));
        assert!(component
            .system
            .pool()
            .unwrap()
            .particles()
            .iter()
            .all(|p| p.position.x == 2.0));
    }

    #[test]
    fn test_prewarm_at_entity_position() {
        let mut config = config();
        config.prewarm = true;
        config.prewarm_time = 1.0;
        config.emitter.speed = ValueRange::constant(0.0);
        let mut app = ParticleApp::new();
        let entity = app.spawn(
            Transform::from_position(Vec3::new(100.0, 0.0, 0.0)),
            ParticleSystemComponent::from_config(config),
        );
        app.update(1.0 / 60.0);

        let component = app.world.get::<ParticleSystemComponent>(entity).unwrap();
        let particles = component.system.pool().unwrap().particles();
        assert!(particles.len() >= 9);
        assert!(particles.iter().all(|p| p.position.x == 100.0));
    }

    #[test]
    fn test_without_auto_play_stays_stopped() {
        let mut app = ParticleApp::new();
        let entity = app.spawn(
            Transform::default(),
            ParticleSystemComponent::from_config(config()).with_auto_play(false),
        );
        app.update(0.5);
        let component = app.world.get::<ParticleSystemComponent>(entity).unwrap();
        assert_eq!(component.system.particle_count(), 0);
    }

    #[test]
    fn test_despawn_on_complete() {
        let mut config = config();
        config.looping = false;
        config.duration = 0.2;
        config.emitter.lifetime = ValueRange::constant(0.1);
        let mut app = ParticleApp::new();
        let entity = app.spawn(
            Transform::default(),
            ParticleSystemComponent::from_config(config).with_despawn_on_complete(true),
        );
        for _ in 0..20 {
            app.update(0.05);
        }
        assert!(app.world.get_entity(entity).is_none());
    }

    #[test]
    fn test_time_advance() {
        let mut time = Time::default();
        time.advance(0.25);
        time.advance(0.25);
        assert_eq!(time.delta_seconds, 0.25);
        assert_eq!(time.elapsed_seconds, 0.5);
    }
}
