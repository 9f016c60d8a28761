use super::{env_override, load_file, parse_str, ConfigError, ConfigFormat, ConfigResult};
use crate::particles::{
    AtlasLayout, AttractorAffector, EmitterConfig, GravityAffector, LinearDragAffector,
    NoiseAffector, PhysicsCollisionSettings, PlaneCollisionAffector,
    SequenceFrameAnimationAffector, VortexAffector,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 模拟空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimulationSpace {
    /// 粒子跟随发射器变换移动
    Local,
    /// 粒子生成后与发射器无关
    #[default]
    World,
}

/// 力的开关与参数
///
/// 每个力的 `enabled` 字段就是开关；重建影响器链时只加入启用的力。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceSettings {
    pub gravity: GravityAffector,
    pub drag: LinearDragAffector,
    pub vortex: VortexAffector,
    pub noise: NoiseAffector,
    pub attractor: AttractorAffector,
}

impl Default for ForceSettings {
    fn default() -> Self {
        Self {
            gravity: GravityAffector {
                enabled: false,
                ..Default::default()
            },
            drag: LinearDragAffector {
                enabled: false,
                ..Default::default()
            },
            vortex: VortexAffector {
                enabled: false,
                ..Default::default()
            },
            noise: NoiseAffector {
                enabled: false,
                ..Default::default()
            },
            attractor: AttractorAffector {
                enabled: false,
                ..Default::default()
            },
        }
    }
}

/// 粒子系统配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSystemConfig {
    /// 发射器配置
    pub emitter: EmitterConfig,
    /// 持续时间（秒）
    pub duration: f32,
    /// 是否循环
    pub looping: bool,
    /// 是否预热
    pub prewarm: bool,
    /// 预热时间（秒）
    pub prewarm_time: f32,
    /// 模拟速度倍率
    pub simulation_speed: f32,
    pub simulation_space: SimulationSpace,
    pub forces: ForceSettings,
    /// 序列帧动画，`enabled = false` 时不加入影响器链
    pub animation: SequenceFrameAnimationAffector,
    /// 平面碰撞
    pub collision: PlaneCollisionAffector,
    /// 物理世界碰撞
    pub physics_collision: PhysicsCollisionSettings,
    pub atlas: AtlasLayout,
    /// 随机种子，None 时使用熵源
    pub seed: Option<u64>,
}

impl Default for ParticleSystemConfig {
    fn default() -> Self {
        Self {
            emitter: EmitterConfig::default(),
            duration: 5.0,
            looping: true,
            prewarm: false,
            prewarm_time: 1.0,
            simulation_speed: 1.0,
            simulation_space: SimulationSpace::World,
            forces: ForceSettings::default(),
            animation: SequenceFrameAnimationAffector {
                enabled: false,
                ..Default::default()
            },
            collision: PlaneCollisionAffector::default(),
            physics_collision: PhysicsCollisionSettings::default(),
            atlas: AtlasLayout::default(),
            seed: None,
        }
    }
}

impl ParticleSystemConfig {
    pub fn new(emitter: EmitterConfig) -> Self {
        Self {
            emitter,
            ..Default::default()
        }
    }

    /// 从TOML字符串加载
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        parse_str(content, ConfigFormat::Toml)
    }

    /// 从JSON字符串加载
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        parse_str(content, ConfigFormat::Json)
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// 保存为TOML
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = super::to_string(self, ConfigFormat::Toml)?;
        std::fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = super::to_string(self, ConfigFormat::Json)?;
        std::fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 加载配置文件（格式由扩展名决定）；失败时使用默认配置
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let mut config = match load_file::<Self, _>(path)
            .and_then(|config| config.validate().map(|_| config))
        {
            Ok(config) => {
                tracing::info!(target: "config", "Loaded particle system config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::warn!(target: "config", "Failed to load {:?}: {}, using defaults", path, e);
                Self::default()
            }
        };
        config.apply_env_overrides();
        config
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.emitter.validate()?;
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "duration must be finite and >= 0, got {}",
                self.duration
            )));
        }
        if !self.prewarm_time.is_finite() || self.prewarm_time < 0.0 {
            return Err(ConfigError::ValidationError(
                "prewarm_time must be finite and >= 0".to_string(),
            ));
        }
        if !self.simulation_speed.is_finite() || self.simulation_speed < 0.0 {
            return Err(ConfigError::ValidationError(
                "simulation_speed must be finite and >= 0".to_string(),
            ));
        }
        if self.physics_collision.particle_radius < 0.0
            || self.physics_collision.units.pixels_per_meter <= 0.0
        {
            return Err(ConfigError::ValidationError(
                "physics collision radius must be >= 0 and pixels_per_meter > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        if let Some(max) = env_override("PARTICLES_MAX") {
            self.emitter.max_particles = max;
        }
        if let Some(rate) = env_override("PARTICLES_RATE") {
            self.emitter.emission_rate = rate;
        }
        if let Some(speed) = env_override("PARTICLES_SPEED") {
            self.simulation_speed = speed;
        }
    }
}
