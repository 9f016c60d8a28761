//! 统一错误处理模块
//!
//! 模拟热路径不返回错误（越界值被钳制或忽略），
//! 这里的错误类型只用于构建、配置加载和物理世界操作。

use crate::config::ConfigError;
use thiserror::Error;

/// 粒子引擎错误类型
#[derive(Error, Debug)]
pub enum ParticleError {
    #[error("Invalid particle configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Physics error: {0}")]
    Physics(#[from] PhysicsError),
}

/// 物理世界错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("Invalid rigid body handle")]
    InvalidRigidBody,

    #[error("Invalid collider handle")]
    InvalidCollider,
}

pub type ParticleResult<T> = Result<T, ParticleError>;
pub type PhysicsResult<T> = Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::ValidationError("dt must be > 0".to_string());
        let err: ParticleError = config_err.into();
        assert!(matches!(err, ParticleError::Config(_)));

        let err: ParticleError = PhysicsError::InvalidCollider.into();
        assert!(matches!(err, ParticleError::Physics(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ParticleError::from(PhysicsError::InvalidRigidBody);
        assert_eq!(err.to_string(), "Physics error: Invalid rigid body handle");

        let err = ParticleError::InvalidConfig("unknown preset".to_string());
        assert_eq!(err.to_string(), "Invalid particle configuration: unknown preset");
    }
}
