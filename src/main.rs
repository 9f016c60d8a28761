use particle_engine::config::{init_logging, load_file, LoggingConfig, RunnerConfig};
use particle_engine::particles::{EmitterTransform, ParticlePreset, ParticleSystem};
use particle_engine::ParticleResult;

fn run() -> ParticleResult<()> {
    let mut args = std::env::args().skip(1);
    let path = args.next();
    let preset = args.next();

    // 日志需要在加载配置之前初始化，先单独读取日志配置
    let logging = path
        .as_deref()
        .and_then(|p| load_file::<RunnerConfig, _>(p).ok())
        .map(|config| config.logging)
        .unwrap_or_else(LoggingConfig::default);
    init_logging(&logging);

    let mut config = RunnerConfig::load_or_default(path.as_deref());
    if let Some(name) = preset {
        let preset: ParticlePreset = name.parse()?;
        tracing::info!(target: "config", "Using {} preset", preset.name());
        config.system = preset.to_config();
        config.system.apply_env_overrides();
    }
    config.validate()?;

    let mut system = ParticleSystem::try_new(config.system.clone())?;
    system.play();

    let transform = EmitterTransform::default();
    let frames_per_second = (1.0 / config.dt).round().max(1.0) as u32;
    for frame in 1..=config.frames {
        system.update(config.dt, &transform, None);

        if frame % frames_per_second == 0 {
            let stats = system.stats();
            tracing::info!(
                target: "particles",
                "t={:.1}s alive={} emitted={} removed={} collisions={}",
                frame as f32 * config.dt,
                stats.alive_count,
                stats.total_emitted,
                stats.frame_removed,
                stats.collisions
            );
        }
        if system.is_complete() {
            tracing::info!(target: "particles", "Simulation completed at frame {}", frame);
            break;
        }
    }

    let stats = system.stats();
    tracing::info!(
        target: "particles",
        "Finished: {} particles alive, {} emitted in total",
        stats.alive_count,
        stats.total_emitted
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Particle runner failed: {}", e);
        std::process::exit(1);
    }
}
