//! 粒子池
//!
//! 两条按索引对齐的稠密数组：模拟记录 `particles` 与 GPU 镜像 `gpu_data`。
//! 所有结构性修改（追加、移除、清空）都同时作用于两条数组，
//! 公共方法返回时两者长度必然相等。

use super::particle::{AtlasLayout, GpuParticle, Particle};

/// 单个粒子系统独占的粒子存储
#[derive(Debug, Clone, Default)]
pub struct ParticlePool {
    particles: Vec<Particle>,
    gpu_data: Vec<GpuParticle>,
    /// 预分配提示，不是硬上限
    capacity_hint: usize,
    atlas: AtlasLayout,
}

impl ParticlePool {
    /// 创建粒子池并按 `capacity` 预留空间
    pub fn new(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
            gpu_data: Vec::with_capacity(capacity),
            capacity_hint: capacity,
            atlas: AtlasLayout::default(),
        }
    }

    pub fn with_atlas(mut self, atlas: AtlasLayout) -> Self {
        self.atlas = atlas;
        self
    }

    pub fn set_atlas(&mut self, atlas: AtlasLayout) {
        self.atlas = atlas;
    }

    pub fn atlas(&self) -> AtlasLayout {
        self.atlas
    }

    /// 追加一个默认粒子，返回其可变引用
    ///
    /// 引用在下一次结构性修改之前有效，由借用检查器保证。
    pub fn emit(&mut self) -> &mut Particle {
        self.particles.push(Particle::default());
        self.gpu_data.push(GpuParticle::default());
        let last = self.particles.len() - 1;
        &mut self.particles[last]
    }

    /// 批量追加 `count` 个默认粒子，返回第一个新粒子的索引
    pub fn emit_batch(&mut self, count: usize) -> usize {
        let start = self.particles.len();
        let new_len = start + count;
        self.particles.resize(new_len, Particle::default());
        self.gpu_data.resize(new_len, GpuParticle::default());
        start
    }

    /// 移除所有死亡粒子，返回移除数量
    ///
    /// 单次前向扫描，死亡粒子与末尾粒子交换后弹出（两条数组同步），
    /// 交换过来的粒子会在同一索引上重新检查。不保留粒子顺序。
    pub fn remove_dead_particles(&mut self) -> usize {
        let mut removed = 0;
        let mut i = 0;
        while i < self.particles.len() {
            if self.particles[i].is_dead() {
                self.particles.swap_remove(i);
                self.gpu_data.swap_remove(i);
                removed += 1;
            } else {
                i += 1;
            }
        }
        debug_assert_eq!(self.particles.len(), self.gpu_data.len());
        removed
    }

    /// 清空粒子，保留已分配的容量
    pub fn clear(&mut self) {
        self.particles.clear();
        self.gpu_data.clear();
    }

    /// 根据模拟记录重新计算全部 GPU 镜像
    pub fn sync_to_gpu(&mut self) {
        let atlas = self.atlas;
        for (gpu, particle) in self.gpu_data.iter_mut().zip(self.particles.iter()) {
            *gpu = GpuParticle::from_particle(particle, &atlas);
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn capacity_hint(&self) -> usize {
        self.capacity_hint
    }

    /// 调整预分配提示并预留空间
    pub fn reserve(&mut self, capacity: usize) {
        self.capacity_hint = capacity;
        let additional = capacity.saturating_sub(self.particles.len());
        self.particles.reserve(additional);
        self.gpu_data.reserve(additional);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// 可变切片只允许原地修改，无法改变长度
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn get(&self, index: usize) -> Option<&Particle> {
        self.particles.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    /// GPU 镜像数据，需在本帧 `sync_to_gpu` 之后读取
    pub fn gpu_data(&self) -> &[GpuParticle] {
        &self.gpu_data
    }

    /// GPU 镜像的字节大小
    pub fn gpu_data_size(&self) -> usize {
        std::mem::size_of_val(self.gpu_data.as_slice())
    }

    /// GPU 镜像的原始字节，可直接上传到顶点/存储缓冲区
    pub fn gpu_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.gpu_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use proptest::prelude::*;

    fn pool_with_ages(ages: &[(f32, f32)]) -> ParticlePool {
        let mut pool = ParticlePool::new(ages.len());
        for (i, &(age, lifetime)) in ages.iter().enumerate() {
            let p = pool.emit();
            p.age = age;
            p.lifetime = lifetime;
            p.position = Vec3::new(i as f32, 0.0, 0.0);
        }
        pool
    }

    #[test]
    fn test_emit_keeps_alignment() {
        let mut pool = ParticlePool::new(4);
        pool.emit().position = Vec3::ONE;
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.gpu_data().len(), 1);
        assert_eq!(pool.particles()[0].position, Vec3::ONE);
    }

    #[test]
    fn test_emit_batch() {
        let mut pool = ParticlePool::new(0);
        pool.emit();
        let start = pool.emit_batch(10);
        assert_eq!(start, 1);
        assert_eq!(pool.len(), 11);
        assert_eq!(pool.gpu_data().len(), 11);
    }

    #[test]
    fn test_remove_dead_swaps_last_into_hole() {
        // 索引 0 和 末尾 都死亡，末尾交换过来后需要被再次检查
        let mut pool = pool_with_ages(&[(2.0, 1.0), (0.0, 1.0), (0.5, 1.0), (3.0, 1.0)]);
        let removed = pool.remove_dead_particles();
        assert_eq!(removed, 2);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.gpu_data().len(), 2);
        assert!(pool.iter().all(|p| !p.is_dead()));
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut pool = pool_with_ages(&[(0.0, 1.0); 32]);
        let cap = pool.particles.capacity();
        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.gpu_data().is_empty());
        assert_eq!(pool.particles.capacity(), cap);
    }

    #[test]
    fn test_sync_to_gpu() {
        let mut pool = pool_with_ages(&[(0.0, 1.0), (0.0, 1.0)]);
        pool.sync_to_gpu();
        assert_eq!(pool.gpu_data()[1].position_rotation[0], 1.0);
        assert_eq!(pool.gpu_data_size(), 2 * std::mem::size_of::<GpuParticle>());
        assert_eq!(pool.gpu_bytes().len(), pool.gpu_data_size());
    }

    proptest! {
        #[test]
        fn removal_leaves_only_live_particles(
            entries in proptest::collection::vec((0.0f32..4.0, -1.0f32..4.0), 0..200)
        ) {
            let mut pool = pool_with_ages(&entries);
            let expected_dead = entries.iter().filter(|(a, l)| a >= l).count();
            let removed = pool.remove_dead_particles();
            prop_assert_eq!(removed, expected_dead);
            prop_assert_eq!(pool.len(), entries.len() - expected_dead);
            prop_assert_eq!(pool.len(), pool.gpu_data().len());
            prop_assert!(pool.iter().all(|p| p.age < p.lifetime));
        }
    }
}
