//! 核心宏定义

/// 为字段全部给出默认值的结构体实现 `Default`
///
/// ```rust
/// # use particle_engine::impl_default;
/// struct Limits {
///     max: u32,
///     scale: f32,
/// }
///
/// impl_default!(Limits {
///     max: 16,
///     scale: 1.0,
/// });
///
/// assert_eq!(Limits::default().max, 16);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}
