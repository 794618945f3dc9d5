/// Primitive number types whose alignment is a multiple of 4 bytes.
///
/// Receive buffers are made of these so the raw parameter tail of a task
/// frame can be viewed as `&[f32]` without copying.
pub trait Align4: bytemuck::Pod {}

impl Align4 for u32 {}
impl Align4 for i32 {}
impl Align4 for u64 {}
impl Align4 for i64 {}
impl Align4 for f32 {}
impl Align4 for f64 {}
