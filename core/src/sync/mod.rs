pub mod barrier;
pub mod buffer;

pub use barrier::SynchronizationBarrier;
pub use buffer::DeviceStreamBuffer;
