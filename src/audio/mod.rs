pub mod chunk;
pub mod format;
pub mod frame;

pub use chunk::plan_chunks;
pub use format::AudioFormat;
pub use frame::FrameAssembler;
