pub mod binding_builder;
pub mod binding_types;
pub mod buffer;
pub mod command_buffer;
pub mod device;
pub mod shader;
pub mod texture;
pub mod uniform_buffer;
pub mod work;

pub use buffer::Buffer;
pub use command_buffer::CommandBuffer;
pub use device::{Device, InitError};
pub use shader::ShaderLibrary;
pub use texture::{DoubleBuffered, Texture};
pub use uniform_buffer::UniformBuffer;
pub use work::{Bound, ComputeSize, DispatchParams, Work, WorkDesc, WorkResource};
