pub mod pacer;
pub mod shutdown;
pub mod tracing;

pub use self::pacer::*;
pub use self::shutdown::*;
pub use self::tracing::*;
