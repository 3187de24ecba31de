mod settings;
mod topology;

pub use settings::*;
pub use topology::*;
