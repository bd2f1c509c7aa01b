pub mod analysis;
pub mod differential;
pub mod enums;
pub mod guideline;
pub mod input;
pub mod patient;
pub mod soap;

pub use analysis::*;
pub use differential::*;
pub use enums::*;
pub use guideline::*;
pub use input::*;
pub use patient::*;
pub use soap::*;
