mod layout;
mod palette;
mod panel;
mod presets;

pub use crate::layout::*;
pub use crate::palette::*;
pub use crate::panel::*;
pub use crate::presets::*;
