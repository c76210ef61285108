pub mod ids;
pub mod preset;
pub mod run;

pub use ids::{RunId, SessionId};
pub use preset::Preset;
pub use run::*;
