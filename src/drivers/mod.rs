pub mod error;
pub mod plot;
pub mod source;
pub mod tinkerforge;

pub use error::{PlotError, SourceError};
pub use plot::{render_pass_png, write_snapshot, PlotStyle};
pub use source::{ManualSource, SimulatedSource, VoltageSource};
pub use tinkerforge::TinkerforgeSource;
