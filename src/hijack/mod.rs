mod hijacker;
mod shim;
mod surface;

pub use hijacker::{Hijacker, LibraryHijackRecord};
pub use shim::{ClockProbe, Shim};
pub use surface::{Binding, LibraryId, SystemSource, TimeSource, TimeSurface};
