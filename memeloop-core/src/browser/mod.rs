mod automation;
mod error;

pub use automation::{BrowserAutomation, BrowserLauncher, SurfaceContext};
pub use error::{BrowserError, BrowserResult};
