#[cfg(feature = "chrome")]
pub mod chrome;
pub mod session;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSession;
pub use session::{BrowserSession, ExtractMode};
