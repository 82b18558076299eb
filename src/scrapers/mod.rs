pub mod browser;
pub mod daangn;
pub mod traits;
pub mod types;

pub use browser::ChromeSession;
pub use daangn::DaangnClient;
pub use traits::{ListingSource, SearchSession};
