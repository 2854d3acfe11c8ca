pub mod backend;
pub mod clock;
pub mod desktop;
pub mod sqlite_store;

pub use backend::HttpBackend;
pub use clock::SystemClock;
pub use desktop::DesktopNotifier;
pub use sqlite_store::SqliteStore;
