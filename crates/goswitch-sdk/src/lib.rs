//! The Go SDK engine behind goswitch.
//!
//! `SdkManager` implements [`goswitch_backend::VersionManager`] over an
//! [`FsStore`] (the managed install root and active pointer on disk) and a
//! release source such as [`goswitch_core::HttpReleaseSource`]. Installs found
//! elsewhere on the host are picked up by [`SystemScan`].

mod discovery;
mod manager;
mod store;

pub use discovery::{ForeignInstall, SystemScan, UNKNOWN_VERSION, canonical, describe_install};
pub use manager::{ManagerOptions, SdkManager};
pub use store::FsStore;
