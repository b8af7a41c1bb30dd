//! Runtime installation pipeline: release lookup, download, unpacking,
//! registry paths and the post-install smoke test.

pub mod archive;
pub mod events;
pub mod locator;
pub mod orchestrator;
pub mod registry;
pub mod smoke;
pub mod traits;
pub mod transport;
pub mod types;


pub use archive::{classify_artifact, ArchiveFormat, ArchiveInstaller, ArtifactKind, InstallLayout};
pub use events::{InstallEvent, InstallObserver, LogObserver, RecordingObserver};
pub use locator::GitHubReleaseLocator;
pub use orchestrator::InstallationOrchestrator;
pub use registry::RuntimeRegistry;
pub use smoke::{SmokeOutcome, SmokeTester, DEFAULT_SMOKE_TIMEOUT};
pub use traits::{ReleaseLocator, RuntimeManager};
pub use transport::{build_http_client, ArchiveTransport, DownloadedArtifact};
pub use types::{InstallManifest, OwnerRepo, Platform, ReleaseAsset, ReleaseInfo, VersionSpec};
