pub mod fixtures;
pub mod mock_release_server;

pub use mock_release_server::{MockReleaseServer, ReleaseFixture};
