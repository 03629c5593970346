//! External collaborators feeding the pipeline
//!
//! - [`pub2tools`]: candidate extraction tool
//! - [`homepage`]: homepage reachability probe
//! - [`europe_pmc`]: publication abstracts
//! - [`registry`]: bio.tools membership index

pub mod europe_pmc;
pub mod homepage;
pub mod pub2tools;
pub mod registry;

pub use europe_pmc::{EuropePmcClient, EuropePmcConfig, PublicationEnricher};
pub use homepage::{HomepageConfig, HomepageScraper, HttpHomepageScraper};
pub use pub2tools::{CandidateFetcher, FetchWindow, Pub2ToolsCli, Pub2ToolsConfig};
pub use registry::RegistryIndex;
