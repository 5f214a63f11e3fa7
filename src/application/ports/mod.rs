pub mod provider_directory;

pub use provider_directory::ProviderDirectory;
