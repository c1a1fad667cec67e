pub mod fixture;

pub use fixture::DirectoryFetcher;
