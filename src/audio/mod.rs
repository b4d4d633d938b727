pub mod metadata;
pub mod tags;
pub mod transcode;
