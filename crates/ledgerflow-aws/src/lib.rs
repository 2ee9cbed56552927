//! # ledgerflow-aws
//!
//! AWS implementations of the ledgerflow collaborator traits.
//!
//! | Feature          | Type                        | Implements      |
//! |------------------|-----------------------------|-----------------|
//! | `dynamodb`       | [`DynamoDbStore`]           | `KeyValueStore` |
//! | `s3`             | [`S3ObjectStore`]           | `ObjectStore`   |
//! | `secretsmanager` | [`SecretsManagerResolver`]  | `SecretResolver`|
//!
//! All clients share one [`AwsConfig`], so a single region and endpoint
//! override (LocalStack) applies everywhere.
//!
//! ```rust,ignore
//! let sdk = AwsConfig::default().load().await;
//! let store = DynamoDbStore::new(&sdk);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "s3")]
pub mod s3;

#[cfg(feature = "secretsmanager")]
pub mod secrets;

pub use config::{AwsConfig, SensitiveString, DEFAULT_REGION};

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;

#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

#[cfg(feature = "secretsmanager")]
pub use secrets::SecretsManagerResolver;
