//! # Task Center Region Library
//!
//! Regional task-center backends: per-shard member storage, the owner
//! invariant, and routing from region names to regional implementations.
//!
//! ## Modules
//!
//! - `store`: `ShardStore` trait with in-memory and PostgreSQL implementations
//! - `private`: `RegionPrivateApi`, the per-region membership rules
//! - `client`: `InternalRegionApi` and the in-process `InternalRegionClient`
//! - `error`: Region outcomes, public rejections and internal failures
//!
//! ## Example
//!
//! ```
//! use taskcenter_region::client::{InternalRegionApi, InternalRegionClient};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), taskcenter_region::error::RegionFailure> {
//! let client = InternalRegionClient::in_memory([("us", 4)], 100);
//! let user = Uuid::new_v4();
//! let shard = client.create_personal_task_center("us", user, "ali").await?;
//! assert!((0..4).contains(&shard));
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod private;
pub mod store;

pub use client::{InternalRegionApi, InternalRegionClient};
pub use error::{RegionFailure, RegionOutcome, RegionRejection, ShardStoreError};
pub use private::RegionPrivateApi;
