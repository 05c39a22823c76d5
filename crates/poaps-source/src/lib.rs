//! POAP streams for decentraland-tap
//!
//! Two incremental streams over the POAP (proof of attendance) data set:
//!
//! - `poaps_xdai` - events indexed by a subgraph on the xDai chain, paged
//!   through a GraphQL query on the `created` timestamp
//! - `poaps_metadata` - event metadata from the POAP REST API, paged by a
//!   date token taken from the last record of each page
//!
//! Both implement [`sync_core::IncrementalStream`] and carry their own
//! checkpoint type for resuming.

pub mod context;
pub mod metadata;
pub mod testing;
pub mod transport;
pub mod xdai;

pub use context::PoapEventContext;
pub use metadata::{
    PageToken, PoapMetadata, PoapsMetadataCheckpoint, PoapsMetadataStream, RawPoapMetadata,
    POAPS_METADATA, POAPS_METADATA_SCHEMA,
};
pub use transport::{HttpTransport, ReqwestTransport, TransportOpts};
pub use xdai::{PoapEvent, PoapsXdaiCheckpoint, PoapsXdaiStream, POAPS_XDAI, POAPS_XDAI_SCHEMA};
