pub mod acl;
pub mod chunk;
pub mod collection;
pub mod principal;
pub mod similarity;

mod error;

pub use acl::UserAuthorization;
pub use chunk::{ChunkWithEmbedding, RankedResult, StoredChunkRecord};
pub use collection::{Collection, CollectionConfig, CollectionPath, CollectionPattern};
pub use error::{Error, Result};
pub use principal::{ExternalPrincipal, PrincipalId, PrincipalKind};
