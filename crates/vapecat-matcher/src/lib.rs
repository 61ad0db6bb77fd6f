//! Product identity resolution: title normalization, brand resolution,
//! canonical keys and similarity grouping.
//!
//! Everything here is pure computation. Persistence lives in `vapecat-db`.

pub mod brand;
pub mod context;
pub mod error;
pub mod group;
pub mod key;
pub mod normalize;
pub mod similarity;

pub use brand::{BrandMatch, BrandResolution, BrandResolver};
pub use context::MatchContext;
pub use error::MatchError;
pub use group::{group_by_key, group_by_similarity, GroupingConfig, KeyedGroup, StrictGrouping};
pub use key::{token_sort_key, ProductKey, SpacingCorrector};
pub use normalize::Normalizer;
pub use similarity::similarity;
