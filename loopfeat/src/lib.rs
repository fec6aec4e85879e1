pub mod bound;
pub mod common;
pub mod expr;
pub mod feature;
pub mod opset;
pub mod records;
pub mod stmt;

pub use feature::{
    per_store_feature_names, per_store_feature_sets, per_store_features,
    per_store_features_batch, serialize_features, FeatureError, FeatureOptions,
};
