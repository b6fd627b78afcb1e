pub mod burn_detection;
pub mod inscription_indexing;
