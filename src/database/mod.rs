pub mod vector_db;

pub use vector_db::{DistanceMetric, ScoredRecord, VectorDB, VectorDBError, VectorRecord};
