use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq)]
pub enum VectorDBError {
    #[error("Index is empty")]
    Empty,
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Vectors must not be empty")]
    EmptyVector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cosine similarity`; 0 for identical directions, 2 for opposite ones.
    Cosine,
    Euclidean,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        }
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub document_id: Uuid,
    pub source: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub distance: f32,
}

/// Session-scoped vector store. Brute-force scan over records in insertion order.
#[derive(Debug, Clone)]
pub struct VectorDB {
    records: Vec<VectorRecord>,
    metric: DistanceMetric,
}

impl VectorDB {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            records: Vec::new(),
            metric,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Dimensionality fixed by the first inserted record.
    pub fn dimensions(&self) -> Option<usize> {
        self.records.first().map(|r| r.embedding.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VectorRecord> {
        self.records.iter()
    }

    /// Checks a vector against the index dimensionality without inserting it.
    pub fn check_dimensions(&self, vector: &[f32]) -> Result<(), VectorDBError> {
        if vector.is_empty() {
            return Err(VectorDBError::EmptyVector);
        }
        match self.dimensions() {
            Some(expected) if expected != vector.len() => Err(VectorDBError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Appends a record. Returns its position in insertion order.
    pub fn insert(&mut self, record: VectorRecord) -> Result<usize, VectorDBError> {
        self.check_dimensions(&record.embedding)?;
        self.records.push(record);
        Ok(self.records.len() - 1)
    }

    /// The `k` nearest records, nearest first. Equal distances keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredRecord>, VectorDBError> {
        if self.records.is_empty() {
            return Err(VectorDBError::Empty);
        }
        self.check_dimensions(vector)?;

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, self.metric.distance(vector, &r.embedding)))
            .collect();

        // Stable sort, so ties stay in insertion order.
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| ScoredRecord {
                record: self.records[i].clone(),
                distance,
            })
            .collect())
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
