use std::cmp::Ordering;

use crate::{Error, Result};

pub fn validate_vector(vec: &[f32], expected_dim: u32, label: &str) -> Result<()> {
	if vec.len() != expected_dim as usize {
		return Err(Error::InvalidEmbedding {
			message: format!("{label} has dimension {}, expected {expected_dim}.", vec.len()),
		});
	}
	if vec.iter().any(|value| !value.is_finite()) {
		return Err(Error::InvalidEmbedding {
			message: format!("{label} contains a non-finite value."),
		});
	}
	if squared_norm(vec) <= f32::EPSILON {
		return Err(Error::InvalidEmbedding { message: format!("{label} has zero magnitude.") });
	}

	Ok(())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	let denom = norm_a.sqrt() * norm_b.sqrt();

	if denom < f32::EPSILON {
		return 0.0;
	}

	dot / denom
}

/// A scored item plus the order it was stored in, which breaks score ties.
#[derive(Clone, Debug)]
pub struct Scored<T> {
	pub item: T,
	pub score: f32,
	pub seq: u64,
}

/// Highest scores first; equal scores keep insertion order.
pub fn top_k<T>(mut candidates: Vec<Scored<T>>, k: usize) -> Vec<Scored<T>> {
	candidates.sort_by(compare_ranked);
	candidates.truncate(k);

	candidates
}

fn compare_ranked<T>(a: &Scored<T>, b: &Scored<T>) -> Ordering {
	b.score.total_cmp(&a.score).then_with(|| a.seq.cmp(&b.seq))
}

fn squared_norm(vec: &[f32]) -> f32 {
	vec.iter().map(|value| value * value).sum()
}
