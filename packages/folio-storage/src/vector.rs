use crate::{Error, Result};

/// Renders a vector as a pgvector text literal, e.g. `[0.1,0.2]`.
pub fn format_vector_text(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 10 + 2);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_vector_text(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets = trimmed
		.strip_prefix('[')
		.and_then(|s| s.strip_suffix(']'))
		.ok_or_else(|| Error::Decode("Vector text is not bracketed.".to_string()))?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value: f32 = part
			.trim()
			.parse()
			.map_err(|_| Error::Decode("Vector text contains a non-numeric value.".to_string()))?;

		vec.push(value);
	}

	Ok(vec)
}
