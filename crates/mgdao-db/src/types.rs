//! Value types shared by the store boundary and the handles

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

/// Options applied to a find
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
	pub sort: Option<Document>,
	pub skip: Option<u64>,
	pub limit: Option<i64>,
}

impl FindOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn sort(mut self, sort: Document) -> Self {
		self.sort = Some(sort);
		self
	}

	pub fn skip(mut self, skip: u64) -> Self {
		self.skip = Some(skip);
		self
	}

	pub fn limit(mut self, limit: i64) -> Self {
		self.limit = Some(limit);
		self
	}
}

/// Outcome of an update or upsert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
	pub matched_count: u64,
	pub modified_count: u64,
	pub upserted_count: u64,
	pub upserted_id: Option<Bson>,
}

impl UpdateResult {
	pub fn new(
		matched_count: u64,
		modified_count: u64,
		upserted_count: u64,
		upserted_id: Option<Bson>,
	) -> Self {
		Self {
			matched_count,
			modified_count,
			upserted_count,
			upserted_id,
		}
	}
}

/// Outcome of a multi-document delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteResult {
	pub deleted_count: u64,
}

/// Pagination metadata returned next to a page of records
///
/// `count` is the number of pages, computed as `total / size + 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
	pub count: u64,
	pub index: u64,
	pub size: u64,
	pub total: u64,
}

/// Build a sort document from `"field"` (ascending) / `"-field"` (descending) keys
///
/// # Examples
///
/// ```
/// use bson::doc;
/// use mgdao_db::types::sort_document;
///
/// assert_eq!(sort_document(["name", "-age"]), doc! { "name": 1, "age": -1 });
/// ```
pub fn sort_document<I, S>(keys: I) -> Document
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut sort = Document::new();
	for key in keys {
		let (field, direction) = split_direction(key.as_ref());
		if !field.is_empty() {
			sort.insert(field, direction);
		}
	}
	sort
}

/// Index name the server derives from a key list, e.g. `name_1_age_-1`
pub fn index_name<I, S>(keys: I) -> String
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	keys.into_iter()
		.map(|key| {
			let (field, direction) = split_direction(key.as_ref());
			format!("{}_{}", field, direction)
		})
		.collect::<Vec<_>>()
		.join("_")
}

fn split_direction(key: &str) -> (&str, i32) {
	let key = key.trim();
	match key.strip_prefix('-') {
		Some(field) => (field, -1),
		None => (key.strip_prefix('+').unwrap_or(key), 1),
	}
}

/// Equality filter on the identifier field
pub fn id_filter(id: impl Into<Bson>) -> Document {
	doc! { "_id": id.into() }
}
