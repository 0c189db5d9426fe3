//! Database and collection handle tests
//! Identifier filters, not-found reporting, queries, bulk batches and cancellation

mod common;

use bson::{Document, doc};
use common::*;
use mgdao_db::backends::memory::MemoryStore;
use mgdao_db::{BulkResult, CollectionHandle, Context, DatabaseHandle, Error};
use rstest::*;
use std::time::Duration;

#[fixture]
async fn db(store: MemoryStore) -> DatabaseHandle {
	registry(&store, single_settings(SINGLE_URI))
		.connection(None)
		.await
		.unwrap()
}

async fn items(db: &DatabaseHandle) -> CollectionHandle {
	let items = db.c("items");
	items
		.insert(&[
			doc! { "_id": 1, "sku": "a", "qty": 5 },
			doc! { "_id": 2, "sku": "b", "qty": 1 },
			doc! { "_id": 3, "sku": "c", "qty": 9 },
		])
		.await
		.unwrap();
	items
}

#[rstest]
#[tokio::test]
async fn test_insert_persists_every_document(#[future] db: DatabaseHandle) {
	// Arrange
	let db = db.await;
	let people = db.collection("people");

	// Act
	let ids = people
		.insert(&[User::new("a", 1), User::new("b", 2)])
		.await
		.unwrap();

	// Assert
	assert_eq!(ids.len(), 2);
	assert_eq!(people.count().await.unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn test_insert_nothing_is_noop(#[future] db: DatabaseHandle) {
	let db = db.await;
	let people = db.collection("people");

	let ids = people.insert::<User>(&[]).await.unwrap();

	assert!(ids.is_empty());
	assert_eq!(people.count().await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn test_find_by_id(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;

	let found: Option<Document> = items.find_by_id(2).one().await.unwrap();

	assert_eq!(found, Some(doc! { "_id": 2, "sku": "b", "qty": 1 }));
}

#[rstest]
#[tokio::test]
async fn test_query_sort_skip_limit(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;

	let skus: Vec<String> = items
		.find(doc! {})
		.sort(["-qty"])
		.skip(1)
		.limit(1)
		.all::<Document>()
		.await
		.unwrap()
		.into_iter()
		.map(|d| d.get_str("sku").unwrap().to_string())
		.collect();

	assert_eq!(skus, vec!["a"]);
}

#[rstest]
#[tokio::test]
async fn test_query_count_uses_filter(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;

	let count = items.find(doc! { "qty": { "$gte": 5 } }).count().await.unwrap();

	assert_eq!(count, 2);
	assert_eq!(items.count().await.unwrap(), 3);
}

#[rstest]
#[tokio::test]
async fn test_remove_reports_not_found(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;

	items.remove_by_id(1).await.unwrap();
	let again = items.remove_by_id(1).await;

	assert!(matches!(again, Err(Error::NotFound)));
	assert_eq!(items.count().await.unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn test_update_reports_not_found(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;

	let result = items.update_by_id(42, doc! { "$set": { "qty": 0 } }).await;

	assert!(matches!(result, Err(Error::NotFound)));
}

#[rstest]
#[tokio::test]
async fn test_update_all_and_remove_all_report_counts(#[future] db: DatabaseHandle) {
	// Arrange
	let db = db.await;
	let items = items(&db).await;

	// Act
	let updated = items
		.update_all(doc! { "qty": { "$lt": 6 } }, doc! { "$inc": { "qty": 10 } })
		.await
		.unwrap();
	let removed = items.remove_all(doc! { "qty": { "$gt": 10 } }).await.unwrap();

	// Assert
	assert_eq!(updated.matched_count, 2);
	assert_eq!(updated.modified_count, 2);
	assert_eq!(removed.deleted_count, 2);
}

#[rstest]
#[tokio::test]
async fn test_upsert_inserts_then_updates(#[future] db: DatabaseHandle) {
	// Arrange
	let db = db.await;
	let counters = db.c("counters");

	// Act
	let first = counters
		.upsert(doc! { "name": "visits" }, doc! { "$inc": { "n": 1 } })
		.await
		.unwrap();
	let second = counters
		.upsert(doc! { "name": "visits" }, doc! { "$inc": { "n": 1 } })
		.await
		.unwrap();

	// Assert
	assert_eq!(first.upserted_count, 1);
	assert!(first.upserted_id.is_some());
	assert_eq!(second.matched_count, 1);
	let counter: Document = counters.find(doc! { "name": "visits" }).one().await.unwrap().unwrap();
	assert_eq!(counter.get_i32("n").unwrap(), 2);
}

#[rstest]
#[tokio::test]
async fn test_upsert_by_id_uses_given_id(#[future] db: DatabaseHandle) {
	let db = db.await;
	let settings = db.c("settings");

	settings
		.upsert_by_id("theme", doc! { "$set": { "value": "dark" } })
		.await
		.unwrap();

	let stored: Document = settings.find_by_id("theme").one().await.unwrap().unwrap();
	assert_eq!(stored, doc! { "_id": "theme", "value": "dark" });
}

#[rstest]
#[tokio::test]
async fn test_bulk_runs_in_order(#[future] db: DatabaseHandle) {
	// Arrange
	let db = db.await;
	let items = items(&db).await;
	let mut bulk = items.bulk();
	bulk.insert(&doc! { "_id": 4, "sku": "d", "qty": 0 })
		.update_one(doc! { "_id": 4 }, doc! { "$set": { "qty": 3 } })
		.upsert(doc! { "_id": 5 }, doc! { "$set": { "sku": "e" } })
		.remove(doc! { "_id": 1 })
		.remove_all(doc! { "qty": { "$gt": 8 } });
	assert_eq!(bulk.len(), 5);

	// Act
	let result = bulk.run().await.unwrap();

	// Assert
	assert_eq!(
		result,
		BulkResult {
			inserted: 1,
			matched: 1,
			modified: 1,
			upserted: 1,
			deleted: 2,
		}
	);
	let qty: Document = items.find_by_id(4).one().await.unwrap().unwrap();
	assert_eq!(qty.get_i32("qty").unwrap(), 3);
	assert_eq!(items.count().await.unwrap(), 3);
}

#[rstest]
#[tokio::test]
async fn test_bulk_stops_at_first_failure(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;
	let mut bulk = items.bulk();
	bulk.insert(&doc! { "_id": 7 })
		.insert(&doc! { "_id": 1 })
		.insert(&doc! { "_id": 8 });

	let result = bulk.run().await;

	assert!(matches!(result, Err(Error::Execution(_))));
	assert!(items.find_by_id(7).one::<Document>().await.unwrap().is_some());
	assert!(items.find_by_id(8).one::<Document>().await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn test_drop_index_from_keys(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;

	assert!(items.drop_index(["sku", "-qty"]).await.is_ok());
	assert!(matches!(
		items.drop_index(Vec::<String>::new()).await,
		Err(Error::InvalidOperation(_))
	));
}

#[rstest]
#[tokio::test]
async fn test_drop_collection_and_database(#[future] db: DatabaseHandle) {
	let db = db.await;
	let items = items(&db).await;
	db.c("other").insert_one(&doc! { "x": 1 }).await.unwrap();

	items.drop_collection().await.unwrap();
	assert_eq!(items.count().await.unwrap(), 0);
	assert_eq!(db.c("other").count().await.unwrap(), 1);

	db.drop_database().await.unwrap();
	assert_eq!(db.c("other").count().await.unwrap(), 0);
}

#[rstest]
#[tokio::test]
async fn test_run_command_ping(#[future] db: DatabaseHandle) {
	let db = db.await;

	let reply = db.run_command(doc! { "ping": 1 }).await.unwrap();

	assert_eq!(reply.get_f64("ok").unwrap(), 1.0);
}

#[rstest]
#[tokio::test]
async fn test_cancelled_context_wins_over_store(#[future] db: DatabaseHandle) {
	// Arrange
	let db = db.await;
	let ctx = Context::background();
	let items = db.c("items").context(ctx.clone());
	ctx.cancel();

	// Act
	let insert = items.insert_one(&doc! { "_id": 1 }).await;
	let query = items.find(doc! {}).all::<Document>().await;

	// Assert
	assert!(matches!(insert, Err(Error::Cancelled)));
	assert!(matches!(query, Err(Error::Cancelled)));
	assert_eq!(db.c("items").count().await.unwrap(), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_expired_deadline_is_reported(#[future] db: DatabaseHandle) {
	let db = db.await.context(Context::background().with_timeout(Duration::from_millis(10)));
	tokio::time::sleep(Duration::from_millis(20)).await;

	let result = db.c("items").count().await;

	assert!(matches!(result, Err(Error::DeadlineExceeded)));
}

#[rstest]
#[tokio::test]
async fn test_database_context_flows_to_collections(#[future] db: DatabaseHandle) {
	let ctx = Context::background();
	let db = db.await.context(ctx.child());
	ctx.cancel();

	let result = db.run_command(doc! { "ping": 1 }).await;

	assert!(matches!(result, Err(Error::Cancelled)));
	assert!(db.ctx().is_cancelled());
}
