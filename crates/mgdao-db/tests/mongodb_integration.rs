//! MongoDB driver integration tests
//! Runs the DAO and handles against a real MongoDB 7.0 container

#![cfg(feature = "testcontainers")]

mod common;

use bson::{Document, doc};
use common::User;
use mgdao_conf::Settings;
use mgdao_db::{ConnectionRegistry, Dao, Error, MongoStore, RegistrySource};
use rstest::*;
use std::sync::Arc;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

#[fixture]
async fn mongodb() -> (ContainerAsync<GenericImage>, Arc<ConnectionRegistry>) {
	let container = GenericImage::new("mongo", "7.0")
		.with_exposed_port(27017.tcp())
		.with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
		.with_startup_timeout(std::time::Duration::from_secs(60))
		.start()
		.await
		.expect("Failed to start MongoDB container");
	let port = container
		.get_host_port_ipv4(27017)
		.await
		.expect("Failed to get MongoDB port");

	let settings = Settings::from_yaml(&format!(
		"go:\n  data:\n    mongodb:\n      uri: mongodb://127.0.0.1:{}\n      db: mgdao_it\n",
		port
	))
	.unwrap();
	let registry = Arc::new(ConnectionRegistry::new(
		Arc::new(MongoStore::new()),
		RegistrySource::Settings(settings),
	));

	(container, registry)
}

#[rstest]
#[tokio::test]
async fn test_dao_round_trip(#[future] mongodb: (ContainerAsync<GenericImage>, Arc<ConnectionRegistry>)) {
	// Arrange
	let (_container, registry) = mongodb.await;
	let users: Dao<User> = Dao::new(registry.clone(), "users");

	// Act
	users.insert(&User::new("alice", 31)).await.unwrap();
	users.insert(&User::new("bob", 25)).await.unwrap();
	let (rows, page) = users.pager(doc! {}, &["-age"], 1, 1).await.unwrap();

	// Assert
	assert_eq!(rows[0].name, "alice");
	assert_eq!((page.total, page.count), (2, 3));
	assert_eq!(users.delete(doc! {}).await.unwrap(), 2);
	assert_eq!(users.one(doc! {}).await.unwrap(), None);
}

#[rstest]
#[tokio::test]
async fn test_handles_against_driver(#[future] mongodb: (ContainerAsync<GenericImage>, Arc<ConnectionRegistry>)) {
	// Arrange
	let (_container, registry) = mongodb.await;
	let db = registry.connection(None).await.unwrap();
	let items = db.c("items");

	// Act
	items
		.insert(&[doc! { "_id": 1, "qty": 5 }, doc! { "_id": 2, "qty": 1 }])
		.await
		.unwrap();
	items
		.update_by_id(2, doc! { "$inc": { "qty": 4 } })
		.await
		.unwrap();
	let missing = items.remove_by_id(99).await;

	// Assert
	let second: Document = items.find_by_id(2).one().await.unwrap().unwrap();
	assert_eq!(second.get_i32("qty").unwrap(), 5);
	assert!(matches!(missing, Err(Error::NotFound)));
	assert_eq!(db.run_command(doc! { "ping": 1 }).await.unwrap().get_f64("ok").unwrap(), 1.0);
	db.drop_database().await.unwrap();
}

#[rstest]
#[tokio::test]
async fn test_health_check_passes(#[future] mongodb: (ContainerAsync<GenericImage>, Arc<ConnectionRegistry>)) {
	let (_container, registry) = mongodb.await;

	registry.check_all().await.unwrap();

	assert_eq!(registry.list_tags(), vec!["0"]);
	registry.close().await;
}
