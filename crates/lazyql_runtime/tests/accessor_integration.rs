//! Integration tests for the accessor engine.

use lazyql_core::{SelectionKey, SelectionSpec, SelectionType};
use lazyql_runtime::{
    CacheTarget, Client, ClientConfig, Data, ErrorCode, FieldValue, NormalizationConfig,
};
use lazyql_schema::{ObjectType, Schema, SchemaBuilder, SchemaNode};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn schema() -> Schema {
    SchemaBuilder::new()
        .add_object(
            "Query",
            ObjectType::new()
                .field("hello", "String")
                .field("tags", "[String!]")
                .field("me", "User")
                .field("search", "$SearchResult")
                .field("user1", "String")
                .field_with_args("user", "User", [("id", "ID")]),
        )
        .add_object(
            "Subscription",
            ObjectType::new()
                .field("ticker", "Int")
                .field("feed", "$SearchResult"),
        )
        .add_object(
            "User",
            ObjectType::new()
                .field("id", "ID!")
                .field("name", "String")
                .field("friends", "[User]"),
        )
        .add_object(
            "Book",
            ObjectType::new()
                .field("title", "String!")
                .field("pages", "Int"),
        )
        .add_object(
            "Movie",
            ObjectType::new()
                .field("title", "String!")
                .field("duration", "Int"),
        )
        .add_union("SearchResult", ["Book", "Movie"])
        .build()
}

fn paths(selections: &[Rc<lazyql_core::Selection>]) -> Vec<String> {
    selections.iter().map(ToString::to_string).collect()
}

/// Test that unchanged cache content yields the same accessor.
#[test]
fn test_identity_stability() {
    let client = Client::new(schema());
    client
        .query()
        .set("me", json!({"id": "1", "name": "Ada"}))
        .unwrap();

    let first = client.query().get("me").unwrap();
    let second = client.query().get("me").unwrap();
    assert!(first.as_object().unwrap().ptr_eq(second.as_object().unwrap()));

    // Writing below the object keeps its identity.
    first
        .as_object()
        .unwrap()
        .set("name", json!("Grace"))
        .unwrap();
    let third = client.query().get("me").unwrap();
    assert!(first.as_object().unwrap().ptr_eq(third.as_object().unwrap()));

    // Replacing the object does not.
    client
        .query()
        .set("me", json!({"id": "2", "name": "Linus"}))
        .unwrap();
    let fourth = client.query().get("me").unwrap();
    assert!(!first.as_object().unwrap().ptr_eq(fourth.as_object().unwrap()));
}

/// Test that written values read back structurally equal.
#[test]
fn test_round_trip() {
    let client = Client::new(schema());
    let me = client
        .selections()
        .get_selection(SelectionSpec::child("me", &client.selections().query_root()));
    let value = json!({"id": "1", "name": "Ada", "friends": [{"id": "2", "name": "Grace"}, null]});
    client.set_cache(&me, value.clone()).unwrap();

    let read = client.query().get("me").unwrap();
    assert_eq!(read.to_json(), Some(value));

    let me = read.as_object().unwrap();
    assert_eq!(me.get("name").unwrap().as_value(), Some(&json!("Ada")));
    let friends = me.get("friends").unwrap();
    let friends = friends.as_array().unwrap();
    assert_eq!(friends.len(), 2);
    let grace = friends.get(0);
    assert_eq!(
        grace.as_object().unwrap().get("name").unwrap().as_value(),
        Some(&json!("Grace"))
    );
    assert!(friends.get(1).is_null());
    assert!(client.found_valid_cache());
}

/// Test that a miss enqueues exactly one fetch selection.
#[test]
fn test_cache_miss_enqueue() {
    let client = Client::new(schema());
    let interceptor = client.interceptors().create_interceptor();

    assert!(client.query().get("hello").unwrap().is_undefined());
    assert_eq!(paths(&interceptor.fetch_selections()), ["query.hello"]);

    let tags = client.query().get("tags").unwrap();
    assert_eq!(tags.as_value(), Some(&json!([])));
    assert_eq!(
        paths(&interceptor.fetch_selections()),
        ["query.hello", "query.tags"]
    );
    assert!(!client.found_valid_cache());
}

/// Test reads through a union narrowed by the cached `__typename`.
#[test]
fn test_union_narrowing() {
    let client = Client::new(schema());
    client
        .query()
        .set(
            "search",
            json!({"__typename": "Book", "title": "Dune", "pages": 412}),
        )
        .unwrap();

    let search = client.query().get("search").unwrap();
    let search = search.as_object().unwrap();
    assert_eq!(search.schema_node(), &SchemaNode::Union("SearchResult".into()));

    let interceptor = client.interceptors().create_interceptor();

    assert_eq!(search.get("pages").unwrap().as_value(), Some(&json!(412)));
    assert_eq!(
        search.get("__typename").unwrap().as_value(),
        Some(&json!("Book"))
    );
    assert!(search.get("duration").unwrap().is_undefined());

    let movie = search.get("Movie").unwrap();
    let movie = movie.as_object().unwrap();
    assert_eq!(movie.unions(), Some(&["Movie".to_string()][..]));
    assert_eq!(movie.parent_typename(), Some("Movie"));
    assert!(movie.get("duration").unwrap().is_undefined());

    let duration = interceptor
        .cache_selections()
        .into_iter()
        .find(|selection| selection.key().as_field() == Some("duration"))
        .unwrap();
    assert!(!interceptor.has_fetch(&duration));
    assert!(paths(&interceptor.fetch_selections())
        .iter()
        .all(|path| path == "query.search.__typename"));

    assert!(search.on("Book").unwrap().ptr_eq(&search.on("Book").unwrap()));
    assert!(search.on("User").is_none());
    assert!(search.get("toJSON").unwrap().is_undefined());
}

/// Test that a union without a cached `__typename` only resolves `__typename`.
#[test]
fn test_union_without_typename() {
    let client = Client::new(schema());
    client.query().set("search", json!({})).unwrap();

    let search = client.query().get("search").unwrap();
    let search = search.as_object().unwrap();

    let err = search.get("title").unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidUnion);
    assert!(search.get("__typename").unwrap().is_undefined());
    assert!(client
        .interceptors()
        .global()
        .fetch_selections()
        .iter()
        .any(|selection| selection.to_string() == "query.search.__typename"));
}

/// Test that reading the length of an unresolved list enqueues its first item.
#[test]
fn test_array_length_enqueues_first_item() {
    let client = Client::new(schema());
    client.query().set("me", json!({"id": "1"})).unwrap();

    let me = client.query().get("me").unwrap();
    let friends = me.as_object().unwrap().get("friends").unwrap();
    let friends = friends.as_array().unwrap();
    assert!(!friends.is_resolved());
    assert_eq!(friends.len(), 0);

    let global = client.interceptors().global();
    assert!(paths(&global.cache_selections()).contains(&"query.me.friends.0".to_string()));
    assert!(paths(&global.fetch_selections()).contains(&"query.me.friends.0.__typename".to_string()));
    assert_eq!(friends.children().len(), 1);
}

/// Test that cached subscription fields are still force-fetched on every read.
#[test]
fn test_subscription_always_live() {
    let client = Client::new(schema());
    client.subscription().set("ticker", json!(42)).unwrap();

    let interceptor = client.interceptors().create_interceptor();
    let ticker = client.subscription().get("ticker").unwrap();
    assert_eq!(ticker.as_value(), Some(&json!(42)));

    let fetched = interceptor.fetch_selections();
    assert_eq!(paths(&fetched), ["subscription.ticker"]);
    assert_eq!(fetched[0].kind(), SelectionType::Subscription);
    assert!(interceptor.refetch_selections().is_empty());

    interceptor.clear();
    client.subscription().get("ticker").unwrap();
    assert_eq!(interceptor.fetch_selections().len(), 1);
}

/// Test the user / friends walkthrough.
#[test]
fn test_user_scenario() {
    let client = Client::new(schema());
    let user_fn = client.query().get("user").unwrap();
    let user_fn = user_fn.as_callable().unwrap().clone();

    let user = user_fn.call(json!({"id": "1"})).unwrap();
    let name = user.as_object().unwrap().get("name").unwrap();
    assert!(name.is_undefined());

    let fetched = client.interceptors().global().fetch_selections();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].key().as_field(), Some("name"));
    let user_selection = fetched[0].prev().unwrap();
    assert_eq!(user_selection.key().as_field(), Some("user"));
    assert_eq!(user_selection.args(), json!({"id": "1"}).as_object());

    client
        .set_cache(
            CacheTarget::function(user_fn.clone(), json!({"id": "1"})),
            json!({"id": "1", "name": "Ada"}),
        )
        .unwrap();

    let user = user_fn.call(json!({"id": "1"})).unwrap();
    let user = user.as_object().unwrap();
    assert_eq!(user.get("name").unwrap().as_value(), Some(&json!("Ada")));

    let friends = user.get("friends").unwrap();
    assert_eq!(friends.as_array().unwrap().len(), 0);

    let typename = client
        .interceptors()
        .global()
        .fetch_selections()
        .into_iter()
        .find(|selection| selection.key().as_field() == Some("__typename"))
        .unwrap();
    let item = typename.prev().unwrap();
    assert_eq!(item.key(), &SelectionKey::Index(0));
    assert_eq!(item.prev().unwrap().key().as_field(), Some("friends"));
}

/// Test that normalization keys are fetched ahead of the missed field.
#[test]
fn test_normalization_keys() {
    let config =
        ClientConfig::new().normalization(NormalizationConfig::new().keys("User", ["id"]));
    let client = Client::with_config(schema(), config);

    let me = client.query().get("me").unwrap();
    me.as_object().unwrap().get("name").unwrap();

    assert_eq!(
        paths(&client.interceptors().global().fetch_selections()),
        ["query.me.id", "query.me.name"]
    );
}

/// Test that a recorded fetch error suppresses re-enqueueing.
#[test]
fn test_fetch_error_suppression() {
    let client = Client::new(schema());
    let hello = client
        .selections()
        .get_selection(SelectionSpec::child("hello", &client.selections().query_root()));
    client.record_fetch_error(&hello);

    let interceptor = client.interceptors().create_interceptor();
    assert!(client.query().get("hello").unwrap().is_undefined());
    assert!(interceptor.fetch_selections().is_empty());
    assert!(interceptor.has_cache(&hello));
    assert!(!client.found_valid_cache());

    client.clear_fetch_errors();
    client.query().get("hello").unwrap();
    assert!(interceptor.has_fetch(&hello));
}

/// Test that selections read through one accessor are replayed onto another.
#[test]
fn test_assign_selections() {
    let client = Client::new(schema());
    let me = client.query().get("me").unwrap();
    me.as_object().unwrap().get("id").unwrap();
    me.as_object().unwrap().get("name").unwrap();

    let user = client.query().get("user").unwrap();
    let target = user.as_callable().unwrap().call(json!({"id": "7"})).unwrap();

    let interceptor = client.interceptors().create_interceptor();
    client.assign_selections(&me, &target).unwrap();

    let target = target.as_object().unwrap();
    let keys: Vec<_> = interceptor
        .fetch_selections()
        .iter()
        .map(|selection| selection.key().clone())
        .collect();
    assert_eq!(keys, [SelectionKey::from("id"), SelectionKey::from("name")]);
    assert_eq!(target.history(), interceptor.fetch_selections());
}

/// Test that invalid cache writes fail without touching the cache.
#[test]
fn test_set_cache_errors() {
    let client = Client::new(schema());
    let user = client.query().get("user").unwrap();

    let err = client
        .set_cache(FieldValue::from(json!("proxy")), json!({}))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidProxy);
    assert!(err.is_input_error());

    let err = client
        .set_cache(CacheTarget::function(user.clone(), json!([1])), json!({}))
        .unwrap_err();
    assert_eq!(err.to_string(), "[INVALID_ARGUMENTS] Invalid arguments of type: array");

    let err = client
        .set_cache(CacheTarget::function(FieldValue::Undefined, None), json!({}))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidFunction);

    assert_eq!(client.cache().snapshot(), json!({}));
}

/// Test that accessors nobody holds are released.
#[test]
fn test_weak_release() {
    let client = Client::new(schema());
    let me = client
        .selections()
        .get_selection(SelectionSpec::child("me", &client.selections().query_root()));
    let before = client.live_accessors();

    let accessor = client
        .create_accessor(SchemaNode::Object("User".into()), &me, None, Some("User"))
        .unwrap()
        .unwrap();
    accessor.get("friends").unwrap();
    assert_eq!(client.live_accessors(), before + 2);

    drop(accessor);
    assert_eq!(client.live_accessors(), before);
}

/// Test list resizing and its events.
#[test]
fn test_set_len() {
    let client = Client::new(schema());
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    client.events().on_cache_change(move |event| {
        sink.borrow_mut().push(event.data.clone());
    });

    client.query().set("me", json!({"friends": []})).unwrap();
    let me = client.query().get("me").unwrap();
    let friends = me.as_object().unwrap().get("friends").unwrap();
    let friends = friends.as_array().unwrap();
    assert!(friends.is_resolved());

    friends.set_len(2);
    assert_eq!(friends.to_json(), json!([null, null]));
    assert_eq!(friends.len(), 2);

    assert_eq!(
        events.borrow().as_slice(),
        [Some(json!({"friends": []})), Some(json!([null, null]))]
    );
}

/// Test that listeners see every write and can be removed.
#[test]
fn test_cache_change_events() {
    let client = Client::new(schema());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let id = client.events().on_cache_change(move |event| {
        sink.borrow_mut().push(event.selection.to_string());
    });

    client.query().set("hello", json!("world")).unwrap();
    let me = client.query().get("me").unwrap();
    client
        .set_cache(&me, Data::from([("name", Data::from(json!("Ada")))]))
        .unwrap();
    assert_eq!(seen.borrow().as_slice(), ["query.hello", "query.me"]);

    assert!(client.events().remove_listener(id));
    client.query().set("hello", json!("again")).unwrap();
    assert_eq!(seen.borrow().len(), 2);
}

/// Test that disallowing the cache turns every read into a fetch.
#[test]
fn test_allow_cache_disabled() {
    let client = Client::with_config(schema(), ClientConfig::new().allow_cache(false));
    client.query().set("hello", json!("world")).unwrap();
    client.query().set("me", Data::from(json!(null))).unwrap();

    let interceptor = client.interceptors().create_interceptor();
    let hello = client.query().get("hello").unwrap();
    assert_eq!(hello.as_value(), Some(&json!("world")));
    assert_eq!(paths(&interceptor.fetch_selections()), ["query.hello"]);
    assert!(interceptor.refetch_selections().is_empty());

    // A cached null still yields an accessor.
    assert!(client.query().get("me").unwrap().as_object().is_some());

    client.set_allow_cache(true);
    assert!(client.query().get("me").unwrap().is_null());
}

/// Test that a field with arguments and a plain field named like its alias stay apart.
#[test]
fn test_arguments_do_not_collide_with_fields() {
    let client = Client::new(schema());
    let user_fn = client.query().get("user").unwrap();
    let user_fn = user_fn.as_callable().unwrap().clone();

    client
        .set_cache(
            CacheTarget::function(user_fn.clone(), json!({"id": "1"})),
            json!({"id": "1", "name": "Ada"}),
        )
        .unwrap();
    assert!(client.query().get("user1").unwrap().is_undefined());
    let snapshot = client.cache().snapshot();
    assert!(snapshot["query"].get("user1").is_none());

    client.query().set("user1", json!("plain")).unwrap();
    let user = user_fn.call(json!({"id": "1"})).unwrap();
    assert_eq!(
        user.as_object().unwrap().get("name").unwrap().as_value(),
        Some(&json!("Ada"))
    );
    assert_eq!(
        client.query().get("user1").unwrap().as_value(),
        Some(&json!("plain"))
    );
}

/// Test that rewriting a field does not keep accessors of older snapshots alive.
#[test]
fn test_rewrites_release_stale_children() {
    let client = Client::new(schema());
    client.query().set("me", json!({"id": "0"})).unwrap();
    client.query().get("me").unwrap();
    let before = client.live_accessors();

    for i in 1..=1000 {
        client.query().set("me", json!({"id": i.to_string()})).unwrap();
        let me = client.query().get("me").unwrap();
        me.as_object().unwrap().get("friends").unwrap();
    }

    assert!(client.live_accessors() <= before + 1);
    assert_eq!(client.query().children().len(), 1);
}

/// Test that a union member read fetches the member's normalization keys.
#[test]
fn test_union_normalization_keys() {
    let config =
        ClientConfig::new().normalization(NormalizationConfig::new().keys("Book", ["title"]));
    let client = Client::with_config(schema(), config);
    client
        .query()
        .set("search", json!({"__typename": "Book"}))
        .unwrap();

    let search = client.query().get("search").unwrap();
    assert!(search.as_object().unwrap().get("pages").unwrap().is_undefined());

    let fetched = client.interceptors().global().fetch_selections();
    assert_eq!(
        paths(&fetched),
        [
            "query.search.__typename",
            "query.search.title",
            "query.search.pages"
        ]
    );
    let title = &fetched[1];
    assert_eq!(title.unions().map(|unions| unions.to_vec()), Some(vec!["Book".to_string()]));
}

/// Test that member type mismatches suppress fetching for queries but not subscriptions.
#[test]
fn test_member_mismatch_suppression() {
    let client = Client::new(schema());
    client
        .query()
        .set("search", json!({"__typename": "Movie"}))
        .unwrap();
    client
        .subscription()
        .set("feed", json!({"__typename": "Movie"}))
        .unwrap();
    let interceptor = client.interceptors().create_interceptor();

    let search = client.query().get("search").unwrap();
    let book = search.as_object().unwrap().get("Book").unwrap();
    assert!(book.as_object().unwrap().get("pages").unwrap().is_undefined());

    let feed = client.subscription().get("feed").unwrap();
    let book = feed.as_object().unwrap().get("Book").unwrap();
    assert!(book.as_object().unwrap().get("pages").unwrap().is_undefined());

    let fetched = paths(&interceptor.fetch_selections());
    assert!(!fetched.contains(&"query.search.pages".to_string()));
    assert!(fetched.contains(&"subscription.feed.pages".to_string()));
}

/// Test that a list cached as `null` reads as `null` without an accessor.
#[test]
fn test_null_list() {
    let client = Client::new(schema());
    client.query().set("me", json!({"friends": null})).unwrap();

    let me = client.query().get("me").unwrap();
    let me = me.as_object().unwrap();
    let interceptor = client.interceptors().create_interceptor();

    let friends = me.get("friends").unwrap();
    assert!(friends.is_null());
    assert!(friends.as_array().is_none());
    assert!(interceptor.fetch_selections().is_empty());
    assert!(me.children().is_empty());
}
