use super::*;
use crate::results::HandlerResult;
use crate::route::{handler, Args, Route, RouteKind, RouteSpec};
use std::sync::Arc;

fn route() -> Arc<Route> {
    let spec = RouteSpec::new(handler(|_: Args| async {
        anyhow::Ok(HandlerResult::from("ok"))
    }));
    Arc::new(spec.build(RouteKind::Http).unwrap())
}

fn found(resolution: Resolution) -> (Arc<Route>, ParamVec) {
    match resolution {
        Resolution::Found { route, params } => (route, params),
        other => panic!("expected a match, got {other:?}"),
    }
}

#[test]
fn test_root_path() {
    let mut table = RouteTable::new(8).unwrap();
    let root = route();
    table.insert(MethodTable::Get, "/", None, Arc::clone(&root)).unwrap();
    let (matched, params) = found(table.resolve(MethodTable::Get, "/"));
    assert!(Arc::ptr_eq(&matched, &root));
    assert!(params.is_empty());
}

#[test]
fn test_trailing_slash_is_stripped() {
    let mut table = RouteTable::new(8).unwrap();
    table.insert(MethodTable::Get, "/widgets/", None, route()).unwrap();
    found(table.resolve(MethodTable::Get, "/widgets"));
    found(table.resolve(MethodTable::Get, "/widgets/"));
}

#[test]
fn test_parameterized_path() {
    let mut table = RouteTable::new(8).unwrap();
    let parts = PathPart::parse_template("/app/{id}/index");
    let indexed = route();
    table
        .insert(MethodTable::Get, "/app/{id}/index", Some(&parts), Arc::clone(&indexed))
        .unwrap();
    assert!(table.has_path_params());

    let (matched, params) = found(table.resolve(MethodTable::Get, "/app/12345/index"));
    assert!(Arc::ptr_eq(&matched, &indexed));
    assert_eq!(params.as_slice(), ["12345".to_owned()]);
}

#[test]
fn test_nested_params_capture_in_order() {
    let mut table = RouteTable::new(8).unwrap();
    let parts = PathPart::parse_template("/a/{b}/c/{d}");
    table.insert(MethodTable::Get, "/a/{b}/c/{d}", Some(&parts), route()).unwrap();
    let (_, params) = found(table.resolve(MethodTable::Get, "/a/1/c/2"));
    assert_eq!(params.as_slice(), ["1".to_owned(), "2".to_owned()]);
}

#[test]
fn test_literal_beats_param() {
    let mut table = RouteTable::new(8).unwrap();
    let by_id = route();
    let latest = route();
    let param_parts = PathPart::parse_template("/items/{id}");
    let literal_parts = vec![PathPart::literal("items"), PathPart::literal("latest")];
    table
        .insert(MethodTable::Get, "/items/{id}", Some(&param_parts), Arc::clone(&by_id))
        .unwrap();
    table
        .insert(MethodTable::Get, "/items/latest", Some(&literal_parts), Arc::clone(&latest))
        .unwrap();

    let (matched, params) = found(table.resolve(MethodTable::Get, "/items/latest"));
    assert!(Arc::ptr_eq(&matched, &latest));
    assert!(params.is_empty());

    let (matched, params) = found(table.resolve(MethodTable::Get, "/items/7"));
    assert!(Arc::ptr_eq(&matched, &by_id));
    assert_eq!(params.as_slice(), ["7".to_owned()]);
}

#[test]
fn test_transport_node_without_route_is_not_found() {
    let mut table = RouteTable::new(8).unwrap();
    let parts = PathPart::parse_template("/app/{id}/index");
    table.insert(MethodTable::Get, "/app/{id}/index", Some(&parts), route()).unwrap();
    assert!(matches!(table.resolve(MethodTable::Get, "/app"), Resolution::NotFound));
    assert!(matches!(table.resolve(MethodTable::Get, "/app/1"), Resolution::NotFound));
    assert!(matches!(
        table.resolve(MethodTable::Get, "/app/1/other"),
        Resolution::NotFound
    ));
}

#[test]
fn test_method_not_allowed_vs_not_found() {
    let mut table = RouteTable::new(8).unwrap();
    table.insert(MethodTable::Post, "/submit", None, route()).unwrap();
    assert!(matches!(
        table.resolve(MethodTable::Get, "/submit"),
        Resolution::MethodNotAllowed
    ));
    assert!(matches!(table.resolve(MethodTable::Get, "/nowhere"), Resolution::NotFound));
    assert!(matches!(
        table.resolve(MethodTable::WebSocket, "/submit"),
        Resolution::NotFound
    ));
}

#[test]
fn test_method_not_allowed_with_param_routes() {
    let mut table = RouteTable::new(8).unwrap();
    let parts = PathPart::parse_template("/app/{id}/index");
    table.insert(MethodTable::Get, "/app/{id}/index", Some(&parts), route()).unwrap();
    table.insert(MethodTable::Get, "/widgets", None, route()).unwrap();
    assert!(table.has_path_params());
    assert!(matches!(
        table.resolve(MethodTable::Post, "/widgets"),
        Resolution::MethodNotAllowed
    ));
    assert!(matches!(table.resolve(MethodTable::Post, "/gadgets"), Resolution::NotFound));
}

#[test]
fn test_empty_segment_not_captured() {
    let mut table = RouteTable::new(8).unwrap();
    let parts = PathPart::parse_template("/app/{id}/index");
    table.insert(MethodTable::Get, "/app/{id}/index", Some(&parts), route()).unwrap();
    assert!(matches!(table.resolve(MethodTable::Get, "/app//index"), Resolution::NotFound));
    let (_, params) = found(table.resolve(MethodTable::Get, "/app/7/index"));
    assert_eq!(params.as_slice(), ["7".to_owned()]);
}

#[test]
fn test_leading_param_rejected() {
    let mut table = RouteTable::new(8).unwrap();
    let parts = PathPart::parse_template("/{id}");
    let err = table
        .insert(MethodTable::Get, "/{id}", Some(&parts), route())
        .unwrap_err();
    assert_eq!(err, RegistrationError::LeadingParameter("/{id}".into()));
}

#[test]
fn test_reregistration_replaces() {
    let mut table = RouteTable::new(8).unwrap();
    let second = route();
    table.insert(MethodTable::Get, "/dup", None, route()).unwrap();
    table.insert(MethodTable::Get, "/dup", None, Arc::clone(&second)).unwrap();
    let (matched, _) = found(table.resolve(MethodTable::Get, "/dup"));
    assert!(Arc::ptr_eq(&matched, &second));
    assert_eq!(table.paths().count(), 1);
}

#[test]
fn test_unknown_method_uses_get() {
    assert_eq!(MethodTable::for_method("PROPFIND"), MethodTable::Get);
    assert_eq!(MethodTable::for_method("PATCH"), MethodTable::Patch);
    assert_eq!(MethodTable::for_http(&http::Method::HEAD), None);
}

#[test]
fn test_many_routes_resolve() {
    let mut table = RouteTable::new(8).unwrap();
    for i in 0..500 {
        let path = format!("/api/resource{i}/{{id}}");
        let parts = PathPart::parse_template(&path);
        table.insert(MethodTable::Get, &path, Some(&parts), route()).unwrap();
    }
    let (_, params) = found(table.resolve(MethodTable::Get, "/api/resource250/123"));
    assert_eq!(params.as_slice(), ["123".to_owned()]);
}
