//! End-to-end dispatch, without sockets.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use autoroute::middleware::Invocation;
use autoroute::{
    AUTH_HEADER, Call, Config, Context, Dispatcher, Error, Method, Reply, Request, Responder,
    RoutingTable, Status,
};
use http::Uri;
use serde::Serialize;
use serde_json::{Value, json};

const SECRET: &str = "proxypassword";

fn config() -> Config {
    let mut config = Config::default();
    config.proxy.auth = SECRET.to_owned();
    config
}

/// Echoes everything the handler received.
async fn echo(call: Call, respond: Responder) {
    respond.respond(Reply::ok(json!({
        "id": call.id,
        "meta": call.meta,
        "body": call.body,
        "props": call.subresource_properties,
    })));
}

async fn create(call: Call, respond: Responder) {
    let name = call.body.as_ref().and_then(|b| b["name"].as_str()).unwrap_or_default().to_owned();
    respond.respond(Reply::ok(format!("{name}-1")).status(Status::Created));
}

async fn moved(_call: Call, respond: Responder) {
    respond.respond(Reply::redirect(Status::MovedPermanently, "/v2/legacy.json"));
}

async fn slow(_call: Call, respond: Responder) {
    tokio::time::sleep(Duration::from_secs(5)).await;
    respond.respond(Reply::empty());
}

async fn forgetful(_call: Call, _respond: Responder) {}

fn routes() -> RoutingTable {
    RoutingTable::new()
        .on(Method::Get, "products", echo)
        .on(Method::Post, "products", create)
        .on(Method::Get, "products/images", echo)
        .on(Method::Get, "legacy", moved)
        .on(Method::Get, "slow", slow)
        .on(Method::Get, "broken", forgetful)
}

fn dispatcher() -> Dispatcher {
    Dispatcher::new(Context::new(config(), routes()))
}

fn request(method: Method, uri: &'static str) -> Request {
    Request::new(method, Uri::from_static(uri)).with_header(AUTH_HEADER, SECRET)
}

fn json(res: &autoroute::Response) -> Value {
    serde_json::from_slice(res.body()).expect("response body is JSON")
}

#[tokio::test]
async fn nested_resource_with_query() {
    let res = dispatcher()
        .dispatch(request(Method::Get, "/v1/products/123/images/7.json?sort=-date&limit=5"))
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert!(res.header("etag").unwrap().starts_with("W/\""));
    assert_eq!(
        json(&res),
        json!({
            "id": "123",
            "meta": {
                "limit": 5,
                "offset": null,
                "sort": [{ "field": "date", "order": -1 }],
                "query": {},
            },
            "body": null,
            "props": ["7"],
        })
    );
}

#[tokio::test]
async fn filters_and_field_selection() {
    let mut config = config();
    config.vary_fields = true;
    let dispatcher = Dispatcher::new(Context::new(config, routes()));

    let res = dispatcher
        .dispatch(request(Method::Get, "/v1/products?fields=name,name,price&color=red&tag=a&tag=b&limit=abc"))
        .await
        .unwrap();
    let meta = &json(&res)["meta"];
    assert_eq!(meta["fields"], json!(["name", "price"]));
    assert_eq!(meta["query"], json!({ "color": "red" }));
    assert_eq!(meta["limit"], Value::Null);
}

#[tokio::test]
async fn options_lists_verbs_and_subresources() {
    let res = dispatcher().dispatch(request(Method::Options, "/v1/products")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        json(&res),
        json!({
            "available_verbs": ["GET", "POST"],
            "subresources": ["/v1/products/_id/images.json"],
        })
    );
}

#[tokio::test]
async fn options_on_nested_resource_name() {
    let res = dispatcher().dispatch(request(Method::Options, "/v1/products/images")).await.unwrap();
    assert_eq!(json(&res), json!({ "available_verbs": ["GET"] }));
}

#[tokio::test]
async fn missing_proxy_header_never_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let routes = RoutingTable::new().on(Method::Get, "products", move |_call: Call, respond: Responder| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { respond.respond(Reply::empty()) }
    });
    let dispatcher = Dispatcher::new(Context::new(config(), routes));

    let req = Request::new(Method::Get, Uri::from_static("/v1/products"));
    let res = dispatcher.dispatch(req).await.unwrap();
    assert_eq!(res.status(), 407);
    assert_eq!(json(&res)["error_code"], 10);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let req = Request::new(Method::Get, Uri::from_static("/v1/products")).with_header(AUTH_HEADER, "nope");
    let res = dispatcher.dispatch(req).await.unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(json(&res)["message"], "Unauthorized");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_identifier_is_412() {
    for uri in ["/v1/products/", "/v1/products//images", "/v1/products/1/images/"] {
        let res = dispatcher().dispatch(request(Method::Get, uri)).await.unwrap();
        assert_eq!(res.status(), 412, "{uri}");
        assert_eq!(json(&res)["error_code"], 25);
    }
}

#[tokio::test]
async fn unknown_resource_and_index() {
    let res = dispatcher().dispatch(request(Method::Get, "/v1/customers")).await.unwrap();
    assert_eq!(res.status(), 404);
    let message = json(&res)["message"].as_str().unwrap().to_owned();
    assert!(message.contains("/products/images.json"));

    let res = dispatcher().dispatch(request(Method::Get, "/v1/")).await.unwrap();
    assert_eq!(res.status(), 202);
    assert_eq!(
        json(&res),
        json!({
            "resources": [
                "/v1/broken.json",
                "/v1/legacy.json",
                "/v1/products.json",
                "/v1/slow.json",
            ]
        })
    );
}

#[tokio::test]
async fn base_uri_mismatch() {
    let res = dispatcher().dispatch(request(Method::Get, "/v2/products")).await.unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(json(&res)["error_code"], 19);
}

#[tokio::test]
async fn unregistered_verb_is_405() {
    let res = dispatcher().dispatch(request(Method::Delete, "/v1/products/1")).await.unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(json(&res)["error_code"], 29);
}

#[tokio::test]
async fn creation_returns_identifier_without_etag() {
    let req = request(Method::Post, "/v1/products").with_body(json!({ "name": "lamp" }));
    let res = dispatcher().dispatch(req).await.unwrap();
    assert_eq!(res.status(), 201);
    assert_eq!(json(&res), json!({ "result": "lamp-1" }));
    assert_eq!(res.header("etag"), None);
}

#[tokio::test]
async fn redirect_echoes_requested_url() {
    let res = dispatcher().dispatch(request(Method::Get, "/v1/legacy.json?x=1")).await.unwrap();
    assert_eq!(res.status(), 301);
    assert_eq!(res.header("location"), Some("/v2/legacy.json"));
    let body = json(&res);
    assert_eq!(body["requested_url"], "/v1/legacy.json?x=1");
    assert_eq!(body["status"], 301);
}

#[tokio::test]
async fn timeout_yields_504() {
    let mut config = config();
    config.proxy.timeout = 20;
    let dispatcher = Dispatcher::new(Context::new(config, routes()));

    let res = dispatcher.handle(request(Method::Get, "/v1/slow")).await.unwrap();
    assert_eq!(res.status(), 504);
    let body = json(&res);
    assert_eq!(body["error_code"], -2);
    assert_eq!(body["message"], "Connection timeout");
}

#[tokio::test]
async fn abandoned_reply_is_an_error() {
    let err = dispatcher().dispatch(request(Method::Get, "/v1/broken")).await.unwrap_err();
    assert!(matches!(err, Error::Abandoned { resource } if resource == "broken"));
}

#[tokio::test]
async fn panicking_handler_is_abandoned() {
    async fn boom(_call: Call, _respond: Responder) {
        panic!("boom");
    }
    let routes = RoutingTable::new().on(Method::Get, "boom", boom);
    let dispatcher = Dispatcher::new(Context::new(config(), routes));
    let result = dispatcher.dispatch(request(Method::Get, "/v1/boom")).await;
    assert!(matches!(result, Err(Error::Abandoned { .. })));
}

#[tokio::test]
async fn middleware_sees_context_and_can_short_circuit() {
    async fn guard(inv: Invocation, respond: Responder) {
        if inv.resource == "products/images" {
            return respond.respond(Reply::error(403u16, 77).dev_message("images are private"));
        }
        assert_eq!(inv.verb, Method::Get);
        assert_eq!(inv.headers.get(AUTH_HEADER).unwrap(), SECRET);
        inv.proceed(respond).await
    }
    let dispatcher = Dispatcher::new(Context::new(config(), routes()).with_middleware(guard));

    let res = dispatcher.dispatch(request(Method::Get, "/v1/products/1/images")).await.unwrap();
    assert_eq!(res.status(), 403);
    let body = json(&res);
    assert_eq!(body["error_code"], 77);
    assert_eq!(body["message"], "images are private");
    assert_eq!(body["user_message"]["en_us"], "Unexpected error, report to support or responsible developer");

    let res = dispatcher.dispatch(request(Method::Get, "/v1/products/9")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(json(&res)["id"], "9");
}

#[tokio::test]
async fn late_reply_after_timeout_is_ignored() {
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let tx = Arc::new(std::sync::Mutex::new(Some(tx)));
    let routes = RoutingTable::new().on(Method::Get, "late", move |_call: Call, respond: Responder| {
        let tx = Arc::clone(&tx);
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(respond.is_closed());
            respond.respond(Reply::empty());
            if let Some(tx) = tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    });
    let mut config = config();
    config.proxy.timeout = 10;
    let dispatcher = Dispatcher::new(Context::new(config, routes));

    let res = dispatcher.handle(request(Method::Get, "/v1/late")).await.unwrap();
    assert_eq!(res.status(), 504);
    rx.await.unwrap();
}

#[tokio::test]
async fn handler_error_details_reach_the_envelope() {
    async fn out_of_stock(call: Call, respond: Responder) {
        let reply = Reply::error(Status::NotFound, 300)
            .dev_message(format!("product {} is out of stock", call.id.unwrap_or_default()))
            .user_message(json!({ "en_us": "Sold out" }))
            .more_info("https://docs.example.com/errors/300");
        respond.respond(reply);
    }
    let routes = RoutingTable::new().on(Method::Get, "stock", out_of_stock);
    let dispatcher = Dispatcher::new(Context::new(config(), routes));

    let res = dispatcher.dispatch(request(Method::Get, "/v1/stock/42")).await.unwrap();
    assert_eq!(res.status(), 404);
    assert_eq!(
        json(&res),
        json!({
            "status": 404,
            "error_code": 300,
            "message": "product 42 is out of stock",
            "user_message": { "en_us": "Sold out" },
            "more_info": "https://docs.example.com/errors/300",
        })
    );
}

#[tokio::test]
async fn typed_results_are_serialized() {
    #[derive(Serialize)]
    struct Product {
        id: String,
        price: u32,
    }
    async fn show(call: Call, respond: Responder) {
        let product = Product { id: call.id.unwrap_or_default(), price: 50 };
        match Reply::json(&product) {
            Ok(reply) => respond.respond(reply),
            Err(_) => respond.respond(Reply::error(Status::InternalServerError, 1)),
        }
    }
    let routes = RoutingTable::new().on(Method::Get, "products", show);
    let dispatcher = Dispatcher::new(Context::new(config(), routes));

    let res = dispatcher.dispatch(request(Method::Get, "/v1/products/7.json")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(json(&res), json!({ "id": "7", "price": 50 }));
}
