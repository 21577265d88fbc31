//! Minimal autoroute example: an in-memory product catalogue.
//!
//! Run with:
//!   RUST_LOG=autoroute=debug cargo run --example basic -- demos/autoroute.toml
//!
//! Try:
//!   curl -H 'x-authentication: proxypassword' http://localhost:8080/v1/
//!   curl -H 'x-authentication: proxypassword' 'http://localhost:8080/v1/products.json?sort=-price&limit=2'
//!   curl -H 'x-authentication: proxypassword' http://localhost:8080/v1/products/1/images.json
//!   curl -X OPTIONS -H 'x-authentication: proxypassword' http://localhost:8080/v1/products
//!   curl -X POST -H 'x-authentication: proxypassword' \
//!        -d '{"name":"lamp","price":30}' http://localhost:8080/v1/products
//!   curl -H 'x-authentication: proxypassword' http://localhost:8080/v1/catalog

use std::sync::{Arc, Mutex};

use autoroute::query::SortOrder;
use autoroute::{
    Call, Config, Context, Dispatcher, Method, Reply, Responder, RoutingTable, Server, Status,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

type Store = Arc<Mutex<Vec<Value>>>;

#[tokio::main]
async fn main() -> autoroute::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path)?,
        None => Config::from_toml_str("[proxy]\nauth = \"proxypassword\"")?,
    };

    let store: Store = Arc::new(Mutex::new(vec![
        json!({ "id": "1", "name": "chair", "price": 50 }),
        json!({ "id": "2", "name": "desk", "price": 120 }),
    ]));

    let list = {
        let store = Arc::clone(&store);
        move |call: Call, respond: Responder| {
            let store = Arc::clone(&store);
            async move { list_products(store, call, respond) }
        }
    };
    let create = {
        let store = Arc::clone(&store);
        move |call: Call, respond: Responder| {
            let store = Arc::clone(&store);
            async move { create_product(store, call, respond) }
        }
    };

    let routes = RoutingTable::new()
        .on(Method::Get, "products", list)
        .on(Method::Post, "products", create)
        .on(Method::Get, "products/images", list_images)
        .on(Method::Get, "catalog", catalog_moved);

    let addr = config.addr();
    Server::bind(addr).serve(Dispatcher::new(Context::new(config, routes))).await
}

// GET /v1/products[/{id}]
fn list_products(store: Store, call: Call, respond: Responder) {
    let Ok(products) = store.lock().map(|p| p.clone()) else {
        return respond.respond(Reply::error(Status::InternalServerError, 1));
    };

    if let Some(id) = call.id {
        return match products.into_iter().find(|p| p["id"] == id.as_str()) {
            Some(product) => respond.respond(Reply::ok(product)),
            None => respond.respond(Reply::error(Status::NotFound, 100)),
        };
    }

    let mut items: Vec<Value> = products
        .into_iter()
        .filter(|p| call.meta.query.iter().all(|(k, v)| p[k].as_str() == Some(v.as_str())))
        .collect();
    for sort in call.meta.sort.iter().rev() {
        items.sort_by(|a, b| {
            let ord = a[&sort.field].to_string().cmp(&b[&sort.field].to_string());
            if sort.order == SortOrder::Descending { ord.reverse() } else { ord }
        });
    }
    let total = items.len();
    let offset = call.meta.offset.unwrap_or(0).max(0) as usize;
    let limit = call.meta.limit.map_or(usize::MAX, |l| l.max(0) as usize);
    let page: Vec<Value> = items.into_iter().skip(offset).take(limit).collect();

    respond.respond(Reply::ok(page).with_meta(json!({ "total": total })));
}

// POST /v1/products
fn create_product(store: Store, call: Call, respond: Responder) {
    let Some(mut product) = call.body.filter(Value::is_object) else {
        return respond.respond(Reply::error(Status::BadRequest, 101).dev_message("expected an object"));
    };
    let Ok(mut products) = store.lock() else {
        return respond.respond(Reply::error(Status::InternalServerError, 1));
    };
    let id = (products.len() + 1).to_string();
    product["id"] = json!(id);
    products.push(product);
    respond.respond(Reply::ok(id).status(Status::Created));
}

// GET /v1/products/{id}/images[/{image}]
async fn list_images(call: Call, respond: Responder) {
    let product = call.id.unwrap_or_default();
    let images = json!([{ "id": "1", "url": format!("/static/{product}/1.png") }]);
    match call.subresource_properties.first() {
        Some(image) if image == "1" => respond.respond(Reply::ok(images[0].clone())),
        Some(_) => respond.respond(Reply::error(Status::NotFound, 102)),
        None => respond.respond(Reply::ok(images)),
    }
}

// GET /v1/catalog → moved to products
async fn catalog_moved(_call: Call, respond: Responder) {
    respond.respond(Reply::redirect(Status::MovedPermanently, "/v1/products.json"));
}
