extern crate iron;
extern crate router;
extern crate logger;
extern crate env_logger;
#[macro_use]
extern crate log;
extern crate rustc_serialize;
extern crate url;

mod model;
mod store;
mod handlers;

use std::env;

use store::PostStore;
use handlers::*;

use iron::prelude::Chain;
use iron::Iron;
use router::Router;
use logger::Logger;
use rustc_serialize::json::{self, Json};

// RUST_LOG=logger=info postboard_backend > logs 2>&1 &
fn main() {
    env_logger::init().unwrap();
    let (logger_before, logger_after) = Logger::new(None);

    let mut store = PostStore::new();
    store.create(&seed_post("First post", "This is the first post.")).unwrap();
    store.create(&seed_post("Second post", "This is the second post.")).unwrap();
    info!("seeded the store with 2 posts");

    let handlers = Handlers::new(store);

    let mut router = Router::new();
    router.get("/api/posts", handlers.list_posts, "list_posts");
    router.post("/api/posts", handlers.create_post, "create_post");
    router.put("/api/posts/:id", handlers.update_post, "update_post");
    router.delete("/api/posts/:id", handlers.delete_post, "delete_post");
    router.get("/api/posts/search", handlers.search_posts, "search_posts");

    let mut chain = Chain::new(router);
    chain.link_before(logger_before); // Should be first!
    chain.link_after(RouterErrorMiddleware);
    chain.link_after(JsonAfterMiddleware);
    chain.link_after(CorsAfterMiddleware);
    chain.link_after(logger_after); // Should be last!

    let address = env::var("POSTBOARD_ADDR").unwrap_or_else(|_| "0.0.0.0:5002".to_string());
    info!("listening on {}", address);
    Iron::new(chain).http(address.as_str()).unwrap();
}

fn seed_post(title: &str, content: &str) -> json::Object {
    let mut data = json::Object::new();
    data.insert("title".to_string(), Json::String(title.to_string()));
    data.insert("content".to_string(), Json::String(content.to_string()));
    data
}
