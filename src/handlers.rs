use std::sync::{Arc, Mutex};
use std::io::Read;
use iron::{Handler, status, IronResult, IronError, Response, Request, AfterMiddleware};
use iron::headers::{ContentType, AccessControlAllowOrigin};
use iron::method::Method;
use rustc_serialize::json::{self, Json, ToJson};
use router::{Router, NoRoute};
use url::form_urlencoded;
use model::Post;
use store::{PostStore, StoreError};
use std::error::Error;

/// Match a `Result` into its inner value or
/// return `500 Internal Server Error`,
/// or some other provided error using the second variant of this macro.
macro_rules! try_handler {
    ( $e:expr ) => {
        match $e {
            Ok(x) => x,
            Err(e) => return Ok(Response::with((status::InternalServerError, e.description())))
        }
    };
    ( $e:expr, $error:expr ) => {
        match $e {
            Ok(x) => x,
            Err(e) => return Ok(Response::with(($error, e.description())))
        }
    }
}

/// Lock a `Mutex`. This macro simply calls `m.lock().unwrap()`,
/// because the thread should panic if the lock can not be obtained:
/// we cannot recover from that.
macro_rules! lock {
    ( $e:expr ) => { $e.lock().unwrap() }
}

/// Get the value of a parameter in the URI.
/// If the parameter was absent, return `400 Bad Request`.
/// If we could not obtain the parameter list, return `500 Internal Server Error`.
macro_rules! get_http_param {
    ( $r:expr, $e:expr ) => {
        match $r.extensions.get::<Router>() {
            Some(router) => {
                match router.find($e) {
                    Some(val) => val,
                    None => return Ok(Response::with(status::BadRequest)),
                }
            }
            None => return Ok(Response::with(status::InternalServerError)),
        }
    }
}

/// Read the `:id` route parameter as a `u64` or return the API's JSON 404;
/// a path segment that is not an integer never names a post.
macro_rules! get_post_id {
    ( $r:expr ) => {
        {
            let raw = get_http_param!($r, "id");
            match raw.parse::<u64>() {
                Ok(id) => id,
                Err(_) => return Ok(not_found_response()),
            }
        }
    }
}

pub struct Handlers {
    pub list_posts: ListPostsHandler,
    pub create_post: CreatePostHandler,
    pub update_post: UpdatePostHandler,
    pub delete_post: DeletePostHandler,
    pub search_posts: SearchPostsHandler,
}

impl Handlers {
    pub fn new(store: PostStore) -> Handlers {
        let store = Arc::new(Mutex::new(store));
        Handlers {
            list_posts: ListPostsHandler::new(store.clone()),
            create_post: CreatePostHandler::new(store.clone()),
            update_post: UpdatePostHandler::new(store.clone()),
            delete_post: DeletePostHandler::new(store.clone()),
            search_posts: SearchPostsHandler::new(store.clone()),
        }
    }
}

/// First value of a query-string parameter. Empty values count as absent.
fn query_param(req: &Request, key: &str) -> Option<String> {
    let query = match req.url.query() {
        Some(query) => query,
        None => return None,
    };
    match form_urlencoded::parse(query.as_bytes()).find(|pair| pair.0 == key) {
        Some((_, value)) => {
            if value.is_empty() {
                None
            } else {
                Some(value.into_owned())
            }
        }
        None => None,
    }
}

fn posts_payload(posts: &[Post]) -> String {
    Json::Array(posts.iter().map(|post| post.to_json()).collect()).to_string()
}

fn json_message(key: &str, message: String) -> String {
    let mut body = json::Object::new();
    body.insert(key.to_string(), Json::String(message));
    Json::Object(body).to_string()
}

/// Map a store error onto the wire: 400 for missing create fields, 404 for
/// everything else. Create validation failures use a capitalized "Error" key,
/// the rest of the API a lowercase one.
fn error_response(err: &StoreError) -> Response {
    let (code, key) = match *err {
        StoreError::MissingField(_) => (status::BadRequest, "Error"),
        _ => (status::NotFound, "error"),
    };
    Response::with((code, json_message(key, format!("{}", err))))
}

fn not_found_response() -> Response {
    Response::with((status::NotFound, json_message("error", "Not Found".to_string())))
}

fn method_not_allowed_response() -> Response {
    Response::with((status::MethodNotAllowed,
                    json_message("error", "Method Not Allowed".to_string())))
}

pub struct ListPostsHandler {
    store: Arc<Mutex<PostStore>>,
}

impl ListPostsHandler {
    fn new(store: Arc<Mutex<PostStore>>) -> ListPostsHandler {
        ListPostsHandler { store: store }
    }
}

impl Handler for ListPostsHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let sort = query_param(req, "sort");
        let direction = query_param(req, "direction");

        let result = lock!(self.store).list(sort.as_ref().map(|s| s.as_str()),
                                            direction.as_ref().map(|s| s.as_str()));
        match result {
            Ok(posts) => Ok(Response::with((status::Ok, posts_payload(&posts)))),
            Err(e) => Ok(error_response(&e)),
        }
    }
}

pub struct CreatePostHandler {
    store: Arc<Mutex<PostStore>>,
}

impl CreatePostHandler {
    fn new(store: Arc<Mutex<PostStore>>) -> CreatePostHandler {
        CreatePostHandler { store: store }
    }
}

impl Handler for CreatePostHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let mut payload = String::new();
        try_handler!(req.body.read_to_string(&mut payload));

        let data = try_handler!(Json::from_str(&payload), status::BadRequest);
        let result = match data.as_object() {
            Some(fields) => lock!(self.store).create(fields),
            None => return Ok(Response::with(status::BadRequest)),
        };

        match result {
            Ok(post) => Ok(Response::with((status::Created, post.to_json().to_string()))),
            Err(e) => Ok(error_response(&e)),
        }
    }
}

pub struct UpdatePostHandler {
    store: Arc<Mutex<PostStore>>,
}

impl UpdatePostHandler {
    fn new(store: Arc<Mutex<PostStore>>) -> UpdatePostHandler {
        UpdatePostHandler { store: store }
    }
}

impl Handler for UpdatePostHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let id = get_post_id!(req);

        let mut payload = String::new();
        try_handler!(req.body.read_to_string(&mut payload));

        let data = try_handler!(Json::from_str(&payload), status::BadRequest);
        let result = match data.as_object() {
            Some(fields) => lock!(self.store).update(id, fields),
            None => return Ok(Response::with(status::BadRequest)),
        };

        match result {
            Ok(post) => Ok(Response::with((status::Ok, post.to_json().to_string()))),
            Err(e) => Ok(error_response(&e)),
        }
    }
}

pub struct DeletePostHandler {
    store: Arc<Mutex<PostStore>>,
}

impl DeletePostHandler {
    fn new(store: Arc<Mutex<PostStore>>) -> DeletePostHandler {
        DeletePostHandler { store: store }
    }
}

impl Handler for DeletePostHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let id = get_post_id!(req);

        match lock!(self.store).delete(id) {
            Ok(id) => {
                let message = format!("Post with id <{}> has been deleted successfully.", id);
                Ok(Response::with((status::Ok, json_message("message", message))))
            }
            Err(e) => Ok(error_response(&e)),
        }
    }
}

pub struct SearchPostsHandler {
    store: Arc<Mutex<PostStore>>,
}

impl SearchPostsHandler {
    fn new(store: Arc<Mutex<PostStore>>) -> SearchPostsHandler {
        SearchPostsHandler { store: store }
    }
}

impl Handler for SearchPostsHandler {
    fn handle(&self, req: &mut Request) -> IronResult<Response> {
        let title = query_param(req, "title");
        let content = query_param(req, "content");

        let result = lock!(self.store).search(title.as_ref().map(|s| s.as_str()),
                                              content.as_ref().map(|s| s.as_str()));
        match result {
            Ok(posts) => Ok(Response::with((status::Ok, posts_payload(&posts)))),
            Err(e) => Ok(error_response(&e)),
        }
    }
}

pub struct JsonAfterMiddleware;

impl AfterMiddleware for JsonAfterMiddleware {
    fn after(&self, _: &mut Request, mut res: Response) -> IronResult<Response> {
        res.headers.set(ContentType::json());
        Ok(res)
    }
}

/// The frontend lives on a different origin; every response carries a
/// wildcard CORS header.
pub struct CorsAfterMiddleware;

impl AfterMiddleware for CorsAfterMiddleware {
    fn after(&self, _: &mut Request, mut res: Response) -> IronResult<Response> {
        res.headers.set(AccessControlAllowOrigin::Any);
        Ok(res)
    }
}

/// The router reports every miss as `NoRoute`. Requests for a known API path
/// with the wrong method become `405 Method Not Allowed`, everything else
/// becomes the JSON `404 Not Found`.
pub struct RouterErrorMiddleware;

impl AfterMiddleware for RouterErrorMiddleware {
    fn catch(&self, req: &mut Request, err: IronError) -> IronResult<Response> {
        if err.error.is::<NoRoute>() {
            match allowed_methods(&req.url.path()) {
                Some(ref methods) if !methods.contains(&req.method) => {
                    Ok(method_not_allowed_response())
                }
                _ => Ok(not_found_response()),
            }
        } else {
            Err(err)
        }
    }
}

/// Methods the API accepts for a path, or `None` when the path is not part
/// of the API surface at all.
fn allowed_methods(path: &[&str]) -> Option<Vec<Method>> {
    if path.len() == 2 && path[0] == "api" && path[1] == "posts" {
        Some(vec![Method::Get, Method::Post])
    } else if path.len() == 3 && path[0] == "api" && path[1] == "posts" && path[2] == "search" {
        Some(vec![Method::Get])
    } else if path.len() == 3 && path[0] == "api" && path[1] == "posts" {
        Some(vec![Method::Put, Method::Delete])
    } else {
        None
    }
}
