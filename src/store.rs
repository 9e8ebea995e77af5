use std::error;
use std::fmt;
use std::str::FromStr;

use rustc_serialize::json;

use model::Post;

/// Everything that can go wrong inside the store. All variants are expected,
/// recoverable conditions; `Display` renders the message the client sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreError {
    MissingField(&'static str),
    InvalidQuery,
    NotFound(u64),
    MissingSearchParameter,
    NoResults,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StoreError::MissingField(field) => write!(f, "Missing data: '{}'", field),
            StoreError::InvalidQuery => {
                write!(f,
                       "Bad Data. Sort by 'title' or 'content' and 'asc' or 'desc' for direction")
            }
            StoreError::NotFound(id) => write!(f, "Post with id <{}> not found", id),
            StoreError::MissingSearchParameter => {
                write!(f, "Missing search parameter ['title' or 'content']")
            }
            StoreError::NoResults => write!(f, "Search not found"),
        }
    }
}

impl error::Error for StoreError {
    fn description(&self) -> &str {
        match *self {
            StoreError::MissingField(_) => "missing required field",
            StoreError::InvalidQuery => "invalid sort query",
            StoreError::NotFound(_) => "post not found",
            StoreError::MissingSearchParameter => "missing search parameter",
            StoreError::NoResults => "no matching posts",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Title,
    Content,
}

impl FromStr for SortField {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<SortField, StoreError> {
        match raw {
            "title" => Ok(SortField::Title),
            "content" => Ok(SortField::Content),
            _ => Err(StoreError::InvalidQuery),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Direction, StoreError> {
        match raw {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(StoreError::InvalidQuery),
        }
    }
}

/// The post collection and the operations on it. Posts are kept in insertion
/// order; every operation either fully succeeds or leaves the collection
/// untouched.
#[derive(Clone, Debug)]
pub struct PostStore {
    posts: Vec<Post>,
}

impl PostStore {
    pub fn new() -> PostStore {
        PostStore { posts: vec![] }
    }

    /// All posts, optionally sorted for this response only.
    ///
    /// A sort field without a direction sorts descending, while a direction
    /// without a sort field sorts by title. The two defaults are asymmetric
    /// on purpose.
    pub fn list(&self,
                sort: Option<&str>,
                direction: Option<&str>)
                -> Result<Vec<Post>, StoreError> {
        let field = match sort {
            Some(raw) => Some(raw.parse::<SortField>()?),
            None => None,
        };
        let dir = match direction {
            Some(raw) => Some(raw.parse::<Direction>()?),
            None => None,
        };

        let mut posts = self.posts.clone();
        match (field, dir) {
            (None, None) => {}
            (Some(field), None) => sort_posts(&mut posts, field, Direction::Desc),
            (None, Some(dir)) => sort_posts(&mut posts, SortField::Title, dir),
            (Some(field), Some(dir)) => sort_posts(&mut posts, field, dir),
        }
        Ok(posts)
    }

    /// Append a new post. `data` must carry `title` and `content`; whatever
    /// else it carries is stored verbatim. A client-supplied id is discarded.
    pub fn create(&mut self, data: &json::Object) -> Result<Post, StoreError> {
        let title = match string_field(data, "title") {
            Some(title) => title,
            None => return Err(StoreError::MissingField("title")),
        };
        let content = match string_field(data, "content") {
            Some(content) => content,
            None => return Err(StoreError::MissingField("content")),
        };

        let post = Post::new(self.next_id(), title, content, extra_fields(data));
        self.posts.push(post.clone());
        Ok(post)
    }

    /// Merge `data` into the post with the given id. The id itself is never
    /// altered, even when `data` contains one.
    pub fn update(&mut self, id: u64, data: &json::Object) -> Result<Post, StoreError> {
        match self.posts.iter_mut().find(|post| post.id() == id) {
            Some(post) => {
                post.merge(data);
                Ok(post.clone())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Remove the post with the given id and hand the id back as
    /// confirmation.
    pub fn delete(&mut self, id: u64) -> Result<u64, StoreError> {
        match self.posts.iter().position(|post| post.id() == id) {
            Some(index) => {
                self.posts.remove(index);
                Ok(id)
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    /// Case-insensitive substring search. A post qualifies when the title
    /// needle matches its title or the content needle matches its content;
    /// supplying both widens the result rather than narrowing it. Matches
    /// come back in insertion order, each post once.
    pub fn search(&self,
                  title: Option<&str>,
                  content: Option<&str>)
                  -> Result<Vec<Post>, StoreError> {
        if title.is_none() && content.is_none() {
            return Err(StoreError::MissingSearchParameter);
        }

        let title_needle = title.map(|needle| needle.to_lowercase());
        let content_needle = content.map(|needle| needle.to_lowercase());

        let matches: Vec<Post> = self.posts
            .iter()
            .filter(|post| {
                let title_hit = title_needle
                    .as_ref()
                    .map_or(false, |needle| post.title().to_lowercase().contains(needle.as_str()));
                let content_hit = content_needle
                    .as_ref()
                    .map_or(false,
                            |needle| post.content().to_lowercase().contains(needle.as_str()));
                title_hit || content_hit
            })
            .cloned()
            .collect();

        if matches.is_empty() {
            Err(StoreError::NoResults)
        } else {
            Ok(matches)
        }
    }

    // Ids are never handed out twice while the holder is still in the
    // collection: the next id is one past the current maximum.
    fn next_id(&self) -> u64 {
        self.posts.iter().map(|post| post.id()).max().map_or(1, |max| max + 1)
    }
}

fn sort_posts(posts: &mut Vec<Post>, field: SortField, direction: Direction) {
    // sort_by is stable, so equal keys keep their insertion order; the
    // descending arm must flip the comparison rather than reverse the result.
    posts.sort_by(|a, b| {
        let (x, y) = (sort_key(a, field), sort_key(b, field));
        match direction {
            Direction::Asc => x.cmp(y),
            Direction::Desc => y.cmp(x),
        }
    });
}

fn sort_key(post: &Post, field: SortField) -> &str {
    match field {
        SortField::Title => post.title(),
        SortField::Content => post.content(),
    }
}

fn string_field(data: &json::Object, key: &str) -> Option<String> {
    data.get(key).and_then(|value| value.as_string()).map(|value| value.to_string())
}

fn extra_fields(data: &json::Object) -> json::Object {
    data.iter()
        .filter(|&(key, _)| key != "id" && key != "title" && key != "content")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{PostStore, StoreError};
    use rustc_serialize::json::{self, Json, ToJson};

    fn data(fields: &[(&str, &str)]) -> json::Object {
        fields.iter()
            .map(|&(key, value)| (key.to_string(), Json::String(value.to_string())))
            .collect()
    }

    fn seeded() -> PostStore {
        let mut store = PostStore::new();
        store.create(&data(&[("title", "First post"), ("content", "This is the first post.")]))
            .unwrap();
        store.create(&data(&[("title", "Second post"), ("content", "This is the second post.")]))
            .unwrap();
        store
    }

    fn titles(store: &PostStore, sort: Option<&str>, direction: Option<&str>) -> Vec<String> {
        store.list(sort, direction)
            .unwrap()
            .iter()
            .map(|post| post.title().to_string())
            .collect()
    }

    #[test]
    fn create_assigns_sequential_ids() {
        let mut store = seeded();
        let post = store.create(&data(&[("title", "Third"), ("content", "c")])).unwrap();
        assert_eq!(post.id(), 3);
    }

    #[test]
    fn create_starts_at_one_on_an_empty_store() {
        let mut store = PostStore::new();
        let post = store.create(&data(&[("title", "t"), ("content", "c")])).unwrap();
        assert_eq!(post.id(), 1);
    }

    #[test]
    fn create_does_not_reuse_an_id_freed_by_deletion() {
        let mut store = seeded();
        store.create(&data(&[("title", "Third"), ("content", "c")])).unwrap();
        store.delete(2).unwrap();

        let post = store.create(&data(&[("title", "Fourth"), ("content", "c")])).unwrap();
        assert_eq!(post.id(), 4);
    }

    #[test]
    fn create_checks_title_before_content() {
        let mut store = PostStore::new();
        assert_eq!(store.create(&json::Object::new()).unwrap_err(),
                   StoreError::MissingField("title"));
        assert_eq!(store.create(&data(&[("title", "t")])).unwrap_err(),
                   StoreError::MissingField("content"));
        assert_eq!(store.create(&data(&[("content", "c")])).unwrap_err(),
                   StoreError::MissingField("title"));
    }

    #[test]
    fn create_ignores_a_client_supplied_id() {
        let mut store = seeded();
        let mut fields = data(&[("title", "Third"), ("content", "c")]);
        fields.insert("id".to_string(), Json::U64(42));

        let post = store.create(&fields).unwrap();
        assert_eq!(post.id(), 3);
    }

    #[test]
    fn create_round_trips_extra_fields() {
        let mut store = PostStore::new();
        let mut fields = data(&[("title", "t"), ("content", "c"), ("author", "jane")]);
        fields.insert("pinned".to_string(), Json::Boolean(true));

        let post = store.create(&fields).unwrap();
        let encoded = post.to_json();
        let object = encoded.as_object().unwrap();
        assert_eq!(object.get("author"), Some(&Json::String("jane".to_string())));
        assert_eq!(object.get("pinned"), Some(&Json::Boolean(true)));
    }

    #[test]
    fn list_without_parameters_keeps_insertion_order() {
        let store = seeded();
        assert_eq!(titles(&store, None, None), vec!["First post", "Second post"]);
    }

    #[test]
    fn list_with_sort_only_defaults_to_descending() {
        let store = seeded();
        assert_eq!(titles(&store, Some("title"), None),
                   vec!["Second post", "First post"]);
    }

    #[test]
    fn list_with_direction_only_sorts_titles() {
        let store = seeded();
        assert_eq!(titles(&store, None, Some("asc")),
                   vec!["First post", "Second post"]);
        assert_eq!(titles(&store, None, Some("desc")),
                   vec!["Second post", "First post"]);
    }

    #[test]
    fn list_honours_explicit_sort_and_direction() {
        let mut store = PostStore::new();
        store.create(&data(&[("title", "b"), ("content", "zz")])).unwrap();
        store.create(&data(&[("title", "a"), ("content", "yy")])).unwrap();
        store.create(&data(&[("title", "c"), ("content", "xx")])).unwrap();

        assert_eq!(titles(&store, Some("title"), Some("asc")), vec!["a", "b", "c"]);
        assert_eq!(titles(&store, Some("content"), Some("asc")), vec!["c", "a", "b"]);
        assert_eq!(titles(&store, Some("content"), Some("desc")), vec!["b", "a", "c"]);
    }

    #[test]
    fn list_sorts_stably_for_equal_keys() {
        let mut store = PostStore::new();
        store.create(&data(&[("title", "same"), ("content", "first in")])).unwrap();
        store.create(&data(&[("title", "same"), ("content", "second in")])).unwrap();

        for direction in &["asc", "desc"] {
            let posts = store.list(Some("title"), Some(*direction)).unwrap();
            let ids: Vec<u64> = posts.iter().map(|post| post.id()).collect();
            assert_eq!(ids, vec![1, 2]);
        }
    }

    #[test]
    fn list_rejects_unknown_sort_field_and_direction() {
        let store = seeded();
        assert_eq!(store.list(Some("bogus"), None).unwrap_err(),
                   StoreError::InvalidQuery);
        assert_eq!(store.list(None, Some("sideways")).unwrap_err(),
                   StoreError::InvalidQuery);
        assert_eq!(store.list(Some("title"), Some("sideways")).unwrap_err(),
                   StoreError::InvalidQuery);
    }

    #[test]
    fn update_merges_and_preserves_the_rest() {
        let mut store = seeded();
        let post = store.update(1, &data(&[("content", "Edited.")])).unwrap();

        assert_eq!(post.id(), 1);
        assert_eq!(post.title(), "First post");
        assert_eq!(post.content(), "Edited.");

        // the change is visible on a later read
        let posts = store.list(None, None).unwrap();
        assert_eq!(posts[0].content(), "Edited.");
    }

    #[test]
    fn update_cannot_change_the_id() {
        let mut store = seeded();
        let mut fields = data(&[("title", "Renamed")]);
        fields.insert("id".to_string(), Json::U64(7));

        let post = store.update(2, &fields).unwrap();
        assert_eq!(post.id(), 2);
        assert_eq!(post.title(), "Renamed");
        assert!(store.update(7, &json::Object::new()).is_err());
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let mut store = seeded();
        assert_eq!(store.update(9, &data(&[("title", "t")])).unwrap_err(),
                   StoreError::NotFound(9));
    }

    #[test]
    fn delete_removes_exactly_one_post() {
        let mut store = seeded();
        assert_eq!(store.delete(1).unwrap(), 1);

        let posts = store.list(None, None).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id(), 2);

        assert_eq!(store.delete(1).unwrap_err(), StoreError::NotFound(1));
    }

    #[test]
    fn search_matches_substrings_case_insensitively() {
        let store = seeded();
        let posts = store.search(Some("FIRST"), None).unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id(), 1);
    }

    #[test]
    fn search_returns_every_match_once_in_insertion_order() {
        let store = seeded();
        let posts = store.search(Some("post"), Some("this is")).unwrap();
        let ids: Vec<u64> = posts.iter().map(|post| post.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn search_widens_across_fields() {
        let mut store = PostStore::new();
        store.create(&data(&[("title", "Alpha"), ("content", "plain body")])).unwrap();
        store.create(&data(&[("title", "Beta"), ("content", "mentions alpha here")])).unwrap();

        // title matches post 1 only, content matches post 2 only; both come back
        let posts = store.search(Some("alpha"), Some("mentions")).unwrap();
        let ids: Vec<u64> = posts.iter().map(|post| post.id()).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn search_needs_at_least_one_parameter() {
        let store = seeded();
        assert_eq!(store.search(None, None).unwrap_err(),
                   StoreError::MissingSearchParameter);
    }

    #[test]
    fn search_without_matches_reports_no_results() {
        let store = seeded();
        assert_eq!(store.search(Some("absent"), None).unwrap_err(),
                   StoreError::NoResults);
    }
}
