use rustc_serialize::json::{self, Json, ToJson};

/// A single post in the collection. The `id` is assigned by the store and
/// never changes afterwards. Fields the API does not know about are kept in
/// `extra` and round-tripped through JSON untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    id: u64,
    title: String,
    content: String,
    extra: json::Object,
}

impl Post {
    pub fn new(id: u64, title: String, content: String, extra: json::Object) -> Post {
        Post {
            id: id,
            title: title,
            content: content,
            extra: extra,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Overwrite the fields present in `data` and keep the rest.
    /// The id is left alone even when `data` carries one.
    pub fn merge(&mut self, data: &json::Object) {
        for (key, value) in data {
            match key.as_str() {
                "id" => {}
                "title" => {
                    if let Some(title) = value.as_string() {
                        self.title = title.to_string();
                    }
                }
                "content" => {
                    if let Some(content) = value.as_string() {
                        self.content = content.to_string();
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl ToJson for Post {
    fn to_json(&self) -> Json {
        let mut object = self.extra.clone();
        object.insert("id".to_string(), Json::U64(self.id));
        object.insert("title".to_string(), Json::String(self.title.clone()));
        object.insert("content".to_string(), Json::String(self.content.clone()));
        Json::Object(object)
    }
}
