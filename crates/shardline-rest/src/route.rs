//! Routes and their rate-limit keys
//!
//! Requests that differ only in minor ids share a bucket; the major
//! parameters (channel, guild, webhook) split buckets.

use std::fmt;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path segments whose following id is a major parameter
const MAJOR_PARAMETERS: [&str; 3] = ["channels", "guilds", "webhooks"];

/// A concrete API route
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    method: Method,
    path: String,
    key: String,
    major: Option<String>,
}

impl Route {
    /// Build a route from a method and a path relative to the API base
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let (key, major) = bucket_key(method, &path);
        Self {
            method,
            path,
            key,
            major,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Key shared by every request this route's bucket covers
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value of the major parameter, if the route has one
    pub fn major(&self) -> Option<&str> {
        self.major.as_deref()
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

fn bucket_key(method: Method, path: &str) -> (String, Option<String>) {
    let path = path.split('?').next().unwrap_or(path);
    let mut key = String::from(method.as_str());
    let mut major = None;
    let mut previous = "";

    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        key.push('/');
        let is_id = segment.bytes().all(|b| b.is_ascii_digit());
        if is_id && MAJOR_PARAMETERS.contains(&previous) {
            if major.is_none() {
                major = Some(segment.to_string());
            }
            key.push_str(segment);
        } else if is_id {
            key.push_str(":id");
        } else {
            key.push_str(segment);
        }
        previous = segment;
    }

    (key, major)
}
