//! Requests as handed to the pipeline

use serde::Serialize;

use crate::error::RestError;
use crate::route::Route;
use crate::transport::{FileAttachment, RequestBody};

/// A route plus its encoded body
#[derive(Debug, Clone)]
pub struct Request {
    route: Route,
    body: RequestBody,
}

impl Request {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            body: RequestBody::Empty,
        }
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, RestError> {
        self.body = RequestBody::Json(serde_json::to_string(body).map_err(RestError::Encode)?);
        Ok(self)
    }

    /// Attach files, with the JSON part sent as `payload_json`
    pub fn multipart<T: Serialize + ?Sized>(
        mut self,
        payload: Option<&T>,
        files: Vec<FileAttachment>,
    ) -> Result<Self, RestError> {
        let payload_json = payload
            .map(serde_json::to_string)
            .transpose()
            .map_err(RestError::Encode)?;
        self.body = RequestBody::Multipart {
            payload_json,
            files,
        };
        Ok(self)
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }
}
