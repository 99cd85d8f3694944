//! Per-request scratchpad passed through the router and middleware chain.

use crate::http::{request::HttpRequest, response::HttpResponse, types::StatusCode};
use std::{any::Any, collections::HashMap};

/// Everything a handler or middleware touches while servicing one request:
/// the parsed request, the response under construction, path parameters
/// extracted by the router, and an arbitrary state map middlewares use to
/// pass data downstream.
pub struct Context<'req> {
    request: HttpRequest<'req>,
    response: HttpResponse,
    params: HashMap<String, String>,
    state: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl<'req> Context<'req> {
    pub(crate) fn new(request: HttpRequest<'req>) -> Self {
        Self {
            request,
            response: HttpResponse::new(StatusCode::Ok),
            params: HashMap::new(),
            state: HashMap::new(),
        }
    }

    /// The parsed request this context was built from.
    pub fn request(&self) -> &HttpRequest<'req> {
        &self.request
    }

    /// The response under construction. Handlers and middleware mutate
    /// this directly rather than returning a value.
    pub fn response(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    pub(crate) fn into_response(self) -> HttpResponse {
        self.response
    }

    /// A path parameter captured by a `:name` segment in the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Stores a value under `key`, replacing and dropping any prior value
    /// stored under the same key.
    pub fn set_state<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.state.insert(key.into(), Box::new(value));
    }

    /// Retrieves a value previously stored with [`Self::set_state`] under
    /// `key`, if it was stored as exactly type `T`.
    pub fn state<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.state.get(key).and_then(|value| value.downcast_ref())
    }

    /// Sets the response status and a JSON body in one call.
    pub fn json(&mut self, status: StatusCode, body: Vec<u8>) -> &mut Self {
        self.response.set_status(status).json(body);
        self
    }

    /// Sets the response status and a plain-text body in one call.
    pub fn text(&mut self, status: StatusCode, body: Vec<u8>) -> &mut Self {
        self.response.set_status(status).text(body);
        self
    }

    /// Sets the response status and an HTML body in one call.
    pub fn html(&mut self, status: StatusCode, body: Vec<u8>) -> &mut Self {
        self.response.set_status(status).html(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context<'static> {
        Context::new(crate::http::request::parse(b"GET /x HTTP/1.1\r\n\r\n").unwrap())
    }

    #[test]
    fn params_default_empty_and_round_trip_through_set_params() {
        let mut context = ctx();
        assert_eq!(context.param("id"), None);

        let mut params = HashMap::new();
        params.insert("id".to_string(), "42".to_string());
        context.set_params(params);

        assert_eq!(context.param("id"), Some("42"));
    }

    #[test]
    fn state_round_trips_by_type_and_key() {
        let mut context = ctx();
        context.set_state("count", 7u32);
        assert_eq!(context.state::<u32>("count"), Some(&7));
        assert_eq!(context.state::<u32>("missing"), None);

        context.set_state("count", 9u32);
        assert_eq!(context.state::<u32>("count"), Some(&9));
    }

    #[test]
    fn json_helper_sets_status_and_body() {
        let mut context = ctx();
        context.json(StatusCode::Created, b"{}".to_vec());
        assert_eq!(context.response().status(), StatusCode::Created);
    }
}
