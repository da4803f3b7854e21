//! Per-request state shared by the middleware chain.

use bytes::Bytes;
use http::{HeaderMap, Method, Request, Uri};
use indexmap::IndexMap;

use crate::cookie::{parse_cookies, serialize_cookie, CookieOptions};

/// The request, its cookies, and whatever middleware attach to it.
#[derive(Debug)]
pub struct EdgeContext {
    request: Request<Bytes>,
    cookies: IndexMap<String, String>,
    set_cookies: Vec<String>,
    extensions: http::Extensions,
}

impl EdgeContext {
    pub fn new(request: Request<Bytes>) -> Self {
        let cookies = request
            .headers()
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| parse_cookies(header).into_iter())
            .fold(IndexMap::new(), |mut cookies, (name, value)| {
                cookies.entry(name).or_insert(value);
                cookies
            });

        Self {
            request,
            cookies,
            set_cookies: Vec::new(),
            extensions: http::Extensions::new(),
        }
    }

    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.request.headers()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers().get(name)?.to_str().ok()
    }

    pub fn body(&self) -> &Bytes {
        self.request.body()
    }

    /// Best guess at the client address: the first `X-Forwarded-For`
    /// entry, then `X-Real-IP`.
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|value| value.split(',').next())
            .map(str::trim);
        forwarded
            .or_else(|| self.header("x-real-ip").map(str::trim))
            .filter(|ip| ip.parse::<std::net::IpAddr>().is_ok())
            .map(str::to_string)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn cookies(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    /// Queue a `Set-Cookie` header for the response.
    ///
    /// The value is also visible through [`cookie`](Self::cookie) for the
    /// rest of the request.
    pub fn set_cookie(&mut self, name: &str, value: &str, options: &CookieOptions) {
        self.set_cookies.push(serialize_cookie(name, value, options));
        self.cookies.insert(name.to_string(), value.to_string());
    }

    /// Queue an expired cookie so the client drops it.
    pub fn delete_cookie(&mut self, name: &str, options: &CookieOptions) {
        let options = CookieOptions {
            max_age: Some(0),
            ..options.clone()
        };
        self.set_cookies.push(serialize_cookie(name, "", &options));
        self.cookies.shift_remove(name);
    }

    pub fn pending_cookies(&self) -> &[String] {
        &self.set_cookies
    }

    pub(crate) fn take_pending_cookies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.set_cookies)
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.extensions.insert(value)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions.get::<T>()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions.get_mut::<T>()
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions.remove::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<Bytes> {
        let mut builder = Request::builder().uri("/path?q=1");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Bytes::new()).unwrap()
    }

    #[test]
    fn cookies_from_every_header_are_merged() {
        let ctx = EdgeContext::new(request(&[("cookie", "a=1; b=2"), ("cookie", "c=3; a=9")]));
        assert_eq!(ctx.cookie("a"), Some("1"));
        assert_eq!(ctx.cookie("c"), Some("3"));
        assert_eq!(ctx.path(), "/path");
    }

    #[test]
    fn set_and_delete_update_the_view() {
        let mut ctx = EdgeContext::new(request(&[("cookie", "old=1")]));
        ctx.set_cookie("new", "2", &CookieOptions::new().path("/"));
        ctx.delete_cookie("old", &CookieOptions::new().path("/"));

        assert_eq!(ctx.cookie("new"), Some("2"));
        assert_eq!(ctx.cookie("old"), None);
        assert_eq!(
            ctx.pending_cookies(),
            ["new=2; Path=/".to_string(), "old=; Path=/; Max-Age=0".to_string()]
        );
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let ctx = EdgeContext::new(request(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]));
        assert_eq!(ctx.client_ip().as_deref(), Some("203.0.113.7"));

        let ctx = EdgeContext::new(request(&[("x-real-ip", "198.51.100.2")]));
        assert_eq!(ctx.client_ip().as_deref(), Some("198.51.100.2"));

        let ctx = EdgeContext::new(request(&[("x-forwarded-for", "not-an-ip")]));
        assert_eq!(ctx.client_ip(), None);
    }

    #[test]
    fn extensions_are_typed() {
        #[derive(Clone, Debug, PartialEq)]
        struct User(u32);

        let mut ctx = EdgeContext::new(request(&[]));
        assert!(ctx.get::<User>().is_none());
        ctx.insert(User(7));
        assert_eq!(ctx.get::<User>(), Some(&User(7)));
        assert_eq!(ctx.remove::<User>(), Some(User(7)));
    }
}
