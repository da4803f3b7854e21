//! End-to-end tests for the middleware stack.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::{Method, Request, StatusCode};
use philjs_core::view::{dynamic, jsx, Props};
use philjs_edge::config::{CsrfConfig, RateLimitConfig, SessionConfig};
use philjs_edge::cookie::{parse_cookies, serialize_cookie, CookieOptions};
use philjs_edge::middleware::{ssr_handler, text_response};
use philjs_edge::session::SessionData;
use philjs_edge::{
    CookieSigner, CsrfMiddleware, CsrfToken, EdgeContext, MemoryStore, Pipeline, RateLimiter,
    RequireSession, Response, Result, Session, SessionMiddleware,
};

const SECRET: &str = "test-secret-that-is-32-bytes-long";

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

fn get(path: &str, cookies: &str) -> Request<Bytes> {
    request(Method::GET, path, cookies, &[], Bytes::new())
}

fn request(
    method: Method,
    path: &str,
    cookies: &str,
    headers: &[(&str, &str)],
    body: Bytes,
) -> Request<Bytes> {
    let mut builder = Request::builder().method(method).uri(path);
    if !cookies.is_empty() {
        builder = builder.header(COOKIE, cookies);
    }
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(body).unwrap()
}

/// `name=value` pairs from every `Set-Cookie`, ready to send back.
fn returned_cookies(response: &Response) -> String {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().split(';').next().unwrap().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn set_cookie(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .find(|cookie| cookie.starts_with(&format!("{name}=")))
}

fn body(response: &Response) -> String {
    String::from_utf8(response.body().to_vec()).unwrap()
}

fn count_visits(ctx: &mut EdgeContext) -> Result<Response> {
    let session = Session::from_context(ctx).unwrap();
    let visits = session.get::<u32>("visits").unwrap_or(0) + 1;
    session.insert("visits", &visits)?;
    Ok(text_response(StatusCode::OK, visits.to_string()))
}

fn read_only(ctx: &mut EdgeContext) -> Result<Response> {
    let session = Session::from_context(ctx).unwrap();
    let visits = session.get::<u32>("visits").unwrap_or(0);
    Ok(text_response(StatusCode::OK, visits.to_string()))
}

fn crafted_session_cookie(data: &SessionData) -> String {
    let signed = CookieSigner::new(SECRET)
        .unwrap()
        .sign(&serde_json::to_string(data).unwrap());
    serialize_cookie("philjs_session", &signed, &CookieOptions::default())
}

#[tokio::test]
async fn cookie_sessions_persist_across_requests() {
    let pipeline = Pipeline::new(count_visits)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap());

    let first = pipeline.handle(get("/", "")).await;
    assert_eq!(body(&first), "1");
    let cookie = set_cookie(&first, "philjs_session").unwrap();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age="));

    let second = pipeline.handle(get("/", &returned_cookies(&first))).await;
    assert_eq!(body(&second), "2");
}

#[tokio::test]
async fn untouched_sessions_write_no_cookie() {
    let pipeline = Pipeline::new(read_only)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap());

    let response = pipeline.handle(get("/", "")).await;
    assert_eq!(body(&response), "0");
    assert!(response.headers().get(SET_COOKIE).is_none());
}

#[tokio::test]
async fn tampered_cookies_fall_back_to_a_fresh_session() {
    let pipeline = Pipeline::new(count_visits)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap());

    let first = pipeline.handle(get("/", "")).await;
    let forged = returned_cookies(&first).replace("visits", "vis1ts");
    let response = pipeline.handle(get("/", &forged)).await;
    assert_eq!(body(&response), "1");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_cookie_is_cleared_when_session_is_unused() {
    let pipeline = Pipeline::new(read_only)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap());

    let response = pipeline.handle(get("/", "philjs_session=garbage")).await;
    let cookie = set_cookie(&response, "philjs_session").unwrap();
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn encrypted_sessions_hide_their_payload() {
    let config = SessionConfig::new(SECRET).encrypt(true);
    let pipeline = Pipeline::new(count_visits).with(SessionMiddleware::new(config).unwrap());

    let first = pipeline.handle(get("/", "")).await;
    let cookies = parse_cookies(&returned_cookies(&first));
    let value = &cookies["philjs_session"];
    assert_eq!(value.split('.').count(), 3);
    assert!(!value.contains("visits"));

    let second = pipeline.handle(get("/", &returned_cookies(&first))).await;
    assert_eq!(body(&second), "2");

    let unencrypted = Pipeline::new(read_only)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap());
    let response = unencrypted.handle(get("/", &returned_cookies(&first))).await;
    assert_eq!(body(&response), "0");
}

#[tokio::test]
async fn expired_sessions_start_over() {
    let mut data = SessionData::new(now() - 10_000);
    data.values.insert("visits".into(), 7.into());
    let cookie = crafted_session_cookie(&data);
    let cookie = cookie.split(';').next().unwrap();

    let pipeline = Pipeline::new(read_only)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET).max_age(3600)).unwrap());
    assert_eq!(body(&pipeline.handle(get("/", cookie)).await), "0");

    let pipeline = Pipeline::new(read_only)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET).max_age(100_000)).unwrap());
    assert_eq!(body(&pipeline.handle(get("/", cookie)).await), "7");
}

#[tokio::test]
async fn old_sessions_are_rotated() {
    let data = SessionData::new(now() - 600);
    let cookie = crafted_session_cookie(&data);
    let cookie = cookie.split(';').next().unwrap();

    let pipeline = Pipeline::new(read_only)
        .with(SessionMiddleware::new(SessionConfig::new(SECRET).rotate_after(300)).unwrap());
    let response = pipeline.handle(get("/", cookie)).await;

    let cookies = parse_cookies(&returned_cookies(&response));
    let payload = CookieSigner::new(SECRET)
        .unwrap()
        .unsign(&cookies["philjs_session"])
        .unwrap();
    let rotated: SessionData = serde_json::from_str(&payload).unwrap();
    assert_eq!(rotated.created_at, data.created_at);
    assert!(rotated.rotated_at >= now() - 5);
}

#[tokio::test]
async fn store_sessions_keep_data_server_side() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(count_visits).with(
        SessionMiddleware::with_store(SessionConfig::new(SECRET), store.clone()).unwrap(),
    );

    let first = pipeline.handle(get("/", "")).await;
    assert_eq!(store.len(), 1);
    assert!(!returned_cookies(&first).contains("visits"));

    let second = pipeline.handle(get("/", &returned_cookies(&first))).await;
    assert_eq!(body(&second), "2");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn regenerate_and_destroy_with_a_store() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(|ctx: &mut EdgeContext| -> Result<Response> {
        let session = Session::from_context(ctx).unwrap();
        match ctx.path() {
            "/login" => {
                session.insert("user", &"ada")?;
                session.regenerate();
            }
            "/logout" => session.destroy(),
            _ => {}
        }
        Ok(text_response(StatusCode::OK, session.get::<String>("user").unwrap_or_default()))
    })
    .with(SessionMiddleware::with_store(SessionConfig::new(SECRET), store.clone()).unwrap());

    let login = pipeline.handle(get("/login", "")).await;
    let first_id = returned_cookies(&login);

    let again = pipeline.handle(get("/login", &first_id)).await;
    let second_id = returned_cookies(&again);
    assert_ne!(first_id, second_id);
    assert_eq!(store.len(), 1);

    let stale = pipeline.handle(get("/", &first_id)).await;
    assert_eq!(body(&stale), "");

    let logout = pipeline.handle(get("/logout", &second_id)).await;
    assert_eq!(body(&logout), "ada");
    assert!(set_cookie(&logout, "philjs_session").unwrap().contains("Max-Age=0"));
    assert!(store.is_empty());
}

#[tokio::test]
async fn require_session_rejects_anonymous_requests() {
    let pipeline = Pipeline::new(|ctx: &mut EdgeContext| -> Result<Response> {
        let session = Session::from_context(ctx).unwrap();
        if ctx.path() == "/login" {
            session.insert("user", &1)?;
        }
        Ok(text_response(StatusCode::OK, "ok"))
    })
    .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap());
    let guarded = Pipeline::new(|_: &mut EdgeContext| -> Result<Response> {
        Ok(text_response(StatusCode::OK, "secret"))
    })
    .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap())
    .with(RequireSession::new("user"));

    let anonymous = guarded.handle(get("/admin", "")).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let login = pipeline.handle(get("/login", "")).await;
    let response = guarded.handle(get("/admin", &returned_cookies(&login))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), "secret");
}

fn csrf_pipeline() -> Pipeline {
    Pipeline::new(|ctx: &mut EdgeContext| -> Result<Response> {
        let token = CsrfToken::from_context(ctx).unwrap_or_default();
        Ok(text_response(StatusCode::OK, token))
    })
    .with(SessionMiddleware::new(SessionConfig::new(SECRET)).unwrap())
    .with(CsrfMiddleware::new(CsrfConfig::new(SECRET)).unwrap())
}

#[tokio::test]
async fn csrf_tokens_live_in_the_session() {
    let pipeline = csrf_pipeline();

    let page = pipeline.handle(get("/form", "")).await;
    let token = body(&page);
    assert!(!token.is_empty());
    let cookies = returned_cookies(&page);
    assert!(set_cookie(&page, "philjs_csrf").is_none());

    let missing = pipeline
        .handle(request(Method::POST, "/submit", &cookies, &[], Bytes::new()))
        .await;
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);

    let wrong = pipeline
        .handle(request(Method::POST, "/submit", &cookies, &[("x-csrf-token", "nope")], Bytes::new()))
        .await;
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let header = pipeline
        .handle(request(Method::POST, "/submit", &cookies, &[("x-csrf-token", token.as_str())], Bytes::new()))
        .await;
    assert_eq!(header.status(), StatusCode::OK);

    let form = pipeline
        .handle(request(
            Method::POST,
            "/submit",
            &cookies,
            &[(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded")],
            Bytes::from(format!("title=hi&_csrf={token}")),
        ))
        .await;
    assert_eq!(form.status(), StatusCode::OK);
}

#[tokio::test]
async fn csrf_without_a_session_uses_a_signed_cookie() {
    let pipeline = Pipeline::new(|ctx: &mut EdgeContext| -> Result<Response> {
        Ok(text_response(StatusCode::OK, CsrfToken::from_context(ctx).unwrap_or_default()))
    })
    .with(CsrfMiddleware::new(CsrfConfig::new(SECRET)).unwrap());

    let page = pipeline.handle(get("/", "")).await;
    let token = body(&page);
    let cookie = set_cookie(&page, "philjs_csrf").unwrap();
    assert!(!cookie.contains("HttpOnly"));
    let cookies = returned_cookies(&page);

    let again = pipeline.handle(get("/", &cookies)).await;
    assert_eq!(body(&again), token);
    assert!(again.headers().get(SET_COOKIE).is_none());

    let ok = pipeline
        .handle(request(Method::DELETE, "/item", &cookies, &[("x-csrf-token", token.as_str())], Bytes::new()))
        .await;
    assert_eq!(ok.status(), StatusCode::OK);

    let forged_cookie = format!("philjs_csrf={token}.forged");
    let forged = pipeline
        .handle(request(Method::DELETE, "/item", &forged_cookie, &[("x-csrf-token", token.as_str())], Bytes::new()))
        .await;
    assert_eq!(forged.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn rate_limiter_returns_429_with_headers() {
    let pipeline = Pipeline::new(|_: &mut EdgeContext| -> Result<Response> {
        Ok(text_response(StatusCode::OK, "ok"))
    })
    .with(RateLimiter::new(RateLimitConfig::new(2, 0.001).exclude("/health")).unwrap());

    let client = [("x-forwarded-for", "203.0.113.9")];
    let first = pipeline
        .handle(request(Method::GET, "/", "", &client, Bytes::new()))
        .await;
    assert_eq!(first.headers()["x-ratelimit-limit"], "2");
    assert_eq!(first.headers()["x-ratelimit-remaining"], "1");

    pipeline
        .handle(request(Method::GET, "/", "", &client, Bytes::new()))
        .await;
    let limited = pipeline
        .handle(request(Method::GET, "/", "", &client, Bytes::new()))
        .await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers()["x-ratelimit-remaining"], "0");
    let retry_after: u64 = limited.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!(retry_after >= 1);

    let other = pipeline
        .handle(request(Method::GET, "/", "", &[("x-forwarded-for", "198.51.100.1")], Bytes::new()))
        .await;
    assert_eq!(other.status(), StatusCode::OK);

    let health = pipeline
        .handle(request(Method::GET, "/health", "", &client, Bytes::new()))
        .await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn ssr_handler_renders_a_document() {
    let pipeline = Pipeline::new(ssr_handler(|ctx| {
        let path = ctx.path().to_string();
        jsx(
            "main",
            Props::new().child(dynamic(move || format!("Path: {path}"))),
            None,
        )
    }));

    let response = pipeline.handle(get("/about", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
    let html = body(&response);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("<main><!--$-->Path: /about<!--/$--></main>"));
}
