use anyhow::{Context, Result};
use axum::{
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{COOKIE, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use tower_sessions::cookie::{Cookie, SameSite};
use url::Url;

use crate::auth::IssuedTokens;
use crate::config::{JwtConfig, OAuthConfig, ServerConfig};

pub const REFRESH_COOKIE: &str = "refreshToken";

/// Delivers issued tokens to the caller: refresh token in a scoped HTTP-only
/// cookie, access token via redirect query or response body.
#[derive(Debug, Clone)]
pub struct SessionTransport {
    cookie_path: String,
    secure: bool,
    refresh_max_age: time::Duration,
    success_url: Url,
    failure_url: Url,
}

impl SessionTransport {
    pub fn new(server: &ServerConfig, oauth: &OAuthConfig, jwt: &JwtConfig) -> Result<Self> {
        Ok(Self {
            cookie_path: server.refresh_cookie_path.clone(),
            secure: server.secure_cookies,
            refresh_max_age: time::Duration::seconds(jwt.refresh_ttl_seconds),
            success_url: Url::parse(&oauth.success_redirect_url)
                .context("Invalid oauth.success_redirect_url")?,
            failure_url: Url::parse(&oauth.failure_redirect_url)
                .context("Invalid oauth.failure_redirect_url")?,
        })
    }

    #[must_use]
    pub fn refresh_cookie(&self, refresh_token: &str) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, refresh_token.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(self.cookie_path.clone())
            .max_age(self.refresh_max_age)
            .build()
    }

    /// Same scope as [`Self::refresh_cookie`] so the browser overwrites it.
    #[must_use]
    pub fn expired_refresh_cookie(&self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, String::new()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path(self.cookie_path.clone())
            .max_age(time::Duration::ZERO)
            .build()
    }

    #[must_use]
    pub fn success_location(&self, tokens: &IssuedTokens) -> String {
        let mut url = self.success_url.clone();
        url.query_pairs_mut()
            .append_pair("accessToken", &tokens.access_token)
            .append_pair("refreshToken", &tokens.refresh_token);
        url.into()
    }

    #[must_use]
    pub fn failure_location(&self, reason: &str) -> String {
        let mut url = self.failure_url.clone();
        url.query_pairs_mut().append_pair("error", reason);
        url.into()
    }

    /// 302 to the success URL with the refresh cookie attached.
    #[must_use]
    pub fn success_redirect(&self, tokens: &IssuedTokens) -> Response {
        let mut response = redirect(&self.success_location(tokens));
        self.attach_cookie(&mut response, &self.refresh_cookie(&tokens.refresh_token));
        response
    }

    #[must_use]
    pub fn failure_redirect(&self, reason: &str) -> Response {
        redirect(&self.failure_location(reason))
    }

    pub fn attach_cookie(&self, response: &mut Response, cookie: &Cookie<'_>) {
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Read the refresh token from the request's `Cookie` header(s).
#[must_use]
pub fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == REFRESH_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}
