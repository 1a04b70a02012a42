//! Request body extraction shared by the write endpoints.

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::error::RegistrationError;

/// Request body accepted either as JSON or as an
/// `application/x-www-form-urlencoded` form, chosen by `Content-Type`.
///
/// HTML forms on the registration page post form bodies; API clients send
/// JSON. Anything that is not a form is handed to the JSON extractor, which
/// rejects a missing or foreign content type. Rejections surface as
/// [`RegistrationError::InvalidRequest`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = RegistrationError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let Form(value) = Form::<T>::from_request(req, state).await?;
            Ok(Self(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state).await?;
            Ok(Self(value))
        }
    }
}

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::body::Body;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Payload {
        attendee_identity: String,
        #[serde(default)]
        capacity: Option<u32>,
    }

    fn request(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let Ok(req) = builder.body(Body::from(body)) else {
            panic!("valid request");
        };
        req
    }

    #[tokio::test]
    async fn json_body_is_extracted() {
        let req = request(
            Some("application/json"),
            r#"{"attendeeIdentity":"a@example.org","capacity":4}"#,
        );
        let Ok(JsonOrForm(body)) = JsonOrForm::<Payload>::from_request(req, &()).await else {
            panic!("json must extract");
        };
        assert_eq!(body.attendee_identity, "a@example.org");
        assert_eq!(body.capacity, Some(4));
    }

    #[tokio::test]
    async fn form_body_is_extracted() {
        let req = request(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            "attendeeIdentity=a%40example.org&capacity=2",
        );
        let Ok(JsonOrForm(body)) = JsonOrForm::<Payload>::from_request(req, &()).await else {
            panic!("form must extract");
        };
        assert_eq!(body.attendee_identity, "a@example.org");
        assert_eq!(body.capacity, Some(2));
    }

    #[tokio::test]
    async fn other_content_types_are_invalid_requests() {
        let req = request(Some("text/plain"), "attendeeIdentity=a%40example.org");
        let result = JsonOrForm::<Payload>::from_request(req, &()).await;
        assert!(matches!(result, Err(RegistrationError::InvalidRequest(_))));

        let req = request(Some("application/x-www-form-urlencoded"), "capacity=two");
        let result = JsonOrForm::<Payload>::from_request(req, &()).await;
        assert!(matches!(result, Err(RegistrationError::InvalidRequest(_))));
    }
}
