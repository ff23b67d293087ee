use crate::extractors::RejectionType;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use log::*;
use sse::UserId;

/// Header set by the upstream authentication gateway once it has verified
/// the caller's credentials.
pub(crate) const USER_ID_HEADER: &str = "x-user-id";

pub(crate) struct AuthenticatedUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = RejectionType;

    // The hub trusts the identity forwarded by the gateway and performs no
    // credential checks of its own. A missing or blank id is Unauthorized.
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match user_id {
            Some(user_id) => Ok(AuthenticatedUser(user_id.to_string())),
            None => {
                trace!("Rejecting request without a {USER_ID_HEADER} header");
                Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<AuthenticatedUser, RejectionType> {
        let (mut parts, _) = request.into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_trimmed_user_id() {
        let request = Request::builder()
            .header(USER_ID_HEADER, " user-42 ")
            .body(())
            .unwrap();
        let AuthenticatedUser(user_id) = extract(request).await.unwrap();
        assert_eq!(user_id, "user-42");
    }

    #[tokio::test]
    async fn missing_or_blank_header_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        let (status, _) = extract(request).await.err().unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .header(USER_ID_HEADER, "   ")
            .body(())
            .unwrap();
        let (status, _) = extract(request).await.err().unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
