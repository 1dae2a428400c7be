//! Cart ownership.
//!
//! A logged-in user owns their cart directly. Anonymous visitors own a cart
//! through a random token kept in their session, created on the first cart
//! write so read-only visitors never get one.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CartOwner, CurrentUser, session_keys};

/// The session and user a cart request acts for.
pub struct CartSession {
    session: Session,
    user: Option<CurrentUser>,
}

impl CartSession {
    /// The cart owner for reads. `None` for anonymous visitors without a cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the session store fails.
    pub async fn reader(&self) -> Result<Option<CartOwner>, AppError> {
        if let Some(user) = &self.user {
            return Ok(Some(CartOwner::User(user.id)));
        }
        Ok(cart_token(&self.session).await?.map(CartOwner::Anonymous))
    }

    /// The cart owner for writes, issuing an anonymous token if needed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the session store fails.
    pub async fn writer(&self) -> Result<CartOwner, AppError> {
        if let Some(user) = &self.user {
            return Ok(CartOwner::User(user.id));
        }
        if let Some(token) = cart_token(&self.session).await? {
            return Ok(CartOwner::Anonymous(token));
        }

        let token = Uuid::new_v4();
        self.session
            .insert(session_keys::CART_TOKEN, token)
            .await
            .map_err(session_error)?;
        Ok(CartOwner::Anonymous(token))
    }
}

impl<S> FromRequestParts<S> for CartSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;
        let user = session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .map_err(session_error)?;

        Ok(Self { session, user })
    }
}

/// Hand the session's anonymous cart token to `merge`, then forget it.
///
/// The token stays in the session until `merge` succeeds, so a failed merge
/// leaves the anonymous cart reachable for the next login attempt.
///
/// # Errors
///
/// Returns the error from `merge`, or `AppError::Internal` if the session
/// store fails.
pub async fn adopt_anonymous_cart<F, Fut, E>(session: &Session, merge: F) -> Result<(), AppError>
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    AppError: From<E>,
{
    let Some(token) = cart_token(session).await? else {
        return Ok(());
    };

    merge(token).await?;

    session
        .remove::<Uuid>(session_keys::CART_TOKEN)
        .await
        .map_err(session_error)?;
    Ok(())
}

async fn cart_token(session: &Session) -> Result<Option<Uuid>, AppError> {
    session
        .get::<Uuid>(session_keys::CART_TOKEN)
        .await
        .map_err(session_error)
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session error: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::services::cart::CartError;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_token() {
        let session = session();
        let token = Uuid::new_v4();
        session.insert(session_keys::CART_TOKEN, token).await.unwrap();

        let result = adopt_anonymous_cart(&session, |_| async {
            Err::<(), _>(CartError::LineNotFound)
        })
        .await;

        assert!(result.is_err());
        assert_eq!(cart_token(&session).await.unwrap(), Some(token));
    }

    #[tokio::test]
    async fn test_successful_merge_drops_token() {
        let session = session();
        let token = Uuid::new_v4();
        session.insert(session_keys::CART_TOKEN, token).await.unwrap();

        adopt_anonymous_cart(&session, |merged| async move {
            assert_eq!(merged, token);
            Ok::<(), CartError>(())
        })
        .await
        .unwrap();

        assert_eq!(cart_token(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_token_skips_merge() {
        let called = AtomicBool::new(false);

        adopt_anonymous_cart(&session(), |_| async {
            called.store(true, Ordering::SeqCst);
            Ok::<(), CartError>(())
        })
        .await
        .unwrap();

        assert!(!called.load(Ordering::SeqCst));
    }
}
