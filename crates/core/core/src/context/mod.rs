//! Session context shared by console services.
//!
//! The context is built once from an [`AuthProvider`] and handed to every
//! service at construction. It caches the current actor, re-reads it on
//! [`SessionContext::refresh`], and broadcasts every change to subscribers.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{AdminError, AdminResult};
use crate::traits::AuthProvider;
use crate::types::{Actor, Credentials, Role};

/// Who is acting and whether they may.
pub struct SessionContext {
    auth: Arc<dyn AuthProvider>,
    state: watch::Sender<Option<Actor>>,
}

impl SessionContext {
    /// Creates a context with no known actor. Call [`refresh`](Self::refresh)
    /// to pick up an existing session.
    pub fn new(auth: Arc<dyn AuthProvider>) -> Self {
        let (state, _) = watch::channel(None);
        Self { auth, state }
    }

    /// Creates a context and loads the current actor from the auth service.
    pub async fn load(auth: Arc<dyn AuthProvider>) -> AdminResult<Self> {
        let ctx = Self::new(auth);
        ctx.refresh().await?;
        Ok(ctx)
    }

    /// Re-reads the current actor from the auth service.
    pub async fn refresh(&self) -> AdminResult<Option<Actor>> {
        let actor = self.auth.current_actor().await?;
        self.publish(actor.clone());
        Ok(actor)
    }

    /// Signs in and records the new actor.
    pub async fn sign_in(&self, credentials: &Credentials) -> AdminResult<Actor> {
        let actor = self.auth.sign_in(credentials).await?;
        tracing::info!(actor = %actor.id, role = ?actor.role, "signed in");
        self.publish(Some(actor.clone()));
        Ok(actor)
    }

    /// Signs out and clears the actor.
    pub async fn sign_out(&self) -> AdminResult<()> {
        self.auth.sign_out().await?;
        tracing::info!("signed out");
        self.publish(None);
        Ok(())
    }

    /// Returns the cached actor.
    pub fn actor(&self) -> Option<Actor> {
        self.state.borrow().clone()
    }

    /// Returns true if an actor is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Receives every actor change from now on.
    pub fn subscribe(&self) -> watch::Receiver<Option<Actor>> {
        self.state.subscribe()
    }

    /// Returns the actor or fails if nobody is signed in.
    pub fn require_actor(&self) -> AdminResult<Actor> {
        self.actor().ok_or(AdminError::NotAuthenticated)
    }

    /// Returns the actor if their role is one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> AdminResult<Actor> {
        let actor = self.require_actor()?;
        if allowed.contains(&actor.role) {
            Ok(actor)
        } else {
            Err(AdminError::permission_denied(format!(
                "role {:?} may not perform this operation",
                actor.role
            )))
        }
    }

    /// Returns the actor if they may use the console at all.
    pub fn require_staff(&self) -> AdminResult<Actor> {
        self.require_role(&[Role::Admin, Role::Editor])
    }

    /// Returns the actor if they are an administrator.
    pub fn require_admin(&self) -> AdminResult<Actor> {
        self.require_role(&[Role::Admin])
    }

    fn publish(&self, actor: Option<Actor>) {
        self.state.send_replace(actor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedAuth {
        actor: Mutex<Option<Actor>>,
    }

    #[async_trait]
    impl AuthProvider for FixedAuth {
        async fn current_actor(&self) -> AdminResult<Option<Actor>> {
            Ok(self.actor.lock().unwrap().clone())
        }

        async fn sign_in(&self, credentials: &Credentials) -> AdminResult<Actor> {
            let actor = Actor {
                id: "a1".into(),
                email: credentials.email.clone(),
                role: Role::Editor,
            };
            *self.actor.lock().unwrap() = Some(actor.clone());
            Ok(actor)
        }

        async fn sign_out(&self) -> AdminResult<()> {
            *self.actor.lock().unwrap() = None;
            Ok(())
        }
    }

    fn auth() -> Arc<FixedAuth> {
        Arc::new(FixedAuth {
            actor: Mutex::new(None),
        })
    }

    #[tokio::test]
    async fn test_sign_in_updates_subscribers() {
        let ctx = SessionContext::load(auth()).await.unwrap();
        let mut rx = ctx.subscribe();
        assert!(!ctx.is_authenticated());

        ctx.sign_in(&Credentials::new("ed@example.com", "pw")).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|a| a.role), Some(Role::Editor));

        assert!(ctx.require_staff().is_ok());
        assert!(matches!(
            ctx.require_admin(),
            Err(AdminError::PermissionDenied { .. })
        ));
    }

    #[tokio::test]
    async fn test_sign_out_clears_actor() {
        let ctx = SessionContext::new(auth());
        ctx.sign_in(&Credentials::new("ed@example.com", "pw")).await.unwrap();
        ctx.sign_out().await.unwrap();
        assert!(matches!(ctx.require_actor(), Err(AdminError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_refresh_picks_up_external_session() {
        let provider = auth();
        let ctx = SessionContext::new(provider.clone());
        provider
            .sign_in(&Credentials::new("ed@example.com", "pw"))
            .await
            .unwrap();
        assert!(ctx.actor().is_none());
        ctx.refresh().await.unwrap();
        assert_eq!(ctx.actor().map(|a| a.id), Some("a1".to_string()));
    }
}
