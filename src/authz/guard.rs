use std::future::Future;

use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{AppError, AppResult};

use super::evaluator::{PolicyEvaluator, RequiredPermission};
use super::principal::Principal;

pub const LOGIN_PATH: &str = "/login";

/// Why a guard refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    Unauthenticated,
    Unauthorized,
}

/// Guard lifecycle. `Checking` is only ever the initial state; `evaluate` always
/// returns a terminal one, so callers never render before the decision exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Allowed,
    Denied(Denial),
}

impl GuardState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GuardState::Checking)
    }
}

/// Gate for server-side operations: the handler runs only once access is granted.
#[derive(Debug, Clone)]
pub struct ActionGuard {
    required: RequiredPermission,
}

impl ActionGuard {
    pub fn new(required: impl Into<RequiredPermission>) -> Self {
        Self {
            required: required.into(),
        }
    }

    pub fn required(&self) -> &RequiredPermission {
        &self.required
    }

    pub fn evaluate(&self, evaluator: &dyn PolicyEvaluator, principal: Option<&Principal>) -> GuardState {
        if principal.is_none() {
            return GuardState::Denied(Denial::Unauthenticated);
        }

        if evaluator.has_any_permission(principal, &self.required) {
            GuardState::Allowed
        } else {
            GuardState::Denied(Denial::Unauthorized)
        }
    }

    pub fn authorize(&self, evaluator: &dyn PolicyEvaluator, principal: Option<&Principal>) -> AppResult<()> {
        match self.evaluate(evaluator, principal) {
            GuardState::Allowed => Ok(()),
            GuardState::Denied(Denial::Unauthenticated) => Err(AppError::unauthenticated("login required")),
            GuardState::Denied(Denial::Unauthorized) | GuardState::Checking => {
                tracing::info!(
                    user_id = ?principal.map(|p| p.user_id),
                    required = ?self.required.tokens(),
                    "guard denied"
                );
                Err(AppError::unauthorized(format!(
                    "requires one of: {}",
                    self.required.tokens().join(", ")
                )))
            }
        }
    }

    /// Runs `handler` only if the guard allows; otherwise the handler is never invoked.
    pub async fn run<F, Fut, T>(
        &self,
        evaluator: &dyn PolicyEvaluator,
        principal: Option<&Principal>,
        handler: F,
    ) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.authorize(evaluator, principal)?;
        handler().await
    }
}

/// What the client should do with a protected view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RouteDecision {
    Render,
    Redirect { to: String, reason: Denial },
}

/// Gate for client routes: on denial, redirect to login first, then to the fallback view.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    guard: ActionGuard,
    fallback: String,
}

impl RouteGuard {
    pub fn new(required: impl Into<RequiredPermission>, fallback: impl Into<String>) -> Self {
        Self {
            guard: ActionGuard::new(required),
            fallback: fallback.into(),
        }
    }

    pub fn decide(&self, evaluator: &dyn PolicyEvaluator, principal: Option<&Principal>) -> RouteDecision {
        match self.guard.evaluate(evaluator, principal) {
            GuardState::Allowed => RouteDecision::Render,
            GuardState::Denied(Denial::Unauthenticated) => RouteDecision::Redirect {
                to: LOGIN_PATH.to_string(),
                reason: Denial::Unauthenticated,
            },
            GuardState::Denied(Denial::Unauthorized) | GuardState::Checking => RouteDecision::Redirect {
                to: self.fallback.clone(),
                reason: Denial::Unauthorized,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::permissions::*;
    use crate::authz::{roles, DefaultPolicyEvaluator};
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    #[test]
    fn unauthenticated_takes_precedence() {
        let evaluator = DefaultPolicyEvaluator::default();
        let guard = ActionGuard::new(RequiredPermission::Any(vec![]));
        assert_eq!(guard.evaluate(&evaluator, None), GuardState::Denied(Denial::Unauthenticated));
    }

    #[test]
    fn evaluate_never_returns_checking() {
        let evaluator = DefaultPolicyEvaluator::default();
        let patrol = Principal::new(Uuid::new_v4(), roles::PATROL);
        let guard = ActionGuard::new(ACCESS_ANALYTICS);
        assert!(guard.evaluate(&evaluator, Some(&patrol)).is_terminal());
        assert!(guard.evaluate(&evaluator, None).is_terminal());
        assert!(!GuardState::Checking.is_terminal());
    }

    #[tokio::test]
    async fn denied_handler_is_never_invoked() {
        let evaluator = DefaultPolicyEvaluator::default();
        let patrol = Principal::new(Uuid::new_v4(), roles::PATROL);
        let guard = ActionGuard::new(CAN_MODIFY_PRIVILEGES);
        let invoked = AtomicBool::new(false);

        let result = guard
            .run(&evaluator, Some(&patrol), || async {
                invoked.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn allowed_handler_result_is_returned() {
        let evaluator = DefaultPolicyEvaluator::default();
        let admin = Principal::new(Uuid::new_v4(), roles::ADMIN);
        let guard = ActionGuard::new(CAN_MODIFY_PRIVILEGES);

        let value = guard.run(&evaluator, Some(&admin), || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn route_guard_redirects_to_login_then_fallback() {
        let evaluator = DefaultPolicyEvaluator::default();
        let guard = RouteGuard::new([ACCESS_SUMMARIES, VIEW_OWN_SUMMARIES], "/dashboard");

        assert_eq!(
            guard.decide(&evaluator, None),
            RouteDecision::Redirect { to: LOGIN_PATH.to_string(), reason: Denial::Unauthenticated }
        );

        let patrol = Principal::new(Uuid::new_v4(), roles::PATROL);
        assert_eq!(guard.decide(&evaluator, Some(&patrol)), RouteDecision::Render);

        let stranger = Principal::new(Uuid::new_v4(), "visitor");
        assert_eq!(
            guard.decide(&evaluator, Some(&stranger)),
            RouteDecision::Redirect { to: "/dashboard".to_string(), reason: Denial::Unauthorized }
        );
    }
}
