//! Authorization guard.
//!
//! Evaluation order is fixed:
//!
//! 1. no identity → `Unauthenticated`, before the subject is looked at
//! 2. admin bypass, when the policy allows it and the caller is admin
//! 3. capability check against the subject's matching view
//! 4. subject lacking the required view → `Configuration`
//! 5. check failed → `AccessDenied`

use super::capability::AccessSubject;
use super::policy::{AccessPolicy, Capability};
use crate::errors::SchedulerError;
use crate::identity::IdentityContext;
use crate::observability::metrics::record_access_decision;
use std::future::Future;

/// How a guard check was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The caller holds the required capability on the subject.
    Allowed,
    /// The policy allows admins and the caller is one.
    AdminBypass,
}

/// Stateless authorization guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGuard;

impl AccessGuard {
    /// Evaluates `policy` for the caller in `ctx` against `subject`.
    pub fn check<S>(
        policy: AccessPolicy,
        ctx: &IdentityContext,
        subject: &S,
    ) -> Result<AccessDecision, SchedulerError>
    where
        S: AccessSubject + ?Sized,
    {
        let capability = policy.required_capability.as_str();

        let identity = ctx.current().inspect_err(|_| {
            record_access_decision(capability, "unauthenticated");
        })?;

        if policy.allow_admin && identity.is_admin() {
            tracing::debug!(
                target: "scheduler.guard",
                capability,
                user_id = identity.user_id(),
                "Admin bypass"
            );
            record_access_decision(capability, "admin_bypass");
            return Ok(AccessDecision::AdminBypass);
        }

        let granted = match policy.required_capability {
            Capability::Ownable => subject
                .as_ownable()
                .map(|ownable| ownable.has_access(identity.username())),
            Capability::Participatable => subject
                .as_participatable()
                .map(|participatable| participatable.is_participant(identity.user_id())),
        };

        match granted {
            Some(true) => {
                record_access_decision(capability, "allowed");
                Ok(AccessDecision::Allowed)
            }
            Some(false) => {
                tracing::debug!(
                    target: "scheduler.guard",
                    capability,
                    user_id = identity.user_id(),
                    "Access denied"
                );
                record_access_decision(capability, "denied");
                Err(SchedulerError::AccessDenied)
            }
            None => {
                tracing::error!(
                    target: "scheduler.guard",
                    capability,
                    subject = std::any::type_name::<S>(),
                    "Guarded subject does not expose the required capability"
                );
                record_access_decision(capability, "misconfigured");
                Err(SchedulerError::Configuration(format!(
                    "subject {} does not expose the {} capability",
                    std::any::type_name::<S>(),
                    capability
                )))
            }
        }
    }

    /// Runs `op` only if `policy` admits the caller for `subject`. The
    /// operation's result is returned unchanged.
    pub async fn guarded<S, F, Fut, T>(
        policy: AccessPolicy,
        ctx: &IdentityContext,
        subject: &S,
        op: F,
    ) -> Result<T, SchedulerError>
    where
        S: AccessSubject + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SchedulerError>>,
    {
        Self::check(policy, ctx, subject)?;
        op().await
    }
}
