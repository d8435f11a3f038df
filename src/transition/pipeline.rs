//! The guard/middleware execution pipeline.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::{ErrorCode, NavigationError};
use crate::lifecycle::{invoke_guard, GuardKind, GuardOutcome, GuardRejection, RedirectTarget};
use crate::options::NavigationOptions;
use crate::router::Router;
use crate::state::State;

use super::token::TransitionToken;

/// Upper bound on guard/middleware redirects within one navigation.
pub const MAX_REDIRECTS: usize = 10;

/// Segment lists for a transition: ancestors of `from` to deactivate
/// (deepest first) and ancestors of `to` to activate (shallowest first).
/// Shared ancestors stay untouched unless `reload` forces a full cycle.
pub(crate) fn transition_path(
    to: &State,
    from: Option<&State>,
    reload: bool,
) -> (Vec<String>, Vec<String>) {
    let to_segments = name_segments(&to.name);
    let from_segments = from.map(|s| name_segments(&s.name)).unwrap_or_default();

    let common = if reload {
        0
    } else {
        to_segments
            .iter()
            .zip(from_segments.iter())
            .take_while(|(a, b)| a == b)
            .count()
    };

    let mut to_deactivate: Vec<String> = from_segments[common..].to_vec();
    to_deactivate.reverse();
    let to_activate: Vec<String> = to_segments[common..].to_vec();
    (to_deactivate, to_activate)
}

fn name_segments(name: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut acc = String::new();
    for part in name.split('.') {
        if acc.is_empty() {
            acc.push_str(part);
        } else {
            acc.push('.');
            acc.push_str(part);
        }
        out.push(acc.clone());
    }
    out
}

fn cancelled(token: &TransitionToken) -> NavigationError {
    NavigationError::new(ErrorCode::TransitionCancelled).context(
        Some(token.to.name.as_str()),
        token.from.as_ref().map(|s| s.name.as_str()),
    )
}

fn ensure_live(token: &TransitionToken) -> Result<(), NavigationError> {
    if token.is_cancelled() {
        debug!(transition_id = %token.id, "Transition token invalidated, dropping step");
        Err(cancelled(token))
    } else {
        Ok(())
    }
}

fn rejection_error(
    code: ErrorCode,
    rejection: GuardRejection,
    to: &State,
    from: Option<&State>,
) -> NavigationError {
    let mut err = match rejection.message {
        Some(message) => NavigationError::with_message(code, message),
        None => NavigationError::new(code),
    };
    err = err.context(Some(to.name.as_str()), from.map(|s| s.name.as_str()));
    err
}

/// Run the full pipeline for one navigation attempt. Redirects restart the
/// loop against the rebuilt target; everything else flows to commit or to a
/// classified error.
pub(crate) fn run(
    router: &Router,
    token: &Arc<TransitionToken>,
    opts: &NavigationOptions,
) -> Result<Arc<State>, NavigationError> {
    let from = token.from.clone();
    let mut to = Arc::clone(&token.to);
    let mut redirects = 0usize;

    'attempt: loop {
        let (to_deactivate, to_activate) =
            transition_path(&to, from.as_deref(), opts.reload || opts.force);
        debug!(
            transition_id = %token.id,
            to = %to.name,
            deactivating = ?to_deactivate,
            activating = ?to_activate,
            "Transition path computed"
        );

        for segment in &to_deactivate {
            ensure_live(token)?;
            let Some(guard) = router.lifecycle().guard(GuardKind::Deactivate, segment) else {
                continue;
            };
            match invoke_guard(&guard, &to, from.as_deref()) {
                Ok(GuardOutcome::Allow) => {}
                Ok(GuardOutcome::Deny) => {
                    info!(transition_id = %token.id, segment = %segment, "Deactivation denied");
                    return Err(NavigationError::new(ErrorCode::CannotDeactivate)
                        .segment(segment)
                        .context(Some(to.name.as_str()), from.as_deref().map(|s| s.name.as_str())));
                }
                Ok(GuardOutcome::Redirect(target)) => {
                    to = follow_redirect(router, token, &target, opts, &mut redirects)?;
                    continue 'attempt;
                }
                Err(rejection) => {
                    return Err(rejection_error(
                        ErrorCode::CannotDeactivate,
                        rejection,
                        &to,
                        from.as_deref(),
                    )
                    .segment(segment));
                }
            }
        }

        for middleware in router.lifecycle().middleware_snapshot() {
            ensure_live(token)?;
            match invoke_guard(&middleware, &to, from.as_deref()) {
                Ok(GuardOutcome::Allow) => {}
                Ok(GuardOutcome::Deny) => {
                    return Err(NavigationError::with_message(
                        ErrorCode::TransitionErr,
                        "middleware denied the transition",
                    )
                    .context(Some(to.name.as_str()), from.as_deref().map(|s| s.name.as_str())));
                }
                Ok(GuardOutcome::Redirect(target)) => {
                    to = follow_redirect(router, token, &target, opts, &mut redirects)?;
                    continue 'attempt;
                }
                Err(rejection) => {
                    return Err(rejection_error(
                        ErrorCode::TransitionErr,
                        rejection,
                        &to,
                        from.as_deref(),
                    ));
                }
            }
        }

        for segment in &to_activate {
            ensure_live(token)?;
            let Some(guard) = router.lifecycle().guard(GuardKind::Activate, segment) else {
                continue;
            };
            match invoke_guard(&guard, &to, from.as_deref()) {
                Ok(GuardOutcome::Allow) => {}
                Ok(GuardOutcome::Deny) => {
                    info!(transition_id = %token.id, segment = %segment, "Activation denied");
                    return Err(NavigationError::new(ErrorCode::CannotActivate)
                        .segment(segment)
                        .context(Some(to.name.as_str()), from.as_deref().map(|s| s.name.as_str())));
                }
                Ok(GuardOutcome::Redirect(target)) => {
                    to = follow_redirect(router, token, &target, opts, &mut redirects)?;
                    continue 'attempt;
                }
                Err(rejection) => {
                    return Err(rejection_error(
                        ErrorCode::CannotActivate,
                        rejection,
                        &to,
                        from.as_deref(),
                    )
                    .segment(segment));
                }
            }
        }

        ensure_live(token)?;
        return router.commit_transition(token, to, opts);
    }
}

fn follow_redirect(
    router: &Router,
    token: &Arc<TransitionToken>,
    target: &RedirectTarget,
    opts: &NavigationOptions,
    redirects: &mut usize,
) -> Result<Arc<State>, NavigationError> {
    *redirects += 1;
    if *redirects > MAX_REDIRECTS {
        warn!(
            transition_id = %token.id,
            target = %target.name,
            max_redirects = MAX_REDIRECTS,
            "Redirect limit exceeded"
        );
        return Err(NavigationError::with_message(
            ErrorCode::TransitionErr,
            format!("more than {MAX_REDIRECTS} redirects in one transition"),
        ));
    }
    info!(
        transition_id = %token.id,
        target = %target.name,
        redirect_count = *redirects,
        "Guard redirected the transition"
    );
    router.build_redirect_state(target, opts)
}
