//! Admission controller: tier/quota checks and image resolution ahead of
//! session creation.

use sessionctl_images::{BuildHook, BuildSpec, ImageCache};
use sessionctl_types::{RequestContext, SessionCtlError, SessionCtlResult, SessionRequest, SessionStore, TierLimits};

/// What admission decided about the image a newly-admitted session should
/// run, computed ahead of `Backend.CreateSession`.
#[derive(Debug, Clone)]
pub struct AdmissionDecision {
    pub resolved_image: String,
    pub setup_hash: Option<String>,
}

/// Run the admission checks in order: concurrent-session quota, daily
/// quota, base-image validation, then image resolution. Principal/tier
/// resolution happens earlier, in the caller's context construction, see
/// `sessionctl-api`'s auth middleware.
pub async fn admit(
    ctx: &RequestContext,
    request: &SessionRequest,
    store: &dyn SessionStore,
    image_cache: &dyn ImageCache,
    build_hook: Option<&dyn BuildHook>,
) -> SessionCtlResult<AdmissionDecision> {
    let tier = if ctx.tier.is_empty() { "anonymous" } else { ctx.tier.as_str() };
    let limits = sessionctl_policy::limits(tier);

    if !TierLimits::is_unlimited(limits.concurrent_sessions) {
        let active = store.count_active(&ctx.account_id).await?;
        if active >= limits.concurrent_sessions {
            return Err(SessionCtlError::quota_exceeded("concurrent session limit reached for this tier"));
        }
    }

    if !TierLimits::is_unlimited(limits.sessions_per_day) {
        let today = store.count_today(&ctx.account_id).await?;
        if today >= limits.sessions_per_day {
            return Err(SessionCtlError::quota_exceeded("daily session limit reached for this tier"));
        }
    }

    if request.base_image.is_empty() {
        return Err(SessionCtlError::bad_request("base image must not be empty"));
    }

    let wants_custom_build = !request.setup.is_empty() || !request.files.is_empty();
    if wants_custom_build && build_hook.is_none() {
        return Err(SessionCtlError::bad_request("setup commands or file seeds were given but no build hook is configured"));
    }

    if !wants_custom_build {
        return Ok(AdmissionDecision { resolved_image: request.base_image.clone(), setup_hash: None });
    }

    let setup_hash = sessionctl_images::hash_spec(&request.base_image, &request.setup, &request.files);

    let spec = BuildSpec {
        base_image: request.base_image.clone(),
        setup: request.setup.clone(),
        files: request.files.clone(),
    };
    let hook = build_hook.expect("checked above: wants_custom_build implies build_hook.is_some()");
    let resolved_image = sessionctl_images::resolve(ctx, &spec, image_cache, hook).await?;

    Ok(AdmissionDecision { resolved_image, setup_hash: Some(setup_hash) })
}
