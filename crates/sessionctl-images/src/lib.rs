//! Content-addressed image resolver.
//!
//! `resolve` is the only entry point most callers need; `hash` and
//! `ImageCache`/`BuildHook` are exposed separately so the orchestrator can
//! compute and persist the setup hash ahead of a build.

mod cache;
mod hash;

pub use cache::{InMemoryImageCache, ImageCache};
pub use hash::hash_spec;

use sessionctl_types::{FileSeed, RequestContext, SessionCtlError, SessionCtlResult};
use async_trait::async_trait;

/// The minimal build request the resolver hashes and, on a miss, hands to
/// the build hook.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub base_image: String,
    pub setup: Vec<String>,
    pub files: Vec<FileSeed>,
}

/// The opaque build step. The resolver never inspects what this does, it
/// only needs the registry tag it produces.
#[async_trait]
pub trait BuildHook: Send + Sync {
    async fn build(&self, ctx: &RequestContext, spec: &BuildSpec) -> SessionCtlResult<String>;
}

fn first_token_is_from(line: &str) -> bool {
    line.trim()
        .split_whitespace()
        .next()
        .is_some_and(|tok| tok.eq_ignore_ascii_case("from"))
}

/// Validate and resolve `spec` to a final image reference, consulting
/// `cache` and, on a miss, `hook`.
pub async fn resolve(
    ctx: &RequestContext,
    spec: &BuildSpec,
    cache: &dyn ImageCache,
    hook: &dyn BuildHook,
) -> SessionCtlResult<String> {
    if spec.setup.is_empty() && spec.files.is_empty() {
        return Ok(spec.base_image.clone());
    }

    if spec.base_image.is_empty() {
        return Err(SessionCtlError::bad_request("base image must not be empty when setup is non-empty"));
    }

    if let Some(bad) = spec.setup.iter().find(|line| first_token_is_from(line)) {
        return Err(SessionCtlError::bad_request(format!(
            "setup line looks like a FROM directive: {bad:?}"
        )));
    }

    let digest = hash_spec(&spec.base_image, &spec.setup, &spec.files);

    if let Some(entry) = cache.get(&digest).await? {
        // Refresh is out-of-band: a failure here must not fail the resolve.
        if let Err(err) = cache.touch(&digest).await {
            tracing::warn!(hash = %digest, error = %err, "image cache touch failed");
        }
        return Ok(entry.registry_tag);
    }

    let tag = hook.build(ctx, spec).await?;

    if let Err(err) = cache.put(&digest, &spec.base_image, &tag).await {
        tracing::warn!(hash = %digest, error = %err, "image cache write failed, build succeeded anyway");
    }

    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionctl_types::RequestContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ctx() -> RequestContext {
        RequestContext::new("p1", "a1", "free")
    }

    #[tokio::test]
    async fn fast_path_returns_base_image_unchanged() {
        let spec = BuildSpec {
            base_image: "python:3.11".into(),
            setup: vec![],
            files: vec![],
        };
        let cache = InMemoryImageCache::new();
        struct NeverCalled;
        #[async_trait]
        impl BuildHook for NeverCalled {
            async fn build(&self, _ctx: &RequestContext, _spec: &BuildSpec) -> SessionCtlResult<String> {
                panic!("build hook must not be invoked on the fast path");
            }
        }
        let out = resolve(&ctx(), &spec, &cache, &NeverCalled).await.unwrap();
        assert_eq!(out, "python:3.11");
    }

    #[tokio::test]
    async fn empty_base_image_with_setup_is_rejected() {
        let spec = BuildSpec {
            base_image: "".into(),
            setup: vec!["RUN echo hi".into()],
            files: vec![],
        };
        let cache = InMemoryImageCache::new();
        struct Unused;
        #[async_trait]
        impl BuildHook for Unused {
            async fn build(&self, _ctx: &RequestContext, _spec: &BuildSpec) -> SessionCtlResult<String> {
                unreachable!()
            }
        }
        let err = resolve(&ctx(), &spec, &cache, &Unused).await.unwrap_err();
        assert!(matches!(err, SessionCtlError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn from_injection_is_rejected_case_insensitively() {
        let cache = InMemoryImageCache::new();
        struct Unused;
        #[async_trait]
        impl BuildHook for Unused {
            async fn build(&self, _ctx: &RequestContext, _spec: &BuildSpec) -> SessionCtlResult<String> {
                unreachable!()
            }
        }
        for line in ["FROM alpine", "from alpine", "  From  alpine"] {
            let spec = BuildSpec {
                base_image: "python:3.11".into(),
                setup: vec![line.into()],
                files: vec![],
            };
            let err = resolve(&ctx(), &spec, &cache, &Unused).await.unwrap_err();
            assert!(matches!(err, SessionCtlError::BadRequest { .. }), "line {line:?} should fail");
        }
    }

    #[tokio::test]
    async fn run_line_passes() {
        let spec = BuildSpec {
            base_image: "python:3.11".into(),
            setup: vec!["RUN echo from-work".into()],
            files: vec![],
        };
        let cache = InMemoryImageCache::new();
        struct Tagger;
        #[async_trait]
        impl BuildHook for Tagger {
            async fn build(&self, _ctx: &RequestContext, _spec: &BuildSpec) -> SessionCtlResult<String> {
                Ok("registry/tag:1".into())
            }
        }
        let out = resolve(&ctx(), &spec, &cache, &Tagger).await.unwrap();
        assert_eq!(out, "registry/tag:1");
    }

    #[tokio::test]
    async fn cache_hit_skips_build_hook_and_refreshes_last_used() {
        let spec = BuildSpec {
            base_image: "python:3.11".into(),
            setup: vec!["RUN one".into()],
            files: vec![],
        };
        let cache = InMemoryImageCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        struct Counting(Arc<AtomicUsize>);
        #[async_trait]
        impl BuildHook for Counting {
            async fn build(&self, _ctx: &RequestContext, _spec: &BuildSpec) -> SessionCtlResult<String> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok("registry/tag:1".into())
            }
        }
        let hook = Counting(calls.clone());

        let first = resolve(&ctx(), &spec, &cache, &hook).await.unwrap();
        let digest = hash_spec(&spec.base_image, &spec.setup, &spec.files);
        let created_at = cache.get(&digest).await.unwrap().unwrap().created_at;

        let second = resolve(&ctx(), &spec, &cache, &hook).await.unwrap();
        let entry = cache.get(&digest).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(entry.created_at, created_at);
    }

    #[tokio::test]
    async fn hash_is_stable_under_file_reorder_but_not_setup_reorder() {
        let files_a = vec![
            FileSeed { path: "b.txt".into(), content: b"2".to_vec() },
            FileSeed { path: "a.txt".into(), content: b"1".to_vec() },
        ];
        let files_b = vec![
            FileSeed { path: "a.txt".into(), content: b"1".to_vec() },
            FileSeed { path: "b.txt".into(), content: b"2".to_vec() },
        ];
        let setup = vec!["RUN one".to_string(), "RUN two".to_string()];
        let setup_reordered = vec!["RUN two".to_string(), "RUN one".to_string()];

        let h1 = hash_spec("python:3.11", &setup, &files_a);
        let h2 = hash_spec("python:3.11", &setup, &files_b);
        assert_eq!(h1, h2, "file order must not affect the hash");

        let h3 = hash_spec("python:3.11", &setup_reordered, &files_a);
        assert_ne!(h1, h3, "setup order must affect the hash");
    }
}
