use crate::config::Config;

/// Resolve the caller identity from the environment.
///
/// Reads `config.actor_env`. Returns `None` if unset or empty, letting callers
/// decide whether to fall back or let the external tool pick.
pub fn resolve_actor(config: &Config) -> Option<String> {
    std::env::var(&config.actor_env)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Auto-generated fallback for contexts that require a holder identity.
pub fn generated_fallback() -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!("agent-{}", &token[..8])
}
