//! Hook callbacks and their registry
//!
//! Callbacks are configured per [`HookEvent`] behind optional tool-name
//! matchers. `initialize` assigns every callback an id (`hook_0`, `hook_1`,
//! ...) in a stable order and advertises the ids to the peer; afterwards the
//! registry is only read, by id, when a `hook_callback` request arrives.

use crate::error::Result;
use claudewire_protocol::{HookEvent, HookMatcherConfig, HookOutput};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Async hook callback
///
/// Receives the event-specific hook input and the tool use id, if any.
pub type HookCallback = Arc<
    dyn Fn(Value, Option<String>) -> Pin<Box<dyn Future<Output = Result<HookOutput>> + Send>>
        + Send
        + Sync,
>;

/// Callbacks that fire for an event, optionally filtered by tool name
#[derive(Clone, Default)]
pub struct HookMatcher {
    /// Tool-name pattern, or `None` to match every invocation
    pub matcher: Option<String>,

    /// Callbacks, invoked by the peer in order
    pub hooks: Vec<HookCallback>,
}

impl fmt::Debug for HookMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMatcher")
            .field("matcher", &self.matcher)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl HookMatcher {
    /// Match every invocation of the event
    pub fn any() -> Self {
        Self::default()
    }

    /// Match tools whose name matches `pattern`
    pub fn for_tool(pattern: impl Into<String>) -> Self {
        Self {
            matcher: Some(pattern.into()),
            hooks: Vec::new(),
        }
    }

    /// Add a callback
    pub fn with_callback<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(Value, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutput>> + Send + 'static,
    {
        let callback: HookCallback = Arc::new(move |input, tool_use_id| {
            Box::pin(callback(input, tool_use_id))
                as Pin<Box<dyn Future<Output = Result<HookOutput>> + Send>>
        });
        self.hooks.push(callback);
        self
    }
}

/// Callback id to callback lookup
#[derive(Default)]
pub(crate) struct HookRegistry {
    callbacks: HashMap<String, HookCallback>,
}

impl HookRegistry {
    /// Assign ids to every configured callback
    ///
    /// Events are visited in declaration order of [`HookEvent`], then
    /// matchers and callbacks in configuration order, so the same
    /// configuration always yields the same ids.
    pub(crate) fn assign(
        hooks: &HashMap<HookEvent, Vec<HookMatcher>>,
    ) -> (Self, BTreeMap<HookEvent, Vec<HookMatcherConfig>>) {
        let ordered: BTreeMap<_, _> = hooks.iter().collect();
        let mut callbacks = HashMap::new();
        let mut advertised = BTreeMap::new();
        let mut next_id = 0usize;

        for (event, matchers) in ordered {
            let configs = matchers
                .iter()
                .map(|matcher| {
                    let hook_callback_ids = matcher
                        .hooks
                        .iter()
                        .map(|callback| {
                            let id = format!("hook_{next_id}");
                            next_id += 1;
                            callbacks.insert(id.clone(), Arc::clone(callback));
                            id
                        })
                        .collect();
                    HookMatcherConfig {
                        matcher: matcher.matcher.clone(),
                        hook_callback_ids,
                    }
                })
                .collect();
            advertised.insert(*event, configs);
        }

        (Self { callbacks }, advertised)
    }

    pub(crate) fn get(&self, callback_id: &str) -> Option<HookCallback> {
        self.callbacks.get(callback_id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> HookMatcher {
        HookMatcher::any().with_callback(|_, _| async { Ok(HookOutput::proceed()) })
    }

    #[test]
    fn test_ids_are_stable_across_events() {
        let mut hooks = HashMap::new();
        hooks.insert(HookEvent::PostToolUse, vec![noop()]);
        hooks.insert(
            HookEvent::PreToolUse,
            vec![
                HookMatcher::for_tool("Bash")
                    .with_callback(|_, _| async { Ok(HookOutput::block("no shell")) })
                    .with_callback(|_, _| async { Ok(HookOutput::default()) }),
                noop(),
            ],
        );

        let (registry, advertised) = HookRegistry::assign(&hooks);
        assert_eq!(registry.len(), 4);

        let pre = &advertised[&HookEvent::PreToolUse];
        assert_eq!(pre[0].matcher.as_deref(), Some("Bash"));
        assert_eq!(pre[0].hook_callback_ids, vec!["hook_0", "hook_1"]);
        assert_eq!(pre[1].hook_callback_ids, vec!["hook_2"]);
        assert_eq!(
            advertised[&HookEvent::PostToolUse][0].hook_callback_ids,
            vec!["hook_3"]
        );
    }

    #[tokio::test]
    async fn test_lookup_invokes_callback() {
        let mut hooks = HashMap::new();
        hooks.insert(
            HookEvent::PreToolUse,
            vec![HookMatcher::any().with_callback(|input, tool_use_id| async move {
                Ok(HookOutput::block(format!(
                    "{} via {}",
                    input["tool_name"].as_str().unwrap_or_default(),
                    tool_use_id.unwrap_or_default()
                )))
            })],
        );
        let (registry, _) = HookRegistry::assign(&hooks);

        let callback = registry.get("hook_0").unwrap();
        let output = callback(serde_json::json!({"tool_name": "Bash"}), Some("toolu_1".into()))
            .await
            .unwrap();
        assert_eq!(output.reason.as_deref(), Some("Bash via toolu_1"));
        assert!(registry.get("hook_1").is_none());
    }
}
