//! The set of tools a resolver may call.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use super::definition::ToolDefinition;
use super::handler::{MethodInfo, ToolMethod, ToolWrapper};
use crate::error::LlmError;
use crate::provider::ToolSchema;

/// The default name resolver: the method's explicit tool name, if any.
pub fn annotated_name(info: &MethodInfo<'_>) -> Option<String> {
    info.tool_name.map(str::to_string)
}

/// Tools indexed by name.
///
/// Built once, then shared read-only (usually as `Arc<ToolCatalog>`) by any
/// number of concurrent resolutions.
///
/// Registering a name that is already present replaces the earlier tool
/// and logs a warning: the last registration wins.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, Arc<ToolWrapper>>,
}

impl fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prepared wrapper.
    pub fn register(&mut self, wrapper: ToolWrapper) -> &mut Self {
        self.insert(Arc::new(wrapper));
        self
    }

    /// Registers the methods of `receiver` that carry an explicit tool name.
    ///
    /// # Errors
    ///
    /// [`LlmError::Configuration`] if any included method's parameters cannot
    /// be mapped. Nothing is registered in that case.
    pub fn register_receiver<R>(
        &mut self,
        receiver: Arc<R>,
        methods: Vec<ToolMethod<R>>,
    ) -> Result<&mut Self, LlmError>
    where
        R: Send + Sync + 'static,
    {
        self.register_receiver_with(receiver, methods, annotated_name)
    }

    /// Like [`register_receiver`](Self::register_receiver), with a custom
    /// name resolver. Methods for which `resolve` returns `None` are skipped.
    ///
    /// # Errors
    ///
    /// As for [`register_receiver`](Self::register_receiver).
    pub fn register_receiver_with<R, F>(
        &mut self,
        receiver: Arc<R>,
        methods: Vec<ToolMethod<R>>,
        resolve: F,
    ) -> Result<&mut Self, LlmError>
    where
        R: Send + Sync + 'static,
        F: Fn(&MethodInfo<'_>) -> Option<String>,
    {
        let wrappers = build(methods, Some(&receiver), &resolve)?;
        for wrapper in wrappers {
            self.insert(Arc::new(wrapper));
        }
        Ok(self)
    }

    /// Registers the associated functions of `R` that carry an explicit tool
    /// name. Methods that need a receiver instance are skipped.
    ///
    /// # Errors
    ///
    /// As for [`register_receiver`](Self::register_receiver).
    pub fn register_static<R>(
        &mut self,
        methods: Vec<ToolMethod<R>>,
    ) -> Result<&mut Self, LlmError>
    where
        R: Send + Sync + 'static,
    {
        let statics = methods
            .into_iter()
            .filter(|m| {
                let keep = !m.info().needs_receiver;
                if !keep {
                    debug!(
                        method = m.info().method,
                        "skipping instance method in static registration"
                    );
                }
                keep
            })
            .collect();
        let wrappers = build(statics, None, &annotated_name)?;
        for wrapper in wrappers {
            self.insert(Arc::new(wrapper));
        }
        Ok(self)
    }

    fn insert(&mut self, wrapper: Arc<ToolWrapper>) {
        let name = wrapper.name().to_string();
        if self.tools.insert(name.clone(), wrapper).is_some() {
            warn!(tool = %name, "tool registered twice, replacing earlier registration");
        }
    }

    /// The tool named `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<ToolWrapper>> {
        self.tools.get(name)
    }

    /// Returns whether a tool named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Definitions of every tool, ordered by name.
    pub fn definitions(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|w| w.definition()).collect()
    }

    /// Schema export of every tool, ordered by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|w| w.definition().to_schema()).collect()
    }

    /// Number of tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A catalog without the named tools. Wrappers are shared, not copied.
    #[must_use]
    pub fn without<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let exclude: HashSet<&str> = names.into_iter().collect();
        self.filtered(|name| !exclude.contains(name))
    }

    /// A catalog with only the named tools. Wrappers are shared, not copied.
    #[must_use]
    pub fn only<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Self {
        let include: HashSet<&str> = names.into_iter().collect();
        self.filtered(|name| include.contains(name))
    }

    fn filtered(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self {
            tools: self
                .tools
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(name, wrapper)| (name.clone(), Arc::clone(wrapper)))
                .collect(),
        }
    }
}

fn build<R, F>(
    methods: Vec<ToolMethod<R>>,
    receiver: Option<&Arc<R>>,
    resolve: &F,
) -> Result<Vec<ToolWrapper>, LlmError>
where
    R: Send + Sync + 'static,
    F: Fn(&MethodInfo<'_>) -> Option<String>,
{
    methods
        .into_iter()
        .filter_map(|method| resolve(&method.info()).map(|name| (name, method)))
        .map(|(name, method)| method.into_wrapper(name, receiver))
        .collect()
}
