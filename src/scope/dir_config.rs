//! Per-scope configuration fragments and the merge engine
//!
//! Every section, override file and server default carries a `DirConfig`.
//! Unset fields are `None` so that a merge can tell "inherit" apart from an
//! explicit value. `merge` is pure: it never aliases its inputs.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::options::{Options, Override};
use super::section::ScopeSection;
use crate::http::method::{MethodMask, MethodNumber};

/// `Options` state of one fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionsSetting {
    pub value: Options,
    pub add: Options,
    pub remove: Options,
    /// A bare keyword was used, so the value replaces everything inherited
    pub explicit: bool,
}

impl OptionsSetting {
    /// Fully-set options, as carried by server defaults
    pub const fn with_value(value: Options) -> Self {
        Self {
            value,
            add: Options::NONE,
            remove: Options::NONE,
            explicit: true,
        }
    }

    /// First bare keyword of an `Options` line resets the value
    pub fn reset(&mut self) {
        self.value = Options::NONE;
        self.explicit = true;
    }

    pub fn set(&mut self, opt: Options) {
        self.value |= opt;
    }

    pub fn enable(&mut self, opt: Options) {
        self.add |= opt;
        self.remove = self.remove.without(opt);
        self.value |= opt;
    }

    pub fn disable(&mut self, opt: Options) {
        self.remove |= opt;
        self.add = self.add.without(opt);
        self.value = self.value.without(opt);
    }

    pub fn merge(base: &Self, overlay: &Self) -> Self {
        if overlay.explicit {
            return *overlay;
        }
        let add = base.add.without(overlay.remove) | overlay.add;
        let remove = base.remove.without(overlay.add) | overlay.remove;
        let mut value = base.value.without(remove) | add;
        // Turning Includes on below an IncludesNOEXEC parent grants full Includes
        if base.value.contains(Options::INCLUDES_NOEXEC) && overlay.value.contains(Options::INCLUDES)
        {
            value = value.without(Options::INCLUDES_NOEXEC) | Options::INCLUDES;
        }
        Self {
            value,
            add,
            remove,
            explicit: base.explicit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satisfy {
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerSignature {
    Off,
    On,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostnameLookups {
    Off,
    On,
    Double,
}

/// One `Require` line with the methods of its enclosing `<Limit>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequireLine {
    pub methods: MethodMask,
    pub requirement: String,
}

/// Configuration owned by a module, stored opaquely per scope
pub trait ModuleConfig: Any + Send + Sync + fmt::Debug {
    fn merge_dyn(&self, overlay: &dyn ModuleConfig) -> Arc<dyn ModuleConfig>;
    fn as_any(&self) -> &dyn Any;
}

/// Typed merge for a module's config; `ModuleConfig` follows from it
pub trait MergeConfig: Clone + Send + Sync + fmt::Debug + 'static {
    #[must_use]
    fn merge(&self, overlay: &Self) -> Self;
}

impl<T: MergeConfig> ModuleConfig for T {
    fn merge_dyn(&self, overlay: &dyn ModuleConfig) -> Arc<dyn ModuleConfig> {
        match overlay.as_any().downcast_ref::<T>() {
            Some(overlay) => Arc::new(self.merge(overlay)),
            None => Arc::new(self.clone()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Module configs keyed by module name
#[derive(Debug, Clone, Default)]
pub struct ModuleConfigs(BTreeMap<&'static str, Arc<dyn ModuleConfig>>);

impl ModuleConfigs {
    pub fn get<T: ModuleConfig>(&self, module: &str) -> Option<&T> {
        self.0.get(module)?.as_any().downcast_ref::<T>()
    }

    /// Edit the module's config in place, starting from its default
    pub fn update<T>(&mut self, module: &'static str, edit: impl FnOnce(&mut T))
    where
        T: ModuleConfig + Clone + Default,
    {
        let mut value = self.get::<T>(module).cloned().unwrap_or_default();
        edit(&mut value);
        self.0.insert(module, Arc::new(value));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn merge(&self, overlay: &Self) -> Self {
        let mut merged = self.0.clone();
        for (name, over) in &overlay.0 {
            let value = match self.0.get(name) {
                Some(base) => base.merge_dyn(over.as_ref()),
                None => Arc::clone(over),
            };
            merged.insert(name, value);
        }
        Self(merged)
    }
}

/// Configuration fragment for one scope
#[derive(Debug, Clone, Default)]
pub struct DirConfig {
    pub options: OptionsSetting,
    pub allow_override: Option<Override>,
    pub default_type: Option<String>,
    pub auth_type: Option<String>,
    pub auth_name: Option<String>,
    pub satisfy: Option<Satisfy>,
    pub requires: Vec<RequireLine>,
    pub server_signature: Option<ServerSignature>,
    pub hostname_lookups: Option<HostnameLookups>,
    pub content_md5: Option<bool>,
    pub use_canonical_name: Option<bool>,
    pub error_documents: BTreeMap<u16, String>,
    /// `<Files>` sections registered in this scope
    pub files: Vec<Arc<ScopeSection>>,
    pub modules: ModuleConfigs,
}

impl DirConfig {
    /// Defaults of a server before any directive: all options, all overrides
    pub fn server_defaults() -> Self {
        Self {
            options: OptionsSetting::with_value(Options::ALL),
            allow_override: Some(Override::ALL),
            ..Self::default()
        }
    }
}

/// Merge `overlay` on top of `base`
pub fn merge(base: &DirConfig, overlay: &DirConfig) -> DirConfig {
    let mut error_documents = base.error_documents.clone();
    error_documents.extend(
        overlay
            .error_documents
            .iter()
            .map(|(code, doc)| (*code, doc.clone())),
    );

    DirConfig {
        options: OptionsSetting::merge(&base.options, &overlay.options),
        allow_override: overlay.allow_override.or(base.allow_override),
        default_type: pick(&base.default_type, &overlay.default_type),
        auth_type: pick(&base.auth_type, &overlay.auth_type),
        auth_name: pick(&base.auth_name, &overlay.auth_name),
        satisfy: overlay.satisfy.or(base.satisfy),
        requires: base
            .requires
            .iter()
            .chain(&overlay.requires)
            .cloned()
            .collect(),
        server_signature: overlay.server_signature.or(base.server_signature),
        hostname_lookups: overlay.hostname_lookups.or(base.hostname_lookups),
        content_md5: overlay.content_md5.or(base.content_md5),
        use_canonical_name: overlay.use_canonical_name.or(base.use_canonical_name),
        error_documents,
        files: base.files.iter().chain(&overlay.files).cloned().collect(),
        modules: base.modules.merge(&overlay.modules),
    }
}

fn pick(base: &Option<String>, overlay: &Option<String>) -> Option<String> {
    overlay.as_ref().or(base.as_ref()).cloned()
}

/// Left fold of `merge` over scopes ordered broadest first
pub fn merge_all<'a>(base: &DirConfig, stack: impl IntoIterator<Item = &'a DirConfig>) -> DirConfig {
    stack
        .into_iter()
        .fold(base.clone(), |acc, overlay| merge(&acc, overlay))
}

/// Fully merged configuration for one request
#[derive(Debug, Clone, Default)]
pub struct EffectiveConfig {
    dir: DirConfig,
}

impl EffectiveConfig {
    pub const fn new(dir: DirConfig) -> Self {
        Self { dir }
    }

    pub const fn dir(&self) -> &DirConfig {
        &self.dir
    }

    pub const fn options(&self) -> Options {
        self.dir.options.value
    }

    pub fn allow_override(&self) -> Override {
        self.dir.allow_override.unwrap_or(Override::NONE)
    }

    pub fn default_type(&self) -> &str {
        self.dir.default_type.as_deref().unwrap_or("text/plain")
    }

    pub fn auth_type(&self) -> Option<&str> {
        self.dir.auth_type.as_deref()
    }

    pub fn auth_name(&self) -> Option<&str> {
        self.dir.auth_name.as_deref()
    }

    pub fn satisfy(&self) -> Satisfy {
        self.dir.satisfy.unwrap_or(Satisfy::All)
    }

    pub fn requires(&self) -> &[RequireLine] {
        &self.dir.requires
    }

    /// Whether any `Require` line applies to this method
    pub fn requires_auth(&self, method: MethodNumber) -> bool {
        self.dir.requires.iter().any(|r| r.methods.covers(method))
    }

    pub fn server_signature(&self) -> ServerSignature {
        self.dir.server_signature.unwrap_or(ServerSignature::Off)
    }

    pub fn hostname_lookups(&self) -> HostnameLookups {
        self.dir.hostname_lookups.unwrap_or(HostnameLookups::Off)
    }

    pub fn content_md5(&self) -> bool {
        self.dir.content_md5.unwrap_or(false)
    }

    pub fn use_canonical_name(&self) -> bool {
        self.dir.use_canonical_name.unwrap_or(true)
    }

    pub fn error_document(&self, code: u16) -> Option<&str> {
        self.dir.error_documents.get(&code).map(String::as_str)
    }

    pub fn files(&self) -> &[Arc<ScopeSection>] {
        &self.dir.files
    }

    pub fn module<T: ModuleConfig>(&self, module: &str) -> Option<&T> {
        self.dir.modules.get::<T>(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(f: impl FnOnce(&mut OptionsSetting)) -> DirConfig {
        let mut dir = DirConfig::default();
        f(&mut dir.options);
        dir
    }

    #[test]
    fn test_explicit_options_replace() {
        let base = DirConfig::server_defaults();
        let overlay = opts(|o| {
            o.reset();
            o.set(Options::INDEXES);
        });
        let merged = merge(&base, &overlay);
        assert_eq!(merged.options.value, Options::INDEXES);
    }

    #[test]
    fn test_plus_minus_options_fold() {
        let base = DirConfig::server_defaults();
        let minus = opts(|o| o.disable(Options::INDEXES));
        let plus = opts(|o| o.enable(Options::MULTI_VIEWS));
        let merged = merge_all(&base, [&minus, &plus]);
        assert!(!merged.options.value.contains(Options::INDEXES));
        assert!(merged.options.value.contains(Options::MULTI_VIEWS));
        assert!(merged.options.value.contains(Options::EXEC_CGI));
    }

    #[test]
    fn test_add_remove_disjoint_after_every_step() {
        let steps: Vec<DirConfig> = vec![
            opts(|o| o.enable(Options::INDEXES)),
            opts(|o| o.disable(Options::INDEXES)),
            opts(|o| {
                o.enable(Options::EXEC_CGI);
                o.disable(Options::EXEC_CGI);
                o.enable(Options::SYM_LINKS);
            }),
            opts(|o| o.enable(Options::EXEC_CGI)),
            opts(|o| o.disable(Options::SYM_LINKS)),
        ];
        let mut acc = DirConfig::default();
        for step in &steps {
            assert!(!step.options.add.intersects(step.options.remove));
            acc = merge(&acc, step);
            assert!(!acc.options.add.intersects(acc.options.remove));
        }
    }

    #[test]
    fn test_includes_upgrades_noexec_parent() {
        let parent = opts(|o| {
            o.reset();
            o.set(Options::from_keyword("IncludesNOEXEC").unwrap());
        });
        let child = opts(|o| o.enable(Options::INCLUDES));
        let merged = merge(&parent, &child);
        assert!(merged.options.value.contains(Options::INCLUDES));
        assert!(!merged.options.value.contains(Options::INCLUDES_NOEXEC));
    }

    #[test]
    fn test_scalars_inherit_unless_set() {
        let mut base = DirConfig::server_defaults();
        base.default_type = Some("text/html".to_string());
        base.auth_name = Some("realm".to_string());
        let mut overlay = DirConfig::default();
        overlay.auth_name = Some("inner".to_string());
        overlay.content_md5 = Some(true);

        let merged = EffectiveConfig::new(merge(&base, &overlay));
        assert_eq!(merged.default_type(), "text/html");
        assert_eq!(merged.auth_name(), Some("inner"));
        assert!(merged.content_md5());
        assert!(merged.use_canonical_name());
    }

    #[test]
    fn test_override_only_replaced_when_set() {
        let base = DirConfig::server_defaults();
        let mut none = DirConfig::default();
        none.allow_override = Some(Override::NONE);
        let unset = DirConfig::default();
        let merged = merge_all(&base, [&none, &unset]);
        assert!(merged.allow_override.unwrap().is_none());
    }

    #[test]
    fn test_requires_append() {
        let mut a = DirConfig::default();
        a.requires.push(RequireLine {
            methods: MethodMask::ALL,
            requirement: "valid-user".to_string(),
        });
        let mut b = DirConfig::default();
        b.requires.push(RequireLine {
            methods: MethodMask::NONE.with(MethodNumber::Post),
            requirement: "user admin".to_string(),
        });
        let merged = merge(&a, &b);
        assert_eq!(merged.requires.len(), 2);
        assert_eq!(merged.requires[0].requirement, "valid-user");
    }

    #[test]
    fn test_merge_is_associative() {
        let mut a = DirConfig::server_defaults();
        a.default_type = Some("text/plain".to_string());
        a.error_documents.insert(404, "/missing.html".to_string());
        let mut b = opts(|o| o.disable(Options::INDEXES));
        b.auth_type = Some("Basic".to_string());
        b.error_documents.insert(500, "\"oops".to_string());
        let mut c = opts(|o| o.enable(Options::INDEXES));
        c.default_type = Some("application/json".to_string());
        c.error_documents.insert(404, "/gone.html".to_string());

        let folded = merge_all(&DirConfig::default(), [&a, &b, &c]);
        let stepped = merge(&merge(&a, &b), &c);
        assert_eq!(folded.options, stepped.options);
        assert_eq!(folded.default_type, stepped.default_type);
        assert_eq!(folded.auth_type, stepped.auth_type);
        assert_eq!(folded.error_documents, stepped.error_documents);
        assert_eq!(folded.allow_override, stepped.allow_override);
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Names(Vec<String>);

    impl MergeConfig for Names {
        fn merge(&self, overlay: &Self) -> Self {
            if overlay.0.is_empty() {
                self.clone()
            } else {
                overlay.clone()
            }
        }
    }

    #[test]
    fn test_module_configs_merge() {
        let mut base = DirConfig::default();
        base.modules
            .update::<Names>("m", |n| n.0.push("a".to_string()));
        let mut overlay = DirConfig::default();
        overlay
            .modules
            .update::<Names>("m", |n| n.0.push("b".to_string()));
        let merged = EffectiveConfig::new(merge(&base, &overlay));
        assert_eq!(merged.module::<Names>("m"), Some(&Names(vec!["b".to_string()])));
        assert_eq!(merged.module::<Names>("other"), None);
    }
}
