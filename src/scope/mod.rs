//! Configuration scopes
//!
//! Sections, the registries that order them, the merge engine, server
//! identities and the per-request walk that produces an `EffectiveConfig`.

mod dir_config;
mod options;
mod registry;
mod section;
mod server;
pub mod walk;

pub use dir_config::{
    merge, merge_all, DirConfig, EffectiveConfig, HostnameLookups, MergeConfig, ModuleConfig,
    ModuleConfigs, OptionsSetting, RequireLine, Satisfy, ServerSignature,
};
pub use options::{Options, Override};
pub use registry::SectionRegistry;
pub use section::{normalize_path, Pattern, ScopeSection, SectionKind};
pub use server::{ServerBuilder, ServerIdentity, StartupConfig};
