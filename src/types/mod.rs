// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod deployment_name;
mod id;
mod network_alias;

pub use deployment_name::{DeploymentName, NAME_PREFIX, image_tag, kebab_case, strip_instance_suffix};
pub use id::{ContainerId, Id, NetworkId};
pub use network_alias::{NetworkAlias, NetworkAliasError};
