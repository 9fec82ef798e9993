// ABOUTME: Naming rules for images and deployment containers.
// ABOUTME: Instance names carry two random suffix segments that normalisation strips.

use std::fmt;

/// Prefix shared by every image and container this engine creates.
pub const NAME_PREFIX: &str = "exo";

/// Lowercase, hyphen-separated form of an arbitrary user or project string.
///
/// Any run of characters outside `[a-z0-9]` collapses into a single hyphen and
/// camelCase boundaries become hyphens, so `"MyApp_v2"` becomes `"my-app-v2"`.
pub fn kebab_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_lower = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        }
    }

    out.trim_end_matches('-').to_string()
}

/// Image tag built for a user's project: `exo-<user>-<name>:latest`.
pub fn image_tag(username: &str, project_name: &str) -> String {
    format!(
        "{}-{}-{}:latest",
        NAME_PREFIX,
        kebab_case(username),
        kebab_case(project_name)
    )
}

/// Container name of one deployment instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentName(String);

impl DeploymentName {
    /// Fresh instance name: `exo-<user>-<base>-<8 hex>-<4 hex>`.
    ///
    /// `base` is usually the project name, or the image name for image deployments.
    pub fn generate(username: &str, base: &str) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}-{}-{}-{}-{}",
            NAME_PREFIX,
            kebab_case(username),
            kebab_case(base),
            &id[..8],
            &id[8..12]
        ))
    }

    pub fn from_existing(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with its instance suffix removed.
    pub fn logical(&self) -> &str {
        strip_instance_suffix(&self.0)
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop the last two hyphen-delimited segments of a container name.
///
/// Two instances of the same logical deployment normalise to the same value.
/// Names with fewer than three segments are returned unchanged.
pub fn strip_instance_suffix(name: &str) -> &str {
    let name = name.trim_start_matches('/');
    let mut cut = name.len();
    for _ in 0..2 {
        match name[..cut].rfind('-') {
            Some(pos) if pos > 0 => cut = pos,
            _ => return name,
        }
    }
    &name[..cut]
}
