// ABOUTME: Container environment for a deployment.
// ABOUTME: User entries first (secret-substituted), then the fixed identity variables.

use crate::secrets::{Secret, substitute};

pub const ENV_DEPLOYMENT: &str = "EXOFRAME_DEPLOYMENT";
pub const ENV_USER: &str = "EXOFRAME_USER";
pub const ENV_PROJECT: &str = "EXOFRAME_PROJECT";
pub const ENV_HOST: &str = "EXOFRAME_HOST";

/// Identity of the deployment being launched.
#[derive(Debug, Clone, Copy)]
pub struct Identity<'a> {
    pub deployment: &'a str,
    pub username: &'a str,
    pub project: &'a str,
    pub host: Option<&'a str>,
}

/// `KEY=value` entries in launch order.
pub fn build_env(user_env: &[(String, String)], secrets: &[Secret], id: Identity<'_>) -> Vec<String> {
    let mut env: Vec<String> = substitute(user_env, secrets)
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();

    env.push(format!("{ENV_DEPLOYMENT}={}", id.deployment));
    env.push(format!("{ENV_USER}={}", id.username));
    env.push(format!("{ENV_PROJECT}={}", id.project));
    env.push(format!("{ENV_HOST}={}", id.host.unwrap_or_default()));
    env
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_entries_precede_identity() {
        let secrets = vec![Secret {
            name: "db".to_string(),
            value: "hunter2".to_string(),
        }];
        let user = vec![
            ("Z".to_string(), "1".to_string()),
            ("DB_PASS".to_string(), "@db".to_string()),
        ];
        let env = build_env(
            &user,
            &secrets,
            Identity {
                deployment: "exo-admin-demo-aaaa1111-bbbb",
                username: "admin",
                project: "demo",
                host: Some("demo.example.com"),
            },
        );

        assert_eq!(
            env,
            vec![
                "Z=1",
                "DB_PASS=hunter2",
                "EXOFRAME_DEPLOYMENT=exo-admin-demo-aaaa1111-bbbb",
                "EXOFRAME_USER=admin",
                "EXOFRAME_PROJECT=demo",
                "EXOFRAME_HOST=demo.example.com",
            ]
        );
    }

    #[test]
    fn missing_host_is_empty() {
        let env = build_env(
            &[],
            &[],
            Identity {
                deployment: "d",
                username: "u",
                project: "p",
                host: None,
            },
        );
        assert_eq!(env.last().map(String::as_str), Some("EXOFRAME_HOST="));
    }
}
