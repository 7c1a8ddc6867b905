use std::net::SocketAddr;

use derive_builder::Builder;

use crate::db::utils::DatabaseSource;

/// Unset builder fields fall back to [`Config::default`].
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into), default)]
pub struct Config {
    pub database: DatabaseSource,
    pub listen: SocketAddr,
    pub log_filter: String,
    pub identity_header: String,
    pub staff_users: Vec<String>,
    pub login_url: String,
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseSource::File("rentdesk.db".into()),
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            log_filter: "info".into(),
            identity_header: "x-remote-user".into(),
            staff_users: Vec::new(),
            login_url: "/accounts/login/".into(),
            page_size: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigBuilderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any variable source. Unset values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigBuilderError> {
        let mut builder = ConfigBuilder::default();
        if let Some(db) = lookup("RENTDESK_DATABASE") {
            builder.database(DatabaseSource::from(db.as_str()));
        }
        if let Some(listen) = lookup("RENTDESK_LISTEN") {
            let addr = listen.parse::<SocketAddr>().map_err(|e| {
                ConfigBuilderError::ValidationError(format!("RENTDESK_LISTEN '{}': {}", listen, e))
            })?;
            builder.listen(addr);
        }
        if let Some(filter) = lookup("RENTDESK_LOG") {
            builder.log_filter(filter);
        }
        if let Some(header) = lookup("RENTDESK_IDENTITY_HEADER") {
            builder.identity_header(header.to_lowercase());
        }
        if let Some(staff) = lookup("RENTDESK_STAFF_USERS") {
            builder.staff_users(
                staff
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            );
        }
        if let Some(url) = lookup("RENTDESK_LOGIN_URL") {
            builder.login_url(url);
        }
        if let Some(size) = lookup("RENTDESK_PAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(n) if n > 0 => {
                    builder.page_size(n);
                }
                _ => {
                    return Err(ConfigBuilderError::ValidationError(format!(
                        "RENTDESK_PAGE_SIZE '{}' is not a positive number",
                        size
                    )))
                }
            }
        }
        builder.build()
    }

    pub fn database_location(&self) -> DatabaseSource {
        self.database.clone()
    }

    pub fn is_staff(&self, username: &str) -> bool {
        self.staff_users.iter().any(|u| u == username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.database_location(),
            DatabaseSource::File("rentdesk.db".into())
        );
    }

    #[test]
    fn reads_every_setting() {
        let config = Config::from_lookup(lookup(&[
            ("RENTDESK_DATABASE", ":memory:"),
            ("RENTDESK_LISTEN", "0.0.0.0:9000"),
            ("RENTDESK_LOG", "debug"),
            ("RENTDESK_IDENTITY_HEADER", "X-Forwarded-User"),
            ("RENTDESK_STAFF_USERS", "admin, manager,,"),
            ("RENTDESK_LOGIN_URL", "/login/"),
            ("RENTDESK_PAGE_SIZE", "5"),
        ]))
        .unwrap();
        assert_eq!(config.database, DatabaseSource::Memory);
        assert_eq!(config.listen.port(), 9000);
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.identity_header, "x-forwarded-user");
        assert_eq!(config.staff_users, vec!["admin", "manager"]);
        assert!(config.is_staff("manager"));
        assert!(!config.is_staff("guest"));
        assert_eq!(config.login_url, "/login/");
        assert_eq!(config.page_size, 5);
    }

    #[test]
    fn builder_defaults_match_default() {
        assert_eq!(ConfigBuilder::default().build().unwrap(), Config::default());
        let config = ConfigBuilder::default().page_size(5usize).build().unwrap();
        assert_eq!(config.page_size, 5);
        assert_eq!(config.login_url, Config::default().login_url);
    }

    #[test]
    fn bad_values_are_rejected() {
        let listen = Config::from_lookup(lookup(&[("RENTDESK_LISTEN", "nowhere")]));
        assert!(matches!(listen, Err(ConfigBuilderError::ValidationError(_))));
        let page = Config::from_lookup(lookup(&[("RENTDESK_PAGE_SIZE", "0")]));
        assert!(matches!(page, Err(ConfigBuilderError::ValidationError(_))));
    }
}
