//! Layering of TOML config fragments over a resolved [`Config`].

use toml::{Table, Value};

use crate::config::Config;
use crate::error::ConfigError;

/// Overlay a TOML `fragment` onto `base`.
///
/// Keys set in the fragment win. Tables combine key by key; arrays such
/// as `scenario.steps` replace the base array whole.
pub fn merge_configs(base: &Config, fragment: &str) -> Result<Config, ConfigError> {
    let mut layered = to_table(base)?;
    let overlay: Table = toml::from_str(fragment).map_err(parse_error)?;
    overlay_table(&mut layered, overlay);
    Value::Table(layered).try_into().map_err(parse_error)
}

/// Serialized through text so that unset optional fields drop out.
fn to_table(config: &Config) -> Result<Table, ConfigError> {
    let text = toml::to_string(config).map_err(parse_error)?;
    toml::from_str(&text).map_err(parse_error)
}

fn overlay_table(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match value {
            Value::Table(patch) => match base.get_mut(&key) {
                Some(Value::Table(inner)) => overlay_table(inner, patch),
                _ => {
                    base.insert(key, Value::Table(patch));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn parse_error(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse(e.to_string())
}
