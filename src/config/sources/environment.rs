//! Environment source: GEOSERIES__SECTION__KEY overrides, comma-separated lists.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const PREFIX: &str = "GEOSERIES";

/// Keys whose environment values are split on commas
const LIST_KEYS: [&str; 2] = ["subdivisions.codes", "publish.containers"];

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    let mut source = Environment::with_prefix(PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS {
        source = source.with_list_parse_key(key);
    }
    builder.add_source(source)
}
