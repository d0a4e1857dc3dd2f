/// Scope of an introspection run.
#[derive(Debug, Clone, Default)]
pub struct IntrospectOptions {
    /// Sharded-schema prefix; recorded as `prefix*` in the map when a
    /// single sampled schema stands in for every shard.
    pub schema_prefix: String,
    /// Schemas to introspect; empty means `public`.
    pub schemas: Vec<String>,
    /// `schema.table` names to leave out of the map.
    pub exclude_tables: Vec<String>,
}
