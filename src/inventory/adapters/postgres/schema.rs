//! Diesel schema for inventory persistence.

diesel::table! {
    /// Remote node sources.
    subscriptions (id) {
        /// Serial identifier.
        id -> Int8,
        /// Subscription link.
        link -> Text,
        /// Last fetch status.
        status -> Text,
        /// Provider metadata.
        info -> Text,
        /// Optional unique tag.
        #[max_length = 64]
        tag -> Nullable<Varchar>,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Proxy nodes.
    nodes (id) {
        /// Serial identifier.
        id -> Int8,
        /// Canonical link.
        link -> Text,
        /// Derived display name.
        name -> Text,
        /// Endpoint address.
        address -> Text,
        /// Protocol scheme.
        #[max_length = 32]
        protocol -> Varchar,
        /// Optional unique tag.
        #[max_length = 64]
        tag -> Nullable<Varchar>,
        /// Owning subscription.
        subscription_id -> Nullable<Int8>,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Singleton record of the applied configuration.
    system (id) {
        /// Serial identifier.
        id -> Int8,
        /// Always `true`; carries the singleton unique constraint.
        singleton -> Bool,
        /// Whether a configuration is applied.
        running -> Bool,
        /// Applied config version.
        running_config_version -> Int8,
        /// Applied DNS version.
        running_dns_version -> Int8,
        /// Applied routing version.
        running_routing_version -> Int8,
        /// Sum of active group versions at apply time.
        running_group_version_sum -> Int8,
        /// Comma-separated active group identifiers.
        running_group_ids -> Text,
        /// Apply timestamp.
        running_at -> Nullable<Timestamptz>,
        /// Applied config record.
        running_config_id -> Nullable<Int8>,
        /// Applied DNS record.
        running_dns_id -> Nullable<Int8>,
        /// Applied routing record.
        running_routing_id -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Node groups.
    groups (id) {
        /// Serial identifier.
        id -> Int8,
        /// Group name.
        name -> Text,
        /// Selection policy.
        policy -> Text,
        /// Change counter.
        version -> Int8,
        /// Set while the group is in the active set.
        system_id -> Nullable<Int8>,
    }
}

diesel::table! {
    /// Group membership edges.
    group_nodes (group_id, node_id) {
        /// Member group.
        group_id -> Int8,
        /// Member node.
        node_id -> Int8,
    }
}

diesel::joinable!(nodes -> subscriptions (subscription_id));
diesel::joinable!(groups -> system (system_id));
diesel::joinable!(group_nodes -> groups (group_id));
diesel::joinable!(group_nodes -> nodes (node_id));

diesel::allow_tables_to_appear_in_same_query!(subscriptions, nodes, system, groups, group_nodes);
