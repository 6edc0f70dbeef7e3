//! Domain validation tests.

use crate::config::AttributeUpdatePolicy;
use crate::cursor::PageRequest;
use crate::inventory::{
    domain::{
        GroupId, GroupName, InventoryDomainError, NewNode, Node, NodeAttributes, NodeId,
        SubscriptionId, Tag, encode_group_ids, parse_group_ids,
    },
    ports::NodeScope,
    services::ServiceSettings,
};
use chrono::Utc;
use rstest::rstest;

#[rstest]
#[case("hk-01")]
#[case("_internal")]
#[case("Tokyo.premium_2")]
fn valid_tags_are_accepted(#[case] raw: &str) {
    let tag = Tag::new(raw).expect("tag should be valid");
    assert_eq!(tag.as_str(), raw);
}

#[rstest]
#[case("")]
#[case("1starts-with-digit")]
#[case("has space")]
#[case("emoji🙂")]
#[case(&"x".repeat(Tag::MAX_LEN + 1))]
fn invalid_tags_are_rejected(#[case] raw: &str) {
    assert!(matches!(
        Tag::new(raw),
        Err(InventoryDomainError::InvalidTag { .. })
    ));
}

#[rstest]
#[case(0)]
#[case(-4)]
fn non_positive_identifiers_are_rejected(#[case] value: i64) {
    assert!(matches!(
        NodeId::new(value),
        Err(InventoryDomainError::InvalidIdentifier { kind: "node", .. })
    ));
    assert!(SubscriptionId::new(value).is_err());
}

#[test]
fn group_names_are_trimmed_and_must_not_be_blank() {
    let name = GroupName::new("  proxy  ").expect("name should be valid");
    assert_eq!(name.as_str(), "proxy");
    assert_eq!(GroupName::new("   "), Err(InventoryDomainError::EmptyGroupName));
}

#[test]
fn group_id_lists_survive_persistence_and_skip_junk() {
    let ids = vec![GroupId::from_persisted(3), GroupId::from_persisted(11)];
    assert_eq!(encode_group_ids(&ids), "3,11");
    assert_eq!(parse_group_ids("3, 11"), ids);
    assert_eq!(parse_group_ids(""), Vec::<GroupId>::new());
    assert_eq!(parse_group_ids("3,,-1,abc,11"), ids);
}

fn node(subscription_id: Option<SubscriptionId>) -> Node {
    Node::from_new(
        NodeId::from_persisted(1),
        NewNode {
            attributes: NodeAttributes {
                link: "trojan://pw@a.example:443#a".to_owned(),
                name: "a".to_owned(),
                address: "a.example:443".to_owned(),
                protocol: "trojan".to_owned(),
            },
            tag: None,
            subscription_id,
            updated_at: Utc::now(),
        },
    )
}

#[test]
fn node_scopes_select_by_subscription() {
    let owner = SubscriptionId::from_persisted(7);
    let owned = node(Some(owner));
    let manual = node(None);

    assert!(NodeScope::from_filter(None).contains(&owned));
    assert!(NodeScope::from_filter(None).contains(&manual));
    assert!(NodeScope::Manual.contains(&manual));
    assert!(!NodeScope::Manual.contains(&owned));
    assert!(NodeScope::from_filter(Some(owner)).contains(&owned));
    assert!(!NodeScope::Subscription(SubscriptionId::from_persisted(8)).contains(&owned));
}

#[test]
fn page_size_defaults_and_is_capped() {
    let settings = ServiceSettings {
        default_page_size: 20,
        max_page_size: 50,
        attribute_update_policy: AttributeUpdatePolicy::Ignore,
    };
    assert_eq!(settings.page_size(&PageRequest::first_page()), Ok(20));
    assert_eq!(settings.page_size(&PageRequest::first_page().with_first(50)), Ok(50));
    assert_eq!(
        settings.page_size(&PageRequest::first_page().with_first(51)),
        Err(InventoryDomainError::PageSizeTooLarge {
            requested: 51,
            max: 50
        })
    );
    assert_eq!(
        settings.page_size(&PageRequest::first_page().with_first(0)),
        Err(InventoryDomainError::EmptyPage)
    );
}
