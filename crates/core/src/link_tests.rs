// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    same_singleton      = { Link::singleton("svc"), Link::singleton("svc"), true },
    other_service       = { Link::singleton("svc"), Link::singleton("other"), false },
    same_name           = { Link::named("svc", "p0"), Link::named("svc", "p0"), true },
    other_name          = { Link::named("svc", "p0"), Link::named("svc", "p1"), false },
    same_range          = { Link::numbered("svc", 0, 9), Link::numbered("svc", 0, 9), true },
    other_low           = { Link::numbered("svc", 0, 9), Link::numbered("svc", 1, 9), false },
    other_high          = { Link::numbered("svc", 0, 9), Link::numbered("svc", 0, 8), false },
    named_vs_singleton  = { Link::named("svc", "p0"), Link::singleton("svc"), false },
    named_vs_numbered   = { Link::named("svc", "0"), Link::numbered("svc", 0, 0), false },
)]
fn link_equality(a: Link, b: Link, expected: bool) {
    assert_eq!(a == b, expected);
    assert_eq!(same_target(Some(&a), Some(&b)), expected);
}

#[test]
fn absent_links_compare_equal() {
    assert!(same_target(None, None));
}

#[test]
fn absent_never_equals_present() {
    let link = Link::singleton("svc");
    assert!(!same_target(None, Some(&link)));
    assert!(!same_target(Some(&link), None));
}

#[test]
fn distinct_links_dedups_and_excludes_self() {
    let me = Link::named("svc", "me");
    let a = Link::named("svc", "a");
    let b = Link::named("svc", "b");
    let links = vec![a.clone(), me.clone(), b.clone(), a.clone(), me.clone()];

    assert_eq!(distinct_links(links, &me), vec![a, b]);
}

#[test]
fn distinct_links_of_only_self_is_empty() {
    let me = Link::singleton("svc");
    assert!(distinct_links(vec![me.clone(), me.clone()], &me).is_empty());
}

#[test]
fn link_display() {
    assert_eq!(Link::named("fabric:/app", "p0").to_string(), "fabric:/app#named:p0");
    assert_eq!(Link::numbered("fabric:/app", 0, 9).to_string(), "fabric:/app#numbered:0..9");
    assert_eq!(Link::singleton("fabric:/app").to_string(), "fabric:/app#singleton");
}

#[test]
fn link_serializes_with_kind_tag() {
    let json = serde_json::to_value(Link::named("svc", "p0")).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "service": "svc", "partition": { "kind": "named", "name": "p0" } })
    );
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_link() -> impl Strategy<Value = Link> {
        let partition = prop_oneof![
            Just(PartitionAddress::Singleton),
            "[a-c]{1,2}".prop_map(|name| PartitionAddress::Named { name }),
            (0i64..3, 0i64..3).prop_map(|(low, high)| PartitionAddress::Numbered { low, high }),
        ];
        ("svc-[ab]", partition).prop_map(|(service, partition)| Link { service, partition })
    }

    proptest! {
        #[test]
        fn equality_is_reflexive(a in arb_link()) {
            prop_assert!(same_target(Some(&a), Some(&a.clone())));
        }

        #[test]
        fn equality_is_symmetric(a in arb_link(), b in arb_link()) {
            prop_assert_eq!(same_target(Some(&a), Some(&b)), same_target(Some(&b), Some(&a)));
        }

        #[test]
        fn equal_links_agree_on_kind(a in arb_link(), b in arb_link()) {
            if a == b {
                prop_assert_eq!(a.partition.kind(), b.partition.kind());
                prop_assert_eq!(&a.service, &b.service);
            }
        }

        #[test]
        fn distinct_links_has_no_duplicates(
            links in proptest::collection::vec(arb_link(), 0..12),
            me in arb_link(),
        ) {
            let out = distinct_links(links.clone(), &me);
            prop_assert!(!out.contains(&me));
            for (i, a) in out.iter().enumerate() {
                prop_assert!(!out[i + 1..].contains(a));
            }
            for link in links.iter().filter(|l| **l != me) {
                prop_assert!(out.contains(link));
            }
        }
    }
}
