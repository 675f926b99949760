// Longest-prefix matching through the search tree
//
// Networks are inserted in both orders (specific before broad and the
// reverse); lookups must always land on the most specific network that
// contains the address.

mod common;

use common::{map, text, TestDbBuilder};
use mmdb_reader::{DataValue, Database, IpVersion, QueryResult, RecordSize};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

fn category(result: &QueryResult) -> Option<&str> {
    result.data()?.get("category")?.as_str()
}

fn record(category: &str) -> DataValue {
    map(vec![
        ("category", text(category)),
        ("threat_level", text("high")),
    ])
}

#[test]
fn test_ip_specific_before_subnet() {
    let mut builder = TestDbBuilder::v4();
    builder.insert_value("192.0.2.1/32", &record("single"));
    builder.insert_value("192.0.2.0/24", &record("subnet"));
    let db = Database::from_bytes(builder.build()).unwrap();

    let result = db.lookup("192.0.2.1").unwrap();
    assert_eq!(category(&result), Some("single"));
    assert_eq!(result.prefix_len(), 32);

    let result = db.lookup("192.0.2.2").unwrap();
    assert_eq!(category(&result), Some("subnet"));
}

#[test]
fn test_ip_subnet_before_specific() {
    let mut builder = TestDbBuilder::v4();
    builder.insert_value("192.0.2.0/24", &record("subnet"));
    builder.insert_value("192.0.2.1/32", &record("single"));
    let db = Database::from_bytes(builder.build()).unwrap();

    assert_eq!(category(&db.lookup("192.0.2.1").unwrap()), Some("single"));
    let other = db.lookup("192.0.2.200").unwrap();
    assert_eq!(category(&other), Some("subnet"));
    assert!(other.prefix_len() >= 24);
}

#[test]
fn test_ip_nested_subnets() {
    let mut builder = TestDbBuilder::v4();
    builder.insert_value("10.0.0.0/8", &record("eight"));
    builder.insert_value("10.1.0.0/16", &record("sixteen"));
    builder.insert_value("10.1.1.0/24", &record("twenty-four"));
    let db = Database::from_bytes(builder.build()).unwrap();

    let cases = [
        ("10.1.1.1", "twenty-four"),
        ("10.1.2.1", "sixteen"),
        ("10.2.0.1", "eight"),
        ("10.255.255.255", "eight"),
    ];
    for (addr, expected) in cases {
        assert_eq!(
            category(&db.lookup(addr).unwrap()),
            Some(expected),
            "lookup {}",
            addr
        );
    }
    assert_eq!(db.lookup("10.1.1.1").unwrap().prefix_len(), 24);
    assert!(!db.lookup("11.0.0.0").unwrap().is_found());
}

#[test]
fn test_ipv6_longest_prefix() {
    let mut builder = TestDbBuilder::new(IpVersion::V6, RecordSize::Bits32);
    builder.insert_value("2001:db8::/32", &record("wide"));
    builder.insert_value("2001:db8:abcd::/48", &record("narrow"));
    let db = Database::from_bytes(builder.build()).unwrap();

    let narrow = db.lookup("2001:db8:abcd::42").unwrap();
    assert_eq!(category(&narrow), Some("narrow"));
    assert_eq!(narrow.prefix_len(), 48);
    assert_eq!(category(&db.lookup("2001:db8:abce::42").unwrap()), Some("wide"));
}

fn contains(network: u32, prefix_len: u8, addr: u32) -> bool {
    let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
    addr & mask == network & mask
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lookup_finds_longest_prefix(
        networks in prop::collection::vec((any::<u32>(), 1u8..=32), 1..24),
        probes in prop::collection::vec(any::<u32>(), 1..32),
    ) {
        // One entry per distinct network, first insertion kept
        let mut entries: BTreeMap<(u32, u8), usize> = BTreeMap::new();
        let mut builder = TestDbBuilder::v4();
        for (i, (addr, prefix_len)) in networks.iter().enumerate() {
            let mask = u32::MAX.checked_shl(32 - *prefix_len as u32).unwrap_or(0);
            let key = (addr & mask, *prefix_len);
            if entries.contains_key(&key) {
                continue;
            }
            entries.insert(key, i);
            let cidr = format!("{}/{}", Ipv4Addr::from(key.0), prefix_len);
            builder.insert_value(&cidr, &DataValue::Uint32(i as u32));
        }
        let db = Database::from_bytes(builder.build()).unwrap();

        // Probe both random addresses and the network addresses themselves
        let targets = probes.iter().copied().chain(entries.keys().map(|(n, _)| *n));
        for addr in targets {
            let expected = entries
                .iter()
                .filter(|((network, len), _)| contains(*network, *len, addr))
                .max_by_key(|((_, len), _)| *len);

            let result = db.lookup_ip(Ipv4Addr::from(addr).into()).unwrap();
            match expected {
                Some(((_, len), id)) => {
                    prop_assert_eq!(result.data(), Some(&DataValue::Uint32(*id as u32)));
                    prop_assert!(result.prefix_len() >= *len);
                    prop_assert!(result.prefix_len() <= 32);
                }
                None => prop_assert!(!result.is_found()),
            }
        }
    }
}
