//! Print the classic GeoIP summary fields for a few addresses
//!
//! ```text
//! cargo run --example geoip_summary -- GeoLite2-City.mmdb 81.2.69.142 2a02:ff40::1
//! RUST_LOG=mmdb_reader=trace cargo run --example geoip_summary -- GeoLite2-City.mmdb 8.8.8.8
//! ```

use anyhow::{bail, Context, Result};
use mmdb_reader::{Database, FieldPath};
use serde_json::{json, Map, Value};
use tracing_subscriber::EnvFilter;

/// Output key and the record path it comes from
const FIELDS: [(&str, &[&str]); 7] = [
    ("city", &["city", "names", "en"]),
    ("country", &["country", "names", "en"]),
    ("country_code", &["country", "iso_code"]),
    ("continent", &["continent", "names", "en"]),
    ("latitude", &["location", "latitude"]),
    ("longitude", &["location", "longitude"]),
    ("postal_code", &["postal", "code"]),
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: geoip_summary <database.mmdb> <address>...");
    };
    let addresses: Vec<String> = args.collect();

    let db = Database::open(&path).with_context(|| format!("opening {}", path))?;
    let metadata = db.metadata()?;
    eprintln!(
        "{} ({}, {} nodes, built {})",
        metadata.database_type, metadata.ip_version, metadata.node_count, metadata.build_epoch
    );

    let paths: Vec<FieldPath> = FIELDS
        .iter()
        .map(|(_, path)| path.iter().copied().collect())
        .collect();

    for address in &addresses {
        let summary = match db.lookup_fields(address, &paths)? {
            Some(fields) => {
                let mut out = Map::new();
                out.insert("prefix_len".to_string(), json!(fields.prefix_len()));
                for ((key, _), path) in FIELDS.iter().zip(&paths) {
                    let value = fields.get(path).map_or(Value::Null, |v| v.to_json());
                    out.insert(key.to_string(), value);
                }
                Value::Object(out)
            }
            None => Value::Null,
        };
        println!("{} {}", address, summary);
    }

    db.close();
    Ok(())
}
