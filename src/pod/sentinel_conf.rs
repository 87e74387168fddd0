//! sentinel.conf parsing
//!
//! Only the `sentinel <directive> <pod> ...` lines matter here; global
//! directives such as `port`, `dir` or `sentinel myid` are skipped.
//! Sentinel rewrites its file in place, so per-pod directives can show up
//! before the `monitor` line that declares the pod.

use crate::common::{Error, Result};
use crate::pod::{Address, PodConfig};
use std::collections::BTreeMap;

/// Directives that take no pod name
const GLOBAL_SENTINEL_DIRECTIVES: &[&str] = &[
    "myid",
    "current-epoch",
    "deny-scripts-reconfig",
    "resolve-hostnames",
    "announce-hostnames",
    "announce-ip",
    "announce-port",
    "sentinel-user",
    "sentinel-pass",
];

#[derive(Default)]
struct PodBuilder {
    master: Option<(Address, u32)>,
    first_line: usize,
    authpass: String,
    slaves: Vec<Address>,
    sentinels: Vec<Address>,
    settings: BTreeMap<String, String>,
}

/// Parse the contents of a sentinel.conf into a pod-name keyed registry map
pub fn parse_sentinel_config(content: &str) -> Result<BTreeMap<String, PodConfig>> {
    let mut builders: BTreeMap<String, PodBuilder> = BTreeMap::new();

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if !tokens[0].eq_ignore_ascii_case("sentinel") || tokens.len() < 2 {
            continue;
        }
        let directive = tokens[1].to_ascii_lowercase();
        if GLOBAL_SENTINEL_DIRECTIVES.contains(&directive.as_str()) {
            continue;
        }

        let err = |reason: &str| Error::SentinelConfig {
            line: line_no,
            reason: format!("{} ({})", reason, line),
        };

        let name = *tokens.get(2).ok_or_else(|| err("missing pod name"))?;
        let args = &tokens[3..];
        let builder = builders.entry(name.to_string()).or_insert_with(|| PodBuilder {
            first_line: line_no,
            ..Default::default()
        });

        match directive.as_str() {
            "monitor" => {
                if builder.master.is_some() {
                    return Err(err("pod monitored twice"));
                }
                let [ip, port, quorum] = args else {
                    return Err(err("expected: monitor <name> <ip> <port> <quorum>"));
                };
                let master = Address::from_parts(ip, port).map_err(|e| err(&e.to_string()))?;
                let quorum = quorum.parse().map_err(|_| err("invalid quorum"))?;
                builder.master = Some((master, quorum));
            }
            "auth-pass" => {
                let [pass] = args else {
                    return Err(err("expected: auth-pass <name> <password>"));
                };
                builder.authpass = pass.to_string();
            }
            "known-slave" | "known-replica" => {
                let [ip, port] = args else {
                    return Err(err("expected: known-slave <name> <ip> <port>"));
                };
                let addr = Address::from_parts(ip, port).map_err(|e| err(&e.to_string()))?;
                if !builder.slaves.contains(&addr) {
                    builder.slaves.push(addr);
                }
            }
            "known-sentinel" => {
                if args.len() < 2 || args.len() > 3 {
                    return Err(err("expected: known-sentinel <name> <ip> <port> [runid]"));
                }
                let addr =
                    Address::from_parts(args[0], args[1]).map_err(|e| err(&e.to_string()))?;
                if !builder.sentinels.contains(&addr) {
                    builder.sentinels.push(addr);
                }
            }
            other => {
                builder.settings.insert(other.to_string(), args.join(" "));
            }
        }
    }

    builders
        .into_iter()
        .map(|(name, b)| {
            let (master, quorum) = b.master.ok_or_else(|| Error::SentinelConfig {
                line: b.first_line,
                reason: format!("pod '{}' has directives but no monitor line", name),
            })?;
            let pod = PodConfig {
                name: name.clone(),
                master,
                quorum,
                authpass: b.authpass,
                known_slaves: b.slaves,
                known_sentinels: b.sentinels,
                settings: b.settings,
            };
            Ok((name, pod))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
port 26379
dir "/tmp"
sentinel myid 4f8a0b2a9c1d3e5f7a9b1c3d5e7f9a1b3c5d7e9f

# pod1
sentinel monitor pod1 10.0.0.1 6379 2
sentinel auth-pass pod1 s3cret
sentinel down-after-milliseconds pod1 5000
sentinel config-epoch pod1 3
sentinel known-slave pod1 10.0.0.2 6379
sentinel known-slave pod1 10.0.0.3 6379
sentinel known-sentinel pod1 10.0.1.1 26379 0a1b2c3d
sentinel known-sentinel pod1 10.0.1.2 26379 4e5f6a7b

sentinel known-replica pod2 10.0.0.5 6380
sentinel monitor pod2 10.0.0.4 6380 1
sentinel current-epoch 3
"#;

    #[test]
    fn test_parse_sample() {
        let pods = parse_sentinel_config(SAMPLE).unwrap();
        assert_eq!(pods.len(), 2);

        let pod1 = &pods["pod1"];
        assert_eq!(pod1.master, Address::new("10.0.0.1", 6379));
        assert_eq!(pod1.quorum, 2);
        assert_eq!(pod1.authpass, "s3cret");
        assert_eq!(
            pod1.known_slaves,
            vec![Address::new("10.0.0.2", 6379), Address::new("10.0.0.3", 6379)]
        );
        assert_eq!(pod1.known_sentinels.len(), 2);
        assert_eq!(pod1.settings["down-after-milliseconds"], "5000");
        assert_eq!(pod1.settings["config-epoch"], "3");

        let pod2 = &pods["pod2"];
        assert_eq!(pod2.master, Address::new("10.0.0.4", 6380));
        assert_eq!(pod2.known_slaves, vec![Address::new("10.0.0.5", 6380)]);
        assert!(pod2.authpass.is_empty());
    }

    #[test]
    fn test_directive_without_monitor() {
        let err = parse_sentinel_config("sentinel auth-pass ghost pw\n").unwrap_err();
        match err {
            Error::SentinelConfig { line, reason } => {
                assert_eq!(line, 1);
                assert!(reason.contains("ghost"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_lines_report_line_number() {
        let err = parse_sentinel_config("\nsentinel monitor pod1 10.0.0.1 nope 2\n").unwrap_err();
        assert!(matches!(err, Error::SentinelConfig { line: 2, .. }));

        let err = parse_sentinel_config("sentinel monitor pod1 10.0.0.1 6379\n").unwrap_err();
        assert!(matches!(err, Error::SentinelConfig { line: 1, .. }));

        let dup = "sentinel monitor a 10.0.0.1 6379 2\nsentinel monitor a 10.0.0.2 6379 2\n";
        assert!(parse_sentinel_config(dup).is_err());
    }

    #[test]
    fn test_empty_config() {
        assert!(parse_sentinel_config("port 26379\n").unwrap().is_empty());
    }
}
