//! Text codec for shared-log node values
//!
//! Each shared-log entry is stored as a text blob at a sequentially
//! assigned coordination-service node. The format is line-oriented with a
//! fixed field order:
//!
//! ```text
//! format version: 1
//! MERGE_PARTS
//! source_replica=replica-1
//! new_part_name=20230101_1_2_1
//! parts=2
//! 20230101_1_1_0
//! 20230101_2_2_0
//! create_time=1700000000
//! quorum=0
//! ```
//!
//! Only persisted fields are written - execution bookkeeping is
//! process-local and resets on restart. Parsing is tolerant where the
//! format may evolve: the version marker may be absent (the first line is
//! then the kind token) and unknown `key=value` lines are ignored, so an
//! older replica can skip fields a newer one writes.

use crate::entry::{EntryAction, EntryKind, LogEntry};
use std::fmt;
use tessera_core::{Error, Result, Timestamp};

/// Format version written by [`LogEntry::serialize`]
pub const FORMAT_VERSION: u32 = 1;

const FORMAT_PREFIX: &str = "format version:";

/// Identity of the coordination-service node an entry was read from
///
/// The version stamp changes whenever the node's value changes; the queue
/// uses it for change detection (re-fetch and re-parse on mismatch). Only
/// the node name is stored inside the parsed record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeStat {
    /// Node name assigned by the coordination service
    pub name: String,
    /// Version stamp retrieved alongside the node's value
    pub version: u64,
}

impl NodeStat {
    /// Create a node identity
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        NodeStat {
            name: name.into(),
            version,
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::MalformedEntry(format!("invalid {} value '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(Error::MalformedEntry(format!(
            "invalid {} flag '{}' (expected 0 or 1)",
            key, other
        ))),
    }
}

impl LogEntry {
    /// Serialize the persisted fields to node text
    ///
    /// Deterministic: fixed field order, one logical field per line.
    /// `znode_name` is not written - it is the node's own position, not
    /// part of its value.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} {}\n", FORMAT_PREFIX, FORMAT_VERSION));
        out.push_str(self.kind().as_str());
        out.push('\n');
        out.push_str(&format!("source_replica={}\n", self.source_replica));
        out.push_str(&format!("new_part_name={}\n", self.new_part_name()));
        match &self.action {
            EntryAction::GetPart { .. } => {}
            EntryAction::MergeParts { source_parts, .. } => {
                out.push_str(&format!("parts={}\n", source_parts.len()));
                for part in source_parts {
                    out.push_str(part);
                    out.push('\n');
                }
            }
            EntryAction::DropRange { detach, .. } => {
                out.push_str(&format!("detach={}\n", u8::from(*detach)));
            }
            EntryAction::AttachPart {
                source_part_name,
                from_unreplicated,
                ..
            } => {
                out.push_str(&format!("source_part_name={}\n", source_part_name));
                out.push_str(&format!(
                    "attach_unreplicated={}\n",
                    u8::from(*from_unreplicated)
                ));
            }
        }
        out.push_str(&format!("create_time={}\n", self.create_time.as_secs()));
        out.push_str(&format!("quorum={}\n", self.quorum));
        out
    }

    /// Parse node text into a record
    ///
    /// `stat` supplies the node name (stored as `znode_name`) and the
    /// version stamp the queue uses for change detection. Fails with
    /// [`Error::MalformedEntry`] on an unknown kind token, a missing
    /// required field, a malformed number or flag, or a combination the
    /// record invariants reject.
    pub fn parse(text: &str, stat: &NodeStat) -> Result<LogEntry> {
        let mut lines = text.lines();

        let first = lines
            .next()
            .ok_or_else(|| Error::MalformedEntry("empty log entry text".to_string()))?;
        let kind_token = if let Some(version) = first.strip_prefix(FORMAT_PREFIX) {
            // Any version parses; fields this version does not know are
            // skipped below.
            parse_number("format version", version.trim())?;
            lines
                .next()
                .ok_or_else(|| Error::MalformedEntry("missing entry type line".to_string()))?
        } else {
            first
        };
        let kind: EntryKind = kind_token.trim().parse()?;

        let mut source_replica = String::new();
        let mut new_part_name = String::new();
        let mut source_parts: Vec<String> = Vec::new();
        let mut detach = false;
        let mut source_part_name = String::new();
        let mut attach_unreplicated = false;
        let mut create_time = Timestamp::EPOCH;
        let mut quorum = 0;

        while let Some(line) = lines.next() {
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                // Not a key=value line and not part of a counted list:
                // an unknown trailing field from a newer format.
                continue;
            };
            match key {
                "source_replica" => source_replica = value.to_string(),
                "new_part_name" => new_part_name = value.to_string(),
                "parts" => {
                    let count = parse_number("parts", value)?;
                    for _ in 0..count {
                        let part = lines.next().ok_or_else(|| {
                            Error::MalformedEntry(format!(
                                "part list truncated: expected {} parts",
                                count
                            ))
                        })?;
                        source_parts.push(part.to_string());
                    }
                }
                "detach" => detach = parse_flag("detach", value)?,
                "source_part_name" => source_part_name = value.to_string(),
                "attach_unreplicated" => {
                    attach_unreplicated = parse_flag("attach_unreplicated", value)?
                }
                "create_time" => create_time = Timestamp::from_secs(parse_number(key, value)?),
                "quorum" => quorum = parse_number(key, value)?,
                _ => {} // unknown field from a newer format
            }
        }

        let action = match kind {
            EntryKind::GetPart => EntryAction::GetPart {
                part_name: new_part_name,
            },
            EntryKind::MergeParts => EntryAction::MergeParts {
                source_parts,
                merged_part: new_part_name,
            },
            EntryKind::DropRange => EntryAction::DropRange {
                range_name: new_part_name,
                detach,
            },
            EntryKind::AttachPart => EntryAction::AttachPart {
                source_part_name,
                attached_part: new_part_name,
                from_unreplicated: attach_unreplicated,
            },
        };

        let entry = LogEntry {
            znode_name: stat.name.clone(),
            source_replica,
            action,
            create_time,
            quorum,
        };
        entry.validate()?;
        Ok(entry)
    }
}

impl fmt::Display for LogEntry {
    /// The serialized node text; intended for diagnostics and logging
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn stat(name: &str) -> NodeStat {
        NodeStat::new(name, 0)
    }

    #[test]
    fn test_serialize_get_part() {
        let entry = LogEntry {
            znode_name: "log-0000000042".to_string(),
            source_replica: "r1".to_string(),
            action: EntryAction::GetPart {
                part_name: "20230101_1_1_0".to_string(),
            },
            create_time: Timestamp::from_secs(100),
            quorum: 0,
        };
        assert_eq!(
            entry.serialize(),
            "format version: 1\n\
             GET_PART\n\
             source_replica=r1\n\
             new_part_name=20230101_1_1_0\n\
             create_time=100\n\
             quorum=0\n"
        );
    }

    #[test]
    fn test_parse_without_format_marker() {
        let text = "GET_PART\nsource_replica=r1\nnew_part_name=20230101_1_1_0\ncreate_time=100\nquorum=0";
        let entry = LogEntry::parse(text, &stat("log-0000000001")).unwrap();
        assert_eq!(entry.kind(), EntryKind::GetPart);
        assert_eq!(entry.source_replica, "r1");
        assert_eq!(entry.new_part_name(), "20230101_1_1_0");
        assert_eq!(entry.create_time, Timestamp::from_secs(100));
        assert_eq!(entry.quorum, 0);
        assert_eq!(entry.znode_name, "log-0000000001");
    }

    #[test]
    fn test_round_trip_merge() {
        let entry = LogEntry {
            znode_name: "log-0000000007".to_string(),
            source_replica: "replica-2".to_string(),
            action: EntryAction::MergeParts {
                source_parts: vec![
                    "20230101_1_1_0".to_string(),
                    "20230101_2_2_0".to_string(),
                ],
                merged_part: "20230101_1_2_1".to_string(),
            },
            create_time: Timestamp::from_secs(1_700_000_000),
            quorum: 0,
        };
        let parsed = LogEntry::parse(&entry.serialize(), &stat("log-0000000007")).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_round_trip_drop_range_detach() {
        let entry = LogEntry {
            znode_name: "log-0000000008".to_string(),
            source_replica: "replica-1".to_string(),
            action: EntryAction::DropRange {
                range_name: "20230101_0_100_999".to_string(),
                detach: true,
            },
            create_time: Timestamp::from_secs(200),
            quorum: 0,
        };
        let parsed = LogEntry::parse(&entry.serialize(), &stat("log-0000000008")).unwrap();
        assert_eq!(parsed, entry);
        assert!(matches!(
            parsed.action,
            EntryAction::DropRange { detach: true, .. }
        ));
    }

    #[test]
    fn test_round_trip_attach_unreplicated() {
        let entry = LogEntry {
            znode_name: "log-0000000009".to_string(),
            source_replica: String::new(),
            action: EntryAction::AttachPart {
                source_part_name: "20221231_5_5_0".to_string(),
                attached_part: "20230101_3_3_0".to_string(),
                from_unreplicated: true,
            },
            create_time: Timestamp::from_secs(300),
            quorum: 0,
        };
        let parsed = LogEntry::parse(&entry.serialize(), &stat("log-0000000009")).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let text = "format version: 2\n\
                    GET_PART\n\
                    source_replica=r1\n\
                    new_part_name=20230101_1_1_0\n\
                    replace_with_rollup=0\n\
                    create_time=100\n\
                    quorum=0\n";
        let entry = LogEntry::parse(text, &stat("log")).unwrap();
        assert_eq!(entry.new_part_name(), "20230101_1_1_0");
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let err = LogEntry::parse("TRUNCATE\nnew_part_name=p\n", &stat("log")).unwrap_err();
        assert!(matches!(err, Error::MalformedEntry(msg) if msg.contains("unknown log entry type")));
    }

    #[test]
    fn test_parse_rejects_empty_text() {
        assert!(LogEntry::parse("", &stat("log")).is_err());
    }

    #[test]
    fn test_parse_rejects_truncated_part_list() {
        let text = "MERGE_PARTS\n\
                    source_replica=r1\n\
                    new_part_name=20230101_1_2_1\n\
                    parts=3\n\
                    20230101_1_1_0\n";
        // parts=3 consumes the remaining lines and runs out
        let err = LogEntry::parse(text, &stat("log")).unwrap_err();
        assert!(matches!(err, Error::MalformedEntry(msg) if msg.contains("truncated")));
    }

    #[test]
    fn test_parse_rejects_merge_without_parts() {
        let text = "MERGE_PARTS\n\
                    source_replica=r1\n\
                    new_part_name=20230101_1_2_1\n\
                    create_time=100\n\
                    quorum=0\n";
        assert!(LogEntry::parse(text, &stat("log")).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_new_part_name() {
        let text = "GET_PART\nsource_replica=r1\ncreate_time=100\n";
        assert!(LogEntry::parse(text, &stat("log")).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_flag() {
        let text = "DROP_RANGE\nnew_part_name=20230101_0_9_999\ndetach=yes\n";
        let err = LogEntry::parse(text, &stat("log")).unwrap_err();
        assert!(matches!(err, Error::MalformedEntry(msg) if msg.contains("detach")));
    }

    #[test]
    fn test_parse_rejects_bad_number() {
        let text = "GET_PART\nnew_part_name=p\nquorum=many\n";
        assert!(LogEntry::parse(text, &stat("log")).is_err());
    }

    #[test]
    fn test_parse_quorum_get_part() {
        let text = "GET_PART\nsource_replica=r1\nnew_part_name=20230101_1_1_0\nquorum=3\n";
        let entry = LogEntry::parse(text, &stat("log")).unwrap();
        assert_eq!(entry.quorum, 3);
    }

    #[test]
    fn test_display_matches_serialize() {
        let entry = LogEntry {
            znode_name: String::new(),
            source_replica: "r1".to_string(),
            action: EntryAction::GetPart {
                part_name: "20230101_1_1_0".to_string(),
            },
            create_time: Timestamp::from_secs(100),
            quorum: 1,
        };
        assert_eq!(entry.to_string(), entry.serialize());
    }

    // ------------------------------------------------------------------
    // Property: parse(serialize(r), id) reproduces every persisted field
    // ------------------------------------------------------------------

    fn part_name_strategy() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9_.-]{0,23}"
    }

    fn replica_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9-]{0,12}"
    }

    fn action_strategy() -> impl Strategy<Value = EntryAction> {
        prop_oneof![
            part_name_strategy().prop_map(|part_name| EntryAction::GetPart { part_name }),
            (
                proptest::collection::vec(part_name_strategy(), 1..5),
                part_name_strategy()
            )
                .prop_map(|(source_parts, merged_part)| EntryAction::MergeParts {
                    source_parts,
                    merged_part,
                }),
            (part_name_strategy(), any::<bool>()).prop_map(|(range_name, detach)| {
                EntryAction::DropRange { range_name, detach }
            }),
            (part_name_strategy(), part_name_strategy(), any::<bool>()).prop_map(
                |(source_part_name, attached_part, from_unreplicated)| {
                    EntryAction::AttachPart {
                        source_part_name,
                        attached_part,
                        from_unreplicated,
                    }
                }
            ),
        ]
    }

    fn entry_strategy() -> impl Strategy<Value = LogEntry> {
        (action_strategy(), replica_strategy(), any::<u32>(), 0u64..5).prop_map(
            |(action, source_replica, secs, quorum)| {
                let quorum = if action.kind() == EntryKind::GetPart {
                    quorum
                } else {
                    0
                };
                LogEntry {
                    znode_name: "log-0000000001".to_string(),
                    source_replica,
                    action,
                    create_time: Timestamp::from_secs(u64::from(secs)),
                    quorum,
                }
            },
        )
    }

    proptest! {
        #[test]
        fn prop_round_trip(entry in entry_strategy()) {
            let parsed = LogEntry::parse(
                &entry.serialize(),
                &NodeStat::new("log-0000000001", 0),
            ).unwrap();
            prop_assert_eq!(parsed, entry);
        }
    }
}
