fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use hashpub_deploy::{StandardIndex, StrippedArchive};
    use hashpub_protocol::{Archive, Building, CacheManifest, ProgressMessage, Storing, naming};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- Progress messages ---

    #[test]
    fn fixture_building() {
        let starting: ProgressMessage = roundtrip_test("building_starting.json");
        assert_eq!(starting, ProgressMessage::from(Building::starting()));
        let message: ProgressMessage = roundtrip_test("building_message.json");
        assert_eq!(message, ProgressMessage::from(Building::message("Loader")));
        let done: ProgressMessage = roundtrip_test("building_done.json");
        assert_eq!(done, ProgressMessage::from(Building::done()));
    }

    #[test]
    fn fixture_storing() {
        let starting: ProgressMessage = roundtrip_test("storing_starting.json");
        assert_eq!(starting, ProgressMessage::from(Storing::starting()));
        let snapshot: ProgressMessage = roundtrip_test("storing_snapshot.json");
        assert_eq!(snapshot, ProgressMessage::from(Storing::snapshot(3, 1, 2)));
        let done: ProgressMessage = roundtrip_test("storing_done.json");
        assert_eq!(done, ProgressMessage::from(Storing::done()));
    }

    #[test]
    fn fixture_archive_index() {
        let msg: ProgressMessage = roundtrip_test("archive_index.json");
        let ProgressMessage::ArchiveIndex(index) = msg else {
            panic!("expected archiveIndex, got {msg:?}");
        };
        assert_eq!(index.len(), 2);
        assert!(index.get("errors").unwrap().unchanged);
        assert!(!index.get("example.com/lib").unwrap().unchanged);
    }

    #[test]
    fn fixture_archive() {
        let msg: ProgressMessage = roundtrip_test("archive.json");
        let ProgressMessage::Archive(archive) = msg else {
            panic!("expected archive, got {msg:?}");
        };
        assert!(!archive.standard);
        // Clients fetch both halves by these names.
        assert_eq!(
            naming::script_name(&archive.path, &archive.hash),
            format!("example.com/lib.{}.js", archive.hash)
        );
        assert_eq!(
            naming::stripped_archive_name(&archive.path, &archive.hash),
            format!("example.com/lib.{}.ax", archive.hash)
        );

        let prelude: ProgressMessage = roundtrip_test("archive_prelude.json");
        assert_eq!(
            prelude,
            ProgressMessage::from(Archive {
                path: "prelude".into(),
                hash: "prelude-min".into(),
                standard: true,
            })
        );
    }

    #[test]
    fn fixture_unknown_message_type_rejected() {
        let result: Result<ProgressMessage, _> =
            serde_json::from_str(r#"{"type":"compiling","payload":{}}"#);
        assert!(result.is_err());
    }

    // --- Client inputs ---

    #[test]
    fn fixture_cache_manifest() {
        let cache: CacheManifest = roundtrip_test("cache_manifest.json");
        assert_eq!(cache["prelude"], "prelude-min");
    }

    #[test]
    fn fixture_stripped_archive() {
        let archive: StrippedArchive = roundtrip_test("stripped_archive.json");
        assert_eq!(archive.export_data, b"Hello");
        assert!(archive.declarations[1].blocking);
    }

    #[test]
    fn fixture_standard_index() {
        let standard: StandardIndex = roundtrip_test("standard_index.json");
        assert_eq!(standard["runtime"].get(true), "r-min");
    }
}
