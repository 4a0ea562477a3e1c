use proptest::prelude::*;
use procexec::route::route_for;
use procexec::{FileMode, StreamName, StreamSpec};

const TAGS: [&str; 5] = ["close", "null", "inherit", "capture", "controller"];

fn stream_strategy() -> impl Strategy<Value = StreamName> {
    prop_oneof![
        Just(StreamName::In),
        Just(StreamName::Out),
        Just(StreamName::Err),
    ]
}

fn mode_strategy() -> impl Strategy<Value = (&'static str, FileMode)> {
    prop_oneof![
        Just(("r", FileMode::Read)),
        Just(("w", FileMode::Write)),
        Just(("a", FileMode::Append)),
        Just(("r+", FileMode::ReadWrite)),
        Just(("w+", FileMode::ReadWriteTruncate)),
        Just(("a+", FileMode::ReadAppend)),
    ]
}

// Paths without a colon and not starting with a digit, so they are never
// read as descriptors or prefixed forms.
fn path_strategy() -> impl Strategy<Value = String> {
    "/[a-z_./-]{1,24}"
}

proptest! {
    #[test]
    fn non_negative_integers_are_descriptors(stream in stream_strategy(), fd in 0i32..=i32::MAX) {
        let spec = StreamSpec::parse(stream, &fd.to_string()).unwrap();
        prop_assert!(matches!(spec, StreamSpec::Fd(n) if n == fd));
    }

    #[test]
    fn negative_integers_are_rejected(stream in stream_strategy(), fd in i32::MIN..0) {
        prop_assert!(StreamSpec::parse(stream, &fd.to_string()).is_err());
    }

    #[test]
    fn bare_paths_open_as_files(stream in stream_strategy(), path in path_strategy()) {
        prop_assume!(!TAGS.contains(&path.as_str()));
        let spec = StreamSpec::parse(stream, &path).unwrap();
        prop_assert!(matches!(spec, StreamSpec::Path(ref p) if p.to_str() == Some(path.as_str())));
    }

    #[test]
    fn file_form_carries_mode_and_perm(
        stream in stream_strategy(),
        path in path_strategy(),
        (mode_str, mode) in mode_strategy(),
        perm in 0u32..=0o777,
    ) {
        let literal = format!("file:{path}:{mode_str}:{perm:o}");
        let spec = StreamSpec::parse(stream, &literal).unwrap();
        let matched = matches!(
            spec,
            StreamSpec::File { path: ref p, mode: Some(m), perm: Some(q) }
                if p.to_str() == Some(path.as_str()) && m == mode && q == perm
        );
        prop_assert!(matched, "parsed {literal:?} as {spec:?}");
    }

    #[test]
    fn string_form_keeps_data_verbatim(data in ".*") {
        let spec = StreamSpec::parse(StreamName::In, &format!("string:{data}")).unwrap();
        prop_assert!(matches!(spec, StreamSpec::String(ref bytes) if bytes == data.as_bytes()));
    }

    #[test]
    fn capture_never_routes_input(stream in stream_strategy()) {
        let routed = route_for(stream, StreamSpec::Capture);
        prop_assert_eq!(routed.is_ok(), stream != StreamName::In);
    }

    #[test]
    fn child_form_only_merges_err_into_out(stream in stream_strategy(), target in stream_strategy()) {
        let routed = route_for(stream, StreamSpec::Child(target));
        let valid = stream == StreamName::Err && target == StreamName::Out;
        prop_assert_eq!(routed.is_ok(), valid);
    }

    #[test]
    fn string_source_only_routes_input(stream in stream_strategy(), data in any::<Vec<u8>>()) {
        let routed = route_for(stream, StreamSpec::String(data));
        prop_assert_eq!(routed.is_ok(), stream == StreamName::In);
    }
}
