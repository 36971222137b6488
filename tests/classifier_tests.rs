use std::collections::BTreeMap;

use proptest::prelude::*;

use trellis::{ClassifierError, Tst, UriClassifier, format_resolution};

fn classifier(routes: &[&'static str]) -> UriClassifier<&'static str> {
    let mut uc = UriClassifier::new();
    for route in routes {
        uc.register(route, *route).expect("route should register");
    }
    uc
}

/// `(SCRIPT_NAME, PATH_INFO, handler)` for `uri`.
fn split<'a>(
    uc: &'a UriClassifier<&'static str>,
    uri: &'a str,
) -> Option<(&'a str, &'a str, &'static str)> {
    uc.resolve(uri)
        .map(|hit| (hit.script_name, hit.path_info, *hit.handler))
}

// =========================================================================
// Resolution
// =========================================================================

#[test]
fn longest_registered_prefix_wins() {
    let uc = classifier(&["/blog", "/blog/2024"]);
    assert_eq!(split(&uc, "/blog/2024/post"), Some(("/blog/2024", "/post", "/blog/2024")));
    assert_eq!(split(&uc, "/blog/2023"), Some(("/blog", "/2023", "/blog")));
    assert_eq!(split(&uc, "/blog"), Some(("/blog", "", "/blog")));
    assert_eq!(split(&uc, "/blo"), None);
}

#[test]
fn prefixes_match_bytes_not_segments() {
    let uc = classifier(&["/blog"]);
    assert_eq!(split(&uc, "/blogger"), Some(("/blog", "ger", "/blog")));
}

#[test]
fn root_handler_gets_the_whole_path() {
    let uc = classifier(&["/", "/api"]);
    assert_eq!(split(&uc, "/"), Some(("/", "/", "/")));
    assert_eq!(split(&uc, "/index.html"), Some(("/", "/index.html", "/")));
    assert_eq!(split(&uc, "/api/v1"), Some(("/api", "/v1", "/api")));
    assert_eq!(split(&uc, "/ap"), Some(("/", "/ap", "/")));
}

#[test]
fn nothing_registered_resolves_nothing() {
    let uc: UriClassifier<&'static str> = UriClassifier::new();
    assert!(uc.is_empty());
    assert_eq!(split(&uc, "/"), None);
    assert_eq!(split(&uc, ""), None);
}

#[test]
fn resolution_order_does_not_depend_on_registration_order() {
    let routes = ["/", "/a", "/a/", "/a/b", "/ab", "/a/bc", "/b", "/a?x", "/a~"];
    let probes = ["/", "/a", "/a/", "/a/b", "/a/bcd", "/ab", "/abc", "/a?xy", "/a~~", "/zzz", "/a!"];

    let forward = classifier(&routes);
    let mut reversed_routes = routes;
    reversed_routes.reverse();
    let reversed = classifier(&reversed_routes);

    for probe in probes {
        assert_eq!(split(&forward, probe), split(&reversed, probe), "probe {probe}");
    }
    assert_eq!(split(&forward, "/a/bcd"), Some(("/a/bc", "d", "/a/bc")));
    assert_eq!(split(&forward, "/a!"), Some(("/a", "!", "/a")));
}

#[test]
fn resolution_formats_as_cgi_lines() {
    let uc = classifier(&["/app"]);
    let hit = uc.resolve("/app/x").unwrap();
    assert_eq!(format_resolution(&hit), "SCRIPT_NAME=/app\nPATH_INFO=/x\n");
}

// =========================================================================
// Registration
// =========================================================================

#[test]
fn duplicate_registration_keeps_the_first_handler() {
    let mut uc = classifier(&["/x"]);
    assert_eq!(uc.register("/x", "second"), Err(ClassifierError::DuplicateKey));
    assert_eq!(uc.get("/x"), Some(&"/x"));
    assert_eq!(uc.len(), 1);
}

#[test]
fn empty_and_invalid_keys_are_rejected() {
    let mut uc = UriClassifier::new();
    assert_eq!(uc.register("", 1), Err(ClassifierError::NullKey));
    assert_eq!(
        uc.register("/a\0b", 1),
        Err(ClassifierError::InvalidKey { byte: 0, index: 2 })
    );
    assert_eq!(
        uc.register("\u{7f}x", 1),
        Err(ClassifierError::InvalidKey { byte: 0x7f, index: 0 })
    );
    assert!(uc.is_empty());
}

#[test]
fn keys_need_not_start_with_a_slash() {
    let uc = classifier(&["api", "~user"]);
    assert_eq!(split(&uc, "api/v2"), Some(("api", "/v2", "api")));
    assert_eq!(split(&uc, "~user/home"), Some(("~user", "/home", "~user")));
}

#[test]
fn arena_cap_reports_allocation_failure() {
    let mut uc = UriClassifier::with_limits(4, Some(1));
    uc.register("/abc", 1).unwrap();
    assert_eq!(uc.register("/xyz", 2), Err(ClassifierError::AllocationFailed));
    assert_eq!(uc.len(), 1);
    assert_eq!(uc.get("/xyz"), None);
    assert_eq!(uc.resolve("/abc/d").map(|hit| *hit.handler), Some(1));
}

// =========================================================================
// Removal
// =========================================================================

#[test]
fn unregister_then_resolve_falls_back_to_shorter_prefix() {
    let mut uc = classifier(&["/", "/blog", "/blog/2024"]);
    assert_eq!(uc.unregister("/blog/2024"), Some("/blog/2024"));
    assert_eq!(split(&uc, "/blog/2024/x"), Some(("/blog", "/2024/x", "/blog")));

    assert_eq!(uc.unregister("/blog"), Some("/blog"));
    assert_eq!(split(&uc, "/blog/2024/x"), Some(("/", "/blog/2024/x", "/")));
    assert_eq!(uc.len(), 1);
}

#[test]
fn unregister_leaves_longer_keys_in_place() {
    let mut uc = classifier(&["/blog", "/blog/2024"]);
    assert_eq!(uc.unregister("/blog"), Some("/blog"));
    assert_eq!(split(&uc, "/blog/2024"), Some(("/blog/2024", "", "/blog/2024")));
    assert_eq!(split(&uc, "/blog"), None);
    assert_eq!(split(&uc, "/blog/x"), None);
}

#[test]
fn unregister_keeps_keys_sharing_the_path() {
    let mut uc = classifier(&["/a", "/ab", "/abc", "/a/"]);
    assert_eq!(uc.unregister("/ab"), Some("/ab"));
    assert_eq!(uc.get("/a"), Some(&"/a"));
    assert_eq!(uc.get("/abc"), Some(&"/abc"));
    assert_eq!(uc.get("/a/"), Some(&"/a/"));
    assert_eq!(uc.get("/ab"), None);
    assert_eq!(split(&uc, "/abd"), Some(("/a", "bd", "/a")));
}

#[test]
fn unregister_unknown_key_is_a_no_op() {
    let mut uc = classifier(&["/a/b"]);
    assert_eq!(uc.unregister("/a"), None);
    assert_eq!(uc.unregister("/a/b/c"), None);
    assert_eq!(uc.unregister(""), None);
    assert_eq!(uc.len(), 1);
    assert_eq!(uc.get("/a/b"), Some(&"/a/b"));
}

#[test]
fn removed_nodes_are_reused() {
    let mut uc = UriClassifier::new();
    uc.register("/only", ()).unwrap();
    let after_insert = uc.arena_stats();

    uc.unregister("/only").unwrap();
    let after_remove = uc.arena_stats();
    assert_eq!(after_remove.free, after_insert.free + "/only".len());
    assert!(uc.is_empty());

    uc.register("/again", ()).unwrap();
    assert_eq!(uc.arena_stats().lines, after_insert.lines);
}

#[test]
fn register_or_replace_swaps_handlers() {
    let mut uc = UriClassifier::new();
    assert_eq!(uc.register_or_replace("/svc", 1), Ok(None));
    assert_eq!(uc.register_or_replace("/svc", 2), Ok(Some(1)));
    assert_eq!(uc.resolve("/svc/x").map(|hit| *hit.handler), Some(2));
    assert_eq!(uc.len(), 1);
}

// =========================================================================
// Sharing
// =========================================================================

#[test]
fn concurrent_resolution_of_a_built_classifier() {
    let uc = classifier(&["/", "/static", "/api", "/api/v2"]);
    std::thread::scope(|s| {
        for t in 0..4 {
            let uc = &uc;
            s.spawn(move || {
                for i in 0..500 {
                    let uri = format!("/api/v2/items/{}", i + t);
                    let hit = uc.resolve(&uri).unwrap();
                    assert_eq!(hit.script_name, "/api/v2");
                    assert_eq!(*hit.handler, "/api/v2");
                    let hit = uc.resolve("/static/app.js").unwrap();
                    assert_eq!(hit.path_info, "/app.js");
                }
            });
        }
    });
}

// =========================================================================
// Properties
// =========================================================================

/// Short keys over a small alphabet so that prefixes collide often. The
/// alphabet straddles the terminator pivot.
fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop::sample::select(b"/.?Aaz~".to_vec()), 1..6)
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Vec<u8>),
    Remove(Vec<u8>),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => key_strategy().prop_map(Op::Insert),
        2 => key_strategy().prop_map(Op::Remove),
    ]
}

/// Longest key in `model` that prefixes `probe`, by brute force.
fn model_longest(model: &BTreeMap<Vec<u8>, usize>, probe: &[u8]) -> Option<(usize, usize)> {
    model
        .iter()
        .filter(|(k, _)| probe.starts_with(k))
        .max_by_key(|(k, _)| k.len())
        .map(|(k, v)| (k.len(), *v))
}

proptest! {
    #[test]
    fn trie_agrees_with_a_reference_map(
        ops in proptest::collection::vec(op_strategy(), 1..80),
        probes in proptest::collection::vec(key_strategy(), 1..20),
    ) {
        let mut tst = Tst::with_line_width(7);
        let mut model = BTreeMap::new();

        for (n, op) in ops.into_iter().enumerate() {
            match op {
                Op::Insert(key) => {
                    let got = tst.insert(&key, n, false);
                    if model.contains_key(&key) {
                        prop_assert_eq!(got, Err(ClassifierError::DuplicateKey));
                    } else {
                        prop_assert_eq!(got, Ok(None));
                        model.insert(key, n);
                    }
                }
                Op::Remove(key) => {
                    prop_assert_eq!(tst.remove(&key), model.remove(&key));
                }
            }
            prop_assert_eq!(tst.len(), model.len());
        }

        for (key, value) in &model {
            prop_assert_eq!(tst.get(key), Some(value));
        }
        for probe in &probes {
            let got = tst.longest_prefix(probe).map(|(len, v)| (len, *v));
            prop_assert_eq!(got, model_longest(&model, probe));
        }
    }

    #[test]
    fn emptied_trie_returns_every_node(keys in proptest::collection::btree_set(key_strategy(), 1..30)) {
        let mut tst = Tst::new();
        for key in &keys {
            tst.insert(key, (), false).unwrap();
        }
        for key in &keys {
            prop_assert_eq!(tst.remove(key), Some(()));
        }
        let stats = tst.stats();
        prop_assert!(tst.is_empty());
        prop_assert_eq!(stats.free, stats.nodes);
    }
}
