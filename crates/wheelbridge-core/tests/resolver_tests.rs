//! End-to-end resolution properties against a mock upstream index.

use mockito::{Matcher, Server, ServerGuard};
use wheelbridge_core::{PypiClient, Resolver};
use wheelbridge_schema::Subdir;

/// JSON for one published wheel of `version`, hosted under `/files/` on the
/// mock server.
fn wheel_json(base: &str, name: &str, version: &str, tag: &str) -> String {
    let filename = format!("{name}-{version}-{tag}.whl");
    format!(
        r#"{{
            "filename": "{filename}",
            "url": "{base}/files/{filename}",
            "size": 1024,
            "digests": {{"md5": "00000000000000000000000000000000", "sha256": "{:064}"}},
            "upload_time_iso_8601": "2024-01-02T03:04:05Z",
            "requires_python": ">=3.7"
        }}"#,
        0
    )
}

/// Mount the release index for `name` with the given (version, files)
/// pairs, expecting exactly `hits` upstream requests (`None` for any).
async fn mock_releases(
    server: &mut ServerGuard,
    name: &str,
    versions: &[(&str, Vec<String>)],
    hits: Option<usize>,
) -> mockito::Mock {
    let releases: Vec<String> = versions
        .iter()
        .map(|(version, files)| format!(r#""{version}": [{}]"#, files.join(",")))
        .collect();
    let body = format!(r#"{{"releases": {{{}}}}}"#, releases.join(","));
    let mut mock = server
        .mock("GET", format!("/{name}/json").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body);
    if let Some(hits) = hits {
        mock = mock.expect(hits);
    }
    mock.create_async().await
}

/// Catch-all for wheel core metadata lookups.
async fn mock_metadata(server: &mut ServerGuard, body: &str, hits: Option<usize>) -> mockito::Mock {
    let mut mock = server
        .mock("GET", Matcher::Regex(r"^/files/.*\.metadata$".to_string()))
        .with_status(200)
        .with_body(body);
    if let Some(hits) = hits {
        mock = mock.expect(hits);
    }
    mock.create_async().await
}

fn resolver(server: &ServerGuard) -> Resolver {
    Resolver::new(PypiClient::new(server.url()))
}

#[tokio::test]
async fn test_resolve_is_idempotent_and_served_from_cache() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let releases = mock_releases(
        &mut server,
        "niquests",
        &[("3.7.2", vec![wheel_json(&base, "niquests", "3.7.2", "py3-none-any")])],
        Some(1),
    )
    .await;
    let _meta = mock_metadata(&mut server, "Name: niquests\nLicense: Apache-2.0\n", None).await;

    let resolver = resolver(&server);
    let reqs = vec!["niquests".to_string()];
    let first = resolver.resolve(&reqs, Subdir::Linux64, "3.9").await.unwrap();
    let second = resolver.resolve(&reqs, Subdir::Linux64, "3.9").await.unwrap();

    assert_eq!(*first, *second);
    releases.assert_async().await; // second call never touched upstream

    let noarch = first.get(Subdir::Noarch).unwrap();
    let record = noarch
        .packages_conda
        .get("niquests-3.7.2-pypi_py3_none_any_0.conda")
        .expect("record under generated filename");
    assert_eq!(record.build, "pypi_py3_none_any_0");
    assert_eq!(record.noarch.as_deref(), Some("python"));
    assert_eq!(record.license, "Apache-2.0");
    assert_eq!(record.depends, vec!["python >=3.7".to_string()]);
    assert!(record.sha256.is_none());
    assert_eq!(record.legacy_size, 1024);
}

#[tokio::test]
async fn test_generated_filenames_are_deterministic_across_runs() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let _releases = mock_releases(
        &mut server,
        "numpy",
        &[(
            "1.26.0",
            vec![wheel_json(&base, "numpy", "1.26.0", "cp39-cp39-manylinux_2_17_x86_64")],
        )],
        None,
    )
    .await;
    let _meta = mock_metadata(&mut server, "Name: numpy\nLicense: BSD-3-Clause\n", None).await;

    let reqs = vec!["numpy".to_string()];
    let run_a = resolver(&server)
        .resolve(&reqs, Subdir::Linux64, "3.9")
        .await
        .unwrap();
    let run_b = resolver(&server)
        .resolve(&reqs, Subdir::Linux64, "3.9")
        .await
        .unwrap();

    let names = |set: &wheelbridge_schema::RepodataSet| {
        let mut v: Vec<String> = set.records().map(|r| r.filename.clone()).collect();
        v.sort();
        v
    };
    assert_eq!(names(&run_a), names(&run_b));
    assert_eq!(
        names(&run_a),
        vec!["numpy-1.26.0-pypi_cp39_cp39_manylinux_2_17_x86_64_0.conda".to_string()]
    );
}

#[tokio::test]
async fn test_dependency_cycle_terminates() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let a_releases = mock_releases(
        &mut server,
        "pkg-a",
        &[("1.0", vec![wheel_json(&base, "pkg_a", "1.0", "py3-none-any")])],
        Some(1),
    )
    .await;
    let b_releases = mock_releases(
        &mut server,
        "pkg-b",
        &[("1.0", vec![wheel_json(&base, "pkg_b", "1.0", "py3-none-any")])],
        Some(1),
    )
    .await;

    let _a_meta = server
        .mock("GET", Matcher::Regex(r"^/files/pkg_a.*\.metadata$".to_string()))
        .with_body("Name: pkg-a\nRequires-Dist: pkg-b\n")
        .create_async()
        .await;
    let _b_meta = server
        .mock("GET", Matcher::Regex(r"^/files/pkg_b.*\.metadata$".to_string()))
        .with_body("Name: pkg-b\nRequires-Dist: pkg-a\n")
        .create_async()
        .await;

    let resolver = resolver(&server);
    let set = resolver
        .resolve(&["pkg-a".to_string()], Subdir::Linux64, "3.9")
        .await
        .unwrap();

    let noarch = set.get(Subdir::Noarch).unwrap();
    assert_eq!(noarch.packages_conda.len(), 2);
    // Each name resolved exactly once despite mutual discovery.
    a_releases.assert_async().await;
    b_releases.assert_async().await;
}

#[tokio::test]
async fn test_release_cap_allows_six_releases() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let versions: Vec<String> = (1..=10).map(|i| format!("{i}.0")).collect();
    let entries: Vec<(&str, Vec<String>)> = versions
        .iter()
        .map(|v| (v.as_str(), vec![wheel_json(&base, "capped", v, "py3-none-any")]))
        .collect();
    let _releases = mock_releases(&mut server, "capped", &entries, None).await;
    let _meta = mock_metadata(&mut server, "Name: capped\nLicense: MIT\n", None).await;

    let resolver = resolver(&server);
    let set = resolver
        .resolve(&["capped>=1".to_string()], Subdir::Linux64, "3.9")
        .await
        .unwrap();

    let noarch = set.get(Subdir::Noarch).unwrap();
    // Cap of 5 plus the boundary release processed before the check halts.
    assert_eq!(noarch.packages_conda.len(), 6);
    let versions_emitted: Vec<&str> = noarch
        .packages_conda
        .values()
        .map(|r| r.version.as_str())
        .collect();
    assert!(versions_emitted.contains(&"10.0"));
    assert!(versions_emitted.contains(&"5.0"));
    assert!(!versions_emitted.contains(&"4.0"));
}

#[tokio::test]
async fn test_name_only_requirement_takes_newest_matching_release_only() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let entries: Vec<(&str, Vec<String>)> = vec![
        ("2.0", vec![wheel_json(&base, "latest", "2.0", "py3-none-any")]),
        ("1.0", vec![wheel_json(&base, "latest", "1.0", "py3-none-any")]),
    ];
    let _releases = mock_releases(&mut server, "latest", &entries, None).await;
    let _meta = mock_metadata(&mut server, "Name: latest\n", None).await;

    let resolver = resolver(&server);
    let set = resolver
        .resolve(&["latest".to_string()], Subdir::Linux64, "3.9")
        .await
        .unwrap();

    let noarch = set.get(Subdir::Noarch).unwrap();
    assert_eq!(noarch.packages_conda.len(), 1);
    assert_eq!(
        noarch.packages_conda.values().next().unwrap().version,
        "2.0"
    );
}

#[tokio::test]
async fn test_marker_qualified_dependencies_are_dropped() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let _releases = mock_releases(
        &mut server,
        "top",
        &[("1.0", vec![wheel_json(&base, "top", "1.0", "py3-none-any")])],
        None,
    )
    .await;
    let _meta = mock_metadata(
        &mut server,
        "Name: top\n\
         Requires-Dist: plain-dep\n\
         Requires-Dist: marked-dep ; python_version < '3.8'\n\
         Requires-Dist: extra-dep[fast] >=1.0\n",
        None,
    )
    .await;
    let _plain = mock_releases(&mut server, "plain-dep", &[], None).await;

    let resolver = resolver(&server);
    let set = resolver
        .resolve(&["top".to_string()], Subdir::Linux64, "3.9")
        .await
        .unwrap();

    let record = set
        .find("top-1.0-pypi_py3_none_any_0.conda")
        .expect("top record");
    assert!(record.depends.contains(&"plain-dep".to_string()));
    assert!(!record.depends.iter().any(|d| d.contains("marked-dep")));
    assert!(!record.depends.iter().any(|d| d.contains("extra-dep")));
}

#[tokio::test]
async fn test_no_matching_wheels_is_empty_not_error() {
    let mut server = Server::new_async().await;
    let base = server.url();

    // Only a Windows wheel; target is linux-64.
    let _releases = mock_releases(
        &mut server,
        "winonly",
        &[("1.0", vec![wheel_json(&base, "winonly", "1.0", "cp39-cp39-win_amd64")])],
        None,
    )
    .await;

    let resolver = resolver(&server);
    let set = resolver
        .resolve(&["winonly".to_string()], Subdir::Linux64, "3.9")
        .await
        .unwrap();

    assert_eq!(set.records().count(), 0);
}

#[tokio::test]
async fn test_upstream_failure_aborts_whole_call() {
    let mut server = Server::new_async().await;
    let _releases = server
        .mock("GET", "/flaky/json")
        .with_status(502)
        .create_async()
        .await;

    let resolver = resolver(&server);
    let err = resolver
        .resolve(&["flaky".to_string()], Subdir::Linux64, "3.9")
        .await
        .unwrap_err();
    assert!(matches!(err, wheelbridge_core::Error::UpstreamUnavailable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_resolves_coalesce_release_fetch() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let releases = mock_releases(
        &mut server,
        "shared",
        &[("1.0", vec![wheel_json(&base, "shared", "1.0", "py3-none-any")])],
        Some(1),
    )
    .await;
    let metadata = mock_metadata(&mut server, "Name: shared\n", Some(1)).await;

    let resolver = std::sync::Arc::new(resolver(&server));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let resolver = std::sync::Arc::clone(&resolver);
        handles.push(tokio::spawn(async move {
            resolver
                .resolve(&["shared".to_string()], Subdir::Linux64, "3.9")
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let set = handle.await.unwrap();
        assert_eq!(set.records().count(), 1);
    }
    releases.assert_async().await;
    metadata.assert_async().await;
}

#[tokio::test]
async fn test_resolve_fresh_bypasses_repodata_cache() {
    let mut server = Server::new_async().await;
    let base = server.url();

    let releases = mock_releases(
        &mut server,
        "stale",
        &[("1.0", vec![wheel_json(&base, "stale", "1.0", "py3-none-any")])],
        Some(2),
    )
    .await;
    let _meta = mock_metadata(&mut server, "Name: stale\n", None).await;

    let resolver = resolver(&server);
    let reqs = vec!["stale".to_string()];
    resolver.resolve(&reqs, Subdir::Linux64, "3.9").await.unwrap();
    resolver
        .resolve_fresh(&reqs, Subdir::Linux64, "3.9")
        .await
        .unwrap();
    releases.assert_async().await;
}
