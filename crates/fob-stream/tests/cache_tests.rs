//! Graph cache and failure isolation tests for fob-stream.
//!
//! These tests verify that:
//! - A second build of the same entry receives the cached graph
//! - `cache: false` neither reads nor writes the cache
//! - A failed build clears the entry and is reported, not thrown
//! - One failing file does not affect the others

mod helpers;

use fob_stream::{
    BuildOptions, BundleOrchestrator, Error, FailureKind, OutputOptions, PLUGIN_NAME,
    TransformConfig, bundle_with,
};
use futures::StreamExt;
use helpers::{ScriptedEngine, isolated_cache, source_file};
use std::path::PathBuf;

#[tokio::test]
async fn test_second_build_receives_cached_graph() {
    let engine = ScriptedEngine::new();
    let cache = isolated_cache();
    let transform = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        "es",
        None,
    );

    transform.transform(source_file("src/main.js")).await.unwrap();
    assert!(cache.contains("src/main.js"));

    transform.transform(source_file("src/main.js")).await.unwrap();

    let builds = engine.builds();
    assert_eq!(builds.len(), 2);
    assert!(!builds[0].cached, "first build starts cold");
    assert!(builds[1].cached, "second build should reuse the graph");
}

#[tokio::test]
async fn test_cache_is_keyed_by_entry() {
    let engine = ScriptedEngine::new();
    let cache = isolated_cache();
    let transform = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        "es",
        None,
    );

    transform.transform(source_file("src/a.js")).await.unwrap();
    transform.transform(source_file("src/b.js")).await.unwrap();

    assert!(engine.builds().iter().all(|b| !b.cached));
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn test_disabled_cache_is_neither_read_nor_written() {
    let engine = ScriptedEngine::new();
    let cache = isolated_cache();

    let uncached = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        BuildOptions::new().cache(false),
        Some("es".into()),
    );
    uncached.transform(source_file("src/main.js")).await.unwrap();
    assert!(cache.is_empty(), "uncached build must not store its graph");

    // Populate through a caching transform sharing the same cache.
    let cached = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        "es",
        None,
    );
    cached.transform(source_file("src/main.js")).await.unwrap();
    assert!(cache.contains("src/main.js"));

    uncached.transform(source_file("src/main.js")).await.unwrap();

    let builds = engine.builds();
    assert_eq!(builds.len(), 3);
    assert!(builds.iter().all(|b| !b.cached));
}

#[tokio::test]
async fn test_failed_build_clears_entry_and_is_reported() {
    let engine = ScriptedEngine::new();
    let cache = isolated_cache();
    let transform = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        "es",
        None,
    );
    let mut errors = transform.errors().unwrap();

    transform.transform(source_file("src/main.js")).await.unwrap();
    assert!(cache.contains("src/main.js"));

    engine.fail_build("src/main.js");
    let file = source_file("src/main.js");
    let output = transform.transform(file.clone()).await.unwrap();

    assert_eq!(output.file, file, "failed record passes through unchanged");
    assert!(!cache.contains("src/main.js"));

    let reported = errors.try_recv().unwrap();
    assert_eq!(reported.plugin, PLUGIN_NAME);
    assert_eq!(reported.kind(), FailureKind::BuildFailure);
    assert!(reported.to_string().starts_with("[fob-stream]"));
    match &reported.error {
        Error::Build { input, .. } => assert_eq!(input, "src/main.js"),
        other => panic!("expected build error, got {:?}", other),
    }

    // The next build after a failure starts cold.
    engine.heal_build("src/main.js");
    transform.transform(source_file("src/main.js")).await.unwrap();
    assert!(!engine.builds().last().unwrap().cached);
}

#[tokio::test]
async fn test_failed_generate_clears_entry() {
    let engine = ScriptedEngine::new();
    let cache = isolated_cache();
    let primed = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        "es",
        None,
    );
    primed.transform(source_file("src/main.js")).await.unwrap();
    assert!(cache.contains("src/main.js"));

    engine.fail_format("umd");
    let transform = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        vec![
            OutputOptions::new("es").with_file("out.esm.js"),
            OutputOptions::new("umd").with_file("out.umd.js"),
        ],
        None,
    );
    let mut errors = transform.errors().unwrap();

    transform.transform(source_file("src/main.js")).await.unwrap();

    // The build itself succeeded and reused the graph, yet nothing may
    // remain cached once one of its outputs failed.
    assert!(engine.builds().last().unwrap().cached);
    assert!(!cache.contains("src/main.js"));
    assert_eq!(errors.try_recv().unwrap().kind(), FailureKind::GenerateFailure);
}

#[tokio::test]
async fn test_orchestrator_reports_cache_hits() {
    let engine = ScriptedEngine::new();
    let orchestrator = BundleOrchestrator::new(engine.shared(), isolated_cache());
    let build = BuildOptions::new();
    let outputs = vec![OutputOptions::new("es")];

    let mut file = source_file("src/main.js");
    let first = orchestrator
        .run(&mut file, "src/main.js", &build, &outputs)
        .await
        .unwrap();
    assert!(!first.cache_hit);

    let mut file = source_file("src/main.js");
    let second = orchestrator
        .run(&mut file, "src/main.js", &build, &outputs)
        .await
        .unwrap();
    assert!(second.cache_hit);

    let mut file = source_file("src/main.js");
    let uncached = orchestrator
        .run(&mut file, "src/main.js", &BuildOptions::new().cache(false), &outputs)
        .await
        .unwrap();
    assert!(!uncached.cache_hit);
}

#[tokio::test]
async fn test_failure_does_not_affect_other_files() {
    let engine = ScriptedEngine::new();
    engine.fail_build("src/a.js");
    let cache = isolated_cache();
    let transform = bundle_with(
        TransformConfig::new(engine.shared()).cache(cache.clone()),
        "cjs",
        None,
    );
    let mut errors = transform.errors().unwrap();

    let a = source_file("src/a.js");
    let b = source_file("src/b.js");
    let records: Vec<_> = transform
        .pipe(futures::stream::iter(vec![a.clone(), b]))
        .collect()
        .await;

    assert_eq!(records.len(), 2);
    let first = records[0].as_ref().unwrap();
    let second = records[1].as_ref().unwrap();
    assert_eq!(first, &a);
    assert_eq!(second.path, PathBuf::from("/proj/src/b.js"));
    assert_eq!(second.text(), Some("/* cjs:b */ src/b.js"));

    assert!(!cache.contains("src/a.js"));
    assert!(cache.contains("src/b.js"));

    assert_eq!(errors.try_recv().unwrap().kind(), FailureKind::BuildFailure);
    assert!(errors.try_recv().is_err(), "only one error expected");
}

#[tokio::test]
async fn test_errors_receiver_is_handed_out_once() {
    let engine = ScriptedEngine::new();
    let transform = bundle_with(
        TransformConfig::new(engine.shared()).cache(isolated_cache()),
        "es",
        None,
    );

    assert!(transform.errors().is_some());
    assert!(transform.errors().is_none());
}
