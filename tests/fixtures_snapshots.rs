mod support;

use insta::assert_snapshot;
use support::analyzer_harness::{Setup, check};

#[test]
fn workers_fixture_with_defaults() {
    let src = include_str!("fixtures/go/workers.go");
    assert_snapshot!(check(src), @r###"waitgroup:25:11: sync.WaitGroup.Go() closure should use context "ctx""###);
}

#[test]
fn factories_fixture() {
    let src = include_str!("fixtures/go/factories.go");
    assert_snapshot!(check(src), @r###"
    goroutine:21:5: goroutine does not propagate context "ctx"
    goroutine:24:5: goroutine does not propagate context "ctx"
    "###);
}

#[test]
fn factories_fixture_without_flow_graph() {
    let src = include_str!("fixtures/go/factories.go");
    assert_snapshot!(Setup::new().imprecise().check(src), @r###"
    goroutine:21:5: goroutine does not propagate context "ctx"
    goroutine:24:5: goroutine does not propagate context "ctx"
    "###);
}

#[test]
fn syntax_errors_do_not_stop_the_check() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    go func() {
        println("x")
    }()
}

func broken( {
"#;
    let diags = Setup::new()
        .build()
        .check_source(src)
        .expect("analysis should succeed");
    assert!(diags.iter().all(|d| d.span.start.row >= 6));
}
