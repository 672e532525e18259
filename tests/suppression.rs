mod support;

use ctxflow::checker::{Checker, CheckerSet};
use insta::assert_snapshot;
use support::analyzer_harness::{Setup, check};

#[test]
fn named_directive_silences_only_that_checker() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ctxflow:ignore goroutine
    go func() {
        println("x")
    }()
}
"#;
    assert_snapshot!(check(src), @"");
}

#[test]
fn directive_on_the_same_line() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    go func() { println("x") }() //ignore
}
"#;
    assert_snapshot!(check(src), @"");
}

#[test]
fn directive_for_another_checker_is_unused() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore errgroup
    go func() {
        println("x")
    }()
}
"#;
    assert_snapshot!(check(src), @r###"
    unused-ignore:6:5: unused ignore directive for checker "errgroup"
    goroutine:7:5: goroutine does not propagate context "ctx"
    "###);
}

#[test]
fn directive_with_nothing_to_silence_is_unused() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore
    go func() {
        <-ctx.Done()
    }()
}
"#;
    assert_snapshot!(check(src), @"unused-ignore:6:5: unused ignore directive");
}

#[test]
fn unknown_checker_names_are_reported() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore goroutine,bogus
    go func() {
        println("x")
    }()
}
"#;
    assert_snapshot!(check(src), @r###"unused-ignore:6:5: unknown checker "bogus" in ignore directive"###);
}

#[test]
fn disabled_checker_in_directive_is_invalid_not_unused() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore goroutine,spawner
    go func() {
        println("x")
    }()
}
"#;
    let checkers = CheckerSet::all().without(Checker::Spawner);
    assert_snapshot!(
        Setup::new().checkers(checkers).check(src),
        @r###"unused-ignore:6:5: checker "spawner" in ignore directive is not enabled"###
    );
}

#[test]
fn malformed_list_is_reported_but_still_applies() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore goroutine,
    go func() {
        println("x")
    }()
}
"#;
    assert_snapshot!(check(src), @"unused-ignore:6:5: malformed ignore directive: empty checker name");
}

#[test]
fn free_text_after_directive_is_allowed() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore goroutine Fire-and-forget metrics flush.
    go func() {
        println("x")
    }()
}
"#;
    assert_snapshot!(check(src), @"");
}

#[test]
fn directive_problems_vanish_with_unused_ignore_disabled() {
    let src = r#"package p

import "context"

func run(ctx context.Context) {
    //ignore bogus
    go func() {
        <-ctx.Done()
    }()
}
"#;
    let checkers = CheckerSet::all().without(Checker::UnusedIgnore);
    assert_snapshot!(Setup::new().checkers(checkers).check(src), @"");
}

#[test]
fn one_directive_covers_derivation_and_propagation() {
    let src = r#"package p

import "context"

func X(ctx context.Context) context.Context { return ctx }

func run(ctx context.Context) {
    //ignore
    go func() {
        println("x")
    }()
}
"#;
    assert_snapshot!(Setup::new().derive("X").check(src), @"");
}
