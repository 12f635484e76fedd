#![forbid(unsafe_code)]

//! Property tests for the undo log under random command sequences.
//!
//! Validates:
//! - Every command leaves a structurally valid document and a selection
//!   inside it, whatever its outcome.
//! - No command panics out of the engine.
//! - Undoing everything restores the starting document; redoing everything
//!   restores the final one.
//! - Failed and cancelled commands leave no undo entry behind.

use std::sync::Arc;

use proptest::prelude::*;

use subcue_core::{Document, SubtitleEvent};
use subcue_runtime::{CommandError, CommandRegistry, Editor, Engine, EngineOptions, Outcome};

// ============================================================================
// Strategy helpers
// ============================================================================

fn line() -> impl Strategy<Value = usize> {
    1usize..8
}

fn cmdline_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        2 => line().prop_map(|i| format!("sub-select {i}")),
        3 => (line(), prop_oneof![Just("before"), Just("after")])
            .prop_map(|(i, side)| format!("sub-insert -o {i} --{side}")),
        2 => line().prop_map(|i| format!("sub-delete -t {i}")),
        2 => (line(), 0usize..3, any::<bool>()).prop_map(|(i, n, concat)| {
            let flag = if concat { " --concat" } else { "" };
            format!("sub-merge -t {i}..{}{flag}", i + n)
        }),
        2 => (line(), 1i64..1500).prop_map(|(i, at)| format!("sub-split -t {i} -p +{at}ms")),
        1 => line().prop_map(|i| format!("sub-clone -t {i}")),
        2 => (line(), 0usize..2, prop_oneof![Just("above"), Just("below")])
            .prop_map(|(i, n, dir)| format!("sub-move -t {i}..{} --{dir}", i + n)),
        1 => Just("sub-sort".to_owned()),
        2 => (line(), "[a-z ;'\"]{0,6}").prop_map(|(i, text)| {
            format!("sub-set -t {i} --text {}", subcue_runtime::invocation::quote(&text))
        }),
        2 => (line(), -2000i64..2000, prop_oneof![Just(""), Just(" --start-only"), Just(" --end-only")])
            .prop_map(|(i, d, edge)| format!("sub-shift -t {i} -d={d}ms{edge}")),
        2 => Just("undo".to_owned()),
        1 => Just("redo".to_owned()),
    ]
}

fn editor(n: usize) -> Editor {
    let mut ed = Editor::headless();
    for i in 0..n as i64 {
        ed.document
            .push(SubtitleEvent::new(i * 1000, i * 1000 + 800).with_text(format!("line {i}")));
    }
    ed
}

fn engine() -> Engine {
    Engine::new(
        Arc::new(CommandRegistry::with_builtins()),
        &EngineOptions::default(),
    )
}

fn assert_consistent(ed: &Editor, cmdline: &str) {
    ed.document
        .validate()
        .unwrap_or_else(|e| panic!("after {cmdline:?}: {e}"));
    let len = ed.document.len();
    for i in ed.selection.indexes(&ed.document) {
        assert!(i < len, "after {cmdline:?}: selected {i} of {len}");
    }
}

fn undo_all(ed: &mut Editor) {
    while ed.undo_log().can_undo() {
        ed.undo().unwrap();
    }
}

fn redo_all(ed: &mut Editor) {
    while ed.undo_log().can_redo() {
        ed.redo().unwrap();
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn every_command_leaves_a_valid_editor(
        size in 0usize..6,
        cmdlines in prop::collection::vec(cmdline_strategy(), 1..20),
    ) {
        let mut engine = engine();
        let mut ed = editor(size);
        for cmdline in &cmdlines {
            for outcome in engine.run_cmdline(&mut ed, cmdline) {
                prop_assert!(
                    !matches!(outcome, Outcome::Failed(CommandError::Panicked(_) | CommandError::Invariant(_))),
                    "{cmdline}: {outcome:?}"
                );
            }
            assert_consistent(&ed, cmdline);
            prop_assert!(!ed.is_capturing());
        }
    }

    #[test]
    fn undo_all_and_redo_all_restore_documents(
        size in 0usize..6,
        cmdlines in prop::collection::vec(cmdline_strategy(), 1..20),
    ) {
        let mut engine = engine();
        let mut ed = editor(size);
        let initial: Document = ed.document.clone();
        for cmdline in &cmdlines {
            let _ = engine.run_cmdline(&mut ed, cmdline);
        }
        // Trailing undos leave redo entries; redo them so "final" is the tip.
        redo_all(&mut ed);
        let tip = ed.document.clone();

        undo_all(&mut ed);
        prop_assert_eq!(&ed.document, &initial);
        assert_consistent(&ed, "undo all");

        redo_all(&mut ed);
        prop_assert_eq!(&ed.document, &tip);
        assert_consistent(&ed, "redo all");
    }

    #[test]
    fn failures_leave_no_undo_entry(
        size in 1usize..6,
        cmdline in cmdline_strategy(),
    ) {
        let mut engine = engine();
        let mut ed = editor(size);
        let depth = ed.undo_log().undo_depth();
        let before = ed.document.clone();
        let outcomes = engine.run_cmdline(&mut ed, &cmdline);
        if !outcomes.iter().all(Outcome::is_completed) {
            prop_assert_eq!(ed.undo_log().undo_depth(), depth);
            prop_assert_eq!(&ed.document, &before);
        }
    }
}
