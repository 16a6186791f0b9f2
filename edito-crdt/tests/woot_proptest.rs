//! Property-based tests for the WOOT engine.
//!
//! The convergence properties replay concurrently generated operation logs
//! in many delivery orders. Orders are constrained only by per-peer FIFO,
//! which is what the transport actually guarantees.

use edito_crdt::{Character, Document};
use proptest::prelude::*;

/// A generated operation as it would travel between replicas.
#[derive(Clone, Debug)]
enum Op {
    Insert(Character),
    Delete(Character),
}

fn apply(doc: &mut Document, op: &Op) {
    match op {
        Op::Insert(c) => doc
            .integrate_insert(c.clone())
            .expect("neighbours must be present under FIFO delivery"),
        Op::Delete(c) => doc.integrate_delete(c),
    }
}

/// A local editing step, positions expressed as fractions of the current
/// visible length so scripts stay valid as the document grows and shrinks.
#[derive(Clone, Debug)]
enum EditOp {
    Insert { pos_pct: f64, ch: char },
    Delete { pos_pct: f64 },
}

fn arbitrary_edit_op() -> impl Strategy<Value = EditOp> {
    prop_oneof![
        3 => (0.0..=1.0f64, proptest::char::range('a', 'z'))
            .prop_map(|(pos_pct, ch)| EditOp::Insert { pos_pct, ch }),
        1 => (0.0..=1.0f64).prop_map(|pos_pct| EditOp::Delete { pos_pct }),
    ]
}

/// Run one editing step against a replica, returning the wire operation it
/// generated (if any).
fn run_edit(doc: &mut Document, op: &EditOp) -> Option<Op> {
    let visible = doc.content().chars().count();
    match op {
        EditOp::Insert { pos_pct, ch } => {
            let pos = 1 + ((pos_pct * visible as f64) as usize).min(visible);
            let c = doc.generate_insert(pos, ch.to_string()).ok()?;
            Some(Op::Insert(c))
        }
        EditOp::Delete { pos_pct } => {
            if visible == 0 {
                return None;
            }
            let pos = 1 + ((pos_pct * (visible - 1) as f64) as usize).min(visible - 1);
            doc.generate_delete(pos).map(Op::Delete)
        }
    }
}

/// Generate a whole log on a fresh replica for one site.
fn generate_log(site_id: u64, edits: &[EditOp]) -> (Document, Vec<Op>) {
    let mut doc = Document::with_site(site_id);
    let ops = edits.iter().filter_map(|e| run_edit(&mut doc, e)).collect();
    (doc, ops)
}

/// Interleave two logs according to a flag sequence, preserving the
/// internal order of each.
fn interleave(a: &[Op], b: &[Op], flags: &[bool]) -> Vec<Op> {
    let (mut ai, mut bi) = (0, 0);
    let mut out = Vec::with_capacity(a.len() + b.len());
    for &take_a in flags {
        if ai < a.len() && (take_a || bi >= b.len()) {
            out.push(a[ai].clone());
            ai += 1;
        } else if bi < b.len() {
            out.push(b[bi].clone());
            bi += 1;
        }
    }
    out.extend_from_slice(&a[ai..]);
    out.extend_from_slice(&b[bi..]);
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// A single replica behaves exactly like a plain string buffer.
    #[test]
    fn content_matches_string_model(edits in prop::collection::vec(arbitrary_edit_op(), 1..60)) {
        let mut doc = Document::with_site(1);
        let mut model: Vec<char> = Vec::new();

        for edit in &edits {
            let visible = model.len();
            match edit {
                EditOp::Insert { pos_pct, ch } => {
                    let pos = 1 + ((pos_pct * visible as f64) as usize).min(visible);
                    doc.generate_insert(pos, ch.to_string()).unwrap();
                    model.insert(pos - 1, *ch);
                }
                EditOp::Delete { pos_pct } => {
                    if visible == 0 {
                        continue;
                    }
                    let pos = 1 + ((pos_pct * (visible - 1) as f64) as usize).min(visible - 1);
                    doc.generate_delete(pos).unwrap();
                    model.remove(pos - 1);
                }
            }
        }

        prop_assert_eq!(doc.content(), model.iter().collect::<String>());
    }

    /// Content is always the concatenation of visible values in order.
    #[test]
    fn content_is_visible_concatenation(edits in prop::collection::vec(arbitrary_edit_op(), 1..40)) {
        let (doc, _) = generate_log(1, &edits);
        let concat: String = doc
            .characters()
            .iter()
            .filter(|c| c.visible)
            .map(|c| c.value.as_str())
            .collect();
        prop_assert_eq!(doc.content(), concat);
    }

    /// Two replicas that edit concurrently converge once each has applied
    /// the other's log, whatever the interleaving on either side.
    #[test]
    fn concurrent_edits_converge(
        edits1 in prop::collection::vec(arbitrary_edit_op(), 1..25),
        edits2 in prop::collection::vec(arbitrary_edit_op(), 1..25),
        flags in prop::collection::vec(any::<bool>(), 50),
    ) {
        let (mut p1, log1) = generate_log(1, &edits1);
        let (mut p2, log2) = generate_log(2, &edits2);

        for op in &log2 {
            apply(&mut p1, op);
        }
        for op in &log1 {
            apply(&mut p2, op);
        }
        prop_assert_eq!(p1.content(), p2.content());

        // A third replica that saw nothing during generation converges too,
        // under an arbitrary FIFO-respecting interleaving.
        let mut p3 = Document::with_site(3);
        for op in interleave(&log1, &log2, &flags) {
            apply(&mut p3, &op);
        }
        prop_assert_eq!(p3.content(), p1.content());
    }

    /// Replaying a log twice leaves a replica exactly where one replay did.
    #[test]
    fn replay_is_idempotent(edits in prop::collection::vec(arbitrary_edit_op(), 1..30)) {
        let (_, log) = generate_log(1, &edits);

        let mut once = Document::with_site(2);
        for op in &log {
            apply(&mut once, op);
        }
        let mut twice = Document::with_site(2);
        for op in log.iter().chain(log.iter()) {
            apply(&mut twice, op);
        }

        prop_assert_eq!(once.content(), twice.content());
        prop_assert_eq!(once.len(), twice.len());
    }

    /// An identity is reported present exactly when it is in the sequence.
    #[test]
    fn position_agrees_with_membership(edits in prop::collection::vec(arbitrary_edit_op(), 1..30)) {
        let (doc, _) = generate_log(1, &edits);
        for c in doc.characters() {
            prop_assert!(doc.position(&c.id).is_some());
            prop_assert!(doc.contains(&c.id));
        }
        prop_assert!(doc.position("99-99").is_none());
    }
}
