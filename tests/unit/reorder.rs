use super::*;

const BASE: LayerId = LayerId(0);
const A: LayerId = LayerId(1);
const B: LayerId = LayerId(2);
const C: LayerId = LayerId(3);

#[test]
fn moving_top_below_middle_swaps_them() {
    assert_eq!(
        reorder_candidate(&[BASE, A, B], B, A, DropPosition::Below),
        Some(vec![BASE, B, A])
    );
    assert_eq!(
        reorder_candidate(&[BASE, A, B], A, B, DropPosition::Above),
        Some(vec![BASE, B, A])
    );
}

#[test]
fn dropping_below_base_clamps_above_it() {
    assert_eq!(
        reorder_candidate(&[BASE, A, B, C], C, BASE, DropPosition::Below),
        Some(vec![BASE, C, A, B])
    );
    assert_eq!(
        reorder_candidate(&[BASE, A, B, C], C, BASE, DropPosition::Above),
        Some(vec![BASE, C, A, B])
    );
}

#[test]
fn degenerate_moves_yield_none() {
    let order = [BASE, A, B];
    assert_eq!(reorder_candidate(&order, BASE, B, DropPosition::Above), None);
    assert_eq!(reorder_candidate(&order, A, A, DropPosition::Above), None);
    assert_eq!(reorder_candidate(&order, LayerId(99), A, DropPosition::Above), None);
    assert_eq!(reorder_candidate(&order, A, LayerId(99), DropPosition::Above), None);
    // Already directly above A.
    assert_eq!(reorder_candidate(&order, B, A, DropPosition::Above), None);
}

#[test]
fn idle_transaction_ignores_drop_and_process_requests() {
    let mut tx = ReorderTransaction::new();
    assert_eq!(tx.drop_on(A, DropPosition::Above), DropOutcome::Ignored);
    assert_eq!(tx.state(), ReorderState::Idle);
    tx.cancel();
    assert_eq!(tx.state(), ReorderState::Idle);
}
