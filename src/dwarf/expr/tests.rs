use super::{evaluate, ExprContext, DW_OP_call_frame_cfa, DW_OP_consts, DW_OP_minus, DW_OP_plus};
use crate::error::{Error, ErrorKind};

const CTX: ExprContext = ExprContext {
    canonical_frame_address: 0x2000,
};

#[test]
fn add_constants() {
    let expr = [DW_OP_consts, 5, DW_OP_consts, 3, DW_OP_plus];
    assert_eq!(evaluate(&expr, CTX), Ok(8));
}

#[test]
fn push_cfa() {
    assert_eq!(evaluate(&[DW_OP_call_frame_cfa], CTX), Ok(0x2000));
}

#[test]
fn single_constant_is_a_result() {
    assert_eq!(evaluate(&[DW_OP_consts, 5], CTX), Ok(5));
}

#[test]
fn local_below_cfa() {
    // DW_OP_call_frame_cfa; DW_OP_consts -24; DW_OP_plus
    #[rustfmt::skip]
    let expr = [
        DW_OP_call_frame_cfa,
        DW_OP_consts, 0x68,
        DW_OP_plus,
    ];
    assert_eq!(evaluate(&expr, CTX), Ok(0x2000 - 24));
}

#[test]
fn negative_result_wraps_to_address() {
    let expr = [DW_OP_consts, 0x7f];
    assert_eq!(evaluate(&expr, CTX), Ok(u64::MAX));
}

#[test]
fn empty_expression() {
    let err = evaluate(&[], CTX).unwrap_err();
    assert_eq!(err, Error::InvalidExpression { depth: 0 });
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[test]
fn leftover_entries() {
    let expr = [DW_OP_consts, 1, DW_OP_consts, 2];
    assert_eq!(
        evaluate(&expr, CTX),
        Err(Error::InvalidExpression { depth: 2 })
    );
}

#[test]
fn plus_needs_two_operands() {
    assert_eq!(
        evaluate(&[DW_OP_plus], CTX),
        Err(Error::StackUnderflow {
            needed: 2,
            depth: 0
        })
    );
    assert_eq!(
        evaluate(&[DW_OP_consts, 1, DW_OP_plus], CTX),
        Err(Error::StackUnderflow {
            needed: 2,
            depth: 1
        })
    );
}

#[test]
fn unsupported_operation() {
    let expr = [DW_OP_consts, 5, DW_OP_consts, 3, DW_OP_minus];
    let err = evaluate(&expr, CTX).unwrap_err();
    assert_eq!(err, Error::UnsupportedExprOp(DW_OP_minus));
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn truncated_operand() {
    assert!(matches!(
        evaluate(&[DW_OP_consts, 0x80], CTX),
        Err(Error::UnexpectedEof { .. })
    ));
}
