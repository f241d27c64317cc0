//! Deep-recursion tests: unwind, splice, and drive to completion

use unspool_core::{Engine, EngineError, SentinelConfig, Step, StepResult};

fn config(max_depth: usize) -> SentinelConfig {
    SentinelConfig {
        max_depth,
        max_burst_ms: None,
    }
}

/// Unwind-aware sum of 1..=n, written against the generated-call contract.
fn sum_to(engine: &mut Engine<i64>, n: i64) -> StepResult<i64> {
    if n == 0 {
        return Ok(Step::Done(0));
    }
    engine.call_then(
        move |e| sum_to(e, n - 1),
        move |_, below| Ok(Step::Done(below + n)),
    )
}

/// Native reference implementation, usable only for depths the host stack
/// tolerates directly.
fn sum_to_native(n: i64) -> i64 {
    if n == 0 { 0 } else { sum_to_native(n - 1) + n }
}

#[test]
fn test_depth_equivalence_with_native_reference() {
    let n = 500;
    let mut engine = Engine::with_config(config(16));
    let outcome = engine.dispatch(move |e| sum_to(e, n)).unwrap();
    assert_eq!(outcome.into_complete(), Some(sum_to_native(n)));
    assert!(engine.stats().unwinds > 0);
}

#[test]
fn test_recursion_far_beyond_native_limits() {
    let n: i64 = 100_000;
    let mut engine = Engine::with_config(config(64));
    let outcome = engine.dispatch(move |e| sum_to(e, n)).unwrap();
    assert_eq!(outcome.into_complete(), Some(n * (n + 1) / 2));
}

#[test]
fn test_shallow_call_never_unwinds() {
    let mut engine = Engine::with_config(config(256));
    let outcome = engine.dispatch(|e| sum_to(e, 20)).unwrap();
    assert_eq!(outcome.into_complete(), Some(210));
    assert_eq!(engine.stats().unwinds, 0);
    assert_eq!(engine.stats().steps, 0);
}

#[test]
fn test_order_preservation_through_unwind() {
    fn leaf(_: &mut Engine<String>) -> StepResult<String> {
        Ok(Step::Done("C".to_string()))
    }
    fn middle(engine: &mut Engine<String>) -> StepResult<String> {
        engine.call_then(leaf, |_, v| Ok(Step::Done(format!("B({v})"))))
    }
    fn outer(engine: &mut Engine<String>) -> StepResult<String> {
        engine.call_then(middle, |_, v| Ok(Step::Done(format!("A({v})"))))
    }

    // a generous threshold reproduces the plain native nesting
    let mut engine: Engine<String> = Engine::with_config(config(256));
    let native = engine.dispatch(outer).unwrap().into_complete().unwrap();
    assert_eq!(native, "A(B(C))");

    // a threshold of one forces an unwind at every call site; the result
    // must flow through B's and A's post-processing in the same order
    let mut engine: Engine<String> = Engine::with_config(config(1));
    let unwound = engine.dispatch(outer).unwrap().into_complete().unwrap();
    assert_eq!(unwound, native);
    assert!(engine.stats().unwinds > 0);
}

#[test]
fn test_chain_exhaustion_invokes_each_frame_once() {
    let k = 17u64;
    let mut engine: Engine<i64> = Engine::new();
    let outcome = engine
        .dispatch(move |e| {
            // hand-build a chain of k frames: the deepest completes with 0,
            // every caller above it adds one
            let mut step = e.suspend(|_, _| Ok(Step::Done(0)));
            for _ in 1..k {
                step = e.suspend(|_, resumed| Ok(Step::Done(resumed.into_value()? + 1)));
            }
            Ok(step)
        })
        .unwrap();
    assert_eq!(outcome.into_complete(), Some(k as i64 - 1));
    assert_eq!(engine.stats().steps, k);
    assert_eq!(engine.stats().passes, 1);
}

#[test]
fn test_no_leakage_across_unwinds() {
    let mut engine = Engine::with_config(config(8));
    assert!(engine.is_idle());

    // completes natively
    let outcome = engine.dispatch(|e| sum_to(e, 3)).unwrap();
    assert_eq!(outcome.into_complete(), Some(6));
    assert!(engine.is_idle());
    assert_eq!(engine.live_frames(), 0);

    // unwinds many times on the way
    let outcome = engine.dispatch(|e| sum_to(e, 5_000)).unwrap();
    assert!(outcome.is_complete());
    assert!(engine.is_idle());
    assert_eq!(engine.live_frames(), 0);
}

#[test]
fn test_fault_propagates_to_entry_and_frees_chain() {
    fn fail_below(engine: &mut Engine<i64>, n: i64) -> StepResult<i64> {
        if n == 0 {
            return Err(EngineError::fault("bottomed out"));
        }
        engine.call_then(move |e| fail_below(e, n - 1), |_, v| Ok(Step::Done(v)))
    }

    let mut engine = Engine::with_config(config(4));
    let error = engine.dispatch(|e| fail_below(e, 100)).unwrap_err();
    assert_eq!(error, EngineError::fault("bottomed out"));
    assert!(engine.is_idle());
    assert_eq!(engine.live_frames(), 0);
}

#[test]
fn test_nested_dispatch_is_rejected() {
    let mut engine: Engine<i64> = Engine::new();
    let outcome = engine
        .dispatch(|e| {
            let nested = e.dispatch(|_| Ok(Step::Done(0)));
            assert!(matches!(nested, Err(EngineError::NestedDispatch)));
            Ok(Step::Done(1))
        })
        .unwrap();
    assert_eq!(outcome.into_complete(), Some(1));
}

#[test]
fn test_unwind_signal_without_chain_is_rejected() {
    let mut engine: Engine<i64> = Engine::new();
    let error = engine.dispatch(|_| Ok(Step::Unwound)).unwrap_err();
    assert_eq!(error, EngineError::NoPendingChain);
}

#[test]
fn test_burst_cap_forces_unwinds_but_preserves_result() {
    let mut engine = Engine::with_config(SentinelConfig {
        max_depth: usize::MAX,
        max_burst_ms: Some(0),
    });
    let outcome = engine.dispatch(|e| sum_to(e, 50)).unwrap();
    assert_eq!(outcome.into_complete(), Some(50 * 51 / 2));
    assert!(engine.stats().unwinds > 0);
}

#[test]
fn test_tail_position_passes_signal_through() {
    // a tail call returns `call` directly instead of capturing its own
    // frame, so the chain stays one frame shorter per level
    fn countdown(engine: &mut Engine<i64>, n: i64) -> StepResult<i64> {
        if n == 0 {
            return Ok(Step::Done(0));
        }
        engine.call(move |e| countdown(e, n - 1))
    }

    let mut engine = Engine::with_config(config(32));
    let outcome = engine.dispatch(|e| countdown(e, 10_000)).unwrap();
    assert_eq!(outcome.into_complete(), Some(0));
    assert!(engine.is_idle());
    assert_eq!(engine.live_frames(), 0);
}

#[test]
fn test_ten_nested_unwinds_match_reference() {
    // depth equivalence across several successive unwind generations
    for max_depth in [1, 2, 3, 7, 31] {
        let mut engine = Engine::with_config(config(max_depth));
        let outcome = engine.dispatch(|e| sum_to(e, 200)).unwrap();
        assert_eq!(outcome.into_complete(), Some(200 * 201 / 2));
    }
}
