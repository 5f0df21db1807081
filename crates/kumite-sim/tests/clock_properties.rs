//! Property tests for the simulation clock and pause gate.
//!
//! Random speed sequences are fed through `add_frame_time` and the tick
//! counters are checked after every call.

use kumite_sim::prelude::*;
use proptest::prelude::*;

/// Speeds in `(0, 10]`, quantized to avoid denormal noise.
fn speed() -> impl Strategy<Value = f64> {
    (1u32..=1000).prop_map(|v| f64::from(v) * 0.01)
}

fn speeds() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(speed(), 1..300)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn tick_count_never_jumps(initial in speed(), seq in speeds()) {
        let mut clock = SimulationClock::with_step(initial);
        let pause = PauseState::default();

        for s in seq {
            let before = clock.tick_count();
            let fresh = clock.add_frame_time(s, &pause);
            let after = clock.tick_count();

            prop_assert!(after >= before);
            prop_assert!(after - before <= 1);
            prop_assert!(clock.tick_count_f() >= clock.last_tick());
            prop_assert!(clock.tick_count() <= clock.tick_count_f().floor() as i64);
            if !fresh {
                // Flushed calls always release a pending tick.
                prop_assert_eq!(after, before + 1);
            }
        }
    }

    #[test]
    fn interpolation_stays_in_unit_range(initial in speed(), seq in speeds()) {
        let mut clock = SimulationClock::with_step(initial);
        let pause = PauseState::default();

        for s in seq {
            clock.add_frame_time(s, &pause);
            let t = clock.tick_interpolation(&pause);
            prop_assert!((0.0..=1.0).contains(&t), "interpolation {} out of range", t);
            if clock.tick_next_frame(&pause) {
                prop_assert_eq!(t, 1.0);
            }
        }
    }

    #[test]
    fn paused_clock_never_releases_logic(initial in speed(), seq in speeds()) {
        let mut clock = SimulationClock::with_step(initial);
        let pause = PauseState { paused: true, step: false };

        for s in seq {
            clock.add_frame_time(s, &pause);
            prop_assert!(!clock.tick_frame(&pause));
        }
        // At most the tick in flight when the freeze began is crossed.
        prop_assert!(clock.tick_count() <= 1);
    }

    #[test]
    fn match_tick_survives_round_resets(seq in speeds(), reset_at in 0usize..300) {
        let mut clock = SimulationClock::new();
        let pause = PauseState::default();
        let mut released = 0i64;

        for (i, s) in seq.iter().enumerate() {
            if i == reset_at {
                clock.reset_round();
            }
            let before = clock.tick_count();
            clock.add_frame_time(*s, &pause);
            released += clock.tick_count() - before;
        }
        prop_assert_eq!(clock.match_tick(), released);
    }
}

// ---------------------------------------------------------------------------
// Fixed sequences
// ---------------------------------------------------------------------------

#[test]
fn sixty_calls_at_unit_speed_give_sixty_ticks() {
    let mut clock = SimulationClock::new();
    let pause = PauseState::default();
    for _ in 0..60 {
        clock.add_frame_time(1.0, &pause);
    }
    assert_eq!(clock.tick_count(), 60);
}

#[test]
fn step_requests_release_one_tick_each() {
    let mut clock = SimulationClock::new();
    let mut pause = PauseState::default();
    clock.add_frame_time(1.0, &pause);
    pause.toggle_pause();

    let mut released = 0;
    for i in 0..30 {
        if i % 10 == 0 {
            pause.request_step();
        }
        clock.add_frame_time(1.0, &pause);
        if clock.tick_frame(&pause) {
            released += 1;
        }
        pause.consume_step();
    }
    assert_eq!(released, 3);

    pause.toggle_pause();
    assert!(!pause.step);
    clock.add_frame_time(1.0, &pause);
    assert!(clock.tick_frame(&pause));
}
