//! Property tests for the scheduler's per-output bookkeeping

use filament_core::scheduler::{Scheduler, Tracker};
use filament_core::OutputKind;
use filament_protocol::programs::PROGRAM_TIMED_CHANGE;
use filament_protocol::{Blink, Cancel, Fade, ProgramMessage, TimedChange, ALL_OUTPUTS};
use proptest::prelude::*;

const OUTPUTS: u8 = 4;

fn scheduler() -> Scheduler<'static, ()> {
    let mut scheduler = Scheduler::with_builtin_programs();
    for pin in 0..OUTPUTS {
        scheduler.add_output(OutputKind::Value { pin }, ()).unwrap();
    }
    scheduler
}

#[derive(Debug, Clone)]
enum Op {
    Blink(u8),
    Change(u8, u32),
    Fade(u8, u32, bool),
    Cancel(u8),
    Tick(u32),
}

fn target() -> impl Strategy<Value = u8> {
    prop_oneof![0..OUTPUTS, Just(ALL_OUTPUTS)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        target().prop_map(Op::Blink),
        (target(), 0u32..200).prop_map(|(o, p)| Op::Change(o, p)),
        (target(), 0u32..200, any::<bool>()).prop_map(|(o, p, c)| Op::Fade(o, p, c)),
        target().prop_map(Op::Cancel),
        (1u32..150).prop_map(Op::Tick),
    ]
}

fn message(op: &Op) -> Option<ProgramMessage> {
    let msg = match *op {
        Op::Blink(output) => ProgramMessage::from_body(
            output,
            &Blink {
                on_period: 40,
                on_color: 0xFFFFFF,
                off_period: 60,
                off_color: 0,
            },
        ),
        Op::Change(output, period) => ProgramMessage::from_body(
            output,
            &TimedChange {
                change_period: period,
                start_color: 0xFFFFFF,
                stop_color: 0,
            },
        ),
        Op::Fade(output, period, cycle) => ProgramMessage::from_body(
            output,
            &Fade {
                period,
                start_color: 0,
                stop_color: 0xFFFFFF,
                cycle,
            },
        ),
        Op::Cancel(output) => ProgramMessage::from_body(output, &Cancel),
        Op::Tick(_) => return None,
    };
    Some(msg.unwrap())
}

proptest! {
    #[test]
    fn install_leaves_exactly_one_tracker(output in 0..OUTPUTS, period in 0u32..10_000) {
        let mut scheduler = scheduler();
        let msg = ProgramMessage::from_body(
            output,
            &TimedChange { change_period: period, start_color: 1, stop_color: 2 },
        ).unwrap();

        let report = scheduler.handle_message(&msg, 0).unwrap();
        prop_assert_eq!(report.applied, 1);
        prop_assert_eq!(scheduler.active_count(), 1);
        prop_assert_eq!(scheduler.program_on(output), Some(PROGRAM_TIMED_CHANGE));
    }

    #[test]
    fn bookkeeping_stays_consistent(ops in proptest::collection::vec(op(), 1..40)) {
        let mut scheduler = scheduler();
        let mut now = 0u32;

        for op in &ops {
            match (op, message(op)) {
                (Op::Tick(step), _) => {
                    now = now.wrapping_add(*step);
                    scheduler.tick(now);
                }
                (Op::Cancel(output), Some(msg)) => {
                    prop_assert!(scheduler.handle_message(&msg, now).is_ok());
                    let cleared: Vec<u8> = if *output == ALL_OUTPUTS {
                        (0..OUTPUTS).collect()
                    } else {
                        vec![*output]
                    };
                    for index in cleared {
                        prop_assert!(scheduler.tracker(index).unwrap().is_empty());
                    }
                }
                (_, Some(msg)) => {
                    let report = scheduler.handle_message(&msg, now).unwrap();
                    prop_assert!(report.is_clean());
                }
                (_, None) => unreachable!(),
            }

            let running = (0..OUTPUTS)
                .filter(|&i| matches!(scheduler.tracker(i), Some(Tracker::Running(_))))
                .count();
            prop_assert_eq!(scheduler.active_count(), running);
        }

        // With nothing running, a tick reports no change
        let cancel = ProgramMessage::from_body(ALL_OUTPUTS, &Cancel).unwrap();
        scheduler.handle_message(&cancel, now).unwrap();
        prop_assert!(!scheduler.tick(now.wrapping_add(1)));
        prop_assert_eq!(scheduler.active_count(), 0);
    }
}
