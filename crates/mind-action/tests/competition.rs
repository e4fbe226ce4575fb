use std::cell::RefCell;
use std::rc::Rc;

use mind_action::{ActionGroup, ActionNode, ActionSource};
use mind_core::{Config, Fiber, MindBuilder, MindError, SampleMode};

type Log = Rc<RefCell<Vec<(u64, String, f32)>>>;

/// Records `(tick, key, value)` for every action the node emits.
fn record(builder: &mut MindBuilder, node: &ActionNode, log: &Log) {
    let (log, clock) = (Rc::clone(log), builder.clock());
    node.to(builder, move |kv| {
        log.borrow_mut()
            .push((clock.now(), kv.key.to_string(), kv.value));
        Ok(())
    })
    .unwrap();
}

fn two_candidates(builder: &mut MindBuilder) -> (ActionGroup, ActionNode, ActionNode) {
    let top = builder.top();
    let group = ActionGroup::new(builder, top, "move").unwrap();
    let a = group.action(builder, "a").unwrap();
    a.ticks(builder, 2).unwrap();
    let b = group.action(builder, "b").unwrap();
    b.ticks(builder, 2).unwrap();
    (group, a, b)
}

fn entry(tick: u64, key: &str, value: f32) -> (u64, String, f32) {
    (tick, key.to_string(), value)
}

#[test]
fn excited_candidate_runs_for_its_duration() {
    let mut builder = MindBuilder::new("body").with_seed(1).with_trace_log();
    let (group, a, b) = two_candidates(&mut builder);
    let log = Log::default();
    record(&mut builder, &a, &log);
    record(&mut builder, &b, &log);
    let mut mind = builder.build().unwrap();

    a.excite(0.5).unwrap();

    mind.tick().unwrap();
    assert!(a.is_active());
    assert!(!b.is_active());
    assert_eq!(*log.borrow(), vec![entry(1, "a", 1.0)]);

    mind.tick().unwrap();
    assert!(!a.is_active());
    assert_eq!(group.current(), None);
    assert_eq!(*log.borrow(), vec![entry(1, "a", 1.0), entry(2, "a", 0.0)]);

    mind.tick().unwrap();
    assert_eq!(log.borrow().len(), 2);

    let trace = mind.take_trace_log().unwrap();
    let starts: Vec<_> = trace
        .tagged("action")
        .map(|e| (e.tick, e.subject.as_str()))
        .collect();
    assert_eq!(starts, vec![(1, "move.a")]);
}

#[test]
fn completed_action_can_be_selected_again() {
    let mut builder = MindBuilder::new("body");
    let (_group, a, _b) = two_candidates(&mut builder);
    let log = Log::default();
    record(&mut builder, &a, &log);
    let mut mind = builder.build().unwrap();

    a.excite(1.0).unwrap();
    mind.run(2).unwrap();
    a.excite(1.0).unwrap();
    mind.run(3).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            entry(1, "a", 1.0),
            entry(2, "a", 0.0),
            entry(3, "a", 1.0),
            entry(4, "a", 0.0),
        ]
    );
}

#[test]
fn signals_while_busy_are_dropped() {
    let mut builder = MindBuilder::new("body");
    let (group, a, b) = two_candidates(&mut builder);
    let log = Log::default();
    record(&mut builder, &a, &log);
    record(&mut builder, &b, &log);
    let mut mind = builder.build().unwrap();

    a.excite(1.0).unwrap();
    mind.tick().unwrap();
    b.excite(1.0).unwrap();
    mind.tick().unwrap();
    mind.tick().unwrap();

    assert_eq!(group.current(), None);
    assert!(log.borrow().iter().all(|(_, key, _)| key == "a"));
}

#[test]
fn excitation_during_a_tick_is_seen_on_the_next_tick() {
    for sensor_first in [true, false] {
        let mut builder = MindBuilder::new("body");
        let top = builder.top();
        let sensor = builder.node(top, "sensor").unwrap();
        let stimulus: Fiber<mind_core::KeyValue> = builder.fiber(sensor, "odor").unwrap();

        if sensor_first {
            let s = stimulus.clone();
            builder
                .add_ticker(sensor, move |ctx| {
                    if ctx.tick == 1 {
                        s.send_key_value("food", 0.7, 1.0)?;
                    }
                    Ok(())
                })
                .unwrap();
        }

        let (_group, a, _b) = two_candidates(&mut builder);
        stimulus.to(&mut builder, a.excite_input()).unwrap();
        let log = Log::default();
        record(&mut builder, &a, &log);

        if !sensor_first {
            let s = stimulus.clone();
            builder
                .add_ticker(sensor, move |ctx| {
                    if ctx.tick == 1 {
                        s.send_key_value("food", 0.7, 1.0)?;
                    }
                    Ok(())
                })
                .unwrap();
        }

        let mut mind = builder.build().unwrap();
        mind.tick().unwrap();
        assert!(log.borrow().is_empty(), "sensor_first = {sensor_first}");
        mind.tick().unwrap();
        assert_eq!(*log.borrow(), vec![entry(2, "a", 1.0)]);
    }
}

#[test]
fn least_inhibited_candidate_wins_at_the_strict_factor() {
    let mut builder = MindBuilder::new("body").with_sample_mode(SampleMode::Max);
    let (group, a, b) = two_candidates(&mut builder);
    let mut mind = builder.build().unwrap();

    a.excite(1.0).unwrap();
    a.inhibit(1.0).unwrap();
    b.excite(0.2).unwrap();
    mind.tick().unwrap();

    assert_eq!(group.current().as_deref(), Some("b"));
}

#[test]
fn fully_inhibited_candidate_still_wins_when_alone() {
    let mut builder = MindBuilder::new("body");
    let (group, a, _b) = two_candidates(&mut builder);
    let mut mind = builder.build().unwrap();

    a.excite(0.4).unwrap();
    a.inhibit(1.0).unwrap();
    mind.tick().unwrap();

    assert_eq!(group.current().as_deref(), Some("a"));
}

#[test]
fn max_mode_prefers_the_higher_weight() {
    let mut builder = MindBuilder::new("body").with_sample_mode(SampleMode::Max);
    let (group, a, b) = two_candidates(&mut builder);
    let mut mind = builder.build().unwrap();

    a.excite(0.9).unwrap();
    b.excite(0.3).unwrap();
    mind.tick().unwrap();

    assert_eq!(group.current().as_deref(), Some("a"));
}

#[test]
fn group_reports_idle_and_busy_ticks() {
    let mut builder = MindBuilder::new("body");
    let (group, a, _b) = two_candidates(&mut builder);
    let events = Rc::new(RefCell::new(Vec::new()));

    let e = Rc::clone(&events);
    group
        .on_idle(&mut builder, move |key| {
            e.borrow_mut().push(format!("{key}"));
            Ok(())
        })
        .unwrap();
    let e = Rc::clone(&events);
    group
        .on_action_copy(&mut builder, move |kv| {
            e.borrow_mut()
                .push(format!("{}:{}:{}", kv.key, kv.value, kv.p));
            Ok(())
        })
        .unwrap();
    let mut mind = builder.build().unwrap();

    mind.tick().unwrap();
    a.excite(1.0).unwrap();
    mind.run(3).unwrap();

    assert_eq!(*events.borrow(), vec!["idle", "a:1:0", "a:1:0", "idle"]);
}

#[test]
fn zero_excitation_never_nominates() {
    let mut builder = MindBuilder::new("body");
    let (group, a, _b) = two_candidates(&mut builder);
    let mut mind = builder.build().unwrap();

    a.excite(0.0).unwrap();
    a.inhibit(0.5).unwrap();
    mind.tick().unwrap();

    assert_eq!(group.current(), None);
    assert!(!a.is_active());
}

#[test]
fn out_of_range_signals_are_rejected() {
    let mut builder = MindBuilder::new("body");
    let (group, a, _b) = two_candidates(&mut builder);

    assert!(matches!(
        a.value(&mut builder, 1.2),
        Err(MindError::OutOfRange { what: "value", .. })
    ));
    assert!(matches!(
        group.bias(&mut builder, -0.1),
        Err(MindError::OutOfRange { what: "bias", .. })
    ));
    assert!(matches!(
        a.ticks(&mut builder, 0),
        Err(MindError::InvalidDuration { ticks: 0, .. })
    ));
    let _mind = builder.build().unwrap();

    assert!(matches!(
        a.excite(1.5),
        Err(MindError::OutOfRange { what: "excite", .. })
    ));
    assert!(a.inhibit(-0.25).is_err());
    assert!(a.excite(f32::NAN).is_err());
    assert!(group.pending_weights(2.0).is_err());
}

#[test]
fn stop_frees_the_group_without_completing() {
    let mut builder = MindBuilder::new("body");
    let (group, a, b) = two_candidates(&mut builder);
    a.ticks(&mut builder, 5).unwrap();
    let completed = Rc::new(RefCell::new(0));
    let c = Rc::clone(&completed);
    a.on_complete(&mut builder, move |_| {
        *c.borrow_mut() += 1;
        Ok(())
    })
    .unwrap();
    let mut mind = builder.build().unwrap();

    a.excite(1.0).unwrap();
    mind.tick().unwrap();
    assert_eq!(a.remaining(), 4);

    a.stop();
    assert!(!a.is_active());
    assert_eq!(group.current(), None);

    b.excite(1.0).unwrap();
    mind.tick().unwrap();
    assert_eq!(group.current().as_deref(), Some("b"));
    assert_eq!(*completed.borrow(), 0);
}

#[test]
fn key_and_value_shape_the_emitted_payloads() {
    let mut builder = MindBuilder::new("body");
    let (_group, a, _b) = two_candidates(&mut builder);
    a.key(&mut builder, "forward").unwrap().value(&mut builder, 0.5).unwrap();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    a.to(&mut builder, move |kv| {
        s.borrow_mut().push(("action", kv.clone()));
        Ok(())
    })
    .unwrap();
    let s = Rc::clone(&seen);
    a.on_complete(&mut builder, move |kv| {
        s.borrow_mut().push(("complete", kv.clone()));
        Ok(())
    })
    .unwrap();
    let mut mind = builder.build().unwrap();

    a.excite(1.0).unwrap();
    mind.run(2).unwrap();

    let seen = seen.borrow();
    let summary: Vec<_> = seen
        .iter()
        .map(|(what, kv)| (*what, kv.key.as_str(), kv.value, kv.p))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("action", "forward", 1.0, 1.0),
            ("action", "forward", 0.0, 1.0),
            ("complete", "forward", 0.5, 0.0),
        ]
    );
}

#[test]
fn default_duration_comes_from_theta() {
    let mut builder = MindBuilder::new("body").with_config(Config::new().with("theta", 3));
    let top = builder.top();
    let group = ActionGroup::new(&mut builder, top, "move").unwrap();
    let a = group.action(&mut builder, "a").unwrap();
    let b = group.action(&mut builder, "b").unwrap();
    b.ticks(&mut builder, 7).unwrap();
    assert_eq!(group.duration(), 3);

    let other = ActionGroup::new(&mut builder, top, "turn").unwrap();
    other.ticks(&mut builder, 4).unwrap();
    let c = other.action(&mut builder, "c").unwrap();

    let _mind = builder.build().unwrap();
    assert_eq!(a.duration(), 3);
    assert_eq!(b.duration(), 7);
    assert_eq!(c.duration(), 4);
}

#[test]
fn pending_weights_are_reported_without_consuming() {
    let mut builder = MindBuilder::new("body");
    let (group, a, _b) = two_candidates(&mut builder);
    group.bias(&mut builder, 0.3).unwrap();
    let mut mind = builder.build().unwrap();
    assert_eq!(group.bias_value(), 0.3);

    a.excite(0.5).unwrap();
    a.excite(0.25).unwrap();
    a.inhibit(0.4).unwrap();

    let strict = group.pending_weights(0.0).unwrap();
    assert_eq!(strict[0].0, "a");
    assert!((strict[0].1 - 0.1).abs() < 1e-6);
    assert_eq!(strict[1].1, 0.0);
    assert_eq!(group.pending_weights(1.0).unwrap()[0].1, 0.5);

    mind.tick().unwrap();
    assert_eq!(group.current().as_deref(), Some("a"));
    assert_eq!(group.pending_weights(1.0).unwrap()[0].1, 0.0);
}

#[test]
fn source_excites_its_targets_on_the_next_tick() {
    let mut builder = MindBuilder::new("body").with_sample_mode(SampleMode::Max);
    let top = builder.top();
    let trigger: Fiber<()> = builder.fiber(top, "bump").unwrap();
    let source = ActionSource::new(&mut builder, top, "avoid").unwrap();
    let (group, a, b) = two_candidates(&mut builder);
    source
        .target(&mut builder, a.excite_input(), 0.2)
        .unwrap()
        .target(&mut builder, b.excite_input(), 0.9)
        .unwrap()
        .activate_on(&mut builder, &trigger)
        .unwrap();
    let mut mind = builder.build().unwrap();

    trigger.trigger().unwrap();
    mind.tick().unwrap();
    assert_eq!(group.current(), None);
    mind.tick().unwrap();
    assert_eq!(group.current().as_deref(), Some("b"));
}

#[test]
fn wiring_a_running_group_through_another_builder_fails() {
    let mut builder = MindBuilder::new("body").with_sample_mode(SampleMode::Max);
    let (group, a, b) = two_candidates(&mut builder);
    let log = Log::default();
    record(&mut builder, &a, &log);
    let mut mind = builder.build().unwrap();

    let mut other = MindBuilder::new("other");
    let err = group.action(&mut other, "late").unwrap_err();
    assert!(matches!(err, MindError::ForeignWiring { .. }));
    assert!(group.ticks(&mut other, 5).is_err());
    assert!(a.key(&mut other, "hijack").is_err());
    assert!(a.to(&mut other, |_| Ok(())).is_err());
    assert!(b.ticks(&mut other, 1).is_err());
    assert_eq!(group.duration(), 10);
    assert_eq!(group.pending_weights(1.0).unwrap().len(), 2);

    a.excite(1.0).unwrap();
    mind.tick().unwrap();
    assert_eq!(group.current().as_deref(), Some("a"));
    mind.tick().unwrap();
    assert_eq!(group.current(), None);
    assert_eq!(*log.borrow(), vec![entry(1, "a", 1.0), entry(2, "a", 0.0)]);
}
