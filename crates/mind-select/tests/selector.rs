use std::cell::RefCell;
use std::rc::Rc;

use mind_core::{Fiber, KeyValue, Mind, MindBuilder, MindError};
use mind_select::{Selector, SelectorOutput, Settings};

type Fired = Rc<RefCell<Vec<(u64, String, f32)>>>;

struct Rig {
    mind: Mind,
    selector: Selector,
    fired: Fired,
    active: Rc<RefCell<u32>>,
    pulses: Vec<(Fiber<()>, Fiber<()>)>,
}

impl Rig {
    /// One selector with outputs `o0..` wired to select/unselect pulse fibers.
    fn new(priorities: &[f32], configure: impl FnOnce(&mut MindBuilder, &Selector)) -> Self {
        let mut builder = MindBuilder::new("body");
        let top = builder.top();
        let selector = Selector::new(&mut builder, top, "selector").unwrap();
        let fired = Fired::default();
        let active = Rc::new(RefCell::new(0));

        let mut pulses = Vec::new();
        for (i, &p) in priorities.iter().enumerate() {
            let output = selector.choose(&mut builder, &format!("o{i}")).unwrap();
            let select: Fiber<()> = builder.fiber(output.id(), "select").unwrap();
            let unselect: Fiber<()> = builder.fiber(output.id(), "unselect").unwrap();
            output
                .when(&mut builder, &select, p)
                .unwrap()
                .unless(&mut builder, &unselect)
                .unwrap();
            record(&mut builder, &output, &fired);
            pulses.push((select, unselect));
        }

        let a = Rc::clone(&active);
        selector
            .on_active(&mut builder, move |_| {
                *a.borrow_mut() += 1;
                Ok(())
            })
            .unwrap();
        configure(&mut builder, &selector);

        Self {
            mind: builder.build().unwrap(),
            selector,
            fired,
            active,
            pulses,
        }
    }

    fn select(&self, output: usize) {
        self.pulses[output].0.trigger().unwrap();
    }

    fn unselect(&self, output: usize) {
        self.pulses[output].1.trigger().unwrap();
    }

    fn tick(&mut self) {
        self.mind.tick().unwrap();
    }

    fn fired_ticks(&self) -> Vec<u64> {
        self.fired.borrow().iter().map(|(tick, _, _)| *tick).collect()
    }

    fn fired_names(&self) -> Vec<String> {
        self.fired.borrow().iter().map(|(_, name, _)| name.clone()).collect()
    }
}

fn record(builder: &mut MindBuilder, output: &SelectorOutput, fired: &Fired) {
    let (fired, clock) = (Rc::clone(fired), builder.clock());
    output
        .to(builder, move |kv| {
            fired
                .borrow_mut()
                .push((clock.now(), kv.key.to_string(), kv.value));
            Ok(())
        })
        .unwrap();
}

#[test]
fn selected_output_fires_for_its_select_window() {
    let mut rig = Rig::new(&[1.0], |_, _| {});

    rig.tick();
    rig.select(0);
    for _ in 0..5 {
        rig.tick();
    }

    assert_eq!(rig.fired_ticks(), vec![3, 4]);
    assert_eq!(*rig.active.borrow(), 1);
}

#[test]
fn unselect_one_tick_after_select_suppresses_the_output() {
    let mut rig = Rig::new(&[1.0], |_, _| {});

    rig.select(0);
    rig.tick();
    rig.unselect(0);
    rig.tick();
    rig.tick();
    rig.tick();

    assert!(rig.fired_ticks().is_empty());
}

#[test]
fn select_and_unselect_in_one_window_is_vetoed() {
    let mut rig = Rig::new(&[1.0], |_, _| {});

    rig.select(0);
    rig.unselect(0);
    for _ in 0..4 {
        rig.tick();
    }

    assert!(rig.fired_ticks().is_empty());
    assert_eq!(*rig.active.borrow(), 0);
}

#[test]
fn select_after_an_expiring_unselect_fires() {
    let mut rig = Rig::new(&[1.0], |_, _| {});

    rig.unselect(0);
    rig.tick();
    rig.select(0);
    rig.tick();
    rig.tick();
    rig.tick();

    assert_eq!(rig.fired_ticks(), vec![3, 4]);
}

#[test]
fn highest_priority_wins_and_ties_go_to_the_first_pulse() {
    let mut rig = Rig::new(&[0.2, 0.9, 0.9], |_, _| {});

    rig.select(0);
    rig.select(2);
    rig.select(1);
    rig.tick();
    rig.tick();

    assert_eq!(rig.fired_names(), vec!["o2"]);
}

#[test]
fn vetoed_output_gives_way_to_the_next_best() {
    let mut rig = Rig::new(&[0.2, 0.9], |_, _| {});

    rig.select(0);
    rig.select(1);
    rig.unselect(1);
    rig.tick();
    rig.tick();

    assert_eq!(rig.fired_names(), vec!["o0"]);
}

#[test]
fn interrupt_ignores_inputs_for_its_countdown() {
    let mut rig = Rig::new(&[1.0], |_, _| {});
    assert_eq!(rig.selector.settings(), Settings::default());

    rig.selector.interrupt();
    assert_eq!(rig.selector.interrupted(), 0);
    rig.select(0);
    rig.tick();
    assert_eq!(rig.selector.interrupted(), 3);
    for _ in 0..3 {
        rig.select(0);
        rig.tick();
    }
    assert_eq!(rig.selector.interrupted(), 0);
    assert!(rig.fired_ticks().is_empty());

    rig.select(0);
    rig.tick();
    rig.tick();
    assert_eq!(rig.fired_ticks(), vec![6]);
}

#[test]
fn interrupt_can_be_wired_to_a_fiber() {
    let alarm: Rc<RefCell<Option<Fiber<()>>>> = Rc::default();
    let a = Rc::clone(&alarm);
    let mut rig = Rig::new(&[1.0], move |builder, selector| {
        let fiber: Fiber<()> = builder.fiber(selector.id(), "alarm").unwrap();
        selector
            .interrupt_ticks(builder, 2)
            .unwrap()
            .interrupt_on(builder, &fiber)
            .unwrap();
        *a.borrow_mut() = Some(fiber);
    });
    let alarm = alarm.borrow_mut().take().unwrap();

    alarm.trigger().unwrap();
    rig.select(0);
    rig.tick();
    rig.select(0);
    rig.tick();
    rig.select(0);
    rig.tick();
    rig.tick();

    assert_eq!(rig.fired_ticks(), vec![4]);
}

/// A sensor ticker raises the alarm at tick 1 while a select pulse from
/// before tick 1 is pending. Returns the ticks the output fired on.
fn alarm_during_tick_one(sensor_first: bool) -> Vec<u64> {
    let mut builder = MindBuilder::new("body");
    let top = builder.top();
    let sensor = builder.node(top, "sensor").unwrap();
    let alarm: Fiber<()> = builder.fiber(sensor, "alarm").unwrap();
    let raise = |builder: &mut MindBuilder| {
        let alarm = alarm.clone();
        builder
            .add_ticker(sensor, move |ctx| {
                if ctx.tick == 1 {
                    alarm.trigger()?;
                }
                Ok(())
            })
            .unwrap();
    };

    if sensor_first {
        raise(&mut builder);
    }
    let selector = Selector::new(&mut builder, top, "selector").unwrap();
    let output = selector.choose(&mut builder, "o").unwrap();
    if !sensor_first {
        raise(&mut builder);
    }

    let select: Fiber<()> = builder.fiber(top, "select").unwrap();
    output.when(&mut builder, &select, 1.0).unwrap();
    selector.interrupt_on(&mut builder, &alarm).unwrap();
    let fired = Fired::default();
    record(&mut builder, &output, &fired);
    let mut mind = builder.build().unwrap();

    select.trigger().unwrap();
    mind.run(8).unwrap();
    assert_eq!(selector.interrupted(), 0);

    let ticks: Vec<u64> = fired.borrow().iter().map(|(tick, _, _)| *tick).collect();
    ticks
}

#[test]
fn interrupt_from_a_ticker_starts_on_the_next_tick_in_either_order() {
    let sensor_first = alarm_during_tick_one(true);
    let selector_first = alarm_during_tick_one(false);

    assert_eq!(sensor_first, vec![2, 3]);
    assert_eq!(sensor_first, selector_first);
}

#[test]
fn interrupt_blocks_pulses_from_the_tick_after_it_was_raised() {
    let mut rig = Rig::new(&[1.0], |_, _| {});

    rig.tick();
    rig.selector.interrupt();
    rig.select(0);
    rig.tick();
    assert_eq!(rig.selector.interrupted(), 3);
    for _ in 0..4 {
        rig.tick();
    }

    assert!(rig.fired_ticks().is_empty());
    assert_eq!(*rig.active.borrow(), 0);
}

#[test]
fn gated_selector_waits_for_activation() {
    let gate: Rc<RefCell<Option<Fiber<()>>>> = Rc::default();
    let g = Rc::clone(&gate);
    let mut rig = Rig::new(&[1.0], move |builder, selector| {
        let fiber: Fiber<()> = builder.fiber(selector.id(), "dopamine").unwrap();
        selector.when(builder, &fiber).unwrap();
        *g.borrow_mut() = Some(fiber);
    });
    let gate = gate.borrow_mut().take().unwrap();

    rig.select(0);
    rig.tick();
    rig.tick();
    assert!(rig.fired_ticks().is_empty());

    rig.select(0);
    gate.trigger().unwrap();
    rig.tick();
    rig.tick();
    assert_eq!(rig.fired_ticks(), vec![4]);
}

#[test]
fn key_value_pulses_carry_their_value() {
    let mut builder = MindBuilder::new("body");
    let top = builder.top();
    let selector = Selector::new(&mut builder, top, "selector").unwrap();
    selector.select_ticks(&mut builder, 1).unwrap();
    let output = selector.choose(&mut builder, "turn").unwrap();
    let sense: Fiber<KeyValue> = builder.fiber(top, "sense").unwrap();
    output.when(&mut builder, &sense, 0.5).unwrap();
    let fired = Fired::default();
    record(&mut builder, &output, &fired);
    let mut mind = builder.build().unwrap();

    sense.send_key_value("light", 0.25, 1.0).unwrap();
    mind.run(3).unwrap();

    assert_eq!(*fired.borrow(), vec![(2, "turn".to_string(), 0.25)]);
    assert_eq!(output.countdowns(), (0, 0));
}

#[test]
fn invalid_settings_and_priorities_are_rejected() {
    let mut builder = MindBuilder::new("body");
    let top = builder.top();
    let selector = Selector::new(&mut builder, top, "selector").unwrap();
    let output = selector.choose(&mut builder, "o").unwrap();
    let fiber: Fiber<()> = builder.fiber(top, "pulse").unwrap();

    assert!(matches!(
        selector.select_ticks(&mut builder, 0),
        Err(MindError::InvalidDuration { ticks: 0, .. })
    ));
    assert!(matches!(
        output.when(&mut builder, &fiber, 1.5),
        Err(MindError::OutOfRange { what: "p", .. })
    ));
    assert!(matches!(
        selector.choose(&mut builder, "o"),
        Err(MindError::DuplicateNode { .. })
    ));
}

#[test]
fn selector_wiring_through_another_builder_fails() {
    let mut builder = MindBuilder::new("body");
    let top = builder.top();
    let selector = Selector::new(&mut builder, top, "selector").unwrap();
    let output = selector.choose(&mut builder, "o").unwrap();
    let respond = selector.choose_context(&mut builder, "respond").unwrap();
    let _mind = builder.build().unwrap();

    let mut other = MindBuilder::new("other");
    let top = other.top();
    let pulse: Fiber<()> = other.fiber(top, "pulse").unwrap();

    assert!(matches!(
        selector.choose(&mut other, "late"),
        Err(MindError::ForeignWiring { .. })
    ));
    assert!(selector.select_ticks(&mut other, 1).is_err());
    assert!(selector.interrupt_ticks(&mut other, 1).is_err());
    assert!(selector.interrupt_on(&mut other, &pulse).is_err());
    assert!(output.when(&mut other, &pulse, 1.0).is_err());
    assert!(respond.learn_pair(&mut other, None, "food").is_err());
    assert_eq!(selector.settings(), Settings::default());
}
