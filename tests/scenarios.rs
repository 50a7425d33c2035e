mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use jiff::Timestamp;
use timeshift::{ActivationPolicy, Environment, Error, OptionsPatch, VirtualClock};

use common::{instant, isolated, noon};

#[test]
fn set_time_round_trips() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    for text in [
        "1969-07-20T20:17:40Z",
        "2024-02-29T23:59:59.999Z",
        "2038-01-19T03:14:08Z",
    ] {
        let target = instant(text);
        assert_eq!(clock.set_time(target).unwrap(), target);
        assert_eq!(clock.current_time(), target);
    }
}

#[test]
fn add_minutes_has_an_inverse() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    for minutes in [0.0, 1.0, 0.3, 59.999, 1_440.5, 123_456.789] {
        let before = clock.current_time();
        clock.add_minutes(minutes).unwrap();
        clock.add_minutes(-minutes).unwrap();
        assert_eq!(clock.current_time(), before, "minutes={minutes}");
    }
}

#[test]
fn add_days_crosses_month_boundary() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    clock.add_days(31.0).unwrap();
    assert_eq!(clock.current_time(), instant("2024-02-01T12:00:00Z"));
}

#[test]
fn helpers_use_fixed_multipliers() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    clock.add_hours(-2.0).unwrap();
    clock.add_minutes(30.0).unwrap();
    clock.add_time(1_500.0).unwrap();
    assert_eq!(clock.current_time(), instant("2024-01-01T10:30:01.5Z"));
}

#[test]
fn invalid_time_leaves_clock_unchanged() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    let before = clock.current_time();
    let err = clock.set_time("not-a-date").expect_err("garbage must be rejected");
    assert!(matches!(err, Error::InvalidTime(_)));
    assert!(matches!(clock.set_time(f64::NAN), Err(Error::InvalidTime(_))));
    assert!(matches!(
        clock.add_time(f64::INFINITY),
        Err(Error::InvalidDuration(_))
    ));
    assert_eq!(clock.current_time(), before);
}

#[test]
fn subscriber_sees_each_change_once_until_unsubscribed() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    let seen = Arc::new(Mutex::new(Vec::<Timestamp>::new()));
    let sub = {
        let seen = seen.clone();
        clock.subscribe(move |ts| seen.lock().unwrap().push(ts))
    };

    let target = instant("2030-06-15T08:00:00Z");
    clock.set_time(target).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![target]);

    sub.unsubscribe();
    sub.unsubscribe();
    clock.set_time(noon()).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![target]);
}

#[test]
fn failing_subscriber_does_not_starve_the_next() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    let _first = clock.subscribe(|_| panic!("first subscriber fails"));
    let received = Arc::new(Mutex::new(None));
    let _second = {
        let received = received.clone();
        clock.subscribe(move |ts| *received.lock().unwrap() = Some(ts))
    };

    let target = instant("2025-05-05T05:05:05Z");
    clock.set_time(target).expect("mutation is not affected by subscriber panics");
    assert_eq!(*received.lock().unwrap(), Some(target));
}

#[test]
fn production_auto_policy_refuses_enable() {
    let (_surface, options) = isolated(Environment::Production);
    let clock = VirtualClock::new(options.with_activation(ActivationPolicy::Auto));
    assert!(!clock.is_active());
    assert!(!clock.enable());
    assert!(!clock.is_active());
}

#[test]
fn on_change_fires_for_mutations_and_catches_up_when_replaced() {
    let (_surface, options) = isolated(Environment::Test);
    let first_hits = Arc::new(AtomicUsize::new(0));
    let clock = {
        let hits = first_hits.clone();
        VirtualClock::new(options.with_on_change(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        }))
    };
    clock.add_minutes(5.0).unwrap();
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);

    let caught_up = Arc::new(Mutex::new(None));
    {
        let caught_up = caught_up.clone();
        clock.update_options(
            OptionsPatch::new().on_change(move |ts| *caught_up.lock().unwrap() = Some(ts)),
        );
    }
    assert_eq!(*caught_up.lock().unwrap(), Some(clock.current_time()));

    clock.add_minutes(5.0).unwrap();
    assert_eq!(first_hits.load(Ordering::SeqCst), 1);
    assert_eq!(*caught_up.lock().unwrap(), Some(clock.current_time()));

    clock.update_options(OptionsPatch::new().clear_on_change());
    assert!(clock.options().on_change.is_none());
}

#[test]
fn notifications_arrive_from_other_threads() {
    let (_surface, options) = isolated(Environment::Test);
    let clock = VirtualClock::new(options);
    let hits = Arc::new(AtomicUsize::new(0));
    let _sub = {
        let hits = hits.clone();
        clock.subscribe(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    };
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let clock = clock.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    clock.add_minutes(1.0).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 100);
    assert_eq!(clock.current_time(), instant("2024-01-01T13:40:00Z"));
}
