use timeshift::time::format_offset;
use timeshift::{ClockOptions, Environment, global};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the demo
    let _ = tracing_subscriber::fmt().try_init();

    // TIMESHIFT_* variables, if set, feed the options
    let options = ClockOptions::from_env()?.with_environment(Environment::Development);
    let clock = global::initialize(options);

    let sub = clock.subscribe(|ts| println!("clock moved to {ts}"));

    clock.set_time("2024-01-01T09:00:00Z")?;
    println!("now() = {}", timeshift::now());

    clock.add_days(31.0)?;
    clock.advance_by("2h 30m")?;
    println!("jiff facade = {}", timeshift::integrations::jiff::now());
    println!("offset: {}", format_offset(clock.current_time(), jiff::Timestamp::now()));

    sub.unsubscribe();
    clock.reset_to_real_time()?;
    global::shutdown();
    println!("after shutdown now() = {}", timeshift::now());
    Ok(())
}
