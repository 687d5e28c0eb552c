use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fixedpoint_pid::{IntegerPidController, ManualClock, PidConfig};
use log::*;

/// Drive the fixed-point PID controller against a simulated oven.
///
/// Temperatures are in tenths of a degree Celsius, output is heater power
/// in percent.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(long, default_value_t = 0.1)]
    kp: f64,
    #[clap(long, default_value_t = 0.002)]
    ki: f64,
    #[clap(long, default_value_t = 0.0)]
    kd: f64,
    /// Target temperature (0.1 °C)
    #[clap(long, default_value_t = 1800)]
    setpoint: i64,
    #[clap(long, default_value_t = 0)]
    min: i64,
    #[clap(long, default_value_t = 100)]
    max: i64,
    /// JSON controller config; overrides the gain, setpoint and limit flags
    #[clap(long)]
    config: Option<PathBuf>,
    #[clap(long, default_value_t = 1000)]
    period_ms: u64,
    #[clap(long, default_value_t = 600)]
    steps: u32,
    /// Log every n-th step
    #[clap(long, default_value_t = 10)]
    report_every: u32,
    /// Use the constant-interval update (one second per step)
    #[clap(long)]
    const_interval: bool,
}

/// First-order thermal model with Newton cooling.
struct Oven {
    temperature: f32,
    ambient: f32,
    max_heating_rate: f32,
    thermal_mass: f32,
    heat_loss_coefficient: f32,
}

impl Oven {
    fn new() -> Self {
        Self {
            temperature: 25.0,
            ambient: 25.0,
            max_heating_rate: 3.0, // °C/s at 100% power
            thermal_mass: 0.3,
            heat_loss_coefficient: 0.01,
        }
    }

    fn measure(&self) -> i64 {
        (self.temperature * 10.0).round() as i64
    }

    fn step(&mut self, power_percent: i64, dt: Duration) {
        let power = power_percent.clamp(0, 100) as f32 / 100.0;
        let heat_input = self.max_heating_rate * power;
        let heat_loss = self.heat_loss_coefficient * (self.temperature - self.ambient);
        let net_heat_rate = (heat_input - heat_loss) * self.thermal_mass;

        self.temperature += net_heat_rate * dt.as_secs_f32();
        if self.temperature < self.ambient {
            self.temperature = self.ambient;
        }
    }
}

fn build_controller(args: &Args) -> Result<IntegerPidController, Box<dyn Error>> {
    if let Some(path) = &args.config {
        let bytes = std::fs::read(path)?;
        let pid = PidConfig::from_json(&bytes)?.build()?;
        info!("Loaded controller config from {}", path.display());
        return Ok(pid);
    }

    let mut pid = IntegerPidController::new(args.kp, args.ki, args.kd);
    pid.set_setpoint(args.setpoint)
        .set_output_limits(args.min, args.max)?;
    Ok(pid)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_nanos()
        .init();

    let args = Args::parse();
    let mut pid = build_controller(&args)?;
    let period = Duration::from_millis(args.period_ms);

    if args.const_interval && period != Duration::from_secs(1) {
        warn!(
            "Constant-interval mode assumes 1 s steps, period is {} ms",
            args.period_ms
        );
    }

    let (kp, ki, kd) = pid.pid();
    let (min, max) = pid.output_limits();
    info!(
        "Simulating {} steps: kp={} ki={} kd={} setpoint={} limits=[{}, {}]",
        args.steps,
        kp,
        ki,
        kd,
        pid.setpoint(),
        min,
        max
    );

    let clock = ManualClock::new();
    let mut oven = Oven::new();
    let report_every = args.report_every.max(1);

    for step in 0..args.steps {
        let measurement = oven.measure();
        let power = if args.const_interval {
            pid.update_const_interval(measurement)
        } else {
            pid.update_with_clock(measurement, &clock)
        };

        oven.step(power, period);
        clock.advance(period);

        if step % report_every == 0 {
            info!(
                "t={:>6.1}s temp={:>6.1}°C power={:>3}% integral={}",
                (step as f32) * period.as_secs_f32(),
                measurement as f32 / 10.0,
                power,
                pid.integral()
            );
        }
    }

    info!(
        "Final temperature {:.1}°C (target {:.1}°C)",
        oven.measure() as f32 / 10.0,
        pid.setpoint() as f32 / 10.0
    );
    Ok(())
}
