mod config;

use dotenv::dotenv;
use lcd16x2_gpio::delay::{Delay, StdDelay};
use lcd16x2_gpio::lcd::hd44780::driver::{Font, GpioHD44780Driver, HD44780Driver, Lines};
use lcd16x2_gpio::lcd::hd44780::text::{LINE1, LINE2, TextExt};
use lcd16x2_gpio::raw::MmapPorts;
use lcd16x2_gpio::sim::SimulatedHd44780;
use lcd16x2_gpio::PortRegisters;
use log::{debug, info, warn};
use crate::config::{Backend, Config};

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("LCD16x2 demo starting...");

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    let simulated = match config.backend {
        Backend::Simulated => Some(SimulatedHd44780::with_timing(config.timing.into())),
        Backend::Mmap { .. } => None,
    };
    let mapped = match &config.backend {
        Backend::Mmap {
            path,
            offset,
            length,
        } => {
            debug!("Mapping {} bytes of {} at {:#x}...", length, path.display(), offset);
            Some(MmapPorts::open(path, *offset, *length)?)
        }
        Backend::Simulated => None,
    };
    let std_delay = StdDelay::default();

    let (registers, delay): (&dyn PortRegisters, &dyn Delay) = match (&simulated, &mapped) {
        (Some(sim), _) => (sim as &dyn PortRegisters, sim as &dyn Delay),
        (None, Some(ports)) => (ports as &dyn PortRegisters, &std_delay as &dyn Delay),
        (None, None) => eyre::bail!("No register backend available"),
    };
    debug!("{:?} selected.", registers);

    debug!("Initializing LCD driver...");
    let mut lcd = GpioHD44780Driver::new(registers, delay)
        .with_timing(config.timing.into())
        .with_power_on_delay(config.power_on_delay_ms);
    lcd.configure(config.bus_handle(), config.control_lines())?;
    lcd.init(Lines::Two, Font::Font5x8)?;
    lcd.set_display_control(true, true, true)?;
    debug!("{:?} initialized.", lcd);

    let pause = || delay.delay_ms(config.screen_delay_ms);

    lcd.write_line("This is a test 1", LINE1)?;
    pause();
    lcd.write_line("This is a test 2", LINE2)?;
    pause();
    show(&simulated);

    lcd.clear_display()?;
    lcd.set_display_control(true, false, false)?;

    lcd.write_line("Temp: 25 deg.", LINE1)?;
    pause();
    show(&simulated);

    // Only the value changes, the label stays
    for reading in ["35 deg.", "45 deg.", "5 deg."] {
        lcd.write_at(reading, LINE1, 6, 7)?;
        pause();
        show(&simulated);
    }

    if let Some(sim) = &simulated {
        let violations = sim.violations();
        if violations.is_empty() {
            info!("No timing violations in {} ns of bus activity.", sim.now_ns());
        } else {
            warn!("{} timing violations: {:?}", violations.len(), violations);
        }
    }

    info!("Done.");
    Ok(())
}

/// Logs what the simulated display shows.
fn show(simulated: &Option<SimulatedHd44780>) {
    if let Some(sim) = simulated {
        info!("|{}|", sim.line_text(LINE1));
        info!("|{}|", sim.line_text(LINE2));
    }
}
