use std::env::var_os;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use lcd16x2_gpio::lcd::hd44780::driver::{BusTiming, ControlLines};
use lcd16x2_gpio::sim;
use lcd16x2_gpio::{BusHandle, PinHandle, Port};
use serde::{Deserialize, Serialize};

const DEFAULT_CONFIG_FILE: &str = "lcd16x2.json";

/// Where the port registers come from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backend {
    /// A simulated controller on a virtual clock.
    Simulated,
    /// A memory-mapped register block, e.g. `/dev/mem` at the GPIO base.
    Mmap {
        path: PathBuf,
        offset: u64,
        length: usize,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PinConfig {
    pub port: usize,
    pub bit: u8,
    #[serde(default)]
    pub input: Option<usize>,
}

impl PinConfig {
    fn handle(&self) -> PinHandle {
        let pin = PinHandle::new(Port(self.port), self.bit);
        match self.input {
            Some(input) => pin.with_input(Port(input)),
            None => pin,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BusConfig {
    pub output: usize,
    pub input: usize,
    pub direction: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TimingConfig {
    pub address_setup_ns: u64,
    pub enable_pulse_ns: u64,
    pub data_delay_ns: u64,
    pub hold_ns: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let timing = BusTiming::default();
        TimingConfig {
            address_setup_ns: timing.address_setup_ns,
            enable_pulse_ns: timing.enable_pulse_ns,
            data_delay_ns: timing.data_delay_ns,
            hold_ns: timing.hold_ns,
        }
    }
}

impl From<TimingConfig> for BusTiming {
    fn from(config: TimingConfig) -> Self {
        BusTiming {
            address_setup_ns: config.address_setup_ns,
            enable_pulse_ns: config.enable_pulse_ns,
            data_delay_ns: config.data_delay_ns,
            hold_ns: config.hold_ns,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub bus: BusConfig,
    pub rs: PinConfig,
    pub rw: PinConfig,
    pub enable: PinConfig,
    pub timing: TimingConfig,
    pub power_on_delay_ms: u64,
    /// Pause between demo screens.
    pub screen_delay_ms: u64,
}

impl Config {
    fn path() -> PathBuf {
        let config_str = var_os("LCD16X2_CONFIG");
        let config_str: &OsStr = config_str
            .as_deref()
            .unwrap_or(OsStr::new(DEFAULT_CONFIG_FILE));
        Path::new(config_str).to_path_buf()
    }

    pub fn try_load() -> Option<Self> {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Option<Self> {
        if path.exists() {
            let file = std::fs::File::open(path).ok()?;
            let reader = std::io::BufReader::new(file);
            serde_json::from_reader(reader).ok()
        } else {
            None
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn bus_handle(&self) -> BusHandle {
        BusHandle::new(
            Port(self.bus.output),
            Port(self.bus.input),
            Port(self.bus.direction),
        )
    }

    pub fn control_lines(&self) -> ControlLines {
        ControlLines {
            rs: self.rs.handle(),
            rw: self.rw.handle(),
            enable: self.enable.handle(),
        }
    }
}

impl Default for Config {
    /// Matches the wiring of the simulated controller: data bus on one port, RS, R/W and E on
    /// bits 0 to 2 of another.
    fn default() -> Self {
        let pin = |bit| PinConfig {
            port: sim::CONTROL_PORT.0,
            bit,
            input: Some(sim::CONTROL_PIN.0),
        };
        Config {
            backend: Backend::Simulated,
            bus: BusConfig {
                output: sim::DATA_PORT.0,
                input: sim::DATA_PIN.0,
                direction: sim::DATA_DDR.0,
            },
            rs: pin(sim::RS_BIT),
            rw: pin(sim::RW_BIT),
            enable: pin(sim::E_BIT),
            timing: TimingConfig::default(),
            power_on_delay_ms: 40,
            screen_delay_ms: 1000,
        }
    }
}
