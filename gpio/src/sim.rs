//! Simulated HD44780 wired to a simulated set of AVR-style port registers.
//!
//! [SimulatedHd44780] implements both [PortRegisters] and [Delay] over a virtual nanosecond
//! clock, so a driver can run against it without real hardware or real waiting. It records
//! every change of the bus signals with its virtual timestamp, and checks each transfer
//! against the controller's timing contract.
//!
//! Port layout:
//! - [DATA_PORT], [DATA_PIN], [DATA_DDR]: output latch, input and direction register of the
//!   8-bit data bus.
//! - [CONTROL_PORT], [CONTROL_PIN]: output latch and input register of the control lines,
//!   RS on bit [RS_BIT], R/W on bit [RW_BIT] and E on bit [E_BIT].

use crate::delay::Delay;
use crate::lcd::hd44780::driver::{
    ADDRESS_MASK, BUSY_FLAG, BusTiming, CGRAM_ADDRESS_MASK, ControlLines, DATA_EXECUTION_TIME_US,
    Register, execution_time_us,
};
use crate::{BusHandle, GpioError, GpioResult, PinHandle, Port, PortRegisters};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};

pub const DATA_PORT: Port = Port(0);
pub const DATA_PIN: Port = Port(1);
pub const DATA_DDR: Port = Port(2);
pub const CONTROL_PORT: Port = Port(3);
pub const CONTROL_PIN: Port = Port(4);
const PORT_COUNT: usize = 5;

pub const RS_BIT: u8 = 0;
pub const RW_BIT: u8 = 1;
pub const E_BIT: u8 = 2;

const DDRAM_SIZE: usize = 0x80;
const CGRAM_SIZE: usize = 0x40;
const VISIBLE_COLUMNS: usize = 16;

/// A change of a bus signal, as seen by the controller.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Signal {
    Rs(bool),
    Rw(bool),
    Enable(bool),
    /// The host wrote the data bus output latch.
    Data(u8),
    /// The host wrote the data bus direction register.
    Direction(u8),
    /// The host sampled the data bus input register.
    Sample(u8),
    /// The controller latched a written byte on the falling edge of E.
    Latched(Register, u8),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BusEvent {
    pub at_ns: u64,
    pub signal: Signal,
}

/// A breach of the controller's bus timing or handshake.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Violation {
    /// E rose too soon after RS or R/W changed.
    AddressSetup { at_ns: u64, elapsed_ns: u64 },
    /// E was high for too short a time.
    PulseWidth { at_ns: u64, elapsed_ns: u64 },
    /// RS, R/W or the data bus changed too soon after E fell.
    Hold { at_ns: u64, elapsed_ns: u64 },
    /// The bus was sampled before the controller drove valid data.
    DataOutputDelay { at_ns: u64, elapsed_ns: u64 },
    /// The data bus changed while the controller was sampling it.
    DataUnstable { at_ns: u64 },
    /// RS or R/W changed while E was high.
    ControlChangedWhileEnabled { at_ns: u64 },
    /// A write strobe found the host not driving the bus.
    BusNotDriven { at_ns: u64 },
    /// A read strobe found the host still driving the bus.
    BusContention { at_ns: u64 },
    /// A write was latched while the controller was still busy.
    WriteWhileBusy { at_ns: u64 },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Ram {
    Ddram,
    Cgram,
}

/// Controller-side state of the HD44780.
#[derive(Debug, Clone)]
struct Controller {
    ddram: [u8; DDRAM_SIZE],
    cgram: [u8; CGRAM_SIZE],
    address: u8,
    ram: Ram,
    increment: bool,
    shift: bool,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    eight_bit: bool,
    two_lines: bool,
    tall_font: bool,
    busy_until_ns: u64,
}

impl Default for Controller {
    fn default() -> Self {
        Controller {
            ddram: [b' '; DDRAM_SIZE],
            cgram: [0; CGRAM_SIZE],
            address: 0,
            ram: Ram::Ddram,
            increment: true,
            shift: false,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            eight_bit: true,
            two_lines: false,
            tall_font: false,
            busy_until_ns: 0,
        }
    }
}

impl Controller {
    fn execute(&mut self, command: u8, now_ns: u64) {
        self.busy_until_ns = now_ns + execution_time_us(command) * 1_000;

        match command.leading_zeros() {
            7 => {
                self.ddram = [b' '; DDRAM_SIZE];
                self.address = 0;
                self.ram = Ram::Ddram;
                self.increment = true;
            }
            6 => {
                self.address = 0;
                self.ram = Ram::Ddram;
            }
            5 => {
                self.increment = command & 0b10 != 0;
                self.shift = command & 0b01 != 0;
            }
            4 => {
                self.display_on = command & 0b100 != 0;
                self.cursor_on = command & 0b010 != 0;
                self.blink_on = command & 0b001 != 0;
            }
            3 => {
                // Cursor moves only, the display window is not modelled
                if command & 0b1000 == 0 {
                    let increment = command & 0b0100 != 0;
                    self.step(increment);
                }
            }
            2 => {
                self.eight_bit = command & 0b10000 != 0;
                self.two_lines = command & 0b01000 != 0;
                self.tall_font = command & 0b00100 != 0;
            }
            1 => {
                self.address = command & CGRAM_ADDRESS_MASK;
                self.ram = Ram::Cgram;
            }
            0 => {
                self.address = command & ADDRESS_MASK;
                self.ram = Ram::Ddram;
            }
            _ => {}
        }
    }

    fn write_data(&mut self, data: u8, now_ns: u64) {
        self.busy_until_ns = now_ns + DATA_EXECUTION_TIME_US * 1_000;
        match self.ram {
            Ram::Ddram => self.ddram[self.address as usize & (DDRAM_SIZE - 1)] = data,
            Ram::Cgram => self.cgram[self.address as usize & (CGRAM_SIZE - 1)] = data,
        }
        self.step(self.increment);
    }

    fn read_data(&mut self) -> u8 {
        let data = match self.ram {
            Ram::Ddram => self.ddram[self.address as usize & (DDRAM_SIZE - 1)],
            Ram::Cgram => self.cgram[self.address as usize & (CGRAM_SIZE - 1)],
        };
        self.step(self.increment);
        data
    }

    fn status(&self, now_ns: u64) -> u8 {
        let busy = if now_ns < self.busy_until_ns { BUSY_FLAG } else { 0 };
        busy | (self.address & ADDRESS_MASK)
    }

    /// Moves the address counter by one, skipping the unused DDRAM ranges.
    fn step(&mut self, increment: bool) {
        self.address = match (self.ram, self.two_lines, increment) {
            (Ram::Cgram, _, true) => self.address.wrapping_add(1) & CGRAM_ADDRESS_MASK,
            (Ram::Cgram, _, false) => self.address.wrapping_sub(1) & CGRAM_ADDRESS_MASK,
            (Ram::Ddram, true, true) => match self.address {
                0x27 => 0x40,
                0x67 => 0x00,
                address => (address + 1) & ADDRESS_MASK,
            },
            (Ram::Ddram, true, false) => match self.address {
                0x40 => 0x27,
                0x00 => 0x67,
                address => address - 1,
            },
            (Ram::Ddram, false, true) => match self.address {
                0x4F => 0x00,
                address => (address + 1) & ADDRESS_MASK,
            },
            (Ram::Ddram, false, false) => match self.address {
                0x00 => 0x4F,
                address => address - 1,
            },
        };
    }
}

#[derive(Debug)]
struct SimState {
    now_ns: u64,
    ports: [u8; PORT_COUNT],
    controller: Controller,
    timing: BusTiming,
    events: Vec<BusEvent>,
    violations: Vec<Violation>,
    forced_status: Option<u8>,
    last_control_change_ns: u64,
    enable_rose_ns: Option<u64>,
    enable_fell_ns: Option<u64>,
    /// Byte the controller drives while E is high in read mode.
    read_value: Option<u8>,
}

impl SimState {
    fn record(&mut self, signal: Signal) {
        let at_ns = self.now_ns;
        self.events.push(BusEvent { at_ns, signal });
    }

    fn control(&self, bit: u8) -> bool {
        self.ports[CONTROL_PORT.0] & (1 << bit) != 0
    }

    fn check_hold(&mut self) {
        if let Some(fell) = self.enable_fell_ns {
            let elapsed_ns = self.now_ns - fell;
            if elapsed_ns < self.timing.hold_ns {
                let at_ns = self.now_ns;
                self.violations.push(Violation::Hold { at_ns, elapsed_ns });
            }
        }
    }

    fn write_control(&mut self, value: u8) {
        let previous = self.ports[CONTROL_PORT.0];
        self.ports[CONTROL_PORT.0] = value;
        let changed = previous ^ value;

        if changed & (1 << RS_BIT) != 0 {
            self.control_changed(Signal::Rs(value & (1 << RS_BIT) != 0));
        }
        if changed & (1 << RW_BIT) != 0 {
            self.control_changed(Signal::Rw(value & (1 << RW_BIT) != 0));
        }

        if changed & (1 << E_BIT) != 0 {
            if value & (1 << E_BIT) != 0 {
                self.enable_rise();
            } else {
                self.enable_fall();
            }
        }
    }

    fn control_changed(&mut self, signal: Signal) {
        self.record(signal);
        if self.enable_rose_ns.is_some() {
            let at_ns = self.now_ns;
            self.violations
                .push(Violation::ControlChangedWhileEnabled { at_ns });
        }
        self.check_hold();
        self.last_control_change_ns = self.now_ns;
    }

    fn enable_rise(&mut self) {
        self.record(Signal::Enable(true));
        let at_ns = self.now_ns;

        let elapsed_ns = at_ns - self.last_control_change_ns;
        if elapsed_ns < self.timing.address_setup_ns {
            self.violations
                .push(Violation::AddressSetup { at_ns, elapsed_ns });
        }

        self.enable_rose_ns = Some(at_ns);
        self.enable_fell_ns = None;

        if self.control(RW_BIT) {
            if self.ports[DATA_DDR.0] != 0x00 {
                self.violations.push(Violation::BusContention { at_ns });
            }
            self.read_value = Some(if self.control(RS_BIT) {
                self.controller.read_data()
            } else {
                self.forced_status
                    .unwrap_or_else(|| self.controller.status(at_ns))
            });
        } else if self.ports[DATA_DDR.0] != 0xFF {
            self.violations.push(Violation::BusNotDriven { at_ns });
        }
    }

    fn enable_fall(&mut self) {
        self.record(Signal::Enable(false));
        let at_ns = self.now_ns;

        if let Some(rose) = self.enable_rose_ns.take() {
            let elapsed_ns = at_ns - rose;
            if elapsed_ns < self.timing.enable_pulse_ns {
                self.violations
                    .push(Violation::PulseWidth { at_ns, elapsed_ns });
            }
        }
        self.enable_fell_ns = Some(at_ns);
        self.read_value = None;

        if !self.control(RW_BIT) {
            if at_ns < self.controller.busy_until_ns {
                self.violations.push(Violation::WriteWhileBusy { at_ns });
            }

            let data = self.ports[DATA_PORT.0];
            if self.control(RS_BIT) {
                self.record(Signal::Latched(Register::Data, data));
                self.controller.write_data(data, at_ns);
            } else {
                self.record(Signal::Latched(Register::Instruction, data));
                self.controller.execute(data, at_ns);
            }
        }
    }

    fn write_data_port(&mut self, value: u8) {
        self.ports[DATA_PORT.0] = value;
        self.record(Signal::Data(value));

        if self.enable_rose_ns.is_some() && !self.control(RW_BIT) {
            let at_ns = self.now_ns;
            self.violations.push(Violation::DataUnstable { at_ns });
        }
        self.check_hold();
    }

    fn write_direction(&mut self, value: u8) {
        self.ports[DATA_DDR.0] = value;
        self.record(Signal::Direction(value));
        self.check_hold();
    }

    fn sample(&mut self) -> u8 {
        let value = match (self.enable_rose_ns, self.read_value) {
            (Some(rose), Some(value)) => {
                let elapsed_ns = self.now_ns - rose;
                if elapsed_ns < self.timing.data_delay_ns {
                    let at_ns = self.now_ns;
                    self.violations
                        .push(Violation::DataOutputDelay { at_ns, elapsed_ns });
                }
                value
            }
            // Nobody drives the bus, the pins follow the latch
            _ => self.ports[DATA_PORT.0] & self.ports[DATA_DDR.0],
        };
        self.record(Signal::Sample(value));
        value
    }
}

/// Simulated HD44780 behind simulated port registers, running on a virtual clock.
///
/// Both the [PortRegisters] and the [Delay] handed to the driver should be the same instance,
/// so that delays advance the clock the controller checks its timings against.
pub struct SimulatedHd44780 {
    state: RefCell<SimState>,
}

impl SimulatedHd44780 {
    pub fn new() -> Self {
        Self::with_timing(BusTiming::default())
    }

    /// Creates a simulation checking the bus against the given timing minimums.
    pub fn with_timing(timing: BusTiming) -> Self {
        SimulatedHd44780 {
            state: RefCell::new(SimState {
                now_ns: 0,
                ports: [0; PORT_COUNT],
                controller: Controller::default(),
                timing,
                events: Vec::new(),
                violations: Vec::new(),
                forced_status: None,
                last_control_change_ns: 0,
                enable_rose_ns: None,
                enable_fell_ns: None,
                read_value: None,
            }),
        }
    }

    /// The data bus as wired to the simulation.
    pub fn bus() -> BusHandle {
        BusHandle::new(DATA_PORT, DATA_PIN, DATA_DDR)
    }

    /// The control lines as wired to the simulation.
    pub fn control_lines() -> ControlLines {
        ControlLines {
            rs: PinHandle::new(CONTROL_PORT, RS_BIT).with_input(CONTROL_PIN),
            rw: PinHandle::new(CONTROL_PORT, RW_BIT).with_input(CONTROL_PIN),
            enable: PinHandle::new(CONTROL_PORT, E_BIT).with_input(CONTROL_PIN),
        }
    }

    /// Current virtual time.
    pub fn now_ns(&self) -> u64 {
        self.state.borrow().now_ns
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn violations(&self) -> Vec<Violation> {
        self.state.borrow().violations.clone()
    }

    /// Makes every status read return `status` instead of the controller's own.
    pub fn force_status(&self, status: Option<u8>) {
        self.state.borrow_mut().forced_status = status;
    }

    /// Keeps the controller busy for the given time from now.
    pub fn busy_for_ns(&self, ns: u64) {
        let mut state = self.state.borrow_mut();
        state.controller.busy_until_ns = state.now_ns + ns;
    }

    pub fn address_counter(&self) -> u8 {
        self.state.borrow().controller.address
    }

    pub fn ddram(&self, address: u8) -> u8 {
        self.state.borrow().controller.ddram[address as usize & (DDRAM_SIZE - 1)]
    }

    pub fn cgram(&self, address: u8) -> u8 {
        self.state.borrow().controller.cgram[address as usize & (CGRAM_SIZE - 1)]
    }

    /// The 16 visible characters of a line, `1` or `2`.
    pub fn line_text(&self, line: u8) -> String {
        let state = self.state.borrow();
        let start = if line == 2 { 0x40 } else { 0x00 };
        state.controller.ddram[start..start + VISIBLE_COLUMNS]
            .iter()
            .map(|&byte| if byte.is_ascii_graphic() || byte == b' ' { byte as char } else { '?' })
            .collect()
    }

    /// Display, cursor and blink state, as set by Display On/Off Control.
    pub fn display_control(&self) -> (bool, bool, bool) {
        let state = self.state.borrow();
        let controller = &state.controller;
        (controller.display_on, controller.cursor_on, controller.blink_on)
    }

    /// Interface width, line count and tall font state, as set by Function Set.
    pub fn function_set(&self) -> (bool, bool, bool) {
        let state = self.state.borrow();
        let controller = &state.controller;
        (controller.eight_bit, controller.two_lines, controller.tall_font)
    }

    /// Address counter direction and display shift, as set by Entry Mode Set.
    pub fn entry_mode(&self) -> (bool, bool) {
        let state = self.state.borrow();
        let controller = &state.controller;
        (controller.increment, controller.shift)
    }
}

impl Default for SimulatedHd44780 {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for SimulatedHd44780 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimulatedHd44780(t={}ns)", self.now_ns())
    }
}

impl PortRegisters for SimulatedHd44780 {
    fn read(&self, port: Port) -> GpioResult<u8> {
        let mut state = self.state.borrow_mut();
        match port {
            DATA_PIN => Ok(state.sample()),
            CONTROL_PIN => Ok(state.ports[CONTROL_PORT.0]),
            Port(index) if index < PORT_COUNT => Ok(state.ports[index]),
            _ => Err(GpioError::InvalidArgument),
        }
    }

    fn write(&self, port: Port, value: u8) -> GpioResult<()> {
        let mut state = self.state.borrow_mut();
        match port {
            DATA_PORT => state.write_data_port(value),
            DATA_DDR => state.write_direction(value),
            CONTROL_PORT => state.write_control(value),
            DATA_PIN | CONTROL_PIN => return Err(GpioError::NotSupported),
            _ => return Err(GpioError::InvalidArgument),
        }
        Ok(())
    }
}

impl Delay for SimulatedHd44780 {
    fn delay_ns(&self, ns: u64) {
        let mut state = self.state.borrow_mut();
        state.now_ns = state.now_ns.saturating_add(ns);
    }
}
