use crate::delay::Delay;
use crate::lcd::hd44780::driver::{
    ADDRESS_MASK, BUSY_FLAG, CursorMove, DATA_EXECUTION_TIME_US, DataLength, Font,
    HD44780Driver, Instruction, LcdError, LcdResult, Lines, Register, execution_time_us,
};
use crate::{BusDirection, BusHandle, GpioResult, PinHandle, PortRegisters};
use log::{debug, trace};

/// Minimum bus timings, in nanoseconds. The defaults are the HD44780 datasheet minimums.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BusTiming {
    /// RS and R/W setup time before E rises (tAS).
    pub address_setup_ns: u64,
    /// E high level width (PWEH).
    pub enable_pulse_ns: u64,
    /// Time from E rising until read data is valid (tDDR).
    pub data_delay_ns: u64,
    /// Address and data hold time after E falls (tAH, tH).
    pub hold_ns: u64,
}

impl Default for BusTiming {
    fn default() -> Self {
        BusTiming {
            address_setup_ns: 40,
            enable_pulse_ns: 230,
            data_delay_ns: 150,
            hold_ns: 10,
        }
    }
}

/// The three control lines of the HD44780.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ControlLines {
    /// Register select.
    pub rs: PinHandle,
    /// Read/write, high for read.
    pub rw: PinHandle,
    /// Enable strobe.
    pub enable: PinHandle,
}

#[derive(Debug, Copy, Clone)]
struct Binding {
    bus: BusHandle,
    lines: ControlLines,
}

/// HD44780 driver bit-banging an 8-bit parallel bus through port registers.
///
/// The driver starts without pin bindings. Every operation fails with
/// [LcdError::NotConfigured] until [GpioHD44780Driver::configure] is called, without touching
/// any register.
///
/// Until the first [Instruction::FunctionSet], instructions are paced with fixed delays of their
/// worst-case execution time, since the busy flag is undefined before the interface width is
/// latched. Afterwards the driver polls the busy flag before every write, without a timeout:
/// a controller that never becomes ready blocks the caller.
///
/// Between transfers E is low, R/W is high (read), RS is low and the data bus is an input.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a> {
    registers: &'a dyn PortRegisters,
    delay: &'a dyn Delay,
    binding: Option<Binding>,
    timing: BusTiming,
    power_on_delay_ms: u64,
    startup_complete: bool,
}

impl<'a> GpioHD44780Driver<'a> {
    /// Creates an unconfigured driver.
    ///
    /// # Parameters
    ///
    /// - `registers`: Port register access of the host.
    /// - `delay`: Used for bus timings and instruction pacing.
    pub fn new(registers: &'a dyn PortRegisters, delay: &'a dyn Delay) -> Self {
        GpioHD44780Driver {
            registers,
            delay,
            binding: None,
            timing: BusTiming::default(),
            power_on_delay_ms: 40,
            startup_complete: false,
        }
    }

    pub fn with_timing(mut self, timing: BusTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the time [HD44780Driver::init] waits for the supply to settle.
    pub fn with_power_on_delay(mut self, ms: u64) -> Self {
        self.power_on_delay_ms = ms;
        self
    }

    /// Binds the driver to its data bus and control lines, and puts them into the idle state.
    ///
    /// The direction bits of the control lines are not touched and must already be outputs.
    ///
    /// # Errors
    /// - [LcdError::AlreadyConfigured] if called a second time.
    /// - [LcdError::InvalidPinBinding] if a bit index is above 7 or two control lines share a bit.
    pub fn configure(&mut self, bus: BusHandle, lines: ControlLines) -> LcdResult<()> {
        if self.binding.is_some() {
            return Err(LcdError::AlreadyConfigured);
        }

        if [lines.rs, lines.rw, lines.enable].iter().any(|pin| pin.bit > 7) {
            return Err(LcdError::InvalidPinBinding("bit index out of range"));
        }
        if lines.rs.overlaps(&lines.rw)
            || lines.rs.overlaps(&lines.enable)
            || lines.rw.overlaps(&lines.enable)
        {
            return Err(LcdError::InvalidPinBinding("control lines share a pin"));
        }

        let binding = Binding { bus, lines };
        self.release(&binding)?;
        self.binding = Some(binding);

        debug!("HD44780 configured: {:?}, {:?}", bus, lines);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.binding.is_some()
    }

    /// Whether a Function Set has been issued, enabling busy flag polling.
    pub fn is_startup_complete(&self) -> bool {
        self.startup_complete
    }

    pub fn timing(&self) -> BusTiming {
        self.timing
    }

    fn binding(&self) -> LcdResult<Binding> {
        self.binding.ok_or(LcdError::NotConfigured)
    }

    /// Puts the control lines and the bus into the idle state.
    fn release(&self, binding: &Binding) -> GpioResult<()> {
        let registers = self.registers;
        binding.lines.enable.clear(registers)?;
        binding.lines.rw.set(registers)?;
        binding.bus.set_direction(registers, BusDirection::Sense)?;
        binding.lines.rs.clear(registers)
    }

    /// Writes one byte to a register, without any pacing.
    pub fn write_register(&mut self, register: Register, data: u8) -> LcdResult<()> {
        let binding = self.binding()?;
        let registers = self.registers;
        let Binding { bus, lines } = binding;

        trace!("Writing {:08b} to {:?} register", data, register);

        // Select the register, write mode
        lines.rs.write(registers, register.rs_level())?;
        lines.rw.clear(registers)?;
        self.delay.delay_ns(self.timing.address_setup_ns);

        // The controller samples the bus while E is high, so the data goes out first
        bus.set_direction(registers, BusDirection::Drive)?;
        bus.write_byte(registers, data)?;
        lines.enable.set(registers)?;
        self.delay.delay_ns(self.timing.enable_pulse_ns);

        lines.enable.clear(registers)?;
        self.delay.delay_ns(self.timing.hold_ns);

        self.release(&binding)?;
        Ok(())
    }

    /// Reads one byte from a register, without any pacing.
    pub fn read_register(&mut self, register: Register) -> LcdResult<u8> {
        let binding = self.binding()?;
        let registers = self.registers;
        let Binding { bus, lines } = binding;

        // Select the register, read mode, and hand the bus over to the controller
        lines.rs.write(registers, register.rs_level())?;
        lines.rw.set(registers)?;
        bus.set_direction(registers, BusDirection::Sense)?;
        self.delay.delay_ns(self.timing.address_setup_ns);

        lines.enable.set(registers)?;
        self.delay.delay_ns(self.timing.data_delay_ns);
        let data = bus.read_byte(registers)?;
        self.delay.delay_ns(
            self.timing
                .enable_pulse_ns
                .saturating_sub(self.timing.data_delay_ns),
        );

        lines.enable.clear(registers)?;
        self.delay.delay_ns(self.timing.hold_ns);

        self.release(&binding)?;

        trace!("Read {:08b} from {:?} register", data, register);
        Ok(data)
    }

    /// Spins on the busy flag once start-up is complete. Returns the last status read.
    fn wait_until_ready(&mut self) -> LcdResult<Option<u8>> {
        if !self.startup_complete {
            return Ok(None);
        }

        let mut polls = 0u32;
        loop {
            let status = self.read_register(Register::Instruction)?;
            if status & BUSY_FLAG == 0 {
                if polls > 0 {
                    trace!("Controller ready after {} busy polls", polls);
                }
                return Ok(Some(status));
            }
            polls = polls.wrapping_add(1);
        }
    }

    /// Before start-up completes, waits out the execution time of the last access instead.
    fn pace(&self, execution_time_us: u64) {
        if !self.startup_complete {
            self.delay.delay_us(execution_time_us);
        }
    }
}

impl HD44780Driver for GpioHD44780Driver<'_> {
    /// Initializes the display for 8-bit operation, following the datasheet's
    /// initialization-by-instruction sequence.
    ///
    /// After the power-on delay, the 8-bit Function Set is sent three times with the mandated
    /// delays, which synchronizes the controller no matter its state. Only then is the real
    /// Function Set sent, completing start-up. The display is then turned on with a hidden
    /// cursor, cleared, set to increment mode and returned home.
    fn init(&mut self, lines: Lines, font: Font) -> LcdResult<()> {
        self.binding()?;
        self.startup_complete = false;

        debug!("Initializing HD44780: {:?}, {:?}", lines, font);
        self.delay.delay_ms(self.power_on_delay_ms);

        // Synchronize
        let sync = Instruction::FunctionSet {
            length: DataLength::EightBit,
            lines: Lines::One,
            font: Font::Font5x8,
        }
        .encode();
        self.send_command(sync)?;
        self.delay.delay_us(4100);
        self.send_command(sync)?;
        self.delay.delay_us(100);
        self.send_command(sync)?;

        self.function_set(DataLength::EightBit, lines, font)?;
        self.set_display_control(true, false, false)?;
        self.clear_display()?;
        self.set_entry_mode(CursorMove::Increment, false)?;
        self.return_home()?;

        debug!("HD44780 initialized");
        Ok(())
    }

    /// Reads the address counter once the controller is ready, as the counter is only updated
    /// after the previous instruction finishes.
    fn read_address_counter(&mut self) -> LcdResult<u8> {
        let status = match self.wait_until_ready()? {
            Some(status) => status,
            None => self.read_command()?,
        };
        Ok(status & ADDRESS_MASK)
    }

    fn send_instruction(&mut self, instruction: Instruction) -> LcdResult<()> {
        self.send_command(instruction.encode())?;

        if let Instruction::FunctionSet { .. } = instruction {
            if !self.startup_complete {
                debug!("Start-up complete, pacing with the busy flag from now on");
            }
            self.startup_complete = true;
        }
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> LcdResult<()> {
        self.binding()?;
        self.wait_until_ready()?;
        self.write_register(Register::Instruction, command)?;
        self.pace(execution_time_us(command));
        Ok(())
    }

    fn send_data(&mut self, data: u8) -> LcdResult<()> {
        self.binding()?;
        self.wait_until_ready()?;
        self.write_register(Register::Data, data)?;
        self.pace(DATA_EXECUTION_TIME_US);
        Ok(())
    }

    fn read_command(&mut self) -> LcdResult<u8> {
        self.read_register(Register::Instruction)
    }

    fn read_data(&mut self) -> LcdResult<u8> {
        self.binding()?;
        self.wait_until_ready()?;
        let data = self.read_register(Register::Data)?;
        self.pace(DATA_EXECUTION_TIME_US);
        Ok(data)
    }
}
