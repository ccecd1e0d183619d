use lcd16x2_gpio::lcd::hd44780::driver::{
    BusTiming, ControlLines, CursorMove, Direction, Font, GpioHD44780Driver, HD44780Driver,
    LcdError, Lines, Register,
};
use lcd16x2_gpio::lcd::hd44780::text::{LINE1, LINE2, TextExt};
use lcd16x2_gpio::sim::{BusEvent, SimulatedHd44780, Signal, Violation};
use lcd16x2_gpio::{BusHandle, GpioError, GpioResult, PinHandle, Port, PortRegisters};

fn configured(sim: &SimulatedHd44780) -> GpioHD44780Driver<'_> {
    let mut lcd = GpioHD44780Driver::new(sim, sim);
    lcd.configure(SimulatedHd44780::bus(), SimulatedHd44780::control_lines())
        .unwrap();
    lcd
}

fn initialized(sim: &SimulatedHd44780) -> GpioHD44780Driver<'_> {
    let mut lcd = configured(sim);
    lcd.init(Lines::Two, Font::Font5x8).unwrap();
    sim.clear_events();
    lcd
}

fn relative(events: &[BusEvent], start_ns: u64) -> Vec<(u64, Signal)> {
    events
        .iter()
        .map(|event| (event.at_ns - start_ns, event.signal))
        .collect()
}

fn latched(sim: &SimulatedHd44780) -> Vec<(u64, Register, u8)> {
    sim.events()
        .iter()
        .filter_map(|event| match event.signal {
            Signal::Latched(register, data) => Some((event.at_ns, register, data)),
            _ => None,
        })
        .collect()
}

#[test]
fn unconfigured_driver_touches_nothing() {
    let sim = SimulatedHd44780::new();
    let mut lcd = GpioHD44780Driver::new(&sim, &sim);

    assert!(!lcd.is_configured());
    assert_eq!(lcd.write_register(Register::Data, b'A'), Err(LcdError::NotConfigured));
    assert_eq!(lcd.read_register(Register::Instruction), Err(LcdError::NotConfigured));
    assert_eq!(lcd.init(Lines::Two, Font::Font5x8), Err(LcdError::NotConfigured));
    assert_eq!(lcd.clear_display(), Err(LcdError::NotConfigured));
    assert_eq!(lcd.is_busy(), Err(LcdError::NotConfigured));
    assert_eq!(lcd.read_address_counter(), Err(LcdError::NotConfigured));
    assert_eq!(lcd.write_line("Hello", LINE1), Err(LcdError::NotConfigured));

    assert!(sim.events().is_empty());
    assert_eq!(sim.now_ns(), 0);
}

#[test]
fn configure_only_once() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);

    assert!(lcd.is_configured());
    assert_eq!(
        lcd.configure(SimulatedHd44780::bus(), SimulatedHd44780::control_lines()),
        Err(LcdError::AlreadyConfigured)
    );
}

#[test]
fn configure_rejects_bad_bindings() {
    let sim = SimulatedHd44780::new();
    let mut lcd = GpioHD44780Driver::new(&sim, &sim);
    let mut lines = SimulatedHd44780::control_lines();

    lines.enable = PinHandle::new(Port(3), 8);
    assert!(matches!(
        lcd.configure(SimulatedHd44780::bus(), lines),
        Err(LcdError::InvalidPinBinding(_))
    ));

    lines.enable = lines.rw;
    assert!(matches!(
        lcd.configure(SimulatedHd44780::bus(), lines),
        Err(LcdError::InvalidPinBinding(_))
    ));

    assert!(!lcd.is_configured());
    assert!(sim.events().is_empty());
}

#[test]
fn configure_leaves_bus_idle() {
    let sim = SimulatedHd44780::new();
    let _lcd = configured(&sim);
    let lines = SimulatedHd44780::control_lines();

    assert!(!lines.enable.read(&sim).unwrap());
    assert!(lines.rw.read(&sim).unwrap());
    assert!(!lines.rs.read(&sim).unwrap());
    assert_eq!(sim.read(SimulatedHd44780::bus().direction).unwrap(), 0x00);
}

#[test]
fn write_transfer_follows_timing_contract() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);
    sim.clear_events();
    let start = sim.now_ns();

    lcd.write_register(Register::Data, b'A').unwrap();

    assert_eq!(
        relative(&sim.events(), start),
        vec![
            (0, Signal::Rs(true)),
            (0, Signal::Rw(false)),
            (40, Signal::Direction(0xFF)),
            (40, Signal::Data(b'A')),
            (40, Signal::Enable(true)),
            (270, Signal::Enable(false)),
            (270, Signal::Latched(Register::Data, b'A')),
            (280, Signal::Rw(true)),
            (280, Signal::Direction(0x00)),
            (280, Signal::Rs(false)),
        ]
    );
    assert!(sim.violations().is_empty());
}

#[test]
fn read_transfer_follows_timing_contract() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);
    sim.clear_events();
    sim.force_status(Some(0x85));
    let start = sim.now_ns();

    assert_eq!(lcd.read_register(Register::Instruction).unwrap(), 0x85);

    assert_eq!(
        relative(&sim.events(), start),
        vec![
            (0, Signal::Direction(0x00)),
            (40, Signal::Enable(true)),
            (190, Signal::Sample(0x85)),
            (270, Signal::Enable(false)),
            (280, Signal::Direction(0x00)),
        ]
    );
    assert!(sim.violations().is_empty());
}

#[test]
fn custom_timing_is_honoured() {
    let timing = BusTiming {
        address_setup_ns: 140,
        enable_pulse_ns: 450,
        data_delay_ns: 360,
        hold_ns: 20,
    };
    let sim = SimulatedHd44780::with_timing(timing);
    let mut lcd = GpioHD44780Driver::new(&sim, &sim).with_timing(timing);
    lcd.configure(SimulatedHd44780::bus(), SimulatedHd44780::control_lines())
        .unwrap();

    lcd.init(Lines::Two, Font::Font5x8).unwrap();
    lcd.write_line("slow bus", LINE2).unwrap();

    assert_eq!(lcd.timing(), timing);
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
    assert_eq!(sim.line_text(2), "slow bus        ");
}

#[test]
fn too_short_enable_pulse_is_detected() {
    let sim = SimulatedHd44780::new();
    let mut lcd = GpioHD44780Driver::new(&sim, &sim).with_timing(BusTiming {
        enable_pulse_ns: 100,
        ..BusTiming::default()
    });
    lcd.configure(SimulatedHd44780::bus(), SimulatedHd44780::control_lines())
        .unwrap();

    lcd.write_register(Register::Instruction, 0x01).unwrap();

    let violations = sim.violations();
    assert!(matches!(
        violations.as_slice(),
        [Violation::PulseWidth { elapsed_ns: 100, .. }]
    ));
}

#[test]
fn is_busy_follows_bit_seven_only() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);

    for status in 0..=u8::MAX {
        sim.force_status(Some(status));
        assert_eq!(lcd.is_busy().unwrap(), status & 0x80 != 0, "status {:08b}", status);
        assert_eq!(lcd.read_address_counter().unwrap(), status & 0x7F);
        assert_eq!(
            lcd.get_busy_flag_and_address().unwrap(),
            (status >= 0x80, status & 0x7F)
        );
    }
}

#[test]
fn init_runs_power_on_sequence() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);
    assert!(!lcd.is_startup_complete());

    lcd.init(Lines::Two, Font::Font5x8).unwrap();

    assert!(lcd.is_startup_complete());
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());

    let commands: Vec<u8> = latched(&sim).iter().map(|&(_, _, data)| data).collect();
    assert_eq!(
        commands,
        vec![0x30, 0x30, 0x30, 0x38, 0b00001100, 0x01, 0b00000110, 0x02]
    );

    let latched = latched(&sim);
    assert!(latched[0].0 >= 40_000_000);
    assert!(latched[1].0 - latched[0].0 >= 4_100_000);
    assert!(latched[2].0 - latched[1].0 >= 100_000);

    assert_eq!(sim.function_set(), (true, true, false));
    assert_eq!(sim.display_control(), (true, false, false));
    assert_eq!(sim.entry_mode(), (true, false));
    assert_eq!(sim.address_counter(), 0);
}

#[test]
fn busy_flag_is_only_polled_after_function_set() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);
    lcd.init(Lines::Two, Font::Font5x8).unwrap();

    let events = sim.events();
    let function_set = events
        .iter()
        .position(|event| event.signal == Signal::Latched(Register::Instruction, 0x38))
        .unwrap();

    assert!(
        events[..function_set]
            .iter()
            .all(|event| !matches!(event.signal, Signal::Sample(_)))
    );
    assert!(
        events[function_set..]
            .iter()
            .any(|event| matches!(event.signal, Signal::Sample(status) if status & 0x80 != 0))
    );
}

#[test]
fn writes_wait_for_busy_controller() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);
    let start = sim.now_ns();
    sim.busy_for_ns(5_000);

    lcd.send_data(b'Z').unwrap();

    let (latched_at, _, _) = latched(&sim)[0];
    assert!(latched_at - start >= 5_000);
    assert!(sim.violations().is_empty());
    assert_eq!(sim.ddram(0x00), b'Z');
}

#[test]
fn font_request_is_dropped_for_two_lines() {
    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);
    lcd.init(Lines::Two, Font::Font5x10).unwrap();
    assert_eq!(sim.function_set(), (true, true, false));

    let sim = SimulatedHd44780::new();
    let mut lcd = configured(&sim);
    lcd.init(Lines::One, Font::Font5x10).unwrap();
    assert_eq!(sim.function_set(), (true, false, true));
}

#[test]
fn address_counter_round_trip() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    for address in (0x00..=0x27).chain(0x40..=0x67) {
        lcd.set_ddram_address(address).unwrap();
        assert_eq!(lcd.read_address_counter().unwrap(), address);
    }
    assert!(sim.violations().is_empty());
}

#[test]
fn cursor_shift_and_return_home_move_address_counter() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.set_ddram_address(0x05).unwrap();
    lcd.cursor_shift(Direction::Right, Direction::Left).unwrap();
    assert_eq!(lcd.read_address_counter().unwrap(), 0x06);

    lcd.cursor_shift(Direction::Left, Direction::Left).unwrap();
    lcd.cursor_shift(Direction::Left, Direction::Left).unwrap();
    assert_eq!(lcd.read_address_counter().unwrap(), 0x04);

    lcd.return_home().unwrap();
    assert_eq!(lcd.read_address_counter().unwrap(), 0x00);
}

#[test]
fn decrementing_entry_mode_writes_backwards() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.set_entry_mode(CursorMove::Decrement, false).unwrap();
    lcd.set_ddram_address(0x42).unwrap();
    lcd.print("abc").unwrap();

    assert_eq!(sim.line_text(2), "cba             ");
    assert_eq!(sim.entry_mode(), (false, false));
}

#[test]
fn display_control_is_forwarded() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.set_display_control(true, true, true).unwrap();
    assert_eq!(sim.display_control(), (true, true, true));
    lcd.set_display_control(false, false, true).unwrap();
    assert_eq!(sim.display_control(), (false, false, true));
}

#[test]
fn register_reads_by_address() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);
    let rows = [0b11111, 0b10001, 0b10101, 0b10001, 0b11111, 0, 0xFF, 0b00100];

    lcd.set_ddram_address(0x45).unwrap();
    lcd.define_glyph(1, &rows).unwrap();
    assert_eq!(lcd.read_address_counter().unwrap(), 0x45);

    lcd.send_data(b'Q').unwrap();
    assert_eq!(sim.ddram(0x45), b'Q');

    for (row, &pattern) in rows.iter().enumerate() {
        assert_eq!(sim.cgram(8 + row as u8), pattern & 0x1F);
    }
    assert_eq!(lcd.read_instruction_register(8 + 2).unwrap(), 0b10101);
    assert_eq!(lcd.read_data_register(0x45).unwrap(), b'Q');

    assert_eq!(lcd.define_glyph(8, &rows), Err(LcdError::InvalidArgument));
    assert!(sim.violations().is_empty());
}

#[test]
fn temperature_field_is_replaced_in_place() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.write_line("ABCDEFGHIJKLMNOP", LINE1).unwrap();
    lcd.write_at("35 deg.", LINE1, 6, 7).unwrap();
    assert_eq!(sim.line_text(1), "ABCDEF35 deg.NOP");

    lcd.write_line("Temp: 25 deg.", LINE1).unwrap();
    lcd.write_at("5 deg.", LINE1, 6, 7).unwrap();
    assert_eq!(sim.line_text(1), "Temp: 5 deg.    ");
    assert!(sim.violations().is_empty());
}

#[test]
fn text_that_does_not_fit_is_refused() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);
    lcd.write_line("Temp: 25 deg.", LINE1).unwrap();
    sim.clear_events();

    assert_eq!(
        lcd.write_at("12345678", LINE1, 10, 7),
        Err(LcdError::TextTooLong {
            length: 8,
            available: 6
        })
    );
    assert_eq!(
        lcd.write_at("ab", LINE2, 12, 5),
        Err(LcdError::ClearRangeTooWide { start: 12, cells: 5 })
    );
    assert_eq!(
        lcd.write_at("ab", 3, 0, 0),
        Err(LcdError::InvalidPosition { line: 3, column: 0 })
    );
    assert_eq!(
        lcd.write_line("This is too long!", LINE2),
        Err(LcdError::TextTooLong {
            length: 17,
            available: 16
        })
    );

    assert!(sim.events().is_empty());
    assert_eq!(sim.line_text(1), "Temp: 25 deg.   ");
}

#[test]
fn write_line_clears_stale_text() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.write_line("This is a test 1", LINE1).unwrap();
    lcd.write_line("This is a test 2", LINE2).unwrap();
    lcd.write_line("short", LINE1).unwrap();

    assert_eq!(sim.line_text(1), "short           ");
    assert_eq!(sim.line_text(2), "This is a test 2");
}

#[test]
fn empty_text_fits_past_the_last_column() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.write_at("", LINE2, 16, 0).unwrap();
    assert_eq!(lcd.read_address_counter().unwrap(), 0x50);
    lcd.clear_cell(LINE2, 15).unwrap();
    assert_eq!(sim.ddram(0x4F), b' ');
}

#[test]
fn non_ascii_is_substituted() {
    let sim = SimulatedHd44780::new();
    let mut lcd = initialized(&sim);

    lcd.write_line("25°C", LINE2).unwrap();
    assert_eq!(sim.line_text(2), "25?C            ");
}

#[derive(Debug)]
struct BrokenPorts;

impl PortRegisters for BrokenPorts {
    fn read(&self, _port: Port) -> GpioResult<u8> {
        Err(GpioError::Io(std::io::ErrorKind::PermissionDenied))
    }

    fn write(&self, _port: Port, _value: u8) -> GpioResult<()> {
        Err(GpioError::Io(std::io::ErrorKind::PermissionDenied))
    }
}

#[test]
fn port_failures_are_propagated() {
    let sim = SimulatedHd44780::new();
    let mut lcd = GpioHD44780Driver::new(&BrokenPorts, &sim);

    let lines = ControlLines {
        rs: PinHandle::new(Port(0), 0),
        rw: PinHandle::new(Port(0), 1),
        enable: PinHandle::new(Port(0), 2),
    };
    assert_eq!(
        lcd.configure(BusHandle::shared(Port(1), Port(2)), lines),
        Err(LcdError::Gpio(GpioError::Io(
            std::io::ErrorKind::PermissionDenied
        )))
    );
    assert!(!lcd.is_configured());
}
